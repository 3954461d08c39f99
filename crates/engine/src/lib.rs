//! Character builder engine library.
//!
//! ## Structure
//!
//! - `use_cases/` - Slot application and the build session façade
//! - `infrastructure/` - External dependency implementations (ports + adapters)

pub mod infrastructure;
pub mod use_cases;
