//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific area of the build.

pub mod build_source;
pub mod session;

pub use build_source::{ApplyReport, BuildSelection, BuildSourceApplier};
pub use session::BuildSession;
