//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Rule data lookup (could swap 5etools JSON -> a database)
//! - Event publication (UI, unsaved-changes tracking)
//! - External cache invalidation (state held outside the engine)
//! - Clock (for testing)

mod error;
mod external;
mod testing;
pub mod types;

pub use types::{HitDice, RuleData, StartingProficiencies};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{EventSink, ExternalCachePort, RuleDataSource};

#[cfg(test)]
pub use external::{MockEventSink, MockExternalCachePort};

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::ImportError;
