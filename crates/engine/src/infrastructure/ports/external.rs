//! External collaborator ports.

use async_trait::async_trait;

use charbldr_domain::{BuildEvent, BuildSourceKind};

use super::error::ImportError;
use super::types::RuleData;

// =============================================================================
// Event Publication
// =============================================================================

/// Receives build events after a mutation has fully completed.
///
/// Implementations must not call back into the session that published the
/// event; the session is exclusively borrowed while publishing.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &BuildEvent);
}

// =============================================================================
// External Cache Invalidation
// =============================================================================

/// State held outside the engine that depends on a build-source slot, e.g. a
/// UI-side list of pending racial ability choices.
#[cfg_attr(test, mockall::automock)]
pub trait ExternalCachePort: Send + Sync {
    fn invalidate(&self, kind: BuildSourceKind);
}

// =============================================================================
// Rule Data
// =============================================================================

/// Read-only lookup of static rule content.
#[async_trait]
pub trait RuleDataSource: Send + Sync {
    async fn find_race(&self, name: &str, source: Option<&str>) -> Result<RuleData, ImportError>;

    async fn find_subrace(&self, race: &RuleData, name: &str) -> Result<RuleData, ImportError>;

    async fn find_class(&self, name: &str, source: Option<&str>) -> Result<RuleData, ImportError>;

    async fn find_subclass(&self, class: &RuleData, name: &str) -> Result<RuleData, ImportError>;

    async fn find_background(
        &self,
        name: &str,
        source: Option<&str>,
    ) -> Result<RuleData, ImportError>;

    async fn find_feat(&self, name: &str, source: Option<&str>) -> Result<RuleData, ImportError>;
}
