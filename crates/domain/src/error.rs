//! Unified error types for the domain layer
//!
//! The reconciliation core never fails on malformed rule data (it logs and skips),
//! so this error only surfaces at the edges: parsing value objects from strings
//! and rebuilding a character from its persisted form.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Creates a constraint violation error.
    ///
    /// Use this when a ledger or pool invariant would be broken, e.g. a
    /// persisted choice pool whose `selected` list exceeds its allowance:
    ///
    /// ```ignore
    /// if selected.len() > allowed as usize {
    ///     return Err(DomainError::constraint("skills/race pool over capacity"));
    /// }
    /// ```
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    ///
    /// Use this in `FromStr` implementations when the input string
    /// doesn't match any known variant:
    ///
    /// ```ignore
    /// impl FromStr for Origin {
    ///     type Err = DomainError;
    ///     fn from_str(s: &str) -> Result<Self, Self::Err> {
    ///         match s {
    ///             "race" => Ok(Self::Race),
    ///             _ => Err(DomainError::parse(format!("Unknown origin: {}", s))),
    ///         }
    ///     }
    /// }
    /// ```
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
