//! Error types for rule administration.

use crate::geometry::GeometryError;
use crate::rule::RuleId;

/// Error type for rule store and administration operations.
///
/// The variants follow the failure classes callers need to tell apart; mapping
/// them onto a transport (HTTP status codes and the like) is left to the
/// adaptation layer.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Missing or contradictory input.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The referenced rule or instance does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A priority collision the ordering algorithm could not resolve.
    #[error("Priority conflict: {0}")]
    Conflict(String),

    /// Unparsable or non-areal geometry text.
    #[error("Bad geometry: {0}")]
    Format(#[from] GeometryError),
}

impl AdminError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Not-found error for a rule id.
    pub fn rule_not_found(id: RuleId) -> Self {
        Self::NotFound(format!("rule {}", id))
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this is a geometry format error.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Result alias used across the crate.
pub type Result<T, E = AdminError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AdminError::rule_not_found(42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: rule 42");

        let err = AdminError::validation("missing grant type");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Invalid request: missing grant type");
    }

    #[test]
    fn test_geometry_error_converts_to_format() {
        let err: AdminError = GeometryError::Parse("unexpected token".to_string()).into();
        assert!(err.is_format());
        assert!(!err.is_conflict());
    }
}
