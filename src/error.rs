//! Error types for Synheart Wellbeing

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::ValidationError;

/// Errors that can occur in the wellbeing engine
#[derive(Debug, Error)]
pub enum WellbeingError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Insufficient baseline history for {metric}: {samples} of {required} samples")]
    InsufficientBaseline {
        metric: String,
        samples: usize,
        required: usize,
    },

    #[error("Check-in cooldown active until {next_available_at}")]
    CooldownActive { next_available_at: DateTime<Utc> },

    #[error("Support request {0} has already been claimed")]
    AlreadyClaimed(Uuid),

    #[error("Support request {0} has expired")]
    AlreadyExpired(Uuid),

    #[error("Support request not found: {0}")]
    SupportRequestNotFound(Uuid),

    #[error("User {0} cannot claim their own support request")]
    SelfClaim(String),

    #[error("Caller {0} is not allowed to perform this operation")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Collaborator unavailable: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WellbeingError {
    /// Expected conditions the caller surfaces as state rather than failure
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WellbeingError::InsufficientData(_)
                | WellbeingError::InsufficientBaseline { .. }
                | WellbeingError::CooldownActive { .. }
                | WellbeingError::AlreadyClaimed(_)
                | WellbeingError::AlreadyExpired(_)
        )
    }

    /// Stable machine-readable code for hosts
    pub fn code(&self) -> &'static str {
        match self {
            WellbeingError::InsufficientData(_) => "INSUFFICIENT_DATA",
            WellbeingError::InsufficientBaseline { .. } => "INSUFFICIENT_BASELINE",
            WellbeingError::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            WellbeingError::AlreadyClaimed(_) => "ALREADY_CLAIMED",
            WellbeingError::AlreadyExpired(_) => "ALREADY_EXPIRED",
            WellbeingError::SupportRequestNotFound(_) => "NOT_FOUND",
            WellbeingError::SelfClaim(_) => "SELF_CLAIM",
            WellbeingError::Forbidden(_) => "FORBIDDEN",
            WellbeingError::InvalidInput(_) => "INVALID_INPUT",
            WellbeingError::Collaborator(_) => "COLLABORATOR_UNAVAILABLE",
            WellbeingError::Config(_) => "CONFIG_ERROR",
            WellbeingError::Json(_) => "JSON_ERROR",
            WellbeingError::Toml(_) => "TOML_ERROR",
            WellbeingError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WellbeingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(WellbeingError::InsufficientData("none".into()).is_recoverable());
        assert!(WellbeingError::CooldownActive {
            next_available_at: Utc::now()
        }
        .is_recoverable());
        assert!(WellbeingError::AlreadyClaimed(Uuid::new_v4()).is_recoverable());
        assert!(!WellbeingError::Collaborator("timeout".into()).is_recoverable());
        assert!(!WellbeingError::Forbidden("u1".into()).is_recoverable());
    }

    #[test]
    fn test_cooldown_message_carries_retry_time() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = WellbeingError::CooldownActive {
            next_available_at: at,
        };
        assert!(err.to_string().contains("2024-03-01 12:00:00"));
        assert_eq!(err.code(), "COOLDOWN_ACTIVE");
    }
}
