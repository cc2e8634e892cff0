use thiserror::Error;

use crate::telephony::ProviderError;

/// Dialer engine errors
#[derive(Error, Debug)]
pub enum DialerError {
    /// Malformed contact or campaign configuration, rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Contact is already leased by another actor
    #[error("Lease conflict: contact {contact_id} is held by another actor")]
    LeaseConflict { contact_id: String },

    /// Telephony collaborator failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Campaign cannot perform the requested operation in its current setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Entity lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lifecycle transition not allowed from the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration file could not be parsed or is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DialerError {
    /// Create a new Validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new LeaseConflict error
    pub fn lease_conflict<S: Into<String>>(contact_id: S) -> Self {
        Self::LeaseConflict { contact_id: contact_id.into() }
    }

    /// Create a new Configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidTransition error
    pub fn invalid_transition<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller can simply retry later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LeaseConflict { .. } | Self::Provider(_))
    }
}

impl From<toml::de::Error> for DialerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for dialer operations
pub type Result<T> = std::result::Result<T, DialerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(DialerError::lease_conflict("c-1").is_recoverable());
        assert!(DialerError::Provider(ProviderError::Unavailable("down".into())).is_recoverable());
        assert!(!DialerError::validation("bad speed").is_recoverable());
        assert!(!DialerError::configuration("no lists").is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = DialerError::lease_conflict("c-42");
        assert_eq!(err.to_string(), "Lease conflict: contact c-42 is held by another actor");
    }
}
