use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Cannot reach the session bus: {message}")]
    Connection { message: String },

    #[error("No activatable service matches '{pattern}'")]
    ServiceNotFound { pattern: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Remote fault from {member}: {message}")]
    RemoteFault { member: String, message: String },

    #[error("Bus communication error: {message}")]
    Communication { message: String },

    #[error("Record decode failed: {message}")]
    DecodeFailure { message: String },

    #[error("Discovery was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The bus or the service is unavailable for the whole session.
    Environment,
    /// A single remote call failed; retrying may help.
    Transient,
    /// A single item was malformed and is dropped.
    Data,
    Cancelled,
    Configuration,
}

impl DiscoveryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DiscoveryError::Connection { .. }
            | DiscoveryError::ServiceNotFound { .. }
            | DiscoveryError::Communication { .. } => ErrorCategory::Environment,
            DiscoveryError::Timeout { .. } | DiscoveryError::RemoteFault { .. } => {
                ErrorCategory::Transient
            }
            DiscoveryError::DecodeFailure { .. } => ErrorCategory::Data,
            DiscoveryError::Cancelled => ErrorCategory::Cancelled,
            DiscoveryError::IoError(_)
            | DiscoveryError::ConfigError { .. }
            | DiscoveryError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Environment => {
                "Check that a session bus is running and the address-book service is installed"
            }
            ErrorCategory::Transient => "The service may be starting up; try again shortly",
            ErrorCategory::Data => "The address book contains a malformed entry",
            ErrorCategory::Cancelled => "Run the discovery again without cancelling it",
            ErrorCategory::Configuration => "Fix the configuration file and run again",
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        DiscoveryError::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn remote_fault(member: impl Into<String>, message: impl Into<String>) -> Self {
        DiscoveryError::RemoteFault {
            member: member.into(),
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        DiscoveryError::DecodeFailure {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_call_level_failures_are_retryable() {
        assert!(DiscoveryError::timeout("OpenAddressBook", Duration::from_secs(1)).is_retryable());
        assert!(DiscoveryError::remote_fault("GetContactList", "gone").is_retryable());
        assert!(!DiscoveryError::Cancelled.is_retryable());
        assert!(!DiscoveryError::ServiceNotFound {
            pattern: "x".to_string()
        }
        .is_retryable());
        assert!(!DiscoveryError::decode("bad").is_retryable());
    }

    #[test]
    fn test_timeout_message_names_operation() {
        let err = DiscoveryError::timeout("OpenAddressBook", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "OpenAddressBook timed out after 1.5s");
    }
}
