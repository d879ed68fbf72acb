use thiserror::Error;

#[derive(Error, Debug)]
pub enum CondenserError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {body}")]
    BackendStatusError { status: u16, body: String },

    #[error("Workflow run failed: {reason}")]
    RunFailed { reason: String },

    #[error("Stream interrupted: {message}")]
    StreamError { message: String },

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Cannot {action} while session is {phase}")]
    InvalidTransition { action: String, phase: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Backend,
    Storage,
    Configuration,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CondenserError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::StreamError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::StreamError { .. } => ErrorCategory::Network,
            Self::BackendStatusError { .. } | Self::RunFailed { .. } => ErrorCategory::Backend,
            Self::CsvError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorCategory::Storage
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            Self::InvalidTransition { .. } => ErrorCategory::Session,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Backend => match self {
                Self::BackendStatusError { status, .. } if *status >= 500 => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Configuration | ErrorCategory::Session => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "Check that the condenser backend is running and reachable",
            Self::StreamError { .. } => "The connection dropped mid-stream; start the session again",
            Self::BackendStatusError { status, .. } if *status == 404 => {
                "Check the graph id and thread id"
            }
            Self::BackendStatusError { status, .. } if *status == 401 || *status == 403 => {
                "Check the API token"
            }
            Self::BackendStatusError { .. } | Self::RunFailed { .. } => {
                "Inspect the backend logs for this thread"
            }
            Self::CsvError(_) | Self::IoError(_) => {
                "Check that the output directory exists and is writable"
            }
            Self::SerializationError(_) => "The request or transcript could not be encoded as JSON",
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command line flags"
            }
            Self::InvalidTransition { .. } => "Only a paused session can be resumed",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::HttpError(e) if e.is_connect() => {
                "Could not connect to the calendar backend".to_string()
            }
            Self::HttpError(e) if e.is_timeout() => "The calendar backend timed out".to_string(),
            Self::BackendStatusError { status, .. } => {
                format!("The calendar backend rejected the request (HTTP {})", status)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CondenserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_by_status() {
        let server_side = CondenserError::BackendStatusError {
            status: 503,
            body: String::new(),
        };
        assert_eq!(server_side.category(), ErrorCategory::Backend);
        assert_eq!(server_side.severity(), ErrorSeverity::Medium);

        let not_found = CondenserError::BackendStatusError {
            status: 404,
            body: "no such thread".to_string(),
        };
        assert_eq!(not_found.severity(), ErrorSeverity::High);
        assert_eq!(not_found.recovery_suggestion(), "Check the graph id and thread id");
        assert!(not_found.user_friendly_message().contains("HTTP 404"));
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = CondenserError::config("unknown key 'thread'");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.to_string(), "Configuration error: unknown key 'thread'");
    }
}
