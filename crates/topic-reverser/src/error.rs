//! Error types for topic-reverser

use reverser_middleware::TransportError;
use thiserror::Error;

/// Error type for topic-reverser operations
#[derive(Error, Debug)]
pub enum Error {
    /// Record value missing or not valid UTF-8 text
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Outbound publish was rejected by the log client
    #[error("Publish failure: {0}")]
    PublishFailure(#[source] TransportError),

    /// Subscription, ack or stream setup error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short label for logs and the `kind` metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::PublishFailure(_) => "publish_failure",
            Error::Transport(_) => "transport",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(Error::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(
            Error::PublishFailure(TransportError::PublishFailed("down".into())).kind(),
            "publish_failure"
        );
        assert_eq!(
            Error::from(TransportError::AckFailed("gone".into())).kind(),
            "transport"
        );
    }

    #[test]
    fn test_publish_failure_keeps_source() {
        let err = Error::PublishFailure(TransportError::PublishFailed("broker down".into()));
        assert_eq!(
            err.to_string(),
            "Publish failure: publish failed: broker down"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
