// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Maps auth, fetch, push and config failures to specific exit codes

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timed out after {}s waiting for authorization", .0.as_secs())]
    Timeout(Duration),

    #[error("No stored credential at {}", .0.display())]
    CredentialMissing(PathBuf),

    #[error("Stored credential at {} is unreadable: {reason}", .path.display())]
    CredentialParse { path: PathBuf, reason: String },

    #[error("Pocket request failed: {0}")]
    Fetch(String),

    #[error("API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Invalid block id: {0}")]
    Validation(String),

    #[error("Notion push failed{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error("Batch {index}/{total} failed after {exported} items exported and {deleted} deleted: {source}")]
    Batch {
        index: usize,
        total: usize,
        exported: usize,
        deleted: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            Error::Auth(_) | Error::CredentialMissing(_) | Error::CredentialParse { .. } => 3,
            Error::Timeout(_) => 4,
            Error::Fetch(_) | Error::Api { .. } => 5,
            Error::Validation(_) => 6,
            Error::Transport { .. } => 7,
            Error::Batch { source, .. } => source.exit_code(),
            Error::Network(_) => 8,
            Error::Parse(_) => 9,
            Error::Filesystem(_) => 10,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::Auth("test".into()).exit_code(), 3);
        assert_eq!(
            Error::Api {
                endpoint: "/v3/get".into(),
                status: 403,
                message: "forbidden".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(Error::Validation("bad".into()).exit_code(), 6);
    }

    #[test]
    fn test_batch_error_uses_cause_exit_code() {
        let err = Error::Batch {
            index: 2,
            total: 3,
            exported: 5,
            deleted: 0,
            source: Box::new(Error::Transport {
                status: Some(500),
                message: "boom".into(),
            }),
        };
        assert_eq!(err.exit_code(), 7);
        assert_eq!(
            err.to_string(),
            "Batch 2/3 failed after 5 items exported and 0 deleted: Notion push failed (500): boom"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::Timeout(Duration::from_secs(300));
        assert_eq!(
            err.to_string(),
            "Timed out after 300s waiting for authorization"
        );
    }
}
