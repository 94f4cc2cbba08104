use std::path::PathBuf;

use thiserror::Error;

/// Why a single document could not be retrieved. Never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timeout")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// A strategy definition that cannot be compiled.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failure to write an artifact. Fatal: progress can no longer be recorded.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Unreadable or malformed input file (work list, reference, previous results).
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {reason}")]
    Shape { path: PathBuf, reason: String },
}

/// An identity field came out empty even after backfill. The record is
/// still emitted; this is only a flag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required field `{0}` is empty")]
pub struct RequiredFieldMissing(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages() {
        assert_eq!(FetchError::Timeout.to_string(), "timeout");
        assert_eq!(FetchError::Status(404).to_string(), "HTTP 404");
        assert_eq!(
            FetchError::Transport("connection refused".into()).to_string(),
            "connection refused"
        );
    }

    #[test]
    fn required_field_message() {
        let flag = RequiredFieldMissing("name".into());
        assert_eq!(flag.to_string(), "required field `name` is empty");
    }
}
