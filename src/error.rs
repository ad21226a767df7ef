//! Error types shared across the scan pipeline.
//!
//! Only [`ScanError`] ever aborts a scan. [`SourceError`] is attached to the
//! affected dependency's result and [`MalformedRecord`] drops a single record.

use serde::Serialize;
use thiserror::Error;

/// Failure to complete a lookup against the vulnerability source.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceError {
    #[error("rate limited by the vulnerability database")]
    RateLimited,

    #[error("vulnerability database returned HTTP {status}")]
    RemoteFailure { status: u16 },

    #[error("vulnerability database unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("invalid response from vulnerability database: {reason}")]
    InvalidResponse { reason: String },
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::InvalidResponse {
                reason: err.to_string(),
            }
        } else {
            SourceError::Unreachable {
                reason: err.to_string(),
            }
        }
    }
}

/// A raw vulnerability record that lacks fields required to report it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed vulnerability record: {reason}")]
pub struct MalformedRecord {
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Scan-level failures, reported before any query is issued.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("manifest contains no scannable dependencies ({warnings} lines could not be parsed)")]
    InvalidManifest { warnings: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(SourceError::RemoteFailure { status: 503 }).unwrap();
        assert_eq!(json["kind"], "remote_failure");
        assert_eq!(json["status"], 503);

        let json = serde_json::to_value(SourceError::RateLimited).unwrap();
        assert_eq!(json["kind"], "rate_limited");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Unreachable {
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "vulnerability database unreachable: connection refused"
        );
    }
}
