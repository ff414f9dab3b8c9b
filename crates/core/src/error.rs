//! Error types for the Brine data store
//!
//! A single `Error` enum carries every failure kind the system produces,
//! from datatype misuse to provisioning authorization. We use `thiserror`
//! for `Display`/`Error` derivation.
//!
//! ## Propagation policy
//!
//! - Read misses are **not** errors: they return `None` sentinels.
//!   `KeyNotFound` is reserved for operations that require the key
//!   (currently only `RENAME`).
//! - Type mismatches are `InvalidOperation` with the `wrong_type` flag set,
//!   which the wire layer maps to the RESP `WRONGTYPE` prefix.
//! - Replication and best-effort log failures never surface here; they are
//!   counted by their owners.

use std::io;
use thiserror::Error;

/// Result type alias used across all Brine crates
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Brine operations
#[derive(Debug, Error)]
pub enum Error {
    /// Key required by the operation does not exist (RENAME source)
    #[error("no such key: {0}")]
    KeyNotFound(String),

    /// Namespace does not exist
    #[error("no such namespace: {0}")]
    NamespaceNotFound(String),

    /// Instance does not exist
    #[error("no such instance: {0}")]
    InstanceNotFound(String),

    /// A plan-enforced quota was exceeded
    #[error("quota exceeded: {resource} (limit {limit}, requested {requested})")]
    QuotaExceeded {
        /// Which resource ran out
        resource: &'static str,
        /// The configured limit
        limit: u64,
        /// What the operation needed
        requested: u64,
    },

    /// Admission failed even after eviction
    #[error("out of memory: operation needs {needed} bytes, budget is {budget}")]
    MemoryLimit {
        /// Bytes the operation would have admitted
        needed: u64,
        /// The engine's configured budget
        budget: u64,
    },

    /// Requested TTL exceeds the configured maximum
    #[error("ttl {requested_secs}s exceeds maximum {max_secs}s")]
    TtlExceeded {
        /// TTL the caller asked for
        requested_secs: u64,
        /// Configured ceiling
        max_secs: u64,
    },

    /// Caller identity does not match the resource owner
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// TEE attestation was rejected or missing
    #[error("attestation failed: {0}")]
    AttestationFailed(String),

    /// No cluster node can serve the request
    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    /// Operation is invalid for the value's type or arguments
    #[error("{reason}")]
    InvalidOperation {
        /// Human-readable reason
        reason: String,
        /// True when this is a datatype mismatch (RESP `WRONGTYPE`)
        wrong_type: bool,
    },

    /// I/O error (append-only log, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error (log records, catalog payloads)
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an `InvalidOperation` for bad arguments or state
    pub fn invalid_op(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
            wrong_type: false,
        }
    }

    /// Create an `InvalidOperation` for a datatype mismatch
    pub fn wrong_type(expected: &str, found: &str) -> Self {
        Error::InvalidOperation {
            reason: format!(
                "Operation against a key holding the wrong kind of value (expected {}, found {})",
                expected, found
            ),
            wrong_type: true,
        }
    }

    /// Check if this error was caused by client input rather than the system
    ///
    /// Client errors map to HTTP 400/401; everything else is a 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::KeyNotFound(_)
                | Error::NamespaceNotFound(_)
                | Error::InstanceNotFound(_)
                | Error::QuotaExceeded { .. }
                | Error::MemoryLimit { .. }
                | Error::TtlExceeded { .. }
                | Error::Unauthorized(_)
                | Error::InvalidOperation { .. }
        )
    }

    /// Check if the caller's identity was the problem
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// The RESP error-class prefix for this error
    ///
    /// `WRONGTYPE` for datatype mismatches, `NOAUTH` for authentication,
    /// `ERR` for everything else.
    pub fn resp_code(&self) -> &'static str {
        match self {
            Error::InvalidOperation {
                wrong_type: true, ..
            } => "WRONGTYPE",
            Error::Unauthorized(_) => "NOAUTH",
            _ => "ERR",
        }
    }

    /// Short machine-readable code for the HTTP error envelope
    pub fn code(&self) -> &'static str {
        match self {
            Error::KeyNotFound(_) => "key_not_found",
            Error::NamespaceNotFound(_) => "namespace_not_found",
            Error::InstanceNotFound(_) => "instance_not_found",
            Error::QuotaExceeded { .. } => "quota_exceeded",
            Error::MemoryLimit { .. } => "memory_limit",
            Error::TtlExceeded { .. } => "ttl_exceeded",
            Error::Unauthorized(_) => "unauthorized",
            Error::AttestationFailed(_) => "attestation_failed",
            Error::NodeUnavailable(_) => "node_unavailable",
            Error::InvalidOperation { .. } => "invalid_operation",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_type_maps_to_wrongtype_prefix() {
        let err = Error::wrong_type("string", "hash");
        assert_eq!(err.resp_code(), "WRONGTYPE");
        assert!(err.is_client_error());
        let msg = err.to_string();
        assert!(msg.contains("wrong kind of value"));
        assert!(msg.contains("hash"));
    }

    #[test]
    fn test_invalid_op_maps_to_err_prefix() {
        let err = Error::invalid_op("value is not an integer or out of range");
        assert_eq!(err.resp_code(), "ERR");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unauthorized_maps_to_noauth() {
        let err = Error::Unauthorized("Authentication required".to_string());
        assert_eq!(err.resp_code(), "NOAUTH");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_memory_limit_display() {
        let err = Error::MemoryLimit {
            needed: 1024,
            budget: 512,
        };
        let msg = err.to_string();
        assert!(msg.contains("1024"));
        assert!(msg.contains("512"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_ttl_exceeded_display() {
        let err = Error::TtlExceeded {
            requested_secs: 100_000,
            max_secs: 86_400,
        };
        assert!(err.to_string().contains("86400"));
        assert_eq!(err.code(), "ttl_exceeded");
    }

    #[test]
    fn test_io_is_not_client_error() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert!(!err.is_client_error());
        assert_eq!(err.resp_code(), "ERR");
        assert_eq!(err.code(), "io");
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = vec![
            Error::KeyNotFound("k".into()),
            Error::NamespaceNotFound("ns".into()),
            Error::InstanceNotFound("i".into()),
            Error::Unauthorized("u".into()),
            Error::AttestationFailed("a".into()),
            Error::NodeUnavailable("n".into()),
            Error::invalid_op("bad"),
            Error::Serialization("s".into()),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 8);
    }
}
