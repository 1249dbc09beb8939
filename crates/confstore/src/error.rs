//! Error types for confstore operations.
//!
//! None of these errors is fatal. The store layer logs them and keeps the
//! affected member at its previous value, so a malformed document can never
//! stop the host from starting.

use crate::ValueKind;
use thiserror::Error;

/// Result type alias for confstore operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while describing, converting or locking stores.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A member key was absent from the incoming map.
    #[error("missing key {key}")]
    MissingKey {
        /// The serialized key that was looked up.
        key: String,
    },

    /// A `null` node was found for a member that does not accept null.
    #[error("member {member} does not accept null")]
    NullNotAllowed {
        /// The serialized member name.
        member: String,
    },

    /// The node kind does not match the member's expected kind.
    #[error("type mismatch for {member}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The serialized member name (empty for anonymous values).
        member: String,
        /// The expected node kind.
        expected: ValueKind,
        /// The node kind that was found.
        found: ValueKind,
    },

    /// A numeric value cannot be represented by the target type.
    #[error("value {value} is not representable as {target}")]
    NotRepresentable {
        /// Rendered source value.
        value: String,
        /// Rust type name of the target.
        target: &'static str,
    },

    /// A user conversion strategy failed.
    #[error("converter {converter} failed: {message}")]
    Converter {
        /// Type name of the converter.
        converter: &'static str,
        /// Message reported by the converter.
        message: String,
    },

    /// A converter declaration was rejected while describing a schema.
    #[error("invalid converter {converter} on {schema}.{member}: {reason}")]
    InvalidConverter {
        /// The schema that declared the converter.
        schema: &'static str,
        /// The Rust member name.
        member: &'static str,
        /// Type name of the converter.
        converter: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A write lock was requested by a thread that holds a read lock.
    #[error("cannot upgrade a read lock to a write lock")]
    LockUpgrade,

    /// A write lock was requested by the thread that already owns it.
    #[error("write lock is already held by the current thread")]
    LockRecursion,

    /// A lock was released by a thread that does not hold it.
    #[error("{mode} lock released without being held")]
    LockNotHeld {
        /// `"read"` or `"write"`.
        mode: &'static str,
    },
}

impl StoreError {
    /// Create a missing key error.
    #[inline]
    pub fn missing_key(key: impl Into<String>) -> Self {
        StoreError::MissingKey { key: key.into() }
    }

    /// Create a null-not-allowed error.
    #[inline]
    pub fn null_not_allowed(member: impl Into<String>) -> Self {
        StoreError::NullNotAllowed {
            member: member.into(),
        }
    }

    /// Create a type mismatch error for an anonymous value.
    #[inline]
    pub fn type_mismatch(expected: ValueKind, found: ValueKind) -> Self {
        StoreError::TypeMismatch {
            member: String::new(),
            expected,
            found,
        }
    }

    /// Create a not-representable error.
    #[inline]
    pub fn not_representable(value: impl ToString, target: &'static str) -> Self {
        StoreError::NotRepresentable {
            value: value.to_string(),
            target,
        }
    }

    /// Create a converter failure.
    #[inline]
    pub fn converter(converter: &'static str, err: ConvertError) -> Self {
        StoreError::Converter {
            converter,
            message: err.to_string(),
        }
    }

    /// Attach the member name to errors that carry one.
    pub fn for_member(self, name: &str) -> Self {
        match self {
            StoreError::TypeMismatch {
                member,
                expected,
                found,
            } if member.is_empty() => StoreError::TypeMismatch {
                member: name.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}

/// Error returned by user conversion strategies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConvertError {
    message: String,
}

impl ConvertError {
    /// Create a conversion error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The node had an unexpected kind.
    pub fn unexpected(expected: ValueKind, found: ValueKind) -> Self {
        Self::new(format!("expected {expected}, found {found}"))
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<StoreError> for ConvertError {
    fn from(err: StoreError) -> Self {
        ConvertError::new(err.to_string())
    }
}
