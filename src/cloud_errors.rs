// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud API error types and their classification.
//!
//! Every call into Resource Manager or Graph surfaces a [`CloudError`]. Callers never
//! inspect the variants directly to decide what to do next; they ask [`classify`] for
//! an [`ErrorClass`] instead:
//!
//! | Class | Typical cause | Caller behaviour |
//! |-------|---------------|------------------|
//! | [`ErrorClass::NotFound`] | HTTP 404, `*NotFound` service code | treat as already deleted |
//! | [`ErrorClass::Auth`] | HTTP 400-403, rejected credentials | abort the whole job |
//! | [`ErrorClass::Blocked`] | HTTP 409 | stop resource group deletion, retry elsewhere |
//! | [`ErrorClass::Transient`] | everything else | retry on the next tick |
//!
//! # Example
//!
//! ```rust
//! use cluster_teardown::cloud_errors::{classify, CloudError, ErrorClass};
//!
//! let err = CloudError::api(404, Some("ResourceGroupNotFound"), "gone");
//! assert_eq!(classify(&err), ErrorClass::NotFound);
//!
//! let err = CloudError::api(409, Some("Conflict"), "in use");
//! assert_eq!(classify(&err), ErrorClass::Blocked);
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by cloud provider calls.
#[derive(Error, Debug, Clone)]
pub enum CloudError {
    /// Detailed error returned by the service with an HTTP status code.
    ///
    /// `code` is the service's own error code (e.g. `ResourceGroupNotFound`) when the
    /// response body carried one.
    #[error("HTTP {status}{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        /// HTTP status code of the failed response
        status: u16,
        /// Service error code from the response body
        code: Option<String>,
        /// Service error message, or the raw body when it could not be decoded
        message: String,
    },

    /// The credential handle was rejected or could not produce a token.
    #[error("authentication failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Authentication {
        /// HTTP status code observed while authenticating, if any
        status: Option<u16>,
        /// Reason reported by the identity provider
        message: String,
    },

    /// The request never produced an HTTP response (connection refused, reset, DNS failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// An operation did not finish within its own time bound.
    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        /// What was being waited on
        operation: String,
        /// The bound that elapsed
        after: Duration,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A response was well formed but had an unexpected shape.
    #[error("unexpected response: {0}")]
    Malformed(String),

    /// An error annotated with the resource it concerned.
    #[error("{context}: {source}")]
    Context {
        /// Description of the failed operation
        context: String,
        /// The underlying failure
        #[source]
        source: Box<CloudError>,
    },

    /// Several independent failures collected during one pass.
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<CloudError>),
}

struct AggregateDisplay<'a>(&'a [CloudError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [single] => write!(f, "{single}"),
            errors => {
                write!(f, "[")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{err}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl CloudError {
    /// Build a [`CloudError::Api`] error.
    #[must_use]
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Wrap this error with a description of the failed operation.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Collapse a list of failures into one error, or `None` if the list is empty.
    #[must_use]
    pub fn aggregate(mut errors: Vec<CloudError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Aggregate(errors)),
        }
    }

    /// Returns true if the target of the failed call no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        classify(self) == ErrorClass::NotFound
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::api(status.as_u16(), None, err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Outcome classes a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The target is already gone; the operation counts as done.
    NotFound,
    /// Credentials are missing, invalid, or lack permission; nothing else can succeed.
    Auth,
    /// The target is in use by other resources; this phase cannot make progress.
    Blocked,
    /// Anything else; worth another attempt.
    Transient,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NotFound",
            Self::Auth => "Auth",
            Self::Blocked => "Blocked",
            Self::Transient => "Transient",
        };
        f.write_str(name)
    }
}

/// HTTP status range that indicates a credential or permission failure.
const AUTH_STATUS_RANGE: std::ops::RangeInclusive<u16> = 400..=403;

/// HTTP status for a missing resource.
const NOT_FOUND_STATUS: u16 = 404;

/// HTTP status for a resource still referenced by other resources.
const CONFLICT_STATUS: u16 = 409;

/// Classify a cloud error.
///
/// # Classification Order
///
/// 1. HTTP 404, or a service error code ending in `NotFound` → [`ErrorClass::NotFound`]
/// 2. HTTP 400-403 on a detailed error, or an authentication failure carrying such a
///    status → [`ErrorClass::Auth`]
/// 3. HTTP 409 → [`ErrorClass::Blocked`]
/// 4. Everything else → [`ErrorClass::Transient`]
///
/// [`CloudError::Context`] inherits the class of the wrapped error. A
/// [`CloudError::Aggregate`] is `Auth` if any member is, otherwise `Blocked` if any
/// member is, otherwise `NotFound` if every member is, otherwise `Transient`.
#[must_use]
pub fn classify(err: &CloudError) -> ErrorClass {
    match err {
        CloudError::Api { status, code, .. } => {
            if *status == NOT_FOUND_STATUS || code.as_deref().is_some_and(is_not_found_code) {
                ErrorClass::NotFound
            } else if AUTH_STATUS_RANGE.contains(status) {
                ErrorClass::Auth
            } else if *status == CONFLICT_STATUS {
                ErrorClass::Blocked
            } else {
                ErrorClass::Transient
            }
        }
        CloudError::Authentication {
            status: Some(status),
            ..
        } if AUTH_STATUS_RANGE.contains(status) => ErrorClass::Auth,
        CloudError::Context { source, .. } => classify(source),
        CloudError::Aggregate(errors) => classify_all(errors),
        CloudError::Authentication { .. }
        | CloudError::Transport(_)
        | CloudError::Timeout { .. }
        | CloudError::Decode(_)
        | CloudError::Malformed(_) => ErrorClass::Transient,
    }
}

fn classify_all(errors: &[CloudError]) -> ErrorClass {
    let classes: Vec<ErrorClass> = errors.iter().map(classify).collect();

    if classes.contains(&ErrorClass::Auth) {
        ErrorClass::Auth
    } else if classes.contains(&ErrorClass::Blocked) {
        ErrorClass::Blocked
    } else if !classes.is_empty() && classes.iter().all(|c| *c == ErrorClass::NotFound) {
        ErrorClass::NotFound
    } else {
        ErrorClass::Transient
    }
}

fn is_not_found_code(code: &str) -> bool {
    code.ends_with("NotFound")
}

/// Returns true if the error is an unexpected-shape response rather than a service failure.
#[must_use]
pub fn is_malformed(err: &CloudError) -> bool {
    match err {
        CloudError::Malformed(_) => true,
        CloudError::Context { source, .. } => is_malformed(source),
        _ => false,
    }
}

#[cfg(test)]
#[path = "cloud_errors_tests.rs"]
mod cloud_errors_tests;
