// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for the virtual BMC.

use dropshot::HttpError;
use thiserror::Error;

/// Errors reported by a [`crate::compute::ComputeClient`].
///
/// Every client implementation must sort its failures into one of these
/// variants; the resolver and the power-control logic only ever match on
/// them, never on library-specific error types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComputeError {
    /// Network failure, expired token, or a service that is not up yet.
    #[error("transient compute failure: {0}")]
    Transient(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The remote service reports a transition already in progress.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("compute request failed: {0}")]
    Other(String),
}

impl ComputeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ComputeError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ComputeError::Conflict(_))
    }
}

/// Errors resolving the configured instance reference.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no instance found with id or name \"{reference}\"")]
    Absent { reference: String },
    #[error("{count} instances are named \"{reference}\"; refusing to guess")]
    Ambiguous { reference: String, count: usize },
    /// A lookup failed for a reason other than the instance not existing.
    /// Startup retries these for as long as its backoff policy allows, which
    /// by default is forever.
    #[error("looking up instance \"{reference}\": {err}")]
    Lookup {
        reference: String,
        #[source]
        err: ComputeError,
    },
}

impl From<ComputeError> for HttpError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::NotFound(_) => HttpError::for_not_found(
                Some("InstanceNotFound".to_string()),
                err.to_string(),
            ),
            ComputeError::Transient(_) => HttpError::for_unavail(
                Some("ComputeUnavailable".to_string()),
                err.to_string(),
            ),
            ComputeError::Conflict(_) => HttpError::for_unavail(
                Some("ComputeConflict".to_string()),
                err.to_string(),
            ),
            ComputeError::Other(_) => {
                HttpError::for_internal_error(err.to_string())
            }
        }
    }
}

/// Failures that stop the BMC before it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("initializing logger: {0}")]
    Logger(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("setting up compute client: {0}")]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("http server: {0}")]
    Server(String),
}
