//! Error types surfaced by the high-level [`crate::client::Client`] and its
//! admin/partition/producer sub-clients.
//!
//! Distinguishes three registers, matching the taxonomy a caller actually
//! needs to branch on: a transport/codec failure (`Request`), a cluster
//! resolution failure (`Connection`), and a broker answering in-protocol
//! with a coded error (`ServerError`).

use thiserror::Error;

use crate::backoff::BackoffError;
use crate::protocol::error::Error as ProtocolError;
use crate::validation::ExactlyOneError;

/// What was being asked about when a [`Error::ServerError`] or
/// [`Error::InvalidResponse`] occurred, so a log line or error message can
/// name the topic/partition/coordinator key without the caller re-deriving
/// it from the original request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestContext {
    Topic(String),
    Partition(String, i32),
    Coordinator(String),
}

impl std::fmt::Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topic(topic) => write!(f, "topic {topic}"),
            Self::Partition(topic, partition) => write!(f, "partition {topic}-{partition}"),
            Self::Coordinator(key) => write!(f, "coordinator for {key}"),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("request error: {0}")]
    Request(#[from] crate::messenger::RequestError),

    #[error("connection error: {0}")]
    Connection(#[from] crate::connection::Error),

    #[error("server responded with {protocol_error} for {request} (message: {error_message:?})")]
    ServerError {
        protocol_error: ProtocolError,
        error_message: Option<String>,
        request: RequestContext,
        /// `true` when the error was synthesized locally (e.g. a response
        /// array came back empty where exactly one entry was expected)
        /// rather than carried on the wire as a coded error.
        is_virtual: bool,
    },

    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    #[error("gave up retrying after {0}")]
    RetryFailed(#[from] BackoffError<Box<Error>>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Turns a malformed-response shape (zero or more than one element where
    /// the request was scoped to exactly one topic/partition) into a
    /// [`Error::ServerError`] tagged as synthesized rather than wire-coded.
    pub fn exactly_one(context: RequestContext, e: ExactlyOneError) -> Self {
        Self::ServerError {
            protocol_error: ProtocolError::UnknownServerError,
            error_message: Some(e.to_string()),
            request: context,
            is_virtual: true,
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ServerError { protocol_error, .. } => protocol_error.is_retriable(),
            Self::Request(_) | Self::Connection(_) => true,
            Self::InvalidResponse(_) | Self::RetryFailed(_) => false,
        }
    }
}
