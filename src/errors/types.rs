//! Error type definitions for the channel validation engine
//!
//! Errors are split by the layer that raises them, mirroring the
//! error-kind taxonomy in the spec: parse/input errors are the only ones
//! that ever escape to a caller, task errors model invalid lifecycle
//! transitions, and orchestrator errors are recorded on the task record
//! rather than propagated.

use thiserror::Error;

/// Top-level crate error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input to the parser or converter (spec error kind 1).
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Invalid task lifecycle operation.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Orchestrator setup failed before any probes were scheduled.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Generic validation failure surfaced to the caller (empty payload,
    /// `total <= 0`, missing `{i}` placeholder, malformed URL).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Output file write failure (spec error kind 4 — logged at error level,
    /// the owning task still reports `completed`).
    #[error("persistence error writing {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration load/parse failure.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn persistence<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Format-parser specific errors (TXT / M3U / sitemap dialects).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("empty input payload")]
    EmptyPayload,

    #[error("malformed line {line_no}: {content}")]
    MalformedLine { line_no: usize, content: String },

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Task-registry specific errors.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task {id} not found")]
    NotFound { id: String },

    #[error("invalid task status transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("task {id} cannot be deleted while in status {status}")]
    NotDeletable { id: String, status: String },
}

/// Batch-orchestrator specific errors raised before probing starts.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("url template is missing the required {{i}} placeholder: {template}")]
    MissingPlaceholder { template: String },

    #[error("batch size must be greater than zero, got {size}")]
    EmptyBatch { size: i64 },
}
