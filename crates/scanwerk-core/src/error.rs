// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.
//
// Driver-level failures are variants in their own right rather than opaque
// strings, so the classifier can match on the kind of failure instead of on
// its text.

use thiserror::Error;

use crate::types::OptionKind;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Request errors --
    #[error("option {option} expects a {expected} value, got {found}")]
    Coercion {
        option: String,
        expected: OptionKind,
        found: &'static str,
    },

    #[error("no such option {0}")]
    UnknownOption(String),

    #[error("no device named {0}")]
    DeviceNotFound(String),

    // -- Driver status --
    #[error("device busy")]
    DeviceBusy,

    #[error("operation not supported")]
    Unsupported,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidParameters(String),

    #[error("document feeder jammed")]
    Jammed,

    #[error("document feeder out of documents")]
    NoDocuments,

    #[error("scanner cover is open")]
    CoverOpen,

    #[error("error during device I/O: {0}")]
    DeviceIo(String),

    #[error("out of memory")]
    NoMemory,

    #[error("access to resource has been denied")]
    AccessDenied,

    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    #[error("scanner driver error: {0}")]
    Driver(String),

    #[error("no scanner backend available on this host")]
    BackendUnavailable,

    // -- Output --
    #[error("image encoding failed: {0}")]
    Encoding(String),

    #[error("artifact storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
