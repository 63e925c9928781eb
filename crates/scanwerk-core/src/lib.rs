// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — Core types, error definitions and error classification shared
// across all crates.

pub mod classify;
pub mod config;
pub mod error;
pub mod types;

pub use classify::{ClassifiedError, FaultClass, classify};
pub use config::ServerConfig;
pub use error::ScanwerkError;
pub use types::*;
