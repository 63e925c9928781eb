// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Server — HTTP routes, error responses and command-line handling
// for the `scanwerk` binary.

pub mod cli;
pub mod error;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
