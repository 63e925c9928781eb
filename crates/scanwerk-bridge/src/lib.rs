// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — scanner driver abstractions.
//
// The traits in `traits` are everything the scan pipeline needs from a
// driver: enumerate devices, open one, inspect and change its options, read
// an image. Backends are selected at startup from the server configuration.

use std::sync::Arc;

use scanwerk_core::config::BackendKind;

pub mod stub;
pub mod traits;
pub mod virtual_scanner;

pub use traits::{DeviceEnumerate, DeviceHandle, DeviceOpen, ScannerBackend};
pub use virtual_scanner::VirtualBackend;

/// Build the backend selected in the configuration.
pub fn scanner_backend(kind: BackendKind) -> Arc<dyn ScannerBackend> {
    match kind {
        BackendKind::Virtual => Arc::new(VirtualBackend::new()),
        BackendKind::Stub => Arc::new(stub::StubBackend),
    }
}
