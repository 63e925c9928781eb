// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub backend for hosts without any scanner driver.
//
// Every call returns `BackendUnavailable`.

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::Device;

use crate::traits::*;

/// No-op backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubBackend;

impl ScannerBackend for StubBackend {
    fn backend_name(&self) -> &str {
        "stub"
    }
}

impl DeviceEnumerate for StubBackend {
    fn devices(&self) -> Result<Vec<Device>> {
        tracing::warn!("DeviceEnumerate::devices called on stub backend");
        Err(ScanwerkError::BackendUnavailable)
    }
}

impl DeviceOpen for StubBackend {
    fn open(&self, name: &str) -> Result<Box<dyn DeviceHandle>> {
        tracing::warn!(device = name, "DeviceOpen::open called on stub backend");
        Err(ScanwerkError::BackendUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_call_is_unavailable() {
        let backend = StubBackend;
        assert!(matches!(backend.devices(), Err(ScanwerkError::BackendUnavailable)));
        assert!(matches!(backend.open("test:0"), Err(ScanwerkError::BackendUnavailable)));
    }
}
