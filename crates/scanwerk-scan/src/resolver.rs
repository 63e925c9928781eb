// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device resolution: exact open first, then the first enumerated device whose
// name contains the requested one.

use std::sync::Arc;

use scanwerk_bridge::{DeviceHandle, ScannerBackend};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::Device;
use tracing::{debug, info, instrument};

use crate::locks::{DeviceGuard, DeviceLocks};

/// An open device together with the lock that makes it ours.
///
/// Dropping it closes the handle and then releases the lock, on every path.
/// It is assembled on the blocking pool right after the driver's `open`, so
/// a request dropped mid-open still closes the device.
pub struct OpenDevice {
    handle: Box<dyn DeviceHandle>,
    _guard: DeviceGuard,
}

impl OpenDevice {
    fn new(handle: Box<dyn DeviceHandle>, guard: DeviceGuard) -> Self {
        Self {
            handle,
            _guard: guard,
        }
    }

    pub fn name(&self) -> &str {
        self.handle.device_name()
    }

    pub fn handle(&self) -> &dyn DeviceHandle {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> &mut dyn DeviceHandle {
        self.handle.as_mut()
    }
}

impl std::fmt::Debug for OpenDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenDevice")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Drop for OpenDevice {
    fn drop(&mut self) {
        // Fields drop after this, so the lock outlives the close.
        self.handle.close();
        debug!(device = %self.handle.device_name(), "device released");
    }
}

/// Finds and opens devices on a backend.
pub struct Resolver {
    backend: Arc<dyn ScannerBackend>,
    locks: DeviceLocks,
}

impl Resolver {
    pub fn new(backend: Arc<dyn ScannerBackend>) -> Self {
        Self {
            backend,
            locks: DeviceLocks::new(),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Enumerate attached devices.
    ///
    /// Any driver failure is reported as an enumeration error.
    #[instrument(skip(self))]
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let backend = Arc::clone(&self.backend);
        let devices = tokio::task::spawn_blocking(move || backend.devices())
            .await
            .map_err(|e| ScanwerkError::Task(e.to_string()))?
            .map_err(enumeration_error)?;
        debug!(count = devices.len(), "devices enumerated");
        Ok(devices)
    }

    /// Open the device `name` refers to and take its lock.
    ///
    /// `name` is tried as an exact device name first. When that fails the
    /// devices are enumerated and the first one whose name contains `name`
    /// is opened instead.
    #[instrument(skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<OpenDevice> {
        let guard = self.locks.acquire(name).await;
        match self.open_blocking(guard).await? {
            Ok(device) => {
                info!(device = name, "device opened by exact name");
                return Ok(device);
            }
            Err(err) => {
                debug!(device = name, error = %err, "direct open failed, searching devices");
            }
        }

        let devices = self.list_devices().await?;
        let device = devices
            .into_iter()
            .find(|d| d.name.contains(name))
            .ok_or_else(|| ScanwerkError::DeviceNotFound(name.to_owned()))?;

        let guard = self.locks.acquire(&device.name).await;
        let opened = self.open_blocking(guard).await??;
        info!(requested = name, device = %device.name, "device opened by substring match");
        Ok(opened)
    }

    /// Open the device `guard` locks, on the blocking pool. The outer result
    /// is the task, the inner one the driver. A failed open releases the
    /// lock.
    async fn open_blocking(&self, guard: DeviceGuard) -> Result<Result<OpenDevice>> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || -> Result<OpenDevice> {
            let handle = backend.open(guard.device())?;
            Ok(OpenDevice::new(handle, guard))
        })
        .await
        .map_err(|e| ScanwerkError::Task(e.to_string()))
    }
}

fn enumeration_error(err: ScanwerkError) -> ScanwerkError {
    match err {
        ScanwerkError::Enumeration(_) => err,
        other => ScanwerkError::Enumeration(other.to_string()),
    }
}
