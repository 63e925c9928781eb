// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-device exclusive locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::trace;

type Table = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

fn lock_table(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One async mutex per device name.
///
/// Keys are exact device names as passed to the driver's `open`, so two
/// requests that resolve to the same device contend on the same lock no
/// matter how the client spelled the name. An entry lives only while someone
/// holds or waits for it.
#[derive(Debug, Default)]
pub struct DeviceLocks {
    table: Arc<Mutex<Table>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `device`.
    ///
    /// The guard is owned so it can travel into a blocking task together
    /// with the device handle.
    pub async fn acquire(&self, device: &str) -> DeviceGuard {
        let lock = Arc::clone(lock_table(&self.table).entry(device.to_owned()).or_default());
        trace!(device, "waiting for device lock");
        let guard = lock.lock_owned().await;
        DeviceGuard {
            device: device.to_owned(),
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of device names currently held or waited on.
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive use of one device. Releasing the last interest in a name drops
/// its table entry.
#[derive(Debug)]
pub struct DeviceGuard {
    device: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Mutex<Table>>,
}

impl DeviceGuard {
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        // New acquirers clone the entry under the table lock, so the count
        // cannot grow while it is held here.
        let mut table = lock_table(&self.table);
        drop(self.guard.take());
        if table
            .get(&self.device)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.device);
            trace!(device = %self.device, "device lock entry released");
        }
    }
}
