// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Scan — the scan pipeline. Resolves a device from a loose name,
// maps a client's option values onto the device's declared options, drives
// the acquisition and keeps the most recent result for retrieval.
//
// Driver calls block, so everything that touches a device handle runs on
// tokio's blocking pool while holding that device's lock.

pub mod locks;
pub mod options;
pub mod orchestrator;
pub mod resolver;
pub mod store;

pub use locks::{DeviceGuard, DeviceLocks};
pub use options::{apply_options, coerce};
pub use orchestrator::ScanOrchestrator;
pub use resolver::{OpenDevice, Resolver};
pub use store::{ArtifactStore, StoredScan};
