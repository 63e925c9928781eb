// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver-agnostic trait definitions for scanner access.
//
// Every method may block for a long time (USB round trips, lamp warm-up,
// carriage movement). Async callers must run them on the blocking pool.

use scanwerk_core::error::Result;
use scanwerk_core::types::{Device, DeviceOption, Frame, OptionValue};

/// Unified backend that groups the driver capabilities.
pub trait ScannerBackend: DeviceEnumerate + DeviceOpen + Send + Sync {
    /// Human-readable backend name (e.g. "virtual", "sane").
    fn backend_name(&self) -> &str;
}

/// List the devices a driver can see.
pub trait DeviceEnumerate {
    /// Enumerate attached devices. An empty list is not an error.
    fn devices(&self) -> Result<Vec<Device>>;
}

/// Open devices by exact name.
pub trait DeviceOpen {
    /// Open the device called `name`.
    ///
    /// `name` must be accepted only when it is exactly the `Device::name`
    /// that [`DeviceEnumerate::devices`] reports. Aliases such as an empty
    /// name for the default device, or a bare driver name for its first
    /// unit, must be rejected: callers serialise access per name, so an
    /// alias would let two users onto one device. Substring matching is the
    /// resolver's job.
    fn open(&self, name: &str) -> Result<Box<dyn DeviceHandle>>;
}

/// An open device.
///
/// The handle owns the device until [`DeviceHandle::close`] is called.
/// Options are only meaningful while the handle is open.
pub trait DeviceHandle: Send {
    /// Exact name the handle was opened with.
    fn device_name(&self) -> &str;

    /// Declared option set.
    fn options(&self) -> Vec<DeviceOption>;

    /// Apply one option value. The value kind has already been matched to the
    /// option's declared kind; the driver may still reject the value.
    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()>;

    /// Acquire one complete frame with the current settings.
    fn read_image(&mut self) -> Result<Frame>;

    /// Release the device. Must be safe to call more than once, and
    /// dropping a handle must release the device as well.
    fn close(&mut self);
}
