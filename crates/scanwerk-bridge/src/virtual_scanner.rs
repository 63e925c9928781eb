// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Virtual scanner backend.
//
// Produces a deterministic test pattern whose geometry follows the usual
// flatbed options (resolution, scan area, mode). It keeps an event log of
// every open, option change, acquisition and close so that callers can check
// what the pipeline actually did to the device, and it can be told to fail
// the next enumeration or acquisition with any driver error.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{
    Constraint, Device, DeviceOption, Frame, OptionKind, OptionUnit, OptionValue, PixelFormat,
};
use tracing::{debug, info};

use crate::traits::*;

const MM_PER_INCH: f64 = 25.4;

/// Resolution used when the `preview` option is on.
const PREVIEW_DPI: i64 = 75;

/// Events kept in the log; older ones are discarded.
pub const EVENT_LOG_CAPACITY: usize = 1024;

/// Something the virtual scanner did, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Opened(String),
    OptionSet {
        device: String,
        option: String,
        value: OptionValue,
    },
    AcquireStarted(String),
    AcquireFinished(String),
    Closed(String),
}

type FaultFn = Box<dyn FnOnce() -> ScanwerkError + Send>;

/// State shared between the backend and every handle it opened.
struct Shared {
    devices: Vec<Device>,
    /// Time each acquisition takes.
    latency: Duration,
    /// Most recent events, at most `EVENT_LOG_CAPACITY`.
    events: Mutex<VecDeque<DeviceEvent>>,
    acquisitions: AtomicUsize,
    enumeration_fault: Mutex<Option<FaultFn>>,
    acquire_fault: Mutex<Option<FaultFn>>,
    /// Acquisitions in flight, per device.
    active: Mutex<HashMap<String, usize>>,
    /// Acquisitions that started while another one on the same device was
    /// still running.
    overlaps: AtomicUsize,
    open_handles: AtomicUsize,
    /// Pages waiting in the document feeder.
    feeder_pages: AtomicUsize,
}

impl Shared {
    fn record(&self, event: DeviceEvent) {
        let mut events = lock(&self.events);
        if events.len() == EVENT_LOG_CAPACITY {
            events.pop_front();
        }
        events.push_back(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process scanner backend.
///
/// Cloning is cheap and every clone observes the same devices and event log.
#[derive(Clone)]
pub struct VirtualBackend {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for VirtualBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualBackend")
            .field("devices", &self.shared.devices)
            .field("latency", &self.shared.latency)
            .finish_non_exhaustive()
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBackend {
    /// A backend with a single instant flatbed called `test:0`.
    pub fn new() -> Self {
        Self::with_devices(vec![Self::device("test:0")], Duration::ZERO)
    }

    /// A backend exposing `devices`, each acquisition taking `latency`.
    pub fn with_devices(devices: Vec<Device>, latency: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                devices,
                latency,
                events: Mutex::new(VecDeque::with_capacity(EVENT_LOG_CAPACITY)),
                acquisitions: AtomicUsize::new(0),
                enumeration_fault: Mutex::new(None),
                acquire_fault: Mutex::new(None),
                active: Mutex::new(HashMap::new()),
                overlaps: AtomicUsize::new(0),
                open_handles: AtomicUsize::new(0),
                feeder_pages: AtomicUsize::new(0),
            }),
        }
    }

    /// Describe a virtual flatbed called `name`.
    pub fn device(name: &str) -> Device {
        Device {
            name: name.to_owned(),
            vendor: "Scanwerk".into(),
            model: "Virtual flatbed".into(),
            kind: "virtual device".into(),
        }
    }

    /// Make the next call to `devices()` fail with the produced error.
    pub fn fail_next_enumeration(&self, fault: impl FnOnce() -> ScanwerkError + Send + 'static) {
        *lock(&self.shared.enumeration_fault) = Some(Box::new(fault));
    }

    /// Make the next acquisition on any device fail with the produced error.
    pub fn fail_next_acquire(&self, fault: impl FnOnce() -> ScanwerkError + Send + 'static) {
        *lock(&self.shared.acquire_fault) = Some(Box::new(fault));
    }

    /// Put `pages` sheets in the document feeder.
    pub fn load_feeder(&self, pages: usize) {
        self.shared.feeder_pages.store(pages, Ordering::SeqCst);
    }

    /// The most recent things the backend has done, oldest first.
    pub fn events(&self) -> Vec<DeviceEvent> {
        lock(&self.shared.events).iter().cloned().collect()
    }

    /// Option assignments in the order they were applied.
    pub fn applied_options(&self) -> Vec<(String, OptionValue)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DeviceEvent::OptionSet { option, value, .. } => Some((option, value)),
                _ => None,
            })
            .collect()
    }

    /// Number of acquisitions started.
    pub fn acquisitions(&self) -> usize {
        self.shared.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of acquisitions that overlapped another on the same device.
    pub fn overlapping_acquisitions(&self) -> usize {
        self.shared.overlaps.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }
}

impl ScannerBackend for VirtualBackend {
    fn backend_name(&self) -> &str {
        "virtual"
    }
}

impl DeviceEnumerate for VirtualBackend {
    fn devices(&self) -> Result<Vec<Device>> {
        if let Some(fault) = lock(&self.shared.enumeration_fault).take() {
            return Err(fault());
        }
        Ok(self.shared.devices.clone())
    }
}

impl DeviceOpen for VirtualBackend {
    fn open(&self, name: &str) -> Result<Box<dyn DeviceHandle>> {
        if !self.shared.devices.iter().any(|d| d.name == name) {
            return Err(ScanwerkError::InvalidParameters(format!(
                "invalid device name {name}"
            )));
        }

        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        self.shared.record(DeviceEvent::Opened(name.to_owned()));
        info!(device = name, "virtual device opened");

        Ok(Box::new(VirtualHandle {
            name: name.to_owned(),
            shared: Arc::clone(&self.shared),
            settings: default_settings(),
            closed: false,
        }))
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

struct VirtualHandle {
    name: String,
    shared: Arc<Shared>,
    settings: HashMap<String, OptionValue>,
    closed: bool,
}

impl VirtualHandle {
    fn int(&self, name: &str) -> i64 {
        match self.settings.get(name) {
            Some(OptionValue::Int(v)) => *v,
            _ => 0,
        }
    }

    fn real(&self, name: &str) -> f64 {
        match self.settings.get(name) {
            Some(OptionValue::Real(v)) => *v,
            _ => 0.0,
        }
    }

    fn text(&self, name: &str) -> &str {
        match self.settings.get(name) {
            Some(OptionValue::Text(v)) => v,
            _ => "",
        }
    }

    fn flag(&self, name: &str) -> bool {
        matches!(self.settings.get(name), Some(OptionValue::Bool(true)))
    }

    /// Frame geometry in pixels for the current scan area.
    fn geometry(&self) -> Result<(u32, u32)> {
        let mut dpi = self.int("resolution");
        if self.flag("preview") {
            dpi = dpi.min(PREVIEW_DPI);
        }
        let width_mm = self.real("br-x") - self.real("tl-x");
        let height_mm = self.real("br-y") - self.real("tl-y");
        if width_mm <= 0.0 || height_mm <= 0.0 {
            return Err(ScanwerkError::InvalidParameters(
                "scan area is empty (br must lie below and right of tl)".into(),
            ));
        }
        let to_px = |mm: f64| ((mm / MM_PER_INCH * dpi as f64).round() as u32).max(1);
        Ok((to_px(width_mm), to_px(height_mm)))
    }

    fn take_feeder_page(&self) -> Result<()> {
        self.shared
            .feeder_pages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| ScanwerkError::NoDocuments)
    }
}

/// Marks one acquisition in flight until dropped.
struct AcquireWindow<'a> {
    shared: &'a Shared,
    device: &'a str,
}

impl<'a> AcquireWindow<'a> {
    fn open(shared: &'a Shared, device: &'a str) -> Self {
        {
            let mut active = lock(&shared.active);
            let count = active.entry(device.to_owned()).or_insert(0);
            if *count > 0 {
                shared.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *count += 1;
        }
        shared.acquisitions.fetch_add(1, Ordering::SeqCst);
        shared.record(DeviceEvent::AcquireStarted(device.to_owned()));
        Self { shared, device }
    }
}

impl Drop for AcquireWindow<'_> {
    fn drop(&mut self) {
        self.shared
            .record(DeviceEvent::AcquireFinished(self.device.to_owned()));
        let mut active = lock(&self.shared.active);
        if let Some(count) = active.get_mut(self.device) {
            *count = count.saturating_sub(1);
        }
    }
}

impl DeviceHandle for VirtualHandle {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> Vec<DeviceOption> {
        declared_options()
    }

    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        if self.closed {
            return Err(ScanwerkError::InvalidParameters("device handle is closed".into()));
        }
        let option = declared_options()
            .into_iter()
            .find(|o| o.name == name)
            .ok_or_else(|| ScanwerkError::UnknownOption(name.to_owned()))?;

        if !option.settable {
            return Err(ScanwerkError::InvalidParameters(format!(
                "option {name} is read-only"
            )));
        }
        if value.kind() != option.kind {
            return Err(ScanwerkError::InvalidParameters(format!(
                "option {name} expects a {} value",
                option.kind
            )));
        }
        check_constraint(&option, &value)?;

        debug!(device = %self.name, option = name, %value, "virtual option set");
        self.shared.record(DeviceEvent::OptionSet {
            device: self.name.clone(),
            option: name.to_owned(),
            value: value.clone(),
        });
        self.settings.insert(name.to_owned(), value);
        Ok(())
    }

    fn read_image(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(ScanwerkError::InvalidParameters("device handle is closed".into()));
        }
        let _window = AcquireWindow::open(&self.shared, &self.name);

        if !self.shared.latency.is_zero() {
            std::thread::sleep(self.shared.latency);
        }

        if let Some(fault) = lock(&self.shared.acquire_fault).take() {
            return Err(fault());
        }
        if self.text("source") == "ADF" {
            self.take_feeder_page()?;
        }

        let (width, height) = self.geometry()?;
        let format = match self.text("mode") {
            "Gray" => PixelFormat::Gray8,
            "Lineart" => PixelFormat::Lineart,
            _ => PixelFormat::Rgb8,
        };
        let frame = render_pattern(width, height, format);
        info!(device = %self.name, width, height, ?format, "virtual frame acquired");
        Ok(frame)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
        self.shared.record(DeviceEvent::Closed(self.name.clone()));
        debug!(device = %self.name, "virtual device closed");
    }
}

impl Drop for VirtualHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Option table
// ---------------------------------------------------------------------------

fn declared_options() -> Vec<DeviceOption> {
    let option = |name: &str, title: &str, description: &str, kind, unit, constraint| DeviceOption {
        name: name.to_owned(),
        title: title.to_owned(),
        description: description.to_owned(),
        kind,
        unit,
        settable: true,
        constraint,
    };
    let area = |max: f64| Some(Constraint::Range { min: 0.0, max, quant: 0.0 });

    vec![
        option(
            "mode",
            "Scan mode",
            "Selects the scan mode (e.g., lineart, monochrome, or color).",
            OptionKind::String,
            OptionUnit::None,
            Some(Constraint::StringList(vec![
                "Color".into(),
                "Gray".into(),
                "Lineart".into(),
            ])),
        ),
        option(
            "resolution",
            "Scan resolution",
            "Sets the resolution of the scanned image.",
            OptionKind::Int,
            OptionUnit::Dpi,
            Some(Constraint::Range { min: 25.0, max: 1200.0, quant: 1.0 }),
        ),
        option(
            "source",
            "Scan source",
            "Selects the scan source (such as a document-feeder).",
            OptionKind::String,
            OptionUnit::None,
            Some(Constraint::StringList(vec!["Flatbed".into(), "ADF".into()])),
        ),
        option(
            "preview",
            "Preview",
            "Request a preview-quality scan.",
            OptionKind::Bool,
            OptionUnit::None,
            None,
        ),
        option("tl-x", "Top-left x", "Top-left x position of scan area.", OptionKind::Real, OptionUnit::Mm, area(215.9)),
        option("tl-y", "Top-left y", "Top-left y position of scan area.", OptionKind::Real, OptionUnit::Mm, area(297.0)),
        option("br-x", "Bottom-right x", "Bottom-right x position of scan area.", OptionKind::Real, OptionUnit::Mm, area(215.9)),
        option("br-y", "Bottom-right y", "Bottom-right y position of scan area.", OptionKind::Real, OptionUnit::Mm, area(297.0)),
        DeviceOption {
            name: "model-info".into(),
            title: "Model information".into(),
            description: "Firmware and model string reported by the device.".into(),
            kind: OptionKind::String,
            unit: OptionUnit::None,
            settable: false,
            constraint: None,
        },
    ]
}

fn default_settings() -> HashMap<String, OptionValue> {
    HashMap::from([
        ("mode".to_owned(), OptionValue::Text("Color".into())),
        ("resolution".to_owned(), OptionValue::Int(75)),
        ("source".to_owned(), OptionValue::Text("Flatbed".into())),
        ("preview".to_owned(), OptionValue::Bool(false)),
        ("tl-x".to_owned(), OptionValue::Real(0.0)),
        ("tl-y".to_owned(), OptionValue::Real(0.0)),
        ("br-x".to_owned(), OptionValue::Real(50.0)),
        ("br-y".to_owned(), OptionValue::Real(30.0)),
        (
            "model-info".to_owned(),
            OptionValue::Text("Scanwerk virtual flatbed 1.0".into()),
        ),
    ])
}

/// Drivers enforce their own constraints; this one rejects out-of-range
/// numbers and unlisted strings.
fn check_constraint(option: &DeviceOption, value: &OptionValue) -> Result<()> {
    let Some(constraint) = &option.constraint else {
        return Ok(());
    };
    let numeric = match value {
        OptionValue::Int(v) => Some(*v as f64),
        OptionValue::Real(v) => Some(*v),
        _ => None,
    };
    let accepted = match (constraint, numeric, value) {
        (Constraint::Range { min, max, .. }, Some(v), _) => (*min..=*max).contains(&v),
        (Constraint::WordList(words), Some(v), _) => words.contains(&v),
        (Constraint::StringList(list), _, OptionValue::Text(s)) => list.iter().any(|l| l == s),
        _ => true,
    };
    if accepted {
        Ok(())
    } else {
        Err(ScanwerkError::InvalidParameters(format!(
            "{value} is not a valid value for {}",
            option.name
        )))
    }
}

// ---------------------------------------------------------------------------
// Test pattern
// ---------------------------------------------------------------------------

fn render_pattern(width: u32, height: u32, format: PixelFormat) -> Frame {
    let w = width as usize;
    let h = height as usize;
    let span_x = (w - 1).max(1);
    let span_y = (h - 1).max(1);

    let mut data = Vec::with_capacity(format.bytes_per_line(width) * h);
    for y in 0..h {
        match format {
            PixelFormat::Rgb8 => {
                for x in 0..w {
                    data.push((x * 255 / span_x) as u8);
                    data.push((y * 255 / span_y) as u8);
                    data.push(0x80);
                }
            }
            PixelFormat::Gray8 => {
                for x in 0..w {
                    data.push(((x + y) * 255 / (span_x + span_y)) as u8);
                }
            }
            PixelFormat::Lineart => {
                let mut row = vec![0u8; format.bytes_per_line(width)];
                for x in 0..w {
                    // 8x8 checkerboard, set bit = black
                    if (x / 8 + y / 8) % 2 == 0 {
                        row[x / 8] |= 0x80 >> (x % 8);
                    }
                }
                data.extend_from_slice(&row);
            }
        }
    }

    Frame {
        width,
        height,
        format,
        data,
    }
}
