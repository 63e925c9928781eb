// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan server.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A scanning unit as reported by device enumeration.
///
/// This is a snapshot: it is not tied to an open handle and may be stale by
/// the time a caller tries to open the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device name, e.g. `genesys:libusb:001:004`.
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// Device type as reported by the driver, e.g. "flatbed scanner".
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Declared value kind of a device option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Bool,
    Int,
    Real,
    String,
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Real => "real",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Physical unit of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionUnit {
    #[default]
    None,
    Pixel,
    Bit,
    Mm,
    Dpi,
    Percent,
    Microsecond,
}

/// Value constraint declared by the driver.
///
/// Reported to clients through `/config`; the option mapper does not enforce
/// it, the driver does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "values")]
pub enum Constraint {
    Range { min: f64, max: f64, quant: f64 },
    WordList(Vec<f64>),
    StringList(Vec<String>),
}

/// A configurable scan parameter declared by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOption {
    /// Option name, unique within a device (e.g. `resolution`).
    pub name: String,
    pub title: String,
    pub description: String,
    pub kind: OptionKind,
    #[serde(default)]
    pub unit: OptionUnit,
    /// Whether software may change the value. Read-only options are
    /// silently skipped when supplied in a scan request.
    pub settable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
}

/// A typed value ready to be applied to a device option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl OptionValue {
    /// The option kind this value satisfies.
    pub fn kind(&self) -> OptionKind {
        match self {
            Self::Bool(_) => OptionKind::Bool,
            Self::Int(_) => OptionKind::Int,
            Self::Real(_) => OptionKind::Real,
            Self::Text(_) => OptionKind::String,
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan requests
// ---------------------------------------------------------------------------

/// A loosely-typed value as supplied by a client.
///
/// JSON numbers without a fractional part decode as `Int`, all other numbers
/// as `Real`. `null`, arrays and objects do not decode at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl RequestValue {
    /// Short name of the representation, used in coercion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "string",
        }
    }
}

impl From<bool> for RequestValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for RequestValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for RequestValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for RequestValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// Body of `POST /scan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Device name or a substring of one.
    pub device: String,
    #[serde(default)]
    pub options: HashMap<String, RequestValue>,
}

impl ScanRequest {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            options: HashMap::new(),
        }
    }

    /// Builder-style helper to add one option.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<RequestValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Pixel layout of a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit luma, one byte per pixel.
    Gray8,
    /// 8-bit RGB, three bytes per pixel.
    Rgb8,
    /// 1-bit packed, most significant bit first, set bit = black.
    Lineart,
}

impl PixelFormat {
    /// Bytes needed for one row of `width` pixels.
    pub fn bytes_per_line(&self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::Gray8 => width,
            Self::Rgb8 => width * 3,
            Self::Lineart => width.div_ceil(8),
        }
    }
}

/// One acquired image, exactly as the driver delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row-major pixel data.
    pub data: Vec<u8>,
}

impl Frame {
    /// Length `data` must have for the declared geometry.
    pub fn expected_len(&self) -> usize {
        self.format.bytes_per_line(self.width) * self.height as usize
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Unique identifier for a scan artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the bytes of an artifact live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ArtifactLocation {
    Memory,
    Disk { path: PathBuf },
}

/// Metadata for an encoded scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanArtifact {
    pub id: ArtifactId,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    /// Download name, e.g. `scan-20261016143000.png`.
    pub file_name: String,
    pub content_type: String,
    /// Encoded size in bytes.
    pub size: u64,
    /// SHA-256 of the encoded bytes, lowercase hex.
    pub sha256: String,
    pub location: ArtifactLocation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_values_decode_by_representation() {
        let body = r#"{"device":"genesys","options":{"resolution":300,"mode":"Color","preview":false,"tl-x":1.5}}"#;
        let req: ScanRequest = serde_json::from_str(body).expect("decode");
        assert_eq!(req.device, "genesys");
        assert_eq!(req.options["resolution"], RequestValue::Int(300));
        assert_eq!(req.options["mode"], RequestValue::Text("Color".into()));
        assert_eq!(req.options["preview"], RequestValue::Bool(false));
        assert_eq!(req.options["tl-x"], RequestValue::Real(1.5));
    }

    #[test]
    fn null_option_value_is_rejected() {
        let body = r#"{"device":"x","options":{"resolution":null}}"#;
        assert!(serde_json::from_str::<ScanRequest>(body).is_err());
    }

    #[test]
    fn missing_options_default_to_empty() {
        let req: ScanRequest = serde_json::from_str(r#"{"device":"x"}"#).expect("decode");
        assert!(req.options.is_empty());
    }

    #[test]
    fn lineart_rows_round_up_to_whole_bytes() {
        let frame = Frame {
            width: 10,
            height: 3,
            format: PixelFormat::Lineart,
            data: Vec::new(),
        };
        assert_eq!(frame.expected_len(), 6);
    }

    #[test]
    fn constraint_serializes_with_type_tag() {
        let c = Constraint::StringList(vec!["Color".into(), "Gray".into()]);
        let json = serde_json::to_value(&c).expect("serialize");
        assert_eq!(json["type"], "string_list");
        assert_eq!(json["values"][1], "Gray");
    }
}
