// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 7575;

/// Which scanner driver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process test-pattern scanner.
    #[default]
    Virtual,
    /// No driver at all; every call fails with `BackendUnavailable`.
    Stub,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "stub" => Ok(Self::Stub),
            other => Err(format!("unknown backend {other:?} (expected virtual or stub)")),
        }
    }
}

/// Where the last scan is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    #[default]
    Disk,
}

/// Artifact storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// Directory scans are written to in `Disk` mode.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Disk,
            path: PathBuf::from("/tmp"),
        }
    }
}

/// Persistent server settings, read from a JSON file and overridable from
/// the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// CORS origins allowed to call the API. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// PEM certificate; TLS is enabled only when both cert and key are set.
    pub tls_cert: Option<PathBuf>,
    /// PEM private key.
    pub tls_key: Option<PathBuf>,
    pub storage: StorageConfig,
    pub backend: BackendKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
            tls_cert: None,
            tls_key: None,
            storage: StorageConfig::default(),
            backend: BackendKind::default(),
        }
    }
}

impl ServerConfig {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ScanwerkError::Storage(e)),
        };
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ScanwerkError::InvalidParameters("port must not be 0".into()));
        }
        match (&self.tls_cert, &self.tls_key) {
            (Some(_), None) => Err(ScanwerkError::InvalidParameters(
                "tls_cert is set but tls_key is missing".into(),
            )),
            (None, Some(_)) => Err(ScanwerkError::InvalidParameters(
                "tls_key is set but tls_cert is missing".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Certificate and key paths when TLS is fully configured.
    pub fn tls_pair(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}
