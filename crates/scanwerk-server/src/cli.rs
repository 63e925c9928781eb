// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface. Flags override the JSON config file, which
// overrides the built-in defaults.

use std::path::PathBuf;

use clap::Parser;
use scanwerk_core::config::{BackendKind, ServerConfig, StorageMode};
use scanwerk_core::error::Result;

/// HTTP scan server.
#[derive(Debug, Parser)]
#[command(name = "scanwerk", version, about)]
pub struct Cli {
    /// JSON configuration file. A missing file means defaults.
    #[arg(long, env = "SCANWERK_CONFIG", default_value = "/etc/scanwerk.json")]
    pub config: PathBuf,

    /// Interface to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// The API listens on this port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory scans are saved to.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Keep the last scan in memory instead of on disk.
    #[arg(long)]
    pub memory: bool,

    /// PEM certificate for HTTPS.
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// PEM private key for HTTPS.
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Allowed CORS origin; repeat for several. None allows any origin.
    #[arg(long = "origin")]
    pub origins: Vec<String>,

    /// Scanner backend: virtual or stub.
    #[arg(long)]
    pub backend: Option<BackendKind>,
}

impl Cli {
    /// Read the config file and lay the flags over it.
    pub fn load_config(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load(&self.config)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = &self.path {
            config.storage.path = path.clone();
        }
        if self.memory {
            config.storage.mode = StorageMode::Memory;
        }
        if self.cert.is_some() {
            config.tls_cert = self.cert.clone();
        }
        if self.key.is_some() {
            config.tls_key = self.key.clone();
        }
        if !self.origins.is_empty() {
            config.allowed_origins = self.origins.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_the_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"port": 9000, "host": "127.0.0.1", "storage": {{"path": "/srv/scans"}}}}"#)
            .expect("write");

        let cli = Cli::parse_from([
            "scanwerk",
            "--config",
            file.path().to_str().expect("utf-8 path"),
            "--port",
            "8080",
            "--memory",
            "--origin",
            "https://a.example",
            "--origin",
            "https://b.example",
            "--backend",
            "stub",
        ]);
        let config = cli.load_config().expect("config");
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.storage.mode, StorageMode::Memory);
        assert_eq!(config.storage.path, PathBuf::from("/srv/scans"));
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.backend, BackendKind::Stub);
    }

    #[test]
    fn cert_without_key_is_rejected() {
        let cli = Cli::parse_from([
            "scanwerk",
            "--config",
            "/nonexistent/scanwerk.json",
            "--cert",
            "cert.pem",
        ]);
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn unknown_backend_is_a_usage_error() {
        assert!(Cli::try_parse_from(["scanwerk", "--backend", "sane"]).is_err());
    }
}
