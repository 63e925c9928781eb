// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan orchestration: resolve, configure, acquire, encode, store.
//
// The device stays locked from the moment it is opened until after it is
// closed. Storing the artifact never waits on a device, and neither does
// reading it back.

use std::sync::Arc;

use scanwerk_bridge::ScannerBackend;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Device, DeviceOption, ScanArtifact, ScanRequest};
use scanwerk_document::{EncodedImage, ImageEncoder};
use tracing::{info, instrument};

use crate::options::apply_options;
use crate::resolver::Resolver;
use crate::store::ArtifactStore;

/// Drives scans against one backend and records results in one store.
pub struct ScanOrchestrator {
    resolver: Resolver,
    store: Arc<ArtifactStore>,
}

impl ScanOrchestrator {
    pub fn new(backend: Arc<dyn ScannerBackend>, store: Arc<ArtifactStore>) -> Self {
        Self {
            resolver: Resolver::new(backend),
            store,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn backend_name(&self) -> &str {
        self.resolver.backend_name()
    }

    /// Enumerate attached devices.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.resolver.list_devices().await
    }

    /// Declared options of the device `name` resolves to.
    #[instrument(skip(self))]
    pub async fn device_options(&self, name: &str) -> Result<Vec<DeviceOption>> {
        let device = self.resolver.resolve(name).await?;
        tokio::task::spawn_blocking(move || device.handle().options())
            .await
            .map_err(|e| ScanwerkError::Task(e.to_string()))
    }

    /// Run one scan and make its result the last artifact.
    ///
    /// On failure the device is closed and the previous artifact, if any,
    /// stays in place.
    #[instrument(skip(self, request), fields(device = %request.device, options = request.options.len()))]
    pub async fn scan(&self, request: ScanRequest) -> Result<Arc<ScanArtifact>> {
        let mut device = self.resolver.resolve(&request.device).await?;

        let encoded = tokio::task::spawn_blocking(move || -> Result<EncodedImage> {
            apply_options(device.handle_mut(), &request.options)?;
            let frame = device.handle_mut().read_image()?;
            // Close and unlock before the CPU-bound encode.
            drop(device);
            ImageEncoder::from_frame(frame)?.to_png()
        })
        .await
        .map_err(|e| ScanwerkError::Task(e.to_string()))??;

        let store = Arc::clone(&self.store);
        let artifact = tokio::task::spawn_blocking(move || store.put(encoded))
            .await
            .map_err(|e| ScanwerkError::Task(e.to_string()))??;

        info!(
            id = %artifact.id,
            width = artifact.width,
            height = artifact.height,
            "scan complete"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use scanwerk_bridge::virtual_scanner::DeviceEvent;
    use scanwerk_bridge::{DeviceOpen, VirtualBackend};
    use scanwerk_core::classify;
    use scanwerk_core::types::{OptionValue, RequestValue};

    fn orchestrator(backend: &VirtualBackend) -> ScanOrchestrator {
        ScanOrchestrator::new(Arc::new(backend.clone()), Arc::new(ArtifactStore::in_memory()))
    }

    fn genesys() -> VirtualBackend {
        VirtualBackend::with_devices(
            vec![VirtualBackend::device("genesys:libusb:001:004")],
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn genesys_request_applies_options_then_acquires_once() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let request = ScanRequest::new("genesys")
            .with_option("resolution", 300i64)
            .with_option("mode", "Color");

        let artifact = orch.scan(request).await.expect("scan");
        assert!(artifact.width > 0 && artifact.height > 0);
        assert_eq!(artifact.content_type, "image/png");

        let mut applied = backend.applied_options();
        applied.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            applied,
            vec![
                ("mode".to_owned(), OptionValue::Text("Color".into())),
                ("resolution".to_owned(), OptionValue::Int(300)),
            ]
        );
        assert_eq!(backend.acquisitions(), 1);

        // Every option set happens before the acquisition, and close comes last.
        let events = backend.events();
        let acquire = events
            .iter()
            .position(|e| matches!(e, DeviceEvent::AcquireStarted(_)))
            .expect("acquired");
        assert!(
            events[..acquire]
                .iter()
                .filter(|e| matches!(e, DeviceEvent::OptionSet { .. }))
                .count()
                == 2
        );
        assert!(matches!(events.last(), Some(DeviceEvent::Closed(_))));
        assert_eq!(backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn unknown_option_fails_before_acquisition() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let request = ScanRequest::new("genesys").with_option("nonexistent", true);

        let err = orch.scan(request).await.expect_err("unknown option");
        assert!(classify(&err).is_client_fault());
        assert_eq!(backend.acquisitions(), 0);
        assert_eq!(backend.open_handles(), 0);
        assert!(orch.store().latest().is_none());
    }

    #[tokio::test]
    async fn fractional_resolution_is_truncated() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let request = ScanRequest::new("genesys").with_option("resolution", RequestValue::Real(150.9));
        orch.scan(request).await.expect("scan");
        assert_eq!(
            backend.applied_options(),
            vec![("resolution".to_owned(), OptionValue::Int(150))]
        );
    }

    #[tokio::test]
    async fn read_only_option_does_not_change_the_outcome() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let plain = orch.scan(ScanRequest::new("genesys")).await.expect("scan");
        let with_read_only = orch
            .scan(ScanRequest::new("genesys").with_option("model-info", "hacked"))
            .await
            .expect("scan");
        assert_eq!(
            (plain.width, plain.height, &plain.sha256),
            (with_read_only.width, with_read_only.height, &with_read_only.sha256)
        );
        assert!(backend.applied_options().is_empty());
    }

    #[tokio::test]
    async fn hardware_failure_closes_the_device_and_keeps_the_previous_artifact() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let first = orch.scan(ScanRequest::new("genesys")).await.expect("scan");

        backend.fail_next_acquire(|| ScanwerkError::Jammed);
        let err = orch.scan(ScanRequest::new("genesys")).await.expect_err("jam");
        assert!(matches!(err, ScanwerkError::Jammed));
        assert!(!classify(&err).is_client_fault());
        assert_eq!(backend.open_handles(), 0);
        assert_eq!(orch.store().latest().expect("previous").id, first.id);
    }

    #[tokio::test]
    async fn empty_feeder_is_reported() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let err = orch
            .scan(ScanRequest::new("genesys").with_option("source", "ADF"))
            .await
            .expect_err("empty feeder");
        assert!(matches!(err, ScanwerkError::NoDocuments));
        assert_eq!(backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn stored_bytes_are_the_encoded_bytes() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let artifact = orch
            .scan(ScanRequest::new("genesys").with_option("mode", "Gray"))
            .await
            .expect("scan");

        // The virtual device is deterministic, so a direct encode of the same
        // frame must produce the same PNG.
        let mut handle = backend.open("genesys:libusb:001:004").expect("open");
        handle
            .set_option("mode", OptionValue::Text("Gray".into()))
            .expect("mode");
        let frame = handle.read_image().expect("read");
        let expected = ImageEncoder::from_frame(frame)
            .expect("wrap")
            .to_png()
            .expect("encode");

        let stored = orch.store().load_latest().expect("load").expect("present");
        assert_eq!(stored.artifact.id, artifact.id);
        assert_eq!(&*stored.bytes, expected.bytes.as_slice());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_scans_never_overlap_on_one_device() {
        let backend = VirtualBackend::with_devices(
            vec![VirtualBackend::device("genesys:libusb:001:004")],
            Duration::from_millis(25),
        );
        let orch = Arc::new(orchestrator(&backend));

        let names = ["genesys", "genesys:libusb:001:004", "libusb", "genesys"];
        let tasks: Vec<_> = names
            .into_iter()
            .map(|name| {
                let orch = Arc::clone(&orch);
                tokio::spawn(async move { orch.scan(ScanRequest::new(name)).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("join").expect("scan");
        }

        assert_eq!(backend.acquisitions(), 4);
        assert_eq!(backend.overlapping_acquisitions(), 0);
        assert_eq!(backend.open_handles(), 0);
    }

    #[tokio::test]
    async fn device_options_lists_declarations() {
        let backend = genesys();
        let orch = orchestrator(&backend);
        let options = orch.device_options("genesys").await.expect("options");
        assert!(options.iter().any(|o| o.name == "resolution"));
        assert!(options.iter().any(|o| o.name == "model-info" && !o.settable));
        assert_eq!(backend.open_handles(), 0);
    }
}
