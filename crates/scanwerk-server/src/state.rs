// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared handler state.

use std::sync::Arc;

use scanwerk_bridge::ScannerBackend;
use scanwerk_scan::{ArtifactStore, ScanOrchestrator};

/// Cloned into every handler; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ScanOrchestrator>,
}

impl AppState {
    pub fn new(backend: Arc<dyn ScannerBackend>, store: Arc<ArtifactStore>) -> Self {
        Self {
            orchestrator: Arc::new(ScanOrchestrator::new(backend, store)),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        self.orchestrator.store()
    }
}
