// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document — Turns raw scanner frames into retrievable files.
//
// Provides lossless PNG encoding of driver frames (gray, color and packed
// lineart) and SHA-256 fingerprints for stored artifacts.

pub mod image;
pub mod integrity;

pub use crate::image::encoder::{EncodedImage, ImageEncoder};
pub use integrity::{hash_bytes, verify_hash};
