// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw frame to PNG.

pub mod encoder;

pub use encoder::{EncodedImage, ImageEncoder};
