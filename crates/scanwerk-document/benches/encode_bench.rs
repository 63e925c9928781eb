// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for frame encoding and artifact hashing in the
// scanwerk-document crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use scanwerk_core::types::{Frame, PixelFormat};
use scanwerk_document::{ImageEncoder, hash_bytes};

/// A4 at 150 dpi.
const WIDTH: u32 = 1240;
const HEIGHT: u32 = 1754;

fn gradient(format: PixelFormat) -> Frame {
    let len = format.bytes_per_line(WIDTH) * HEIGHT as usize;
    Frame {
        width: WIDTH,
        height: HEIGHT,
        format,
        data: (0..len).map(|i| (i % 251) as u8).collect(),
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_png");
    group.sample_size(10);
    for (label, format) in [
        ("gray8", PixelFormat::Gray8),
        ("rgb8", PixelFormat::Rgb8),
        ("lineart", PixelFormat::Lineart),
    ] {
        let frame = gradient(format);
        group.bench_function(label, |b| {
            b.iter(|| {
                let encoder = ImageEncoder::from_frame(black_box(frame.clone())).expect("wrap");
                encoder.to_png().expect("encode")
            })
        });
    }
    group.finish();
}

fn bench_hash(c: &mut Criterion) {
    let data = vec![0xA5u8; 4 * 1024 * 1024];
    c.bench_function("sha256_4mib", |b| b.iter(|| hash_bytes(black_box(&data))));
}

criterion_group!(benches, bench_encode, bench_hash);
criterion_main!(benches);
