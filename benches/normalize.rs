//! Criterion benchmarks for the contrast stretch and the stream hot path.
//!
//! Key metrics:
//! - Normalization throughput for common sensor sizes at 8 and 16 bits
//! - Per-frame cost of a full pull, normalize, recycle round against the mock
//!
//! Run with: cargo bench --bench normalize

use arv_stream::hardware::mock::MockFrameSource;
use arv_stream::{frame_stream, normalize, PixelFormat, SessionConfig, StreamConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Sensor sizes seen on thermal and scientific cameras.
const SENSORS: [(&str, u32, u32); 3] = [
    ("160x120", 160, 120),
    ("640x512", 640, 512),
    ("2048x2048", 2048, 2048),
];

fn ramp(len: usize, modulus: usize, bytes: usize) -> Vec<u8> {
    (0..len)
        .flat_map(|i| {
            let v = (i % modulus) as u16;
            v.to_le_bytes().into_iter().take(bytes)
        })
        .collect()
}

fn normalize_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for (name, width, height) in SENSORS {
        let npix = width as usize * height as usize;

        let raw8 = ramp(npix, 256, 1);
        group.throughput(Throughput::Elements(npix as u64));
        group.bench_with_input(BenchmarkId::new("mono8", name), &raw8, |b, raw| {
            b.iter(|| normalize(black_box(raw), width, height, 8).unwrap());
        });

        let raw16 = ramp(npix, 4096, 2);
        group.bench_with_input(BenchmarkId::new("mono16", name), &raw16, |b, raw| {
            b.iter(|| normalize(black_box(raw), width, height, 16).unwrap());
        });
    }

    group.finish();
}

fn stream_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_stream");
    group.throughput(Throughput::Elements(1));

    let camera = MockFrameSource::new(640, 512, PixelFormat::MONO_16);
    let mut stream = frame_stream(camera, SessionConfig::default(), StreamConfig::infinite()).unwrap();

    group.bench_function("next_640x512_mono16", |b| {
        b.iter(|| black_box(stream.next()));
    });

    group.finish();
}

criterion_group!(benches, normalize_throughput, stream_round_trip);
criterion_main!(benches);
