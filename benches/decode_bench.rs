//! Performance benchmarks for the WL-134 frame decoder.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench decode_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use feedgate_core::TagId;
use feedgate_rfid::{Wl134Codec, encode_frame, parse_frame};
use std::hint::black_box;
use tokio_util::codec::Decoder;

/// Benchmark decoding a single well-formed frame.
fn bench_parse_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_frame");
    group.throughput(Throughput::Elements(1));

    let frame = encode_frame(TagId::new(0x12_3456_789A).unwrap());

    group.bench_function("valid_frame", |b| {
        b.iter(|| black_box(parse_frame(black_box(&frame))));
    });

    let mut bad = frame;
    bad[5] = b'x';
    group.bench_function("invalid_digit", |b| {
        b.iter(|| black_box(parse_frame(black_box(&bad))));
    });

    group.finish();
}

/// Benchmark the codec over streams of back-to-back frames.
fn bench_codec_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_stream");

    for count in [1usize, 10, 100] {
        let mut stream = Vec::with_capacity(count * 32);
        for i in 0..count {
            stream.extend_from_slice(b"\x00\x00");
            stream.extend_from_slice(&encode_frame(TagId::new(i as u64).unwrap()));
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &stream, |b, stream| {
            b.iter(|| {
                let mut codec = Wl134Codec::new();
                let mut buf = BytesMut::from(&stream[..]);
                let mut decoded = 0usize;
                while let Some(item) = codec.decode(&mut buf).unwrap() {
                    if item.is_ok() {
                        decoded += 1;
                    }
                }
                black_box(decoded)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_frame, bench_codec_stream);
criterion_main!(benches);
