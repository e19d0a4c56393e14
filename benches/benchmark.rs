use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use webpsave::{compose_metadata, write_to_buffer, ByteSink, EncodeOptions, Frame, MetadataSet};

/// Lossy container with a `len` byte image chunk.
fn lossy_stream(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((12 + len) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBPVP8 ");
    out.extend_from_slice(&(len as u32).to_le_bytes());
    out.resize(20 + len, 0x5a);
    out
}

fn bench_sink_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("sink_append");
    // libwebp hands its output over in pieces of a few KiB
    let piece = vec![0xABu8; 4096];
    for total in [64 * 1024usize, 1024 * 1024, 16 * 1024 * 1024] {
        group.throughput(Throughput::Bytes(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(total), &total, |b, &total| {
            b.iter(|| {
                let mut sink = ByteSink::new();
                for _ in 0..total / piece.len() {
                    sink.append(black_box(&piece)).unwrap();
                }
                sink
            })
        });
    }
    group.finish();
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose_metadata");
    let xmp = vec![b'x'; 2048];
    for image_len in [16 * 1024usize, 1024 * 1024] {
        let stream = lossy_stream(image_len);
        group.throughput(Throughput::Bytes(image_len as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(image_len),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut base = ByteSink::new();
                    base.append(stream).unwrap();
                    let mut frame = Frame::new(Vec::new(), 512, 512, 3)
                        .with_metadata(MetadataSet::new().with_xmp(xmp.clone()));
                    compose_metadata(base, 512, 512, &mut frame, false).unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let pixels: Vec<u8> = (0..256u32 * 256 * 3).map(|i| (i % 251) as u8).collect();
    let mut group = c.benchmark_group("write_to_buffer");
    group.sample_size(20);
    for (name, options) in [
        ("lossy_q80", EncodeOptions::new().quality(80)),
        ("lossless", EncodeOptions::new().lossless(true)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut frame = Frame::new(pixels.as_slice(), 256, 256, 3);
                write_to_buffer(&mut frame, black_box(&options)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sink_growth, bench_compose, bench_encode);
criterion_main!(benches);
