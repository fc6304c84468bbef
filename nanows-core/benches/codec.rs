//! Frame codec benchmarks: REQ header framing and unframing against the
//! pass-through protocols, across payload sizes.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nanows_core::codec::{CorrelationSeed, FrameCodec};
use nanows_core::options::SocketOptions;
use nanows_core::payload::Payload;
use nanows_core::protocol::Protocol;

const SIZES: &[usize] = &[16, 256, 4096, 65536];

fn codec_for(protocol: Protocol) -> FrameCodec {
    let options = SocketOptions::new(protocol).with_receive_binary(true);
    FrameCodec::with_seed(&options, Some(CorrelationSeed::from_bytes([1, 2, 3, 4])))
}

fn encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/encode");

    for protocol in [Protocol::Req, Protocol::Bus] {
        let codec = codec_for(protocol);
        for &size in SIZES {
            let payload = Payload::Binary(Bytes::from(vec![0xAB; size]));
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(protocol.as_str(), size), &payload, |b, p| {
                b.iter(|| black_box(codec.encode(black_box(p.clone()))));
            });
        }
    }

    group.finish();
}

fn decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decode");

    for protocol in [Protocol::Req, Protocol::Bus] {
        let codec = codec_for(protocol);
        for &size in SIZES {
            let frame = codec.encode(Payload::Binary(Bytes::from(vec![0xCD; size])));
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(protocol.as_str(), size), &frame, |b, f| {
                b.iter(|| black_box(codec.decode(black_box(f.clone()))));
            });
        }
    }

    group.finish();
}

fn text_fallback(c: &mut Criterion) {
    let options = SocketOptions::new(Protocol::Sub);
    let codec = FrameCodec::new(&options);
    let frame = Payload::Binary(Bytes::from("x".repeat(1024)));

    c.bench_function("codec/decode/sub_text_1024", |b| {
        b.iter(|| black_box(codec.decode(black_box(frame.clone()))));
    });
}

criterion_group!(benches, encode, decode, text_fallback);
criterion_main!(benches);
