//! Codec benchmarks for gnat-protocol.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gnat_protocol::{codec, ClientOp, Frame};

fn bench_encode_pub(c: &mut Criterion) {
    let op = ClientOp::publish("test", None, Bytes::from(vec![0u8; 64]));

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("pub_64B", |b| b.iter(|| codec::encode(black_box(&op))));
    group.finish();
}

fn bench_decode_msg(c: &mut Criterion) {
    let mut encoded = BytesMut::new();
    let frame = Frame::msg("test", 1, None, Bytes::from(vec![0u8; 64]));
    codec::encode_frame(&frame, &mut encoded).unwrap();
    let encoded = encoded.freeze();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("msg_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_streaming_decode(c: &mut Criterion) {
    let mut batch = BytesMut::new();
    for sid in 0..32 {
        let frame = Frame::msg("test.channel.room", sid, None, Bytes::from(vec![0u8; 256]));
        codec::encode_frame(&frame, &mut batch).unwrap();
        codec::encode_frame(&Frame::Ping, &mut batch).unwrap();
    }
    let batch = batch.freeze();

    c.bench_function("stream_32x256B", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&batch[..]);
            let mut count = 0;
            while let Some(frame) = codec::decode_from(&mut buf).unwrap() {
                black_box(frame);
                count += 1;
            }
            count
        })
    });
}

criterion_group!(
    benches,
    bench_encode_pub,
    bench_decode_msg,
    bench_streaming_decode
);
criterion_main!(benches);
