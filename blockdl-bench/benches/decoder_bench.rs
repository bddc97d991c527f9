//! Frame decoder benchmarks.

use blockdl_protocol::{Encoder, FrameDecoder, Record};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const RECORDS_PER_STREAM: u32 = 1000;
const NETWORK_CHUNK: usize = 8 * 1024;

fn create_stream(payload_size: usize) -> Bytes {
    let records: Vec<Record> = (0..RECORDS_PER_STREAM)
        .map(|key| Record::new(key, vec![b'x'; payload_size]))
        .collect();
    Encoder::encode_records(&records).unwrap().freeze()
}

fn decode_all(wire: &Bytes, chunk_size: usize) -> u64 {
    let mut decoder = FrameDecoder::new();
    let mut count = 0;
    for chunk in wire.chunks(chunk_size) {
        for record in decoder.ingest(chunk) {
            black_box(record.unwrap());
            count += 1;
        }
    }
    decoder.finalize().unwrap();
    count
}

fn bench_decode_whole_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_whole_stream");

    for size in [100, 1000, 10000] {
        let wire = create_stream(size);

        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| decode_all(wire, wire.len()));
        });
    }

    group.finish();
}

fn bench_decode_network_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_8k_chunks");

    for size in [100, 1000, 10000] {
        let wire = create_stream(size);

        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| decode_all(wire, NETWORK_CHUNK));
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_record");

    for size in [100, 1000, 10000] {
        let record = Record::new(1, vec![b'x'; size]);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &record, |b, record| {
            b.iter(|| black_box(Encoder::encode_record(record).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_whole_stream,
    bench_decode_network_chunks,
    bench_encode
);
criterion_main!(benches);
