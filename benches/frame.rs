//! Benchmarks for wire frame encoding and decoding.
//!
//! Framing cost is pure overhead on top of network and GPU time; these
//! benchmarks keep an eye on the CRC and byte-shuffling work per batch.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use juxta::dataset::synthetic;
use juxta::matrix::{Matrix, QueryResults};
use juxta::protocol::{pack_results, unpack_results, Command, Request, Response};
use std::io::Cursor;

fn query_request(batch: usize, dim: usize) -> Request {
    let vectors = synthetic::uniform(batch, dim, 42);
    Request::new(Command::Query, "benchkey")
        .with_k(10)
        .with_vectors(&vectors)
}

fn query_results(batch: usize, k: usize) -> QueryResults {
    let distances = synthetic::uniform(batch, k, 7);
    let indices = Matrix::new(batch, k, (0..batch * k).map(|i| i as i32).collect()).unwrap();
    QueryResults::new(distances, indices).unwrap()
}

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encode");
    for &batch in &[1usize, 128, 1024] {
        let dim = 300;
        let req = query_request(batch, dim);
        group.throughput(Throughput::Bytes((batch * dim * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &req, |b, req| {
            b.iter(|| black_box(req.encode()));
        });
    }
    group.finish();
}

fn bench_response_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_decode");
    for &batch in &[1usize, 128, 1024] {
        let k = 10;
        let mut resp = Response::ok(Command::Query);
        resp.body = pack_results(&query_results(batch, k));
        let bytes = resp.encode();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &bytes, |b, bytes| {
            b.iter(|| {
                let resp = Response::read_from(&mut Cursor::new(bytes)).unwrap();
                black_box(unpack_results(&resp.body).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_request_encode, bench_response_roundtrip);
criterion_main!(benches);
