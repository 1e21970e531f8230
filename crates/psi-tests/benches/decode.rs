use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use psi_decoder::{Decoder, DecoderConfig, StreamDecoder};
use psi_tests::{SyntheticCloud, decode_in_chunks};
use psi_wire::parse_header;

fn bench_parse_header(c: &mut Criterion) {
    let file = SyntheticCloud::new(10_000).with_normals().spot_size(0.134_696).build();

    c.bench_function("parse_header", |b| {
        b.iter(|| parse_header(&file).unwrap());
    });
}

fn bench_decode_one_shot(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_one_shot");

    for points in [1_000, 10_000, 100_000] {
        for normals in [false, true] {
            let cloud = SyntheticCloud::new(points);
            let cloud = if normals { cloud.with_normals() } else { cloud };
            let file = cloud.build();
            let label = if normals { "normals" } else { "plain" };

            group.throughput(Throughput::Bytes(file.len() as u64));
            group.bench_with_input(BenchmarkId::new(label, points), &file, |b, file| {
                b.iter(|| StreamDecoder::new().decode_whole(file).unwrap());
            });
        }
    }

    group.finish();
}

fn bench_decode_streamed(c: &mut Criterion) {
    let file = SyntheticCloud::new(100_000).with_normals().build();
    let mut group = c.benchmark_group("decode_streamed");
    group.throughput(Throughput::Bytes(file.len() as u64));

    for chunk in [1_024, 16_384, 65_536] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| decode_in_chunks(&file, chunk, DecoderConfig::default()));
        });
    }

    group.finish();
}

fn bench_session_overhead(c: &mut Criterion) {
    let file = SyntheticCloud::new(100_000).build();

    c.bench_function("session_finish_only", |b| {
        b.iter(|| {
            let mut events = 0usize;
            let mut decoder = Decoder::new(|_| events += 1);
            decoder.finish(&file);
            let points = decoder.parsed_points();
            drop(decoder);
            (points, events)
        });
    });
}

criterion_group!(
    benches,
    bench_parse_header,
    bench_decode_one_shot,
    bench_decode_streamed,
    bench_session_overhead
);
criterion_main!(benches);
