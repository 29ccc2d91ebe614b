use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lapline::telemetry::{LapSegmenter, Packet, decode_packet};
use lapline::{Session, analysis, export_session};
use std::time::Duration;

fn create_packet(point_no: usize) -> Packet {
    Packet {
        wheel_speed_front: 40.0,
        wheel_speed_rear: 41.0,
        lap_number: (point_no / 1000) as u8,
        last_lap_time: 92.5,
        track_id: "monza".to_string(),
        model: "porsche_963".to_string(),
        x: point_no as f32 * 0.5,
        y: (point_no as f32 * 0.01).sin() * 300.0,
        speed: 40.5,
    }
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let datagram = create_packet(42).encode();

    group.bench_function("decode_packet", |b| {
        b.iter(|| decode_packet(black_box(&datagram)))
    });
    group.bench_function("encode_packet", |b| {
        let packet = create_packet(42);
        b.iter(|| black_box(&packet).encode())
    });
    group.finish();
}

fn bench_segmenter(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmenter");
    let datagrams: Vec<_> = (0..10_000).map(|i| create_packet(i).encode()).collect();

    group.bench_function("ingest_10000_datagrams", |b| {
        let segmenter = LapSegmenter::new();
        b.iter(|| {
            let mut session = Session::new();
            for datagram in &datagrams {
                if let Ok(packet) = decode_packet(datagram) {
                    segmenter.apply(&mut session, packet);
                }
            }
            black_box(session.buffer.len())
        })
    });
    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    let buffer: Vec<_> = (0..10_000).map(|i| create_packet(i).into_sample()).collect();

    group.bench_function("lap_summaries", |b| {
        b.iter(|| analysis::lap_summaries(black_box(&buffer)))
    });
    group.bench_function("fastest_lap", |b| {
        b.iter(|| analysis::fastest_lap(black_box(&buffer)))
    });
    group.bench_function("export_session", |b| {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("bench.csv");
        b.iter(|| export_session(black_box(&buffer), &file).unwrap())
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = bench_decode, bench_segmenter, bench_analysis
}
criterion_main!(benches);
