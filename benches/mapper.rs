use criterion::{criterion_group, criterion_main, Criterion};
use ekraw::mapper::FileMap;
use ekraw::parser::cursor::RawCursor;
use std::io::Cursor;

fn frame(tag: &[u8; 4], ticks: u64, payload: &[u8]) -> Vec<u8> {
    let len = (12 + payload.len()) as u32;
    let mut out = Vec::with_capacity(payload.len() + 20);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(&ticks.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&len.to_le_bytes());
    out
}

/// A thousand pings of NME0 + two RAW0 frames each
fn synthetic_stream() -> Vec<u8> {
    let base = 11_644_473_600u64 * 10_000_000;
    let mut raw0 = Vec::new();
    raw0.extend(1i16.to_le_bytes());
    raw0.extend(1i16.to_le_bytes());
    for _ in 0..12 {
        raw0.extend(0f32.to_le_bytes());
    }
    raw0.extend([0u8; 12]);
    raw0.extend(0i32.to_le_bytes());
    raw0.extend(512i32.to_le_bytes());
    raw0.extend([0u8; 1024]);

    let mut bytes = Vec::new();
    for p in 0..1_000u64 {
        let t = base + p * 10_000_000;
        bytes.extend(frame(
            b"NME0",
            t,
            b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
        ));
        bytes.extend(frame(b"RAW0", t, &raw0));
        bytes.extend(frame(b"RAW0", t, &raw0));
    }
    bytes
}

pub fn map_build(c: &mut Criterion) {
    let bytes = synthetic_stream();
    c.bench_function("map_build", |b| {
        b.iter(|| {
            let mut cursor = RawCursor::new(Cursor::new(bytes.clone())).unwrap();
            let mut map = FileMap::build(&mut cursor).unwrap();
            map.finalize();
            map.len()
        })
    });
}

pub fn map_lookup(c: &mut Criterion) {
    let bytes = synthetic_stream();
    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();
    let mut map = FileMap::build(&mut cursor).unwrap();
    map.finalize();

    c.bench_function("map_lookup", |b| {
        b.iter(|| {
            for i in 0..2_000 {
                map.lookup("RAW0", i).unwrap();
            }
        })
    });
}

criterion_group!(benches, map_build, map_lookup);
criterion_main!(benches);
