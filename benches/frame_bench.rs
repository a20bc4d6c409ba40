use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hcadecrypt::checksum::checksum;
use hcadecrypt::cipher::CipherTable;
use hcadecrypt::frame::transform_frames;

const FRAME_SIZE: usize = 0x200;
const FRAME_COUNT: u32 = 2048;

fn bench_tables(c: &mut Criterion) {
    c.bench_function("table_fixed", |b| b.iter(CipherTable::fixed));
    c.bench_function("table_keyed", |b| b.iter(|| CipherTable::keyed(black_box(0x30D9E8))));
}

fn bench_checksum(c: &mut Criterion) {
    let data = vec![0x5Au8; 1024 * 1024];
    c.bench_function("checksum_1mb", |b| b.iter(|| checksum(black_box(&data))));
}

fn bench_transform(c: &mut Criterion) {
    let input: Vec<u8> = (0..FRAME_SIZE * FRAME_COUNT as usize).map(|i| i as u8).collect();
    let table = CipherTable::keyed(0x30D9E8);

    c.bench_function("transform_2048_frames", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(input.len());
            transform_frames(black_box(&input), 0, FRAME_SIZE, FRAME_COUNT, &table, &mut out);
            out
        })
    });
}

criterion_group!(benches, bench_tables, bench_checksum, bench_transform);
criterion_main!(benches);
