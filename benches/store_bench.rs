use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hdstore::{DataStore, DenseMatrix, OpenMode};
use tempfile::tempdir;

fn bench_matrix_round_trip(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.hds");

    let mut store = DataStore::new();
    store.open(&path, OpenMode::ReadWriteTruncate).unwrap();

    let mut mat = DenseMatrix::zeros(256, 256);
    for row in 0..256 {
        for col in 0..256 {
            mat.set(row, col, (row * col) as f64 * 0.5);
        }
    }

    c.bench_function("write_matrix 256x256", |b| {
        b.iter(|| store.write_matrix("bench/matrix", black_box(&mat)).unwrap());
    });
    c.bench_function("read_matrix 256x256", |b| {
        b.iter(|| black_box(store.read_matrix("bench/matrix").unwrap()));
    });

    store.close().unwrap();
}

criterion_group!(benches, bench_matrix_round_trip);
criterion_main!(benches);
