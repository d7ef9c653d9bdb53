use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use ashmem::{Ashmem, FakeBackend};

fn benchmark_checked_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ashmem");

    for size in [64usize, 256, 1024, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("write_read", size), size, |b, &size| {
            let mut region =
                Ashmem::create_with_backend(Arc::new(FakeBackend::new()), "bench", 1 << 20)
                    .unwrap();
            region.map_read_write().unwrap();
            let data = vec![0xA5u8; size];

            b.iter(|| {
                region.write(&data, 4096).unwrap();
                black_box(region.read(size, 4096).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_checked_access);
criterion_main!(benches);
