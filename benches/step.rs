use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sandcore::{CollisionClass, Grid, MovementClass};

fn build_grid(width: u32, height: u32) -> Grid {
    let mut grid = Grid::new_empty(width, height);
    grid.init_materials(3);
    grid.add_material(0, MovementClass::Solid, 0, 0.0, CollisionClass::None, 0.0, &[]);
    grid.add_material(1, MovementClass::Powder, 2, 1.0, CollisionClass::Solid, 0.5, &[]);
    grid.add_material(2, MovementClass::Liquid, 1, 0.0, CollisionClass::Liquid, 0.0, &[]);
    grid
}

fn sparse_powder_column(size: u32) -> Grid {
    let mut grid = build_grid(size, size);
    let (w, _) = grid.get_size();
    for x in (32..w - 32).step_by(4) {
        for y in 32..40 {
            grid.add_particle(x, y, 1);
        }
    }
    grid
}

fn dense_liquid_pool(size: u32) -> Grid {
    let mut grid = build_grid(size, size);
    let (w, h) = grid.get_size();
    for x in 32..(w - 32) {
        for y in (h / 2)..(h - 32) {
            grid.add_particle(x, y, 2);
        }
    }
    grid
}

fn all_solid_idle(size: u32) -> Grid {
    build_grid(size, size)
}

const SIZES: &[u32] = &[128, 256, 512];

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for &size in SIZES {
        let cell_count = (size as u64) * (size as u64);
        group.throughput(Throughput::Elements(cell_count));

        group.bench_with_input(BenchmarkId::new("sparse_powder", size), &size, |b, &size| {
            b.iter_batched(
                || sparse_powder_column(size),
                |mut grid| grid.step_manual(),
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("dense_liquid", size), &size, |b, &size| {
            b.iter_batched(
                || dense_liquid_pool(size),
                |mut grid| grid.step_manual(),
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("idle_solid", size), &size, |b, &size| {
            b.iter_batched(
                || all_solid_idle(size),
                |mut grid| grid.step_manual(),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
