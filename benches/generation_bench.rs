use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use arena_core::generation::{generate, ArenaParams};
use arena_core::pathfinding::find_path;

fn bench_generation(c: &mut Criterion) {
    c.bench_function("generate_60x60", |b| {
        b.iter(|| {
            let params = ArenaParams {
                seed: black_box(42),
                ..ArenaParams::default()
            };
            generate(&params).expect("generation failed")
        })
    });

    c.bench_function("generate_120x120", |b| {
        b.iter(|| {
            let params = ArenaParams {
                seed: black_box(42),
                width: 120,
                height: 120,
                room_count: 16,
                ..ArenaParams::default()
            };
            generate(&params).expect("generation failed")
        })
    });
}

fn bench_pathfinding(c: &mut Criterion) {
    let layout = generate(&ArenaParams::default()).expect("generation failed");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let start = layout.spawn_cell().expect("spawn cell");

    // farthest of a handful of random floor cells, for a long query
    let goal = (0..100)
        .filter_map(|_| layout.random_floor_cell(&mut rng))
        .max_by_key(|cell| cell.manhattan(start))
        .expect("floor cells");

    c.bench_function("find_path_cross_arena", |b| {
        b.iter(|| {
            find_path(
                &layout.grid,
                &layout.costs,
                black_box(start),
                black_box(goal),
            )
            .expect("path")
        })
    });
}

criterion_group!(benches, bench_generation, bench_pathfinding);
criterion_main!(benches);
