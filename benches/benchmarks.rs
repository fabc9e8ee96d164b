// benches/benchmarks.rs -- Host-side hot-path benchmarks.
//
// Everything here is CPU work (no device needed): the per-iteration photon
// map rebuild dominates host time in a real run, so it gets the bulk of the
// attention. Run with `cargo bench`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use glam::Vec3;
use lumen_ppm::{progressive_radius_squared, Photon, PhotonMapBuilder};

// ============================================================
// Helpers
// ============================================================

/// Deterministic photon cloud with the anisotropic spread of a lit room
/// (wide in x/z, shallow in y).
fn make_cloud(n: usize) -> Vec<Photon> {
    let mut state = 0x9e37_79b9u32;
    let mut rand = move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state >> 8) as f32 / (1 << 24) as f32
    };
    (0..n)
        .map(|_| {
            Photon::new(
                Vec3::new(rand() * 12.0, rand() * 3.0, rand() * 9.0),
                Vec3::splat(rand() + 0.01),
            )
        })
        .collect()
}

// ============================================================
// Photon map build
// ============================================================

fn bench_photon_map_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("photon_map_build");
    for &n in &[10_000usize, 100_000, 1_000_000, 4_000_000] {
        let photons = make_cloud(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &photons, |b, photons| {
            b.iter(|| PhotonMapBuilder::default().build(photons).unwrap());
        });
    }
    group.finish();
}

fn bench_photon_map_sparse_buffer(c: &mut Criterion) {
    // A realistic photon buffer is mostly dead slots: full capacity with
    // only a fraction of deposits. Measures the live-filter cost.
    let mut photons = vec![Photon::new(Vec3::ZERO, Vec3::ZERO); 4_194_304];
    for (i, p) in make_cloud(400_000).into_iter().enumerate() {
        photons[i * 10] = p;
    }
    c.bench_function("photon_map_build/sparse_4Mi_10pct_live", |b| {
        b.iter(|| PhotonMapBuilder::default().build(&photons).unwrap());
    });
}

// ============================================================
// Radius schedule
// ============================================================

fn bench_radius_schedule(c: &mut Criterion) {
    c.bench_function("radius_schedule_10k_iterations", |b| {
        b.iter(|| {
            let mut r2 = 1.0f32;
            for i in 0..10_000u64 {
                r2 = progressive_radius_squared(r2, i, 0.7);
            }
            r2
        });
    });
}

criterion_group!(
    benches,
    bench_photon_map_build,
    bench_photon_map_sparse_buffer,
    bench_radius_schedule
);
criterion_main!(benches);
