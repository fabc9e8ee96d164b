// tests/test_photon_map.rs — spatial-hash behaviour through the public API.

use bytemuck::Zeroable;
use glam::Vec3;
use lumen_ppm::{Photon, PhotonGrid, PhotonMapBuilder, RendererError, PHOTON_GRID_MAX_SIZE};

fn cloud(n: usize, scale: Vec3) -> Vec<Photon> {
    // LCG cloud: deterministic, no dev-dependency needed.
    let mut state = 0xdead_beefu32;
    let mut rand = move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state >> 8) as f32 / (1 << 24) as f32
    };
    (0..n)
        .map(|_| Photon::new(Vec3::new(rand(), rand(), rand()) * scale, Vec3::ONE))
        .collect()
}

#[test]
fn empty_photon_set_builds_empty_grid() {
    let grid = PhotonMapBuilder::default().build(&[]).unwrap();
    assert!(grid.is_empty());
    assert_eq!(grid.photon_count(), 0);
    assert!(grid.offsets.iter().all(|&o| o == 0), "offset table not all zero");
}

#[test]
fn all_dead_photons_build_empty_grid() {
    // A freshly zeroed photon buffer (capacity slots, no deposits) must
    // behave like an empty set.
    let photons = vec![Photon::zeroed(); 4096];
    let grid = PhotonMapBuilder::default().build(&photons).unwrap();
    assert!(grid.is_empty());
}

#[test]
fn every_photon_is_reachable_through_its_cell() {
    let photons = cloud(20_000, Vec3::new(12.0, 3.0, 8.0));
    let grid = PhotonMapBuilder::default().build(&photons).unwrap();
    assert_eq!(grid.photon_count() as usize, photons.len());

    for (i, p) in photons.iter().enumerate() {
        let cell = grid.cell_of(Vec3::from_array(p.position));
        assert!(
            grid.cell_photons(cell).contains(&(i as u32)),
            "photon {i} not indexed by its own cell"
        );
    }
}

#[test]
fn neighbourhood_query_finds_nearby_photons() {
    // The point of the grid: photons within one cell of a query position
    // are found by scanning at most 27 cells.
    let photons = vec![
        Photon::new(Vec3::new(5.0, 5.0, 5.0), Vec3::ONE),
        Photon::new(Vec3::new(5.01, 5.0, 5.0), Vec3::ONE),
        Photon::new(Vec3::new(0.0, 0.0, 0.0), Vec3::ONE),
        Photon::new(Vec3::new(10.0, 10.0, 10.0), Vec3::ONE),
    ];
    let grid = PhotonMapBuilder::default().build(&photons).unwrap();

    let query = Vec3::new(5.005, 5.0, 5.0);
    let found = gather_neighbourhood(&grid, query);
    assert!(found.contains(&0) && found.contains(&1), "close pair missing: {found:?}");
    assert!(!found.contains(&2) && !found.contains(&3), "far photons leaked in: {found:?}");
}

/// Host-side mirror of what the indirect-estimation kernel does: collect
/// photon indices from the 3×3×3 cell neighbourhood of a position.
fn gather_neighbourhood(grid: &PhotonGrid, p: Vec3) -> Vec<u32> {
    let centre = ((p - grid.origin) / grid.cell_size).floor();
    let mut out = Vec::new();
    for dz in -1i64..=1 {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let ix = centre.x as i64 + dx;
                let iy = centre.y as i64 + dy;
                let iz = centre.z as i64 + dz;
                if ix < 0
                    || iy < 0
                    || iz < 0
                    || ix >= grid.dims[0] as i64
                    || iy >= grid.dims[1] as i64
                    || iz >= grid.dims[2] as i64
                {
                    continue;
                }
                let cell =
                    (iz as usize * grid.dims[1] as usize + iy as usize) * grid.dims[0] as usize
                        + ix as usize;
                out.extend_from_slice(grid.cell_photons(cell));
            }
        }
    }
    out
}

#[test]
fn rebuild_fully_replaces_previous_grid() {
    let builder = PhotonMapBuilder::default();
    let first = builder.build(&cloud(1000, Vec3::splat(10.0))).unwrap();
    assert_eq!(first.photon_count(), 1000);
    // Nothing of the first build leaks into the second: every index refers
    // to the new, much smaller photon set.
    let second = builder.build(&cloud(10, Vec3::splat(2.0))).unwrap();
    assert_eq!(second.photon_count(), 10);
    assert!(second.indices.iter().all(|&i| i < 10));
}

#[test]
fn overflow_reports_cell_count_and_bound() {
    let builder = PhotonMapBuilder { cells_per_longest_axis: 128, ..Default::default() };
    let photons = vec![
        Photon::new(Vec3::ZERO, Vec3::ONE),
        Photon::new(Vec3::splat(64.0), Vec3::ONE),
    ];
    match builder.build(&photons) {
        Err(RendererError::GridOverflow { cells, max }) => {
            assert_eq!(cells, 129 * 129 * 129);
            assert_eq!(max, PHOTON_GRID_MAX_SIZE as u64);
        }
        other => panic!("expected GridOverflow, got {other:?}"),
    }
}

#[test]
fn grid_is_reproducible_for_a_fixed_photon_set() {
    let photons = cloud(5000, Vec3::new(7.0, 7.0, 1.0));
    let a = PhotonMapBuilder::default().build(&photons).unwrap();
    let b = PhotonMapBuilder::default().build(&photons).unwrap();
    assert_eq!(a, b);
}
