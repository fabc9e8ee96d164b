// tests/test_iteration.rs — progressive-radius and emission-accounting
// behaviour through the public API.
//
// These run with `cargo test --test test_iteration`. Integration tests can
// only touch the crate's public surface — a good check that the iteration
// math is usable without reaching into renderer internals.

use lumen_ppm::{progressive_radius_squared, total_emitted_after, IterationState};

// ===== Radius update =====

#[test]
fn radius_squared_sequence_converges_toward_zero() {
    // Iterating the update r² ← r² · (i + α)/(i + 1) must shrink the
    // radius without ever reaching zero or going negative.
    let alpha = 0.7f32;
    let mut r2 = 1.0f32;
    let mut prev = r2;
    for i in 0..500u64 {
        r2 = progressive_radius_squared(r2, i, alpha);
        assert!(r2 > 0.0, "iteration {i}: radius collapsed");
        assert!(r2 < prev, "iteration {i}: radius did not shrink");
        prev = r2;
    }
    // After 500 iterations the shrink is substantial but finite.
    assert!(r2 < 0.25, "500 iterations only reached {r2}");
    assert!(r2 > 1e-4, "radius shrank implausibly fast: {r2}");
}

#[test]
fn radius_update_reads_the_current_iteration_index() {
    // The factor for i=0 is α, for i=1 it is (1+α)/2 — distinguishable,
    // so an off-by-one in the index shows up immediately.
    let r2 = 2.0f32;
    assert!((progressive_radius_squared(r2, 0, 0.5) - 1.0).abs() < 1e-6);
    assert!((progressive_radius_squared(r2, 1, 0.5) - 1.5).abs() < 1e-6);
}

// ===== Emission accounting =====

#[test]
fn emission_total_is_the_literal_per_call_formula() {
    // The total tracks (i + 1) · E per call, NOT a running sum: with
    // E = 10 the totals after iterations 0, 1, 2 read 10, 20, 30.
    let e = 10u32;
    assert_eq!(total_emitted_after(0, e), 10.0);
    assert_eq!(total_emitted_after(1, e), 20.0);
    assert_eq!(total_emitted_after(2, e), 30.0);
    // A running sum would have reached 10 + 20 + 30 = 60 by now.
    assert_ne!(total_emitted_after(2, e), 60.0);
}

#[test]
fn emission_total_survives_large_iteration_counts() {
    // f64 keeps the product exact far beyond f32 range: one million
    // iterations of a full photon launch.
    let e = 1024u32 * 1024;
    let total = total_emitted_after(999_999, e);
    assert_eq!(total, 1_000_000.0 * e as f64);
}

// ===== IterationState =====

#[test]
fn iteration_state_tracks_one_call() {
    let mut state = IterationState::default();
    state.advance(5, 2, 0.5, 0.8);
    assert_eq!(state.global_iteration, 5);
    assert_eq!(state.local_iteration, 2);
    assert_eq!(state.ppm_radius, 0.5);
    assert!((state.ppm_radius_squared - 0.25).abs() < 1e-7);
    let want = 0.25 * (5.0 + 0.8) / 6.0;
    assert!((state.ppm_radius_squared_new - want).abs() < 1e-7);

    state.record_emission(10);
    assert_eq!(state.total_emitted_photons, 60.0);
}

#[test]
fn iteration_state_is_overwritten_not_accumulated() {
    // The scheduler mutates the state once per iteration; a repeat call
    // with the same inputs must be idempotent.
    let mut a = IterationState::default();
    a.advance(3, 3, 1.5, 0.7);
    a.record_emission(100);
    let snapshot = a;

    a.advance(3, 3, 1.5, 0.7);
    a.record_emission(100);
    assert_eq!(a.ppm_radius_squared_new, snapshot.ppm_radius_squared_new);
    assert_eq!(a.total_emitted_photons, snapshot.total_emitted_photons);
}
