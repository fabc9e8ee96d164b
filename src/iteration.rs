// iteration.rs — progressive-radius state and the per-frame scalar block.
//
// The stochastic progressive photon mapping update is the single most
// important numeric invariant in the renderer:
//
//     r²_new = r² · (i + α) / (i + 1)
//
// computed with the *current* global iteration index i, before any
// increment, and consumed by the photon-tracing pass to decide its own
// radius shrink for the following iteration. For α < 1 the radius strictly
// decreases; α = 1 freezes it.
//
// EMISSION ACCOUNTING:
// The total-emitted counter is recomputed from the global index, not
// accumulated: after the photon pass of iteration i it is set to
// (i + 1) · emitted_per_iteration. See DESIGN.md for why this literal
// formula is the contract.

use bytemuck::{Pod, Zeroable};

use crate::buffers::{
    EMITTED_PHOTONS_PER_ITERATION, MAX_PHOTON_DEPOSITS_PER_EMITTED, PHOTON_LAUNCH_WIDTH,
};
use crate::photon_map::PhotonGrid;
use crate::request::{Camera, RenderRequest};
use crate::scene::Sphere;

/// Next squared search radius per the SPPM update rule.
pub fn progressive_radius_squared(radius_squared: f32, global_iteration: u64, alpha: f32) -> f32 {
    radius_squared * (global_iteration as f32 + alpha) / (global_iteration as f32 + 1.0)
}

/// Cumulative emitted-photon total after the photon pass of `global_iteration`.
pub fn total_emitted_after(global_iteration: u64, emitted_per_iteration: u32) -> f64 {
    (global_iteration + 1) as f64 * emitted_per_iteration as f64
}

/// Mutable per-renderer iteration state. Updated once per iteration by the
/// scheduler; never concurrently mutated; not persisted across restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterationState {
    pub global_iteration: u64,
    pub local_iteration: u64,
    pub ppm_radius: f32,
    pub ppm_radius_squared: f32,
    pub ppm_radius_squared_new: f32,
    pub total_emitted_photons: f64,
}

impl IterationState {
    /// Fold one render request's radius inputs into the state. The new
    /// squared radius uses the incoming (current) global iteration index.
    pub fn advance(&mut self, global_iteration: u64, local_iteration: u64, radius: f32, alpha: f32) {
        self.global_iteration = global_iteration;
        self.local_iteration = local_iteration;
        self.ppm_radius = radius;
        self.ppm_radius_squared = radius * radius;
        self.ppm_radius_squared_new =
            progressive_radius_squared(self.ppm_radius_squared, global_iteration, alpha);
    }

    /// Record the emission total after a photon-tracing pass.
    pub fn record_emission(&mut self, emitted_per_iteration: u32) {
        self.total_emitted_photons =
            total_emitted_after(self.global_iteration, emitted_per_iteration);
    }
}

/// The per-frame scalar block, uploaded as one uniform before the pipeline
/// runs (and re-uploaded after the photon-map build fills the grid fields).
///
/// This is the strongly typed replacement for a string-keyed context
/// variable bag: every kernel reads the same struct, so a typo is a compile
/// error instead of a silently unbound scalar.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameParams {
    pub camera: Camera,
    /// xyz = scene bounding sphere center, w = radius.
    pub scene_bounding_sphere: [f32; 4],
    pub grid_origin: [f32; 3],
    pub grid_cell_size: f32,
    pub grid_dims: [u32; 3],
    pub local_iteration: u32,
    pub iteration_number: f32,
    pub ppm_alpha: f32,
    pub ppm_radius: f32,
    pub ppm_radius_squared: f32,
    pub ppm_radius_squared_new: f32,
    pub total_emitted: f32,
    pub emitted_per_iteration: u32,
    pub photon_launch_width: u32,
    pub max_deposits_per_emitted: u32,
    pub render_method: u32,
    pub _pad: [u32; 2],
}

impl FrameParams {
    /// Assemble the block from the iteration state and request; grid fields
    /// start zeroed and are filled by [`FrameParams::set_grid`] once the
    /// photon map exists.
    pub fn assemble(
        state: &IterationState,
        request: &RenderRequest,
        bounding_sphere: Sphere,
    ) -> Self {
        FrameParams {
            camera: request.camera,
            scene_bounding_sphere: [
                bounding_sphere.center.x,
                bounding_sphere.center.y,
                bounding_sphere.center.z,
                bounding_sphere.radius,
            ],
            grid_origin: [0.0; 3],
            grid_cell_size: 0.0,
            grid_dims: [0; 3],
            local_iteration: state.local_iteration as u32,
            iteration_number: state.global_iteration as f32,
            ppm_alpha: request.ppm_alpha,
            ppm_radius: state.ppm_radius,
            ppm_radius_squared: state.ppm_radius_squared,
            ppm_radius_squared_new: state.ppm_radius_squared_new,
            total_emitted: state.total_emitted_photons as f32,
            emitted_per_iteration: EMITTED_PHOTONS_PER_ITERATION,
            photon_launch_width: PHOTON_LAUNCH_WIDTH,
            max_deposits_per_emitted: MAX_PHOTON_DEPOSITS_PER_EMITTED,
            render_method: request.render_method.as_u32(),
            _pad: [0; 2],
        }
    }

    pub fn set_grid(&mut self, grid: &PhotonGrid) {
        self.grid_origin = grid.origin.to_array();
        self.grid_cell_size = grid.cell_size;
        self.grid_dims = grid.dims;
    }

    pub fn set_total_emitted(&mut self, total: f64) {
        self.total_emitted = total as f32;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
