// renderer.rs — pipeline scheduler / iteration controller.
//
// Lifecycle: construct → initialize (device + buffers + pass table, once)
// → init_scene (once per scene change) → render_next_iteration* →
// get_output_buffer. The state machine is explicit:
//
//     Uninitialized → Initialized → SceneBound → (Rendering) → SceneBound
//
// `Rendering` is transient: a single control thread issues the seven
// pipeline stages in strict data-dependency order and returns to
// SceneBound. The renderer is not reentrant; a second render call while
// one is in flight raises `ConcurrentRenderCall`.
//
// PIPELINE (per iteration):
//   1/7 photon trace          — photon launch extent; fills the photon buffer
//   2/7 photon map build      — host-side grid build + upload (no kernel)
//   3/7 sync                  — zero-extent indirect-estimation launch,
//                               fences the host-written grid for the GPU
//   4/7 ray trace             — width × height; fills the hit-point buffer
//   5/7 indirect estimation   — width × height; consumes grid + hit points
//   6/7 direct estimation     — width × height
//   7/7 output compose        — width × height; direct + indirect → output
//
// Stage timings are advisory only — logged and queryable, never part of
// control flow. Any stage fault aborts the whole iteration; partial output
// is never valid.

use std::fmt;
use std::time::Instant;

use crate::buffers::{
    read_back, BufferPool, EMITTED_PHOTONS_PER_ITERATION, INITIAL_HEIGHT, INITIAL_WIDTH,
    PHOTON_LAUNCH_HEIGHT, PHOTON_LAUNCH_WIDTH,
};
use crate::device::{ComputeDevice, GpuDevice};
use crate::error::RendererError;
use crate::iteration::{FrameParams, IterationState};
use crate::passes::{LaunchContext, PassKind, PassRegistration, PassTable};
use crate::photon_map::{Photon, PhotonMapBuilder};
use crate::request::RenderRequest;
use crate::scene::{Light, Scene, SceneBinding};

/// Wall-clock seconds per pipeline stage, for the last iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub photon_trace: f64,
    pub photon_map: f64,
    pub sync: f64,
    pub ray_trace: f64,
    pub indirect: f64,
    pub direct: f64,
    pub output: f64,
    pub total: f64,
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "photon {:.1}ms | map {:.1}ms | sync {:.1}ms | trace {:.1}ms | \
             indirect {:.1}ms | direct {:.1}ms | output {:.1}ms | total {:.1}ms",
            self.photon_trace * 1e3,
            self.photon_map * 1e3,
            self.sync * 1e3,
            self.ray_trace * 1e3,
            self.indirect * 1e3,
            self.direct * 1e3,
            self.output * 1e3,
            self.total * 1e3,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initialized,
    SceneBound,
}

/// Host-side controller of the progressive photon mapping pipeline.
///
/// Owns the compute context (device, buffer pool, pass table) and the
/// progressive iteration state. One instance per renderer; all state is
/// per-process and rebuilt every run.
pub struct PpmRenderer {
    phase: Phase,
    gpu: Option<GpuDevice>,
    buffers: Option<BufferPool>,
    passes: Option<PassTable>,
    scene: Option<SceneBinding>,
    iteration: IterationState,
    grid_builder: PhotonMapBuilder,
    last_timings: Option<StageTimings>,
    in_flight: bool,
    output_valid: bool,
}

impl Default for PpmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PpmRenderer {
    /// Construct an empty controller. No device work happens here.
    pub fn new() -> Self {
        PpmRenderer {
            phase: Phase::Uninitialized,
            gpu: None,
            buffers: None,
            passes: None,
            scene: None,
            iteration: IterationState::default(),
            grid_builder: PhotonMapBuilder::default(),
            last_timings: None,
            in_flight: false,
            output_valid: false,
        }
    }

    /// Override the photon-grid build policy. Must happen before rendering.
    pub fn set_grid_builder(&mut self, builder: PhotonMapBuilder) {
        self.grid_builder = builder;
    }

    /// Select the compute device, create every pipeline buffer, and
    /// register the kernel passes. Must run exactly once.
    ///
    /// # Errors
    /// `AlreadyInitialized` on a second call; `DeviceNotSupported` /
    /// `DeviceRequest` from device selection.
    pub fn initialize(
        &mut self,
        device: &dyn ComputeDevice,
        passes: PassRegistration,
    ) -> Result<(), RendererError> {
        if self.phase != Phase::Uninitialized {
            return Err(RendererError::AlreadyInitialized);
        }
        let gpu = GpuDevice::select(device)?;
        let pool = BufferPool::new(&gpu);
        self.passes = Some(PassTable::new(passes));
        self.buffers = Some(pool);
        self.gpu = Some(gpu);
        self.phase = Phase::Initialized;
        log::info!("renderer initialized");
        Ok(())
    }

    /// Bind a scene: validate its light list, allocate per-mesh hit
    /// counters, store geometry root and bounding volume, upload lights,
    /// and run the pass validation step.
    ///
    /// # Errors
    /// `NotInitialized` before [`PpmRenderer::initialize`]; `EmptyScene`
    /// for a lightless scene (the previous binding, if any, stays active);
    /// `SceneBind` when geometry or pass validation fails — the pool may
    /// already hold partial scene data at that point, so any prior binding
    /// is discarded and the renderer drops back to the initialized state.
    pub fn init_scene(&mut self, scene: &dyn Scene) -> Result<(), RendererError> {
        if self.phase == Phase::Uninitialized {
            return Err(RendererError::NotInitialized);
        }
        let lights = scene.lights();
        if lights.is_empty() {
            return Err(RendererError::EmptyScene);
        }

        let bound = {
            let gpu = self.gpu.as_ref().ok_or(RendererError::NotInitialized)?;
            let buffers = self.buffers.as_mut().ok_or(RendererError::NotInitialized)?;
            let passes = self.passes.as_mut().ok_or(RendererError::NotInitialized)?;
            Self::bind_scene(gpu, buffers, passes, scene, &lights)
        };
        match bound {
            Ok(binding) => {
                log::info!(
                    "scene bound: {} lights, {} meshes, bounding radius {:.3}",
                    binding.num_lights,
                    binding.num_meshes,
                    binding.bounding_sphere.radius
                );
                self.scene = Some(binding);
                self.output_valid = false;
                self.phase = Phase::SceneBound;
                Ok(())
            }
            Err(err) => {
                self.scene = None;
                self.output_valid = false;
                self.phase = Phase::Initialized;
                Err(err)
            }
        }
    }

    fn bind_scene(
        gpu: &GpuDevice,
        buffers: &mut BufferPool,
        passes: &mut PassTable,
        scene: &dyn Scene,
        lights: &[Light],
    ) -> Result<SceneBinding, RendererError> {
        let root = scene.root_group(gpu).map_err(RendererError::SceneBind)?;
        let aabb = scene.aabb();
        let binding = SceneBinding {
            root,
            aabb,
            bounding_sphere: aabb.bounding_sphere(),
            num_meshes: scene.num_meshes(),
            num_lights: lights.len() as u32,
        };

        buffers.create_mesh_hit_counters(gpu, binding.num_meshes);
        buffers.upload_lights(gpu, lights);

        passes
            .validate(&LaunchContext { gpu, buffers, scene: Some(&binding) })
            .map_err(RendererError::SceneBind)?;
        Ok(binding)
    }

    /// Run one full pipeline iteration.
    ///
    /// `global_iteration` is the progressive index across the whole run
    /// (drives the radius shrink and emission total); `local_iteration` is
    /// the caller's per-restart index, forwarded to the kernels untouched.
    /// `radius` is the current search radius; the next squared radius is
    /// derived here and consumed by the photon pass for the *following*
    /// iteration. When `create_output` is false the compose stage is
    /// skipped and the output buffer keeps its previous contents.
    pub fn render_next_iteration(
        &mut self,
        global_iteration: u64,
        local_iteration: u64,
        radius: f32,
        create_output: bool,
        request: &RenderRequest,
    ) -> Result<(), RendererError> {
        if self.phase != Phase::SceneBound {
            return Err(RendererError::NotReady);
        }
        // `&mut self` already excludes overlapping calls; the flag stays
        // set when a pass panics mid-pipeline, so an instance reused after
        // a caught unwind is refused instead of running on half-written
        // buffers.
        if self.in_flight {
            return Err(RendererError::ConcurrentRenderCall);
        }
        self.in_flight = true;
        self.output_valid = false;
        let result =
            self.run_pipeline(global_iteration, local_iteration, radius, create_output, request);
        self.in_flight = false;
        if result.is_ok() {
            self.output_valid = create_output;
        }
        result
    }

    fn run_pipeline(
        &mut self,
        global_iteration: u64,
        local_iteration: u64,
        radius: f32,
        create_output: bool,
        request: &RenderRequest,
    ) -> Result<(), RendererError> {
        log::debug!("START iteration {global_iteration} (local {local_iteration})");

        // Resize is the only operation that needs the pool mutably; it is
        // also the only resize trigger in the whole renderer.
        {
            let gpu = self.gpu.as_ref().ok_or(RendererError::NotReady)?;
            let buffers = self.buffers.as_mut().ok_or(RendererError::NotReady)?;
            buffers.resize(gpu, request.width, request.height);
            buffers.zero_mesh_hit_counters(gpu);
        }

        // Radius update uses the incoming global index, before anything
        // increments.
        self.iteration.advance(global_iteration, local_iteration, radius, request.ppm_alpha);

        let gpu = self.gpu.as_ref().ok_or(RendererError::NotReady)?;
        let buffers = self.buffers.as_ref().ok_or(RendererError::NotReady)?;
        let passes = self.passes.as_ref().ok_or(RendererError::NotReady)?;
        let scene = self.scene.as_ref().ok_or(RendererError::NotReady)?;
        let ctx = LaunchContext { gpu, buffers, scene: Some(scene) };

        let mut params = FrameParams::assemble(&self.iteration, request, scene.bounding_sphere);
        gpu.queue.write_buffer(&buffers.frame_params.buffer, 0, bytemuck::bytes_of(&params));

        let fault = |stage: PassKind| {
            move |message: String| RendererError::RenderFault { stage: stage.label(), message }
        };

        let mut timings = StageTimings::default();
        let t_total = Instant::now();

        // 1/7 photon trace.
        let t0 = Instant::now();
        passes
            .launch(&ctx, PassKind::PhotonTrace, (PHOTON_LAUNCH_WIDTH, PHOTON_LAUNCH_HEIGHT))
            .map_err(fault(PassKind::PhotonTrace))?;
        self.iteration.record_emission(EMITTED_PHOTONS_PER_ITERATION);
        timings.photon_trace = t0.elapsed().as_secs_f64();
        log::debug!("1/7 photon_trace: {:.3}s", timings.photon_trace);

        // 2/7 photon map build (host side).
        let t0 = Instant::now();
        let raw = read_back(gpu, &buffers.photons).map_err(|message| {
            RendererError::RenderFault { stage: "photon_map", message }
        })?;
        // pod_collect_to_vec rather than cast_slice: a Vec<u8> carries no
        // alignment guarantee for the target type.
        let photons: Vec<Photon> = bytemuck::pod_collect_to_vec(&raw);
        let grid = self.grid_builder.build(&photons)?;
        grid.upload(gpu, buffers);
        params.set_grid(&grid);
        params.set_total_emitted(self.iteration.total_emitted_photons);
        gpu.queue.write_buffer(&buffers.frame_params.buffer, 0, bytemuck::bytes_of(&params));
        timings.photon_map = t0.elapsed().as_secs_f64();
        log::debug!(
            "2/7 photon_map: {:.3}s ({} live photons, {} cells)",
            timings.photon_map,
            grid.photon_count(),
            grid.cell_count()
        );

        // 3/7 sync: a zero-extent launch forcing the photon-map writes to
        // be visible before the estimation pass reads them.
        let t0 = Instant::now();
        passes
            .launch(&ctx, PassKind::IndirectEstimation, (0, 0))
            .map_err(fault(PassKind::IndirectEstimation))?;
        timings.sync = t0.elapsed().as_secs_f64();
        log::debug!("3/7 sync: {:.3}s", timings.sync);

        let screen = (buffers.width(), buffers.height());

        // 4/7 primary visibility.
        let t0 = Instant::now();
        passes
            .launch(&ctx, PassKind::RayTrace, screen)
            .map_err(fault(PassKind::RayTrace))?;
        timings.ray_trace = t0.elapsed().as_secs_f64();
        log::debug!("4/7 ray_trace: {:.3}s", timings.ray_trace);

        // 5/7 indirect radiance estimation.
        let t0 = Instant::now();
        passes
            .launch(&ctx, PassKind::IndirectEstimation, screen)
            .map_err(fault(PassKind::IndirectEstimation))?;
        timings.indirect = t0.elapsed().as_secs_f64();
        log::debug!("5/7 indirect_estimation: {:.3}s", timings.indirect);

        // 6/7 direct radiance estimation.
        let t0 = Instant::now();
        passes
            .launch(&ctx, PassKind::DirectEstimation, screen)
            .map_err(fault(PassKind::DirectEstimation))?;
        timings.direct = t0.elapsed().as_secs_f64();
        log::debug!("6/7 direct_estimation: {:.3}s", timings.direct);

        // 7/7 output compose.
        if create_output {
            let t0 = Instant::now();
            passes
                .launch(&ctx, PassKind::Output, screen)
                .map_err(fault(PassKind::Output))?;
            timings.output = t0.elapsed().as_secs_f64();
            log::debug!("7/7 output: {:.3}s", timings.output);
        }

        timings.total = t_total.elapsed().as_secs_f64();
        log::info!("END iteration {global_iteration}: {timings}");

        if log::log_enabled!(log::Level::Debug) {
            if let Ok(counts) = self.read_mesh_hit_counts() {
                for (mesh, count) in counts.iter().enumerate().filter(|(_, &c)| c > 0) {
                    log::debug!("hits_per_mesh[{mesh}] = {count}");
                }
            }
        }

        self.last_timings = Some(timings);
        Ok(())
    }

    /// Copy the output buffer into `dst`: exactly width × height × 3 f32s.
    ///
    /// # Errors
    /// `NotReady` before the first successful output-producing iteration;
    /// `OutputSizeMismatch` when `dst` has the wrong length.
    pub fn get_output_buffer(&self, dst: &mut [f32]) -> Result<(), RendererError> {
        if !self.output_valid {
            return Err(RendererError::NotReady);
        }
        let gpu = self.gpu.as_ref().ok_or(RendererError::NotReady)?;
        let buffers = self.buffers.as_ref().ok_or(RendererError::NotReady)?;

        let expected = buffers.width() as usize * buffers.height() as usize * 3;
        if dst.len() != expected {
            return Err(RendererError::OutputSizeMismatch { expected, actual: dst.len() });
        }

        let bytes = read_back(gpu, &buffers.output)
            .map_err(|message| RendererError::RenderFault { stage: "output_readback", message })?;
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        dst.copy_from_slice(&floats);
        Ok(())
    }

    /// Read back the per-mesh hit counters filled by the last iteration.
    pub fn read_mesh_hit_counts(&self) -> Result<Vec<u32>, RendererError> {
        if self.phase != Phase::SceneBound {
            return Err(RendererError::NotReady);
        }
        let gpu = self.gpu.as_ref().ok_or(RendererError::NotReady)?;
        let buffers = self.buffers.as_ref().ok_or(RendererError::NotReady)?;
        let counters = buffers.mesh_hit_counters.as_ref().ok_or(RendererError::NotReady)?;
        let bytes = read_back(gpu, counters)
            .map_err(|message| RendererError::RenderFault { stage: "mesh_counters", message })?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Current output width in pixels.
    pub fn width(&self) -> u32 {
        self.buffers.as_ref().map_or(INITIAL_WIDTH, |b| b.width())
    }

    /// Current output height in pixels.
    pub fn height(&self) -> u32 {
        self.buffers.as_ref().map_or(INITIAL_HEIGHT, |b| b.height())
    }

    /// Bytes of one output frame (width × height × 3 × 4).
    pub fn output_size_bytes(&self) -> u64 {
        self.width() as u64 * self.height() as u64 * 12
    }

    /// Stage timings of the last successful iteration.
    pub fn last_timings(&self) -> Option<&StageTimings> {
        self.last_timings.as_ref()
    }

    /// Progressive iteration state after the last iteration.
    pub fn iteration_state(&self) -> &IterationState {
        &self.iteration
    }
}

// ---------------------------------------------------------------------------
// Tests (state machine only — GPU paths live in tests/test_renderer.rs)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Camera, RenderMethod};
    use crate::scene::{Aabb, GeometryRoot, Light};
    use glam::Vec3;
    use std::sync::Arc;

    struct StubScene;

    impl Scene for StubScene {
        fn lights(&self) -> Vec<Light> {
            vec![Light {
                position: [0.0, 5.0, 0.0],
                radius: 0.5,
                power: [100.0; 3],
                kind: 0,
            }]
        }
        fn num_meshes(&self) -> u32 {
            1
        }
        fn aabb(&self) -> Aabb {
            Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
        }
        fn root_group(&self, _gpu: &GpuDevice) -> Result<GeometryRoot, String> {
            Ok(Arc::new(()))
        }
    }

    fn request() -> RenderRequest {
        RenderRequest {
            width: 8,
            height: 8,
            camera: Camera::default(),
            ppm_alpha: 0.7,
            render_method: RenderMethod::ProgressivePhotonMapping,
        }
    }

    #[test]
    fn test_init_scene_before_initialize_fails() {
        let mut renderer = PpmRenderer::new();
        let err = renderer.init_scene(&StubScene).unwrap_err();
        assert!(matches!(err, RendererError::NotInitialized), "{err}");
    }

    #[test]
    fn test_render_before_scene_bound_fails() {
        let mut renderer = PpmRenderer::new();
        let err = renderer
            .render_next_iteration(0, 0, 1.0, true, &request())
            .unwrap_err();
        assert!(matches!(err, RendererError::NotReady), "{err}");
    }

    #[test]
    fn test_output_readback_before_any_iteration_fails() {
        let renderer = PpmRenderer::new();
        let mut dst = vec![0.0f32; 8 * 8 * 3];
        let err = renderer.get_output_buffer(&mut dst).unwrap_err();
        assert!(matches!(err, RendererError::NotReady), "{err}");
    }

    #[test]
    fn test_placeholder_dimensions_before_first_request() {
        let renderer = PpmRenderer::new();
        assert_eq!(renderer.width(), INITIAL_WIDTH);
        assert_eq!(renderer.height(), INITIAL_HEIGHT);
        assert_eq!(renderer.output_size_bytes(), 10 * 10 * 12);
    }

    #[test]
    fn test_stage_timings_display_names_every_stage() {
        let t = StageTimings::default();
        let s = t.to_string();
        for stage in ["photon", "map", "sync", "trace", "indirect", "direct", "output", "total"] {
            assert!(s.contains(stage), "missing {stage} in {s}");
        }
    }
}
