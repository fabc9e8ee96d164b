// passes.rs — the pass abstraction: the entire ABI between this core and
// the opaque compute kernels.
//
// A pass is identified by a stable enumerant, launched with a 0–2D extent,
// and communicates solely through the pool's named buffers and the
// frame-params uniform. The core never looks inside a pass; it registers
// one implementation per enumerant at initialization and issues launches
// strictly in pipeline order. The zero-extent "sync" stage of the pipeline
// is a launch of `IndirectEstimation` with extent (0, 0) — its sole purpose
// is to make the host-written photon map visible to subsequent passes.

use std::fmt;

use crate::buffers::BufferPool;
use crate::device::GpuDevice;
use crate::scene::SceneBinding;

/// Stable pass enumerants, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    PhotonTrace,
    RayTrace,
    IndirectEstimation,
    DirectEstimation,
    Output,
}

impl PassKind {
    pub const ALL: [PassKind; 5] = [
        PassKind::PhotonTrace,
        PassKind::RayTrace,
        PassKind::IndirectEstimation,
        PassKind::DirectEstimation,
        PassKind::Output,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PassKind::PhotonTrace => "photon_trace",
            PassKind::RayTrace => "ray_trace",
            PassKind::IndirectEstimation => "indirect_estimation",
            PassKind::DirectEstimation => "direct_estimation",
            PassKind::Output => "output",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a pass may touch during `prepare` or `launch`: the device,
/// the buffer pool, and (once bound) the scene. Access is transient — a
/// pass must not retain buffer handles across iterations.
pub struct LaunchContext<'a> {
    pub gpu: &'a GpuDevice,
    pub buffers: &'a BufferPool,
    pub scene: Option<&'a SceneBinding>,
}

/// One opaque compute kernel.
///
/// `prepare` runs at scene-bind time (pipeline/bind-group creation against
/// the bound scene — the validation step that must succeed before any
/// render call). `launch` runs once per pipeline stage with the stage's
/// extent. Errors are plain messages; the scheduler wraps them into
/// `SceneBind` / `RenderFault` respectively.
pub trait RenderPass: Send {
    fn prepare(&mut self, _ctx: &LaunchContext) -> Result<(), String> {
        Ok(())
    }

    fn launch(&self, ctx: &LaunchContext, extent: (u32, u32)) -> Result<(), String>;
}

/// The five kernel implementations a caller registers at initialization.
pub struct PassRegistration {
    pub photon_trace: Box<dyn RenderPass>,
    pub ray_trace: Box<dyn RenderPass>,
    pub indirect_estimation: Box<dyn RenderPass>,
    pub direct_estimation: Box<dyn RenderPass>,
    pub output: Box<dyn RenderPass>,
}

/// Registered passes, indexed by enumerant. Built once at initialization;
/// never re-registered.
pub struct PassTable {
    photon_trace: Box<dyn RenderPass>,
    ray_trace: Box<dyn RenderPass>,
    indirect_estimation: Box<dyn RenderPass>,
    direct_estimation: Box<dyn RenderPass>,
    output: Box<dyn RenderPass>,
}

impl PassTable {
    pub fn new(registration: PassRegistration) -> Self {
        PassTable {
            photon_trace: registration.photon_trace,
            ray_trace: registration.ray_trace,
            indirect_estimation: registration.indirect_estimation,
            direct_estimation: registration.direct_estimation,
            output: registration.output,
        }
    }

    fn get(&self, kind: PassKind) -> &dyn RenderPass {
        match kind {
            PassKind::PhotonTrace => self.photon_trace.as_ref(),
            PassKind::RayTrace => self.ray_trace.as_ref(),
            PassKind::IndirectEstimation => self.indirect_estimation.as_ref(),
            PassKind::DirectEstimation => self.direct_estimation.as_ref(),
            PassKind::Output => self.output.as_ref(),
        }
    }

    fn get_mut(&mut self, kind: PassKind) -> &mut dyn RenderPass {
        match kind {
            PassKind::PhotonTrace => self.photon_trace.as_mut(),
            PassKind::RayTrace => self.ray_trace.as_mut(),
            PassKind::IndirectEstimation => self.indirect_estimation.as_mut(),
            PassKind::DirectEstimation => self.direct_estimation.as_mut(),
            PassKind::Output => self.output.as_mut(),
        }
    }

    /// Run every pass's `prepare` against the bound scene. Any failure
    /// means the binding is invalid; the message names the pass.
    pub fn validate(&mut self, ctx: &LaunchContext) -> Result<(), String> {
        for kind in PassKind::ALL {
            self.get_mut(kind)
                .prepare(ctx)
                .map_err(|e| format!("{kind}: {e}"))?;
        }
        Ok(())
    }

    pub fn launch(
        &self,
        ctx: &LaunchContext,
        kind: PassKind,
        extent: (u32, u32),
    ) -> Result<(), String> {
        self.get(kind).launch(ctx, extent)
    }
}
