// lumen-ppm: host-side controller for a GPU progressive photon mapping
// renderer.
//
// The crate owns device selection, the device-resident buffer pool, scene
// binding, the per-iteration photon spatial hash, and the seven-stage
// pipeline scheduler with its progressive-radius state. The compute
// kernels themselves are external collaborators: they are registered as
// opaque passes (`RenderPass`) at initialization and launched by enumerant
// and extent, communicating only through the pool's named buffers and the
// per-frame uniform block.
//
// Reference: Hachisuka, Ogaki, Jensen — "Progressive Photon Mapping"
// (SIGGRAPH Asia 2008); the per-iteration radius update follows the
// stochastic PPM formulation.

pub mod buffers;
pub mod device;
pub mod error;
pub mod iteration;
pub mod passes;
pub mod photon_map;
pub mod renderer;
pub mod request;
pub mod scene;

pub use buffers::{
    BufferPool, DeviceBuffer, Hitpoint, EMITTED_PHOTONS_PER_ITERATION,
    MAX_PHOTON_DEPOSITS_PER_EMITTED, PHOTON_CAPACITY, PHOTON_GRID_MAX_SIZE, PHOTON_LAUNCH_HEIGHT,
    PHOTON_LAUNCH_WIDTH,
};
pub use device::{enumerate_device_ids, ComputeDevice, ComputeDeviceId, GpuDevice};
pub use error::RendererError;
pub use iteration::{progressive_radius_squared, total_emitted_after, FrameParams, IterationState};
pub use passes::{LaunchContext, PassKind, PassRegistration, RenderPass};
pub use photon_map::{Photon, PhotonGrid, PhotonMapBuilder};
pub use renderer::{PpmRenderer, StageTimings};
pub use request::{Camera, RenderMethod, RenderRequest};
pub use scene::{Aabb, GeometryRoot, Light, Scene, SceneBinding, Sphere};
