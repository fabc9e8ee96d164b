// buffers.rs — device-resident buffer pool.
//
// The pool owns every GPU buffer the pipeline touches: the output image,
// the hit-point buffer, direct/indirect radiance accumulators, the photon
// buffer, the photon spatial-hash buffers, per-pixel random states, the
// light list, per-mesh hit counters, and the per-frame uniform. Passes and
// the photon-map builder get transient access per stage through
// `LaunchContext`; nothing else holds buffer handles across iterations.
//
// RESIZE SEMANTICS:
// wgpu buffers are fixed-size, so "resize" recreates the underlying
// `wgpu::Buffer`. Resizing the screen-sized buffers also recreates the
// random-state buffer and re-seeds every state — a resize invalidates the
// prior per-thread seeding (correctness, not optimization: stale states
// would correlate pixels across the resolution change). A resize with
// unchanged dimensions is a no-op. Resize never touches iteration counters.

use bytemuck::{Pod, Zeroable};

use crate::device::GpuDevice;
use crate::photon_map::Photon;

// ---------------------------------------------------------------------------
// Pipeline constants
// ---------------------------------------------------------------------------

/// Launch extent of the photon-tracing pass.
pub const PHOTON_LAUNCH_WIDTH: u32 = 1024;
pub const PHOTON_LAUNCH_HEIGHT: u32 = 1024;

/// Photons emitted by one photon-tracing launch.
pub const EMITTED_PHOTONS_PER_ITERATION: u32 = PHOTON_LAUNCH_WIDTH * PHOTON_LAUNCH_HEIGHT;

/// Each emitted photon may deposit at most this many records.
pub const MAX_PHOTON_DEPOSITS_PER_EMITTED: u32 = 4;

/// Fixed capacity of the photon buffer.
pub const PHOTON_CAPACITY: u32 = EMITTED_PHOTONS_PER_ITERATION * MAX_PHOTON_DEPOSITS_PER_EMITTED;

/// Hard bound on addressable spatial-hash cells (100 × 100 × 100).
pub const PHOTON_GRID_MAX_SIZE: u32 = 100 * 100 * 100;

/// The random-state buffer never shrinks below this extent on resize.
pub const RANDOM_STATE_FLOOR_WIDTH: u32 = 1280;
pub const RANDOM_STATE_FLOOR_HEIGHT: u32 = 768;

/// Placeholder extent for screen-sized buffers before the first request.
pub const INITIAL_WIDTH: u32 = 10;
pub const INITIAL_HEIGHT: u32 = 10;

pub const PHOTON_STRIDE: u32 = std::mem::size_of::<Photon>() as u32;

/// One entry per output pixel, written by the ray-trace pass and consumed
/// by both radiance-estimation passes. Layout is part of the kernel ABI.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Hitpoint {
    pub position: [f32; 3],
    pub flags: u32,
    pub normal: [f32; 3],
    pub material: u32,
    pub attenuation: [f32; 3],
    pub _pad: f32,
}

pub const HITPOINT_STRIDE: u32 = std::mem::size_of::<Hitpoint>() as u32;

/// Three f32 radiance components per pixel.
pub const RADIANCE_STRIDE: u32 = 3 * 4;

// ---------------------------------------------------------------------------
// DeviceBuffer
// ---------------------------------------------------------------------------

/// A typed, fixed-element-stride, resizable array resident on the device.
pub struct DeviceBuffer {
    pub buffer: wgpu::Buffer,
    label: &'static str,
    stride: u32,
    extent: (u32, u32),
    usage: wgpu::BufferUsages,
}

impl DeviceBuffer {
    pub fn new(
        gpu: &GpuDevice,
        label: &'static str,
        stride: u32,
        extent: (u32, u32),
        usage: wgpu::BufferUsages,
    ) -> Self {
        let buffer = create_raw(gpu, label, stride, extent, usage);
        DeviceBuffer { buffer, label, stride, extent, usage }
    }

    /// Element stride in bytes.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Extent in elements; 1D buffers report `(n, 1)`.
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn len_elements(&self) -> u64 {
        self.extent.0 as u64 * self.extent.1 as u64
    }

    pub fn size_bytes(&self) -> u64 {
        self.len_elements() * self.stride as u64
    }

    /// Recreate the buffer at a new extent. Contents are discarded.
    /// No-op when the extent is unchanged.
    pub fn resize(&mut self, gpu: &GpuDevice, extent: (u32, u32)) {
        if extent == self.extent {
            return;
        }
        self.buffer = create_raw(gpu, self.label, self.stride, extent, self.usage);
        self.extent = extent;
    }
}

fn create_raw(
    gpu: &GpuDevice,
    label: &'static str,
    stride: u32,
    extent: (u32, u32),
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: extent.0 as u64 * extent.1 as u64 * stride as u64,
        usage,
        mapped_at_creation: false,
    })
}

// ---------------------------------------------------------------------------
// BufferPool
// ---------------------------------------------------------------------------

/// All device-resident buffers of the pipeline, created once at
/// initialization and resized only by [`BufferPool::resize`].
pub struct BufferPool {
    width: u32,
    height: u32,
    pub output: DeviceBuffer,
    pub hitpoints: DeviceBuffer,
    pub direct: DeviceBuffer,
    pub indirect: DeviceBuffer,
    pub photons: DeviceBuffer,
    pub grid_cells: DeviceBuffer,
    pub grid_offsets: DeviceBuffer,
    pub random_states: DeviceBuffer,
    pub lights: DeviceBuffer,
    pub frame_params: DeviceBuffer,
    /// Created at scene bind time (needs the scene's mesh count).
    pub mesh_hit_counters: Option<DeviceBuffer>,
}

impl BufferPool {
    /// Create every pipeline buffer at its initial extent and seed the
    /// random states. Runs exactly once per renderer; the renderer's state
    /// machine rejects a second initialization.
    pub fn new(gpu: &GpuDevice) -> Self {
        let screen = (INITIAL_WIDTH, INITIAL_HEIGHT);
        let storage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let output = DeviceBuffer::new(gpu, "output", RADIANCE_STRIDE, screen, storage);
        let hitpoints = DeviceBuffer::new(gpu, "hitpoints", HITPOINT_STRIDE, screen, storage);
        let direct = DeviceBuffer::new(gpu, "direct_radiance", RADIANCE_STRIDE, screen, storage);
        let indirect =
            DeviceBuffer::new(gpu, "indirect_radiance", RADIANCE_STRIDE, screen, storage);

        let photons =
            DeviceBuffer::new(gpu, "photons", PHOTON_STRIDE, (PHOTON_CAPACITY, 1), storage);
        let grid_cells =
            DeviceBuffer::new(gpu, "photon_grid_cells", 4, (PHOTON_CAPACITY, 1), storage);
        let grid_offsets = DeviceBuffer::new(
            gpu,
            "photon_grid_offsets",
            4,
            (PHOTON_GRID_MAX_SIZE + 1, 1),
            storage,
        );

        let random_states = DeviceBuffer::new(
            gpu,
            "random_states",
            4,
            (PHOTON_LAUNCH_WIDTH, PHOTON_LAUNCH_HEIGHT),
            storage,
        );

        let lights = DeviceBuffer::new(
            gpu,
            "lights",
            std::mem::size_of::<crate::scene::Light>() as u32,
            (1, 1),
            storage,
        );

        let frame_params = DeviceBuffer::new(
            gpu,
            "frame_params",
            std::mem::size_of::<crate::iteration::FrameParams>() as u32,
            (1, 1),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let mut pool = BufferPool {
            width: INITIAL_WIDTH,
            height: INITIAL_HEIGHT,
            output,
            hitpoints,
            direct,
            indirect,
            photons,
            grid_cells,
            grid_offsets,
            random_states,
            lights,
            frame_params,
            mesh_hit_counters: None,
        };
        pool.seed_random_states(gpu);
        pool
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize the screen-sized buffers to `width × height` and re-seed the
    /// random states. No-op when the dimensions are unchanged.
    pub fn resize(&mut self, gpu: &GpuDevice, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        log::info!(
            "resizing pipeline buffers {}×{} → {width}×{height}",
            self.width,
            self.height
        );
        let screen = (width, height);
        self.output.resize(gpu, screen);
        self.hitpoints.resize(gpu, screen);
        self.direct.resize(gpu, screen);
        self.indirect.resize(gpu, screen);
        self.random_states.resize(gpu, random_state_extent(width, height));
        self.seed_random_states(gpu);
        self.width = width;
        self.height = height;
    }

    /// Upload a fresh deterministic seed stream into the random-state
    /// buffer. Every per-thread state is reinitialized.
    pub fn seed_random_states(&self, gpu: &GpuDevice) {
        let n = self.random_states.len_elements() as u32;
        let seeds: Vec<u32> = (0..n).map(random_seed).collect();
        gpu.queue
            .write_buffer(&self.random_states.buffer, 0, bytemuck::cast_slice(&seeds));
    }

    /// Create the per-mesh hit-counter buffer, zero-filled.
    pub fn create_mesh_hit_counters(&mut self, gpu: &GpuDevice, num_meshes: u32) {
        let storage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let counters =
            DeviceBuffer::new(gpu, "mesh_hit_counters", 4, (num_meshes.max(1), 1), storage);
        gpu.queue.write_buffer(
            &counters.buffer,
            0,
            &vec![0u8; counters.size_bytes() as usize],
        );
        self.mesh_hit_counters = Some(counters);
    }

    /// Reset every per-mesh hit counter to zero.
    pub fn zero_mesh_hit_counters(&self, gpu: &GpuDevice) {
        if let Some(counters) = &self.mesh_hit_counters {
            gpu.queue.write_buffer(
                &counters.buffer,
                0,
                &vec![0u8; counters.size_bytes() as usize],
            );
        }
    }

    /// Resize the light buffer to exactly `lights.len()` and upload the list.
    pub fn upload_lights(&mut self, gpu: &GpuDevice, lights: &[crate::scene::Light]) {
        self.lights.resize(gpu, (lights.len() as u32, 1));
        gpu.queue
            .write_buffer(&self.lights.buffer, 0, bytemuck::cast_slice(lights));
    }

    /// Bytes of one output frame: width × height × 3 × f32.
    pub fn output_size_bytes(&self) -> u64 {
        self.output.size_bytes()
    }
}

/// Extent of the random-state buffer for a given output resolution: always
/// covers the photon launch extent, the output resolution, and the fixed
/// 1280×768 floor.
pub fn random_state_extent(width: u32, height: u32) -> (u32, u32) {
    (
        PHOTON_LAUNCH_WIDTH.max(width.max(RANDOM_STATE_FLOOR_WIDTH)),
        PHOTON_LAUNCH_HEIGHT.max(height.max(RANDOM_STATE_FLOOR_HEIGHT)),
    )
}

/// Deterministic per-slot seed (splitmix32 finalizer). Slot index in,
/// well-mixed nonzero state out.
pub fn random_seed(index: u32) -> u32 {
    let mut z = index.wrapping_add(0x9e37_79b9);
    z = (z ^ (z >> 16)).wrapping_mul(0x85eb_ca6b);
    z = (z ^ (z >> 13)).wrapping_mul(0xc2b2_ae35);
    z ^= z >> 16;
    // xorshift-style generators die on an all-zero state.
    if z == 0 {
        0x9e37_79b9
    } else {
        z
    }
}

/// Copy a device buffer back to host memory through a staging buffer.
///
/// Blocks until the copy completes. Kernel faults surface here as mapping
/// errors, reported in the returned message.
pub fn read_back(gpu: &GpuDevice, src: &DeviceBuffer) -> Result<Vec<u8>, String> {
    let size = src.size_bytes();
    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
    encoder.copy_buffer_to_buffer(&src.buffer, 0, &staging, 0, size);
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    gpu.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| "readback: map callback never fired".to_string())?
        .map_err(|e| format!("readback: buffer map failed: {e:?}"))?;

    let data = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_state_extent_floor() {
        // Small output: the launch extent and the floor dominate.
        assert_eq!(random_state_extent(640, 480), (1280, 1024));
        // Output wider than both: the output dominates.
        assert_eq!(random_state_extent(3840, 2160), (3840, 2160));
        // Exactly the launch extent.
        assert_eq!(random_state_extent(1024, 1024), (1280, 1024));
    }

    #[test]
    fn test_random_seed_deterministic_and_nonzero() {
        let a: Vec<u32> = (0..1000).map(random_seed).collect();
        let b: Vec<u32> = (0..1000).map(random_seed).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|&s| s != 0));
        // Adjacent slots must not share a state.
        for w in a.windows(2) {
            assert_ne!(w[0], w[1]);
        }
    }

    #[test]
    fn test_photon_capacity_matches_launch_extent() {
        assert_eq!(EMITTED_PHOTONS_PER_ITERATION, 1024 * 1024);
        assert_eq!(
            PHOTON_CAPACITY,
            EMITTED_PHOTONS_PER_ITERATION * MAX_PHOTON_DEPOSITS_PER_EMITTED
        );
        assert_eq!(PHOTON_GRID_MAX_SIZE, 1_000_000);
    }

    #[test]
    fn test_gpu_struct_layouts() {
        // Strides are kernel ABI; a silent repr change would corrupt
        // every buffer interpretation on the device.
        assert_eq!(HITPOINT_STRIDE, 48);
        assert_eq!(HITPOINT_STRIDE % 16, 0);
        assert_eq!(PHOTON_STRIDE, 32);
    }
}
