// request.rs — caller-supplied per-iteration parameters.
//
// A render request is immutable for the duration of one iteration. The
// only piece of it that changes renderer-owned state is the resolution,
// which triggers a buffer-pool resize when it differs from the current one.

use bytemuck::{Pod, Zeroable};

/// Pinhole camera parameters, device layout (part of the kernel ABI).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Camera {
    pub eye: [f32; 3],
    pub fov_y: f32,
    pub look_at: [f32; 3],
    pub aspect: f32,
    pub up: [f32; 3],
    pub aperture: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            eye: [0.0, 0.0, 0.0],
            fov_y: 60.0,
            look_at: [0.0, 0.0, -1.0],
            aspect: 1.0,
            up: [0.0, 1.0, 0.0],
            aperture: 0.0,
        }
    }
}

/// Which estimator the pipeline should run. Only the scalar reaches the
/// kernels; the host pipeline is identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMethod {
    #[default]
    ProgressivePhotonMapping,
    PathTracing,
}

impl RenderMethod {
    pub fn as_u32(self) -> u32 {
        match self {
            RenderMethod::ProgressivePhotonMapping => 0,
            RenderMethod::PathTracing => 1,
        }
    }
}

/// One render request: output resolution, camera, progressive-radius
/// smoothing factor and method selector. Read-only per call.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
    /// Progressive-radius smoothing factor α ∈ (0, 1].
    pub ppm_alpha: f32,
    pub render_method: RenderMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_layout() {
        // 48 bytes, 16-byte blocks — embedded directly in FrameParams.
        assert_eq!(std::mem::size_of::<Camera>(), 48);
    }

    #[test]
    fn test_render_method_scalars() {
        assert_eq!(RenderMethod::ProgressivePhotonMapping.as_u32(), 0);
        assert_eq!(RenderMethod::PathTracing.as_u32(), 1);
    }
}
