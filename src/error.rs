// error.rs — renderer error taxonomy.
//
// Every error here is terminal to the call that produced it: nothing is
// retried internally. Initialization and scene-bind failures leave the
// renderer instance unusable; a per-iteration `RenderFault` leaves buffer
// contents undefined and the caller must not read the output buffer.

use std::fmt;

/// Errors from device selection, buffer management, scene binding, photon
/// map construction and the per-iteration pipeline.
#[derive(Debug)]
pub enum RendererError {
    /// The requested native device ordinal exists at the driver level but
    /// no Vulkan adapter reports it, so the compute runtime cannot use it.
    DeviceNotSupported { requested: u32 },
    /// wgpu device request failed (driver issue, unsupported limits, etc.).
    DeviceRequest(wgpu::RequestDeviceError),
    /// `initialize` was called twice on the same renderer instance.
    AlreadyInitialized,
    /// An operation that requires `initialize` ran before it (e.g. scene
    /// binding before the buffer pool exists).
    NotInitialized,
    /// `render_next_iteration` or output readback before a scene was bound
    /// and an iteration completed.
    NotReady,
    /// The scene reports zero lights; a photon mapper cannot emit from nothing.
    EmptyScene,
    /// Scene validation failed while binding geometry, lights or pass
    /// resources. The renderer instance must be discarded.
    SceneBind(String),
    /// The photon spatial hash would need more cells than the fixed
    /// capacity bound allows.
    GridOverflow { cells: u64, max: u64 },
    /// A pipeline stage faulted. The whole iteration is invalid.
    RenderFault { stage: &'static str, message: String },
    /// `render_next_iteration` re-entered while an iteration was in flight.
    /// The renderer is not reentrant.
    ConcurrentRenderCall,
    /// The destination slice passed to `get_output_buffer` does not match
    /// the current width × height × 3 element count.
    OutputSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererError::DeviceNotSupported { requested } => write!(
                f,
                "no Vulkan adapter matches the requested device ordinal {requested}; \
                 the device may not be usable by the compute runtime"
            ),
            RendererError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            RendererError::AlreadyInitialized => {
                write!(f, "renderer was already initialized; initialize must run exactly once")
            }
            RendererError::NotInitialized => {
                write!(f, "renderer is not initialized; call initialize first")
            }
            RendererError::NotReady => {
                write!(f, "no scene bound (or no completed iteration); call init_scene and render first")
            }
            RendererError::EmptyScene => write!(f, "scene has no lights"),
            RendererError::SceneBind(msg) => write!(f, "scene bind failed: {msg}"),
            RendererError::GridOverflow { cells, max } => write!(
                f,
                "photon grid would need {cells} cells, exceeding the capacity bound of {max}"
            ),
            RendererError::RenderFault { stage, message } => {
                write!(f, "render fault in {stage} pass: {message}")
            }
            RendererError::ConcurrentRenderCall => {
                write!(f, "render_next_iteration called while an iteration was in flight")
            }
            RendererError::OutputSizeMismatch { expected, actual } => write!(
                f,
                "output destination holds {actual} floats but the frame needs exactly {expected}"
            ),
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RendererError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}
