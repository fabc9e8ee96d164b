// device.rs — wgpu device selection.
//
// Responsibilities:
//   - Enumerate Vulkan adapters and pin the context to the one whose native
//     ordinal matches the caller-supplied compute device descriptor.
//   - Expose the adapter snapshot (`AdapterInfo`) for logging/debugging.
//   - Provide `dispatch_size` — ceiling-division helper for kernel
//     implementors translating a launch extent into workgroup counts.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` uses power-preference heuristics that may
// grab llvmpipe/softpipe on WSL2. We enumerate explicitly and match the
// requested ordinal instead: the caller's `ComputeDevice` names a specific
// piece of hardware and the renderer must run on exactly that device or
// fail with `DeviceNotSupported`. Selection runs strictly before any buffer
// or pass creation.
//
// DEVICE LIMITS:
// The photon buffer is large (photon capacity × 32 B = 128 MiB), above
// wgpu's default 128 MiB storage binding limit once the grid cell buffer is
// counted. We request a 256 MiB storage binding limit; adapters that cannot
// provide it fail the device request up front rather than faulting
// mid-iteration.

use std::fmt;

use crate::error::RendererError;

/// Inbound collaborator contract: something that names a compute device by
/// its native ordinal (the PCI device id under Vulkan).
pub trait ComputeDevice {
    fn device_id(&self) -> u32;
}

/// A plain native device ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeDeviceId(pub u32);

impl ComputeDevice for ComputeDeviceId {
    fn device_id(&self) -> u32 {
        self.0
    }
}

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ordinal {:#06x}, {:?}, {:?})",
            self.name, self.device, self.backend, self.device_type
        )
    }
}

/// The core GPU context: device, queue and the selected adapter snapshot.
///
/// Create via [`GpuDevice::select`]. Hold one `GpuDevice` for the lifetime
/// of the renderer — it is expensive to create (Vulkan instance + device
/// initialization).
///
/// # Field drop order
/// Rust drops struct fields in declaration order (top → bottom).
/// `_instance` is declared last so the `wgpu::Instance` outlives `device`
/// and `queue`. This prevents a crash in dzn (the D3D12-to-Vulkan layer on
/// WSL2) that occurs when the Vulkan instance is destroyed while
/// device-level objects still hold back-references to it.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue` are
    /// dropped. Never accessed directly.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Pin the compute context to the adapter whose native ordinal matches
    /// `requested`.
    ///
    /// # Errors
    /// `DeviceNotSupported` when no adapter reports the requested ordinal;
    /// `DeviceRequest` when the matching adapter rejects the device request.
    pub fn select(requested: &dyn ComputeDevice) -> Result<Self, RendererError> {
        pollster::block_on(Self::select_async(requested.device_id()))
    }

    async fn select_async(requested: u32) -> Result<Self, RendererError> {
        let instance = new_instance();

        let mut matching = None;
        for adapter in instance.enumerate_adapters(wgpu::Backends::VULKAN) {
            let info = adapter.get_info();
            log::debug!(
                "vulkan adapter: {} (ordinal {:#06x}, {:?}, {:?})",
                info.name,
                info.device,
                info.backend,
                info.device_type
            );
            if info.device == requested && matching.is_none() {
                matching = Some(adapter);
            }
        }

        let adapter = matching.ok_or(RendererError::DeviceNotSupported { requested })?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            vendor: raw_info.vendor,
            device: raw_info.device,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };
        log::info!("selected compute device: {adapter_info}");

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lumen-ppm"),
                    required_features: wgpu::Features::empty(),
                    required_limits: required_limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(RendererError::DeviceRequest)?;

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            _instance: instance,
        })
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ adapter: {} }}", self.adapter_info)
    }
}

/// Enumerate the native ordinals of all compute-capable Vulkan adapters,
/// paired with their names. Callers pick one and hand it back as a
/// [`ComputeDeviceId`].
pub fn enumerate_device_ids() -> Vec<(u32, String)> {
    let instance = new_instance();
    instance
        .enumerate_adapters(wgpu::Backends::VULKAN)
        .into_iter()
        .map(|a| {
            let info = a.get_info();
            (info.device, info.name)
        })
        .collect()
}

fn new_instance() -> wgpu::Instance {
    // Validation layer in debug builds for shader error feedback. The
    // noncompliant-adapter flag lets dzn (D3D12-to-Vulkan on WSL2) appear
    // in enumeration; it supports storage buffers and compute dispatch,
    // which is all this crate needs.
    let flags = if cfg!(debug_assertions) {
        wgpu::InstanceFlags::VALIDATION
            | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    } else {
        wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    };

    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        flags,
        ..Default::default()
    })
}

fn required_limits() -> wgpu::Limits {
    wgpu::Limits {
        max_storage_buffer_binding_size: 256 << 20,
        ..wgpu::Limits::default()
    }
}

/// Workgroup counts needed to cover `extent` with the given workgroup size.
///
/// Ceiling division, so every element is covered even when the extent is
/// not a multiple of the workgroup size; the shader must guard against
/// out-of-bounds global ids.
pub fn dispatch_size(extent: (u32, u32), workgroup: (u32, u32)) -> (u32, u32) {
    let dx = (extent.0 + workgroup.0 - 1) / workgroup.0;
    let dy = (extent.1 + workgroup.1 - 1) / workgroup.1;
    (dx, dy)
}

// ============================================================
// Tests
// ============================================================
