// scene.rs — scene collaborator contract and binding state.
//
// The renderer never looks inside geometry or materials. A scene is
// anything that can report its lights, its mesh count, a bounding volume,
// and an opaque geometry root the kernel passes know how to interpret.
// Binding happens exactly once per scene change and must succeed before the
// first render iteration.

use std::any::Any;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::device::GpuDevice;

/// Opaque geometry root handle. The core stores it and hands it to the
/// kernel passes through `LaunchContext`; only they know the encoding.
pub type GeometryRoot = Arc<dyn Any + Send + Sync>;

/// One light source record, device layout. Part of the kernel ABI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub position: [f32; 3],
    pub radius: f32,
    pub power: [f32; 3],
    pub kind: u32,
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Aabb { min, max }
    }

    /// Grow to include a point.
    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Smallest box containing all points; `None` for an empty set.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in iter {
            aabb.extend(p);
        }
        Some(aabb)
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Minimal sphere enclosing the box. Downstream passes use it to
    /// normalize the search radius against scene scale.
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere {
            center: self.center(),
            radius: 0.5 * self.extent().length(),
        }
    }
}

/// Center + radius bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Inbound collaborator contract (the scene side of the renderer ABI).
pub trait Scene {
    /// Must be non-empty; a scene without lights cannot be photon-mapped.
    fn lights(&self) -> Vec<Light>;
    fn num_meshes(&self) -> u32;
    fn aabb(&self) -> Aabb;
    /// Build (or fetch) the scene's geometry root for this device.
    fn root_group(&self, gpu: &GpuDevice) -> Result<GeometryRoot, String>;
}

/// Everything the renderer retains from a successful scene bind.
pub struct SceneBinding {
    pub root: GeometryRoot,
    pub aabb: Aabb,
    pub bounding_sphere: Sphere,
    pub num_meshes: u32,
    pub num_lights: u32,
}
