// photon_map.rs — uniform-grid spatial hash over the photon buffer.
//
// Rebuilt from scratch every iteration on the host, then uploaded into the
// context-visible grid buffers consumed by the indirect-estimation pass.
// The grid maps a world position to a cell, and the offset table maps a
// cell index to a contiguous range of photon indices — so a GPU lookup
// enumerates the photons near a shading point in O(1) expected cells
// instead of scanning the whole photon buffer.
//
// GRID POLICY:
// Cell size is the longest AABB extent of the live photons divided by a
// fixed per-axis resolution (default 99). Per-axis cell counts are
// floor(extent / cell) + 1, so the longest axis gets resolution + 1 cells
// and a cube-shaped cloud stays at exactly 100³ = 10^6 cells, the capacity
// bound. A larger configured resolution can exceed the bound, which is
// `GridOverflow`. The build is a
// counting sort + exclusive prefix sum and is fully deterministic for a
// fixed photon set: within a cell, photons keep buffer order.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::buffers::{BufferPool, PHOTON_GRID_MAX_SIZE};
use crate::device::GpuDevice;
use crate::error::RendererError;
use crate::scene::Aabb;

/// One deposited photon record, device layout. Part of the kernel ABI.
///
/// The photon buffer has fixed capacity; the tracing pass zeroes the power
/// of unused slots. A record is *live* when its power is nonzero and its
/// position finite.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Photon {
    pub position: [f32; 3],
    pub _pad0: f32,
    pub power: [f32; 3],
    pub _pad1: f32,
}

impl Photon {
    pub fn new(position: Vec3, power: Vec3) -> Self {
        Photon {
            position: position.to_array(),
            _pad0: 0.0,
            power: power.to_array(),
            _pad1: 0.0,
        }
    }

    pub fn is_live(&self) -> bool {
        let pos_finite = self.position.iter().all(|c| c.is_finite());
        let has_power = self.power.iter().any(|&c| c != 0.0);
        pos_finite && has_power
    }
}

/// Policy knobs for the grid build.
#[derive(Debug, Clone, Copy)]
pub struct PhotonMapBuilder {
    /// Cells along the longest AABB axis (before +1 rounding). The default
    /// of 99 keeps a worst-case cube cloud at exactly the capacity bound.
    pub cells_per_longest_axis: u32,
    /// Hard bound on total addressable cells.
    pub max_cells: u64,
}

impl Default for PhotonMapBuilder {
    fn default() -> Self {
        PhotonMapBuilder {
            cells_per_longest_axis: 99,
            max_cells: PHOTON_GRID_MAX_SIZE as u64,
        }
    }
}

impl PhotonMapBuilder {
    /// Build the uniform grid over the live photons in `photons`.
    ///
    /// An input with no live photons yields an empty grid (zero dims,
    /// all-zero offset table) — never a fault.
    ///
    /// # Errors
    /// `GridOverflow` when the photon bounding volume needs more cells than
    /// `max_cells` at the configured resolution.
    pub fn build(&self, photons: &[Photon]) -> Result<PhotonGrid, RendererError> {
        let live: Vec<(u32, Vec3)> = photons
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_live())
            .map(|(i, p)| (i as u32, Vec3::from_array(p.position)))
            .collect();

        let Some(aabb) = Aabb::from_points(live.iter().map(|(_, p)| *p)) else {
            return Ok(PhotonGrid::empty());
        };

        let extent = aabb.extent();
        let longest = extent.max_element();
        // Degenerate cloud (all photons at one point): any positive cell
        // size gives a 1×1×1 grid.
        let cell_size = if longest > 0.0 {
            longest / self.cells_per_longest_axis as f32
        } else {
            1.0
        };

        // Per-axis counts come from the extent *ratio*, not from dividing
        // by cell_size again — the longest axis must land on exactly
        // resolution + 1 cells regardless of f32 rounding.
        let axis_cells = |e: f32| -> u32 {
            if longest > 0.0 {
                ((e / longest) * self.cells_per_longest_axis as f32) as u32 + 1
            } else {
                1
            }
        };
        let dims = [axis_cells(extent.x), axis_cells(extent.y), axis_cells(extent.z)];
        let cells = dims[0] as u64 * dims[1] as u64 * dims[2] as u64;
        if cells > self.max_cells {
            return Err(RendererError::GridOverflow { cells, max: self.max_cells });
        }

        let mut grid = PhotonGrid {
            cell_size,
            dims,
            origin: aabb.min,
            offsets: vec![0u32; cells as usize + 1],
            indices: vec![0u32; live.len()],
        };

        // Counting sort: histogram, exclusive prefix sum, then scatter.
        for (_, pos) in &live {
            let cell = grid.cell_of(*pos);
            grid.offsets[cell + 1] += 1;
        }
        for c in 1..grid.offsets.len() {
            grid.offsets[c] += grid.offsets[c - 1];
        }
        let mut cursor = grid.offsets.clone();
        for (index, pos) in &live {
            let cell = grid.cell_of(*pos);
            grid.indices[cursor[cell] as usize] = *index;
            cursor[cell] += 1;
        }

        log::debug!(
            "photon grid: {} live photons, {}×{}×{} cells, cell size {:.4}",
            live.len(),
            dims[0],
            dims[1],
            dims[2],
            cell_size
        );
        Ok(grid)
    }
}

/// The built spatial hash: photons of cell `c` are
/// `indices[offsets[c] .. offsets[c + 1]]`, indexing into the photon buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonGrid {
    pub cell_size: f32,
    pub dims: [u32; 3],
    pub origin: Vec3,
    /// Length `cell_count() + 1`; monotone; last entry = live photon count.
    pub offsets: Vec<u32>,
    /// One entry per live photon.
    pub indices: Vec<u32>,
}

impl PhotonGrid {
    pub fn empty() -> Self {
        PhotonGrid {
            cell_size: 0.0,
            dims: [0, 0, 0],
            origin: Vec3::ZERO,
            offsets: vec![0],
            indices: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn cell_count(&self) -> u64 {
        self.dims[0] as u64 * self.dims[1] as u64 * self.dims[2] as u64
    }

    /// Live photons indexed by the grid.
    pub fn photon_count(&self) -> u32 {
        *self.offsets.last().unwrap_or(&0)
    }

    /// Flat cell index of a world position. Positions on the max boundary
    /// clamp into the last cell. An empty grid has no cells; every position
    /// maps to 0 and a lookup finds nothing.
    pub fn cell_of(&self, p: Vec3) -> usize {
        if self.is_empty() {
            return 0;
        }
        let rel = (p - self.origin) / self.cell_size;
        let ix = (rel.x as u32).min(self.dims[0] - 1) as usize;
        let iy = (rel.y as u32).min(self.dims[1] - 1) as usize;
        let iz = (rel.z as u32).min(self.dims[2] - 1) as usize;
        (iz * self.dims[1] as usize + iy) * self.dims[0] as usize + ix
    }

    /// Photon-buffer indices stored in one cell.
    pub fn cell_photons(&self, cell: usize) -> &[u32] {
        if self.is_empty() {
            return &[];
        }
        let lo = self.offsets[cell] as usize;
        let hi = self.offsets[cell + 1] as usize;
        &self.indices[lo..hi]
    }

    /// Write the grid into the context-visible buffers, fully replacing the
    /// previous iteration's grid. Grid scalars (cell size, dims, origin)
    /// travel separately in the frame-params uniform.
    pub fn upload(&self, gpu: &GpuDevice, pool: &BufferPool) {
        if !self.indices.is_empty() {
            gpu.queue
                .write_buffer(&pool.grid_cells.buffer, 0, bytemuck::cast_slice(&self.indices));
        }
        gpu.queue
            .write_buffer(&pool.grid_offsets.buffer, 0, bytemuck::cast_slice(&self.offsets));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
