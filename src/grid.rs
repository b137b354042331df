//! Grid façade: lifecycle, external queries, and the single `step_manual`
//! entry point. This is the one thing external code holds a handle to —
//! the cell buffer, chunk map, and material table are gathered here instead
//! of living as module statics, so the single-step contract has no hidden
//! global state behind it.

use crate::cell::Cell;
use crate::chunks::{ChunkMap, CHUNK_SIZE};
use crate::materials::{CollisionClass, MaterialTable, MovementClass};
use crate::perf::{PerfAccumulator, StepStats};

/// Cells reserved on each side as a never-stepped sentinel frame, so every
/// interior neighbor access stays inside the array.
pub const BORDER_CHUNKS: u32 = 1;
pub const BORDER_CELLS: u32 = BORDER_CHUNKS * CHUNK_SIZE;

/// Falling-sand grid: a row-major cell buffer, its chunk activity bitmap,
/// and the material/reaction table that drives both reactions and
/// movement.
pub struct Grid {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) chunks_width: u32,
    pub(crate) chunks_height: u32,
    pub(crate) cells: Vec<Cell>,
    pub(crate) chunks: ChunkMap,
    pub(crate) materials: MaterialTable,
    pub(crate) tick: i64,
    /// 2-bit generation counter; 0 means "never stepped".
    pub(crate) generation: u8,
    pub(crate) perf: PerfAccumulator,
    pub(crate) last_stats: StepStats,
}

#[inline]
fn round_up_to_chunk(v: u32) -> u32 {
    ((v + CHUNK_SIZE - 1) / CHUNK_SIZE) * CHUNK_SIZE
}

impl Grid {
    /// Allocates a grid of at least `width x height` cells, rounded up to a
    /// multiple of the chunk size and clamped to at least 3x3 chunks (so
    /// there is always at least one interior chunk inside the sentinel
    /// border).
    pub fn new_empty(width: u32, height: u32) -> Self {
        let width = round_up_to_chunk(width).max(CHUNK_SIZE * 3);
        let height = round_up_to_chunk(height).max(CHUNK_SIZE * 3);
        let chunks_width = width / CHUNK_SIZE;
        let chunks_height = height / CHUNK_SIZE;
        Grid {
            width,
            height,
            chunks_width,
            chunks_height,
            cells: vec![Cell::from_raw(0); (width as usize) * (height as usize)],
            chunks: ChunkMap::new(chunks_width, chunks_height),
            materials: MaterialTable::empty(),
            tick: 0,
            generation: 0,
            perf: PerfAccumulator::default(),
            last_stats: StepStats::default(),
        }
    }

    /// Releases the cell buffer and chunk map. Idempotent.
    pub fn delete_grid(&mut self) {
        if self.cells.is_empty() {
            return;
        }
        self.cells = Vec::new();
        self.chunks = ChunkMap::new(0, 0);
        self.width = 0;
        self.height = 0;
        self.chunks_width = 0;
        self.chunks_height = 0;
    }

    /// Releases everything, including the material table. Idempotent.
    pub fn free_memory(&mut self) {
        self.delete_grid();
        self.materials = MaterialTable::empty();
    }

    #[inline]
    pub fn get_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get_size_chunk(&self) -> (u32, u32) {
        (self.chunks_width, self.chunks_height)
    }

    #[inline]
    pub fn get_tick(&self) -> i64 {
        self.tick
    }

    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation
    }

    #[inline]
    pub(crate) fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// True if `(x, y)` is inside the steppable interior, i.e. outside the
    /// 1-chunk sentinel border on every side.
    #[inline]
    pub(crate) fn in_interior(&self, x: i32, y: i32) -> bool {
        x >= BORDER_CELLS as i32
            && y >= BORDER_CELLS as i32
            && (x as u32) < self.width.saturating_sub(BORDER_CELLS)
            && (y as u32) < self.height.saturating_sub(BORDER_CELLS)
    }

    #[inline]
    pub(crate) fn index(&self, x: i32, y: i32) -> usize {
        debug_assert!(self.in_bounds(x, y));
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn get_cell_material_idx(&self, x: i32, y: i32) -> u32 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        self.cells[self.index(x, y)].material_idx()
    }

    pub fn is_chunk_active(&self, cx: i32, cy: i32) -> bool {
        if self.chunks_width == 0 {
            return false;
        }
        self.chunks.is_active_checked(cx, cy)
    }

    /// Copies a `tex_w x tex_h` window of raw cell words, row-major,
    /// starting at `origin`, into `texture`. Out-of-bounds source cells
    /// read as `0`. No-op (with a warning) if the texture is empty or the
    /// grid has never been allocated.
    pub fn update_texture_data(&self, texture: &mut [u32], tex_w: u32, tex_h: u32, origin: (i32, i32)) {
        if texture.is_empty() || tex_w == 0 || tex_h == 0 {
            log::warn!("update_texture_data: target texture is empty, ignoring");
            return;
        }
        if self.width == 0 {
            log::warn!("update_texture_data: grid is uninitialized, ignoring");
            return;
        }
        debug_assert!(texture.len() >= (tex_w as usize) * (tex_h as usize));
        for ty in 0..tex_h {
            for tx in 0..tex_w {
                let gx = origin.0 + tx as i32;
                let gy = origin.1 + ty as i32;
                let value = if self.in_bounds(gx, gy) {
                    self.cells[self.index(gx, gy)].to_raw()
                } else {
                    0
                };
                texture[(ty * tex_w + tx) as usize] = value;
            }
        }
    }

    pub fn init_materials(&mut self, n: u32) {
        self.materials = MaterialTable::init(n);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_material(
        &mut self,
        idx: u32,
        movement: MovementClass,
        density: i32,
        durability: f32,
        collision: CollisionClass,
        friction: f32,
        reactions_2d: &[Vec<(u32, u32, u32)>],
    ) {
        debug_assert!(idx < self.materials.len(), "add_material: idx {idx} out of range");
        self.materials
            .add_material(idx, movement, density, durability, collision, friction, reactions_2d);
    }

    pub fn material_count(&self) -> u32 {
        self.materials.len()
    }

    pub fn enable_perf_metrics(&mut self, enabled: bool) {
        self.perf.enabled = enabled;
    }

    pub fn last_step_stats(&self) -> StepStats {
        self.last_stats
    }

    /// Runs one tick. Caller misuse (uninitialized grid, no materials
    /// configured) is a logged warning and a no-op, not an error.
    pub fn step_manual(&mut self) {
        if self.width == 0 {
            log::warn!("step_manual: grid is uninitialized, ignoring");
            return;
        }
        if self.materials.is_empty() {
            log::warn!("step_manual: no materials configured, ignoring");
            return;
        }
        crate::step::step(self);
    }

    #[inline]
    pub(crate) fn material_density(&self, material_idx: u32) -> i32 {
        self.materials.get(material_idx).map(|m| m.density).unwrap_or(0)
    }

    #[inline]
    pub(crate) fn material_movement(&self, material_idx: u32) -> MovementClass {
        self.materials.get(material_idx).map(|m| m.movement).unwrap_or(MovementClass::Solid)
    }

    #[inline]
    fn chunk_local(global: i32) -> (u32, u32) {
        let size = CHUNK_SIZE as i32;
        (global.div_euclid(size) as u32, global.rem_euclid(size) as u32)
    }

    /// Activates the 3x3 cell neighborhood around `(gx, gy)` and the
    /// corresponding chunk-local points, spilling into up to three
    /// neighbor chunks when `(gx, gy)` sits on a chunk edge or corner.
    pub(crate) fn activate_neighbors_at(&mut self, gx: i32, gy: i32) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let nx = gx + dx;
                let ny = gy + dy;
                if !self.in_bounds(nx, ny) {
                    continue;
                }
                let idx = self.index(nx, ny);
                self.cells[idx].set_active(true);
                let (cx, lx) = Self::chunk_local(nx);
                let (cy, ly) = Self::chunk_local(ny);
                self.chunks.activate_point(cx, cy, lx, ly);
            }
        }
    }

    /// Given that some other cell at offset `(dx, dy)` from `(gx, gy)` was
    /// mutated, wakes its neighborhood.
    pub(crate) fn activate_neighbors_offset(&mut self, gx: i32, gy: i32, dx: i32, dy: i32) {
        self.activate_neighbors_at(gx + dx, gy + dy);
    }

    /// Places `material_idx` at `(x, y)` and wakes its neighborhood, ready
    /// to be picked up by the next `step_manual`. Returns `false` (and does
    /// nothing) for out-of-bounds coordinates or an out-of-range material.
    /// This is the grid's only public cell-seeding operation — there is no
    /// bulk loader, so a renderer or test harness paints cells one at a
    /// time exactly the way it would place a single brush stroke.
    pub fn add_particle(&mut self, x: u32, y: u32, material_idx: u32) -> bool {
        if material_idx >= self.materials.len() {
            log::warn!("add_particle: material {material_idx} is out of range");
            return false;
        }
        let (gx, gy) = (x as i32, y as i32);
        if !self.in_bounds(gx, gy) {
            return false;
        }
        let idx = self.index(gx, gy);
        self.cells[idx].set_material_idx(material_idx);
        self.cells[idx].set_active(true);
        self.activate_neighbors_at(gx, gy);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_empty_rounds_up_and_clamps_to_three_chunks() {
        let grid = Grid::new_empty(10, 50);
        assert_eq!(grid.get_size(), (96, 96));
        assert_eq!(grid.get_size_chunk(), (3, 3));
    }

    #[test]
    fn out_of_bounds_queries_return_sentinels() {
        let grid = Grid::new_empty(96, 96);
        assert_eq!(grid.get_cell_material_idx(-1, -1), 0);
        assert!(!grid.is_chunk_active(9999, 9999));
    }

    #[test]
    fn delete_grid_is_idempotent() {
        let mut grid = Grid::new_empty(96, 96);
        grid.delete_grid();
        assert_eq!(grid.get_size(), (0, 0));
        grid.delete_grid();
        assert_eq!(grid.get_size(), (0, 0));
    }

    #[test]
    fn update_texture_data_reads_zero_out_of_bounds() {
        let grid = Grid::new_empty(96, 96);
        let mut texture = vec![0xFFFF_FFFFu32; 9];
        grid.update_texture_data(&mut texture, 3, 3, (-1, -1));
        // Only the bottom-right cell of the 3x3 window is in bounds (0,0).
        assert_eq!(texture[8], grid.get_cell_material_idx(0, 0));
        assert_eq!(texture[0], 0);
    }

    /// Testable property 3: waking a cell sitting on a chunk corner sets
    /// `active` on exactly its 3x3 neighborhood and spills activity into
    /// every chunk that neighborhood actually touches, and no others.
    #[test]
    fn activate_neighbors_spills_across_a_chunk_corner_and_nowhere_else() {
        let mut grid = Grid::new_empty(128, 128);
        // Chunk (1,1) covers cells [32,64) x [32,64); its bottom-right local
        // corner (31,31) is global (63,63). The 3x3 neighborhood around it
        // spans global x/y in [62,65), crossing into chunks (2,1), (1,2),
        // and (2,2).
        grid.activate_neighbors_at(63, 63);

        for gy in 62..65 {
            for gx in 62..65 {
                assert!(
                    grid.cells[grid.index(gx, gy)].active(),
                    "cell ({gx},{gy}) should be active"
                );
            }
        }
        // Nothing just outside the 3x3 neighborhood was touched.
        assert!(!grid.cells[grid.index(61, 63)].active());
        assert!(!grid.cells[grid.index(63, 61)].active());
        assert!(!grid.cells[grid.index(65, 65)].active());

        assert!(grid.is_chunk_active(1, 1));
        assert!(grid.is_chunk_active(2, 1));
        assert!(grid.is_chunk_active(1, 2));
        assert!(grid.is_chunk_active(2, 2));

        // No other chunk, including the sentinel border, was woken.
        for cx in 0..4i32 {
            for cy in 0..4i32 {
                if matches!((cx, cy), (1, 1) | (2, 1) | (1, 2) | (2, 2)) {
                    continue;
                }
                assert!(!grid.is_chunk_active(cx, cy), "chunk ({cx},{cy}) should be untouched");
            }
        }
    }
}
