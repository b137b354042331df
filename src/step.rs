//! The per-tick evolution: select active chunks, walk their bounding active
//! rectangle in an order that alternates per tick, apply reactions then
//! movement, mark updated cells, and propagate activity to neighbors.

use crate::cell::Cell;
use crate::chunks::{ChunkActivity, CHUNK_SIZE};
use crate::grid::Grid;
use crate::materials::MovementClass;
use crate::perf::PerfTimer;
use crate::rng::Rng;

/// Reaction probability a sideways-flowing liquid/gas dissipates to empty
/// instead of moving: `2^23 / 2^32`, per the spec's hardcoded constant.
const DISSIPATE_CHANCE: f64 = (1u64 << 23) as f64 / (1u64 << 32) as f64;

/// Half-neighborhood considered for reactions. Each unordered pair is
/// visited exactly once per tick because the complementary cell sees this
/// one from its own half on the same tick.
const REACTION_NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, -1), (0, -1), (1, -1)];

pub(crate) fn step(grid: &mut Grid) {
    let timer = grid.perf.enabled.then(PerfTimer::start);
    if grid.perf.enabled {
        grid.perf.reset();
    }

    pre_step(grid);

    for cx in 1..grid.chunks_width.saturating_sub(1) {
        step_column(grid, cx);
    }

    if grid.perf.enabled {
        grid.last_stats.cells_considered = grid.perf.cells_considered;
        grid.last_stats.cells_reacted = grid.perf.cells_reacted;
        grid.last_stats.cells_moved = grid.perf.cells_moved;
        grid.last_stats.active_chunks = count_active_chunks(grid);
        if let Some(t) = timer {
            grid.last_stats.tick_us = t.elapsed_us();
        }
    }
}

fn count_active_chunks(grid: &Grid) -> u32 {
    let (cw, ch) = grid.get_size_chunk();
    let mut n = 0;
    for cx in 0..cw {
        for cy in 0..ch {
            if grid.is_chunk_active(cx as i32, cy as i32) {
                n += 1;
            }
        }
    }
    n
}

/// Rotates the 2-bit generation counter, skipping 0 (reserved for "never
/// stepped"), and advances the tick.
fn pre_step(grid: &mut Grid) {
    grid.generation = (grid.generation % 3) + 1;
    grid.tick += 1;
}

/// Walks one interior chunk-column bottom to top. Columns are independent
/// of one another except for their immediate `c-1`/`c+1` neighbors, which is
/// what would make parity-parallel stepping (even columns, odd columns,
/// barrier between) sound; see DESIGN.md for why this crate steps columns
/// serially instead of actually running them concurrently.
fn step_column(grid: &mut Grid, cx: u32) {
    let mut rng = Rng::for_column(cx, grid.tick);
    for cy in (1..grid.chunks_height.saturating_sub(1)).rev() {
        let activity = grid.chunks.get(cx, cy);
        if activity.is_empty() {
            continue;
        }
        // Zeroed *before* stepping, so reactivations produced by this
        // chunk's own step correctly persist into the fresh word instead of
        // being clobbered afterwards.
        grid.chunks.clear(cx, cy);
        step_chunk(grid, cx, cy, activity, &mut rng);
    }
}

fn step_chunk(grid: &mut Grid, cx: u32, cy: u32, activity: ChunkActivity, rng: &mut Rng) {
    let rect = activity.active_rect();
    if rect.is_empty() {
        return;
    }
    let left_to_right = grid.tick % 2 == 0;
    for ly in rect.y_start..rect.y_end {
        if !activity.row_active(ly) {
            continue;
        }
        let gy = (cy * CHUNK_SIZE + ly) as i32;
        if left_to_right {
            for lx in rect.x_start..rect.x_end {
                step_cell_if_col_active(grid, activity, cx, lx, gy, rng);
            }
        } else {
            for lx in (rect.x_start..rect.x_end).rev() {
                step_cell_if_col_active(grid, activity, cx, lx, gy, rng);
            }
        }
    }
}

#[inline]
fn step_cell_if_col_active(grid: &mut Grid, activity: ChunkActivity, cx: u32, lx: u32, gy: i32, rng: &mut Rng) {
    if !activity.col_active(lx) {
        return;
    }
    let gx = (cx * CHUNK_SIZE + lx) as i32;
    step_cell(grid, gx, gy, rng);
}

fn step_cell(grid: &mut Grid, gx: i32, gy: i32, rng: &mut Rng) {
    let idx = grid.index(gx, gy);
    let cell = grid.cells[idx];
    if !cell.active() || cell.is_updated(grid.generation) {
        return;
    }
    if grid.perf.enabled {
        grid.perf.cells_considered += 1;
    }

    let reacted = reaction_phase(grid, gx, gy, rng);

    let idx = grid.index(gx, gy);
    grid.cells[idx].set_updated(grid.generation);
    let material_idx = grid.cells[idx].material_idx();

    let moved = if material_idx == 0 {
        false
    } else {
        match grid.material_movement(material_idx) {
            MovementClass::Solid => false,
            MovementClass::Powder => move_powder(grid, gx, gy, rng),
            MovementClass::Liquid => move_fluid(grid, gx, gy, rng, false),
            MovementClass::Gas => move_fluid(grid, gx, gy, rng, true),
        }
    };

    if !(reacted || moved) {
        let idx = grid.index(gx, gy);
        grid.cells[idx].set_active(false);
    }
}

/// Considers the fixed half-neighborhood (right, top-left, top, top-right)
/// so each unordered cell pair is reacted on at most once per tick.
fn reaction_phase(grid: &mut Grid, gx: i32, gy: i32, rng: &mut Rng) -> bool {
    let mut reacted = false;
    for (dx, dy) in REACTION_NEIGHBORS {
        let nx = gx + dx;
        let ny = gy + dy;
        if !grid.in_bounds(nx, ny) {
            continue;
        }
        let idx = grid.index(gx, gy);
        let nidx = grid.index(nx, ny);
        let a = grid.cells[idx].material_idx();
        let b = grid.cells[nidx].material_idx();
        if a == 0 && b == 0 {
            continue;
        }
        let Some((out_a, out_b)) = grid.materials.lookup(a, b, rng) else {
            continue;
        };

        let changed_here = out_a != a;
        let changed_there = out_b != b;
        if changed_here {
            grid.cells[idx].set_material_idx(out_a);
            grid.activate_neighbors_at(gx, gy);
        }
        if changed_there {
            grid.cells[nidx].set_material_idx(out_b);
            grid.activate_neighbors_offset(gx, gy, dx, dy);
        }
        if changed_here || changed_there {
            reacted = true;
            if grid.perf.enabled {
                grid.perf.cells_reacted += 1;
            }
        }
    }
    reacted
}

fn swap_cells(grid: &mut Grid, ax: i32, ay: i32, bx: i32, by: i32) {
    let ia = grid.index(ax, ay);
    let ib = grid.index(bx, by);
    grid.cells.swap(ia, ib);
    grid.activate_neighbors_at(ax, ay);
    grid.activate_neighbors_offset(ax, ay, bx - ax, by - ay);
    if grid.perf.enabled {
        grid.perf.cells_moved += 1;
    }
}

/// `Some(index)` if `pos` is inside the steppable interior and its density
/// is on the "make room" side of `density_here` (strictly lower when
/// falling, strictly higher when rising).
fn movable_density(grid: &Grid, pos: (i32, i32), density_here: i32, rises: bool) -> Option<usize> {
    if !grid.in_interior(pos.0, pos.1) {
        return None;
    }
    let idx = grid.index(pos.0, pos.1);
    let target_density = grid.material_density(grid.cells[idx].material_idx());
    let makes_room = if rises { target_density > density_here } else { target_density < density_here };
    makes_room.then_some(idx)
}

fn move_powder(grid: &mut Grid, x: i32, y: i32, rng: &mut Rng) -> bool {
    let density_here = grid.material_density(grid.cells[grid.index(x, y)].material_idx());

    let below = (x, y + 1);
    if movable_density(grid, below, density_here, false).is_some() {
        swap_cells(grid, x, y, below.0, below.1);
        return true;
    }

    let left_diag = (x - 1, y + 1);
    let right_diag = (x + 1, y + 1);
    let left_free = movable_density(grid, left_diag, density_here, false).is_some();
    let right_free = movable_density(grid, right_diag, density_here, false).is_some();
    match (left_free, right_free) {
        (true, true) => {
            let target = if rng.next_bool() { left_diag } else { right_diag };
            swap_cells(grid, x, y, target.0, target.1);
            true
        }
        (true, false) => {
            swap_cells(grid, x, y, left_diag.0, left_diag.1);
            true
        }
        (false, true) => {
            swap_cells(grid, x, y, right_diag.0, right_diag.1);
            true
        }
        (false, false) => false,
    }
}

/// Shared by LIQUID (`rises = false`) and GAS (`rises = true`, the vertical
/// mirror): down/diagonal movement identical to powder but comparing
/// against the opposite side of the density order, plus sideways flow with
/// direction memory and a rare dissipation.
fn move_fluid(grid: &mut Grid, x: i32, y: i32, rng: &mut Rng, rises: bool) -> bool {
    let dy = if rises { -1 } else { 1 };
    let density_here = grid.material_density(grid.cells[grid.index(x, y)].material_idx());

    let down = (x, y + dy);
    if movable_density(grid, down, density_here, rises).is_some() {
        swap_cells(grid, x, y, down.0, down.1);
        return true;
    }

    let left_diag = (x - 1, y + dy);
    let right_diag = (x + 1, y + dy);
    let left_diag_free = movable_density(grid, left_diag, density_here, rises).is_some();
    let right_diag_free = movable_density(grid, right_diag, density_here, rises).is_some();
    match (left_diag_free, right_diag_free) {
        (true, true) => {
            let go_left = rng.next_bool();
            let target = if go_left { left_diag } else { right_diag };
            swap_cells(grid, x, y, target.0, target.1);
            let tidx = grid.index(target.0, target.1);
            grid.cells[tidx].set_value(if go_left { 1 } else { 0 });
            return true;
        }
        (true, false) => {
            swap_cells(grid, x, y, left_diag.0, left_diag.1);
            let tidx = grid.index(left_diag.0, left_diag.1);
            grid.cells[tidx].set_value(1);
            return true;
        }
        (false, true) => {
            swap_cells(grid, x, y, right_diag.0, right_diag.1);
            let tidx = grid.index(right_diag.0, right_diag.1);
            grid.cells[tidx].set_value(0);
            return true;
        }
        (false, false) => {}
    }

    let left = (x - 1, y);
    let right = (x + 1, y);
    let left_free = movable_density(grid, left, density_here, rises).is_some();
    let right_free = movable_density(grid, right, density_here, rises).is_some();
    if !left_free && !right_free {
        return false;
    }

    if rng.probability(DISSIPATE_CHANCE) {
        let idx = grid.index(x, y);
        grid.cells[idx] = Cell::from_raw(0);
        grid.activate_neighbors_at(x, y);
        if grid.perf.enabled {
            grid.perf.cells_moved += 1;
        }
        return true;
    }

    // `value != 0` means this cell's last sideways move was to the left;
    // when both sides are open it keeps flowing the way it was already
    // going instead of re-rolling a direction every tick.
    let idx = grid.index(x, y);
    let prefer_left = grid.cells[idx].value() != 0;
    let go_left = if left_free && right_free { prefer_left } else { left_free };
    let target = if go_left { left } else { right };

    swap_cells(grid, x, y, target.0, target.1);
    let tidx = grid.index(target.0, target.1);
    grid.cells[tidx].set_value(if go_left { 1 } else { 0 });
    true
}
