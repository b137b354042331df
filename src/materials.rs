//! Material catalog and the upper-triangular reaction table.
//!
//! Construction is two-phase, exactly as the spec describes: `init` (née
//! `init_materials`) allocates slots, then `add_material` fills each one.
//! Reactions are supplied per-material as a jagged list indexed by
//! `d = partner_idx - this_idx` (so only `d >= 0` partners are named); the
//! table packs all of it into one flat `reactions` array plus, per
//! material, a `reaction_ranges` lookup so `(lo, hi)` lookup at step time is
//! O(1): compute `lo = min(a,b)`, `d = |a-b|`, and index straight into the
//! packed range.

use serde::Deserialize;

use crate::error::MaterialTableError;
use crate::rng::Rng;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementClass {
    Solid,
    Powder,
    Liquid,
    Gas,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionClass {
    None,
    Solid,
    Platform,
    Liquid,
}

#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub movement: MovementClass,
    pub density: i32,
    pub durability: f32,
    pub collision: CollisionClass,
    pub friction: f32,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            movement: MovementClass::Solid,
            density: 0,
            durability: 0.0,
            collision: CollisionClass::None,
            friction: 0.0,
        }
    }
}

/// One reaction outcome: fires with probability `probability` (compared
/// against a raw `u32` draw; `u32::MAX` always fires, `0` never does).
#[derive(Clone, Copy, Debug)]
pub struct Reaction {
    pub probability: u32,
    pub out_lo: u32,
    pub out_hi: u32,
}

/// Packed `[start, end)` slice of the flat `reactions` array, or `None` if
/// `d` has no reactions for this material.
#[inline]
fn pack_range(start: u32, end: u32) -> u64 {
    (start as u64) | ((end as u64) << 32)
}

#[inline]
fn unpack_range(packed: u64) -> (u32, u32) {
    (packed as u32, (packed >> 32) as u32)
}

#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    reactions: Vec<Reaction>,
    /// `reaction_ranges[m]` has length `L` = smallest value such that every
    /// `d >= L` is empty for material `m`; entries are `pack_range` words or
    /// `0` when that `d` has no reactions.
    reaction_ranges: Vec<Vec<u64>>,
}

impl MaterialTable {
    /// Allocates `n` empty slots (all `SOLID`, density 0). Mirrors the
    /// spec's `init_materials(n)`.
    pub fn init(n: u32) -> Self {
        let n = n as usize;
        MaterialTable {
            materials: vec![Material::default(); n],
            reactions: Vec::new(),
            reaction_ranges: vec![Vec::new(); n],
        }
    }

    pub fn empty() -> Self {
        MaterialTable::init(0)
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.materials.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: u32) -> Option<&Material> {
        self.materials.get(idx as usize)
    }

    /// Fills slot `idx`. `reactions_2d[d]` lists every reaction between this
    /// material and the material at `idx + d`.
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
        debug_assert!((idx as usize) < self.materials.len(), "add_material: idx {idx} out of range");
        self.materials[idx as usize] = Material {
            movement,
            density,
            durability,
            collision,
            friction,
        };

        let mut ranges = Vec::with_capacity(reactions_2d.len());
        for reactions_at_d in reactions_2d {
            if reactions_at_d.is_empty() {
                ranges.push(0);
                continue;
            }
            let start = self.reactions.len() as u32;
            self.reactions.extend(reactions_at_d.iter().map(|&(probability, out_lo, out_hi)| {
                Reaction { probability, out_lo, out_hi }
            }));
            let end = self.reactions.len() as u32;
            ranges.push(pack_range(start, end));
        }
        while matches!(ranges.last(), Some(0)) {
            ranges.pop();
        }
        self.reaction_ranges[idx as usize] = ranges;
    }

    /// O(1) reaction lookup for the unordered pair `(a, b)`. Returns the
    /// (possibly swapped) `(out_a, out_b)` outcome if a reaction fires.
    pub fn lookup(&self, a: u32, b: u32, rng: &mut Rng) -> Option<(u32, u32)> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let d = hi - lo;
        let ranges = self.reaction_ranges.get(lo as usize)?;
        let packed = *ranges.get(d as usize)?;
        if packed == 0 {
            return None;
        }
        let (start, end) = unpack_range(packed);
        for reaction in &self.reactions[start as usize..end as usize] {
            if rng.reaction_fires(reaction.probability) {
                let (lo_out, hi_out) = (reaction.out_lo, reaction.out_hi);
                return Some(if a <= b { (lo_out, hi_out) } else { (hi_out, lo_out) });
            }
        }
        None
    }

    /// Parses a material/reaction bundle (see [`MaterialBundle`]) and builds
    /// the same in-memory table `init`/`add_material` would, so both
    /// construction routes are equivalent and neither bypasses the
    /// `idx < len` / upper-triangular invariants.
    pub fn from_bundle_json(json: &str) -> Result<Self, MaterialTableError> {
        let bundle: MaterialBundle = serde_json::from_str(json)?;
        let n = bundle.materials.len() as u32;
        let mut table = MaterialTable::init(n);
        let mut seen = vec![false; n as usize];
        let mut has_empty = false;

        for spec in &bundle.materials {
            if spec.idx >= n {
                return Err(MaterialTableError::IndexOutOfRange { idx: spec.idx, len: n });
            }
            if std::mem::replace(&mut seen[spec.idx as usize], true) {
                return Err(MaterialTableError::DuplicateMaterial { idx: spec.idx });
            }
            if spec.idx == 0 {
                has_empty = true;
            }
            let reactions_2d: Vec<Vec<(u32, u32, u32)>> = spec
                .reactions
                .iter()
                .map(|by_d| by_d.iter().map(|r| (r.probability, r.out_lo, r.out_hi)).collect())
                .collect();
            table.add_material(
                spec.idx,
                spec.movement,
                spec.density,
                spec.durability,
                spec.collision,
                spec.friction,
                &reactions_2d,
            );
        }

        if n > 0 && !has_empty {
            return Err(MaterialTableError::MissingEmptyMaterial);
        }
        Ok(table)
    }
}

#[derive(Deserialize)]
pub struct MaterialBundle {
    pub materials: Vec<MaterialSpec>,
}

#[derive(Deserialize)]
pub struct MaterialSpec {
    pub idx: u32,
    pub movement: MovementClass,
    pub density: i32,
    pub durability: f32,
    pub collision: CollisionClass,
    pub friction: f32,
    #[serde(default)]
    pub reactions: Vec<Vec<ReactionSpec>>,
}

#[derive(Deserialize)]
pub struct ReactionSpec {
    pub probability: u32,
    pub out_lo: u32,
    pub out_hi: u32,
}
