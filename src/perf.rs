//! Opt-in per-tick instrumentation.
//!
//! Scoped to what the step engine in this crate actually does — no
//! rigid-body or temperature counters, since those subsystems are out of
//! scope here. Collection is gated behind a flag so the hot path pays
//! nothing when it's off.

use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStats {
    pub cells_considered: u32,
    pub cells_reacted: u32,
    pub cells_moved: u32,
    pub active_chunks: u32,
    pub tick_us: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PerfAccumulator {
    pub enabled: bool,
    pub cells_considered: u32,
    pub cells_reacted: u32,
    pub cells_moved: u32,
    pub active_chunks: u32,
}

impl PerfAccumulator {
    pub(crate) fn reset(&mut self) {
        self.cells_considered = 0;
        self.cells_reacted = 0;
        self.cells_moved = 0;
        self.active_chunks = 0;
    }
}

/// RAII-ish timer mirroring the teacher's `PerfTimer`: start it, read
/// elapsed time whenever needed. This crate has no wasm target, so unlike
/// the teacher's wasm/native split, only the `Instant`-backed path exists.
pub(crate) struct PerfTimer(Instant);

impl PerfTimer {
    #[inline]
    pub(crate) fn start() -> Self {
        PerfTimer(Instant::now())
    }

    #[inline]
    pub(crate) fn elapsed_us(&self) -> u64 {
        self.0.elapsed().as_micros() as u64
    }
}
