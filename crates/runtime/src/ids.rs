//! Stable handles into the interpreter's owned pools.
//!
//! Spec §9 calls out the source's raw-pointer series graph as something to
//! re-architect: "implement series as arena-allocated nodes referenced by
//! stable indices or handles; the GC traces the arena; cells hold handles,
//! not raw pointers." `SeriesId` is that handle. It carries a generation
//! counter so a stale handle (one whose series has since been freed and its
//! slot reused) is detectable rather than silently aliasing unrelated data
//! — the classic use-after-free a tracing GC over raw pointers would hide.
//!
//! A context's identity *is* its varlist's `SeriesId` (spec §3.4: "slot 0
//! is a cell... which refers back to this varlist") and a function's
//! identity *is* its paramlist's `SeriesId` (spec §3.5: paramlist is "key
//! to function identity"), so `ContextId`/`FunctionId` are aliases rather
//! than new types — they name the same underlying handle space as
//! `SeriesId`, not a disjoint one.

/// Handle into the series arena (`relic_runtime::series::SeriesArena`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl SeriesId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        SeriesId { index, generation }
    }
}

/// A context's identity is its varlist's handle.
pub type ContextId = SeriesId;

/// A function's identity is its paramlist's handle.
pub type FunctionId = SeriesId;

/// Monotonically increasing identifier for a live (or once-live) evaluator
/// frame, used by frame-backed contexts (spec §3.4 "frame context") to
/// detect that their frame has exited (spec §4.3: "Dereferencing such a
/// context after its frame has ended fails with an inaccessible-frame
/// error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);
