//! The `Interpreter`: the single owner of every pool the evaluator touches
//! (spec §9: "isolate into an Interpreter handle passed to every
//! operation; no process-wide statics in the core").
//!
//! Where the source material reaches for a handful of global C statics
//! (symbol table, root context, data stack, chunk stack...), this struct
//! bundles all of it so a process can host more than one interpreter
//! instance side by side (spec §1).

use relic_core::{Arena, ChunkStack, MemoryStats, RuntimeError, SymbolTable};

use crate::cell::Cell;
use crate::function::{DispatchTable, FunctionTable};
use crate::gc::Roots;
use crate::host::HostCallbacks;
use crate::ids::{ContextId, FrameId};
use crate::series::SeriesArena;

/// Knobs an embedder can set before running anything (SPEC_FULL §2.3: "a
/// `Config` struct on `Interpreter`, no statics").
#[derive(Debug, Clone)]
pub struct Config {
    /// `Do_Core` checks `halt_requested` at loop backedges (spec §5).
    pub gc_disabled: bool,
    /// Recursion guard: max live frame-chain depth before a stack-depth
    /// script error is raised instead of overflowing the host's own stack.
    pub max_frame_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gc_disabled: false,
            max_frame_depth: 4096,
        }
    }
}

/// A monotonically increasing source of `FrameId`s, and the set of ids
/// currently denoting a live (on-the-native-call-stack) frame. A reified
/// frame-context's varlist checks membership here to decide whether it's
/// still live (spec §3.4: "Dereferencing such a context after its frame
/// has ended fails with an inaccessible-frame error").
#[derive(Default)]
pub struct FrameRegistry {
    next: u64,
    live: std::collections::HashSet<FrameId>,
}

impl FrameRegistry {
    pub fn enter(&mut self) -> FrameId {
        let id = FrameId(self.next);
        self.next += 1;
        self.live.insert(id);
        tracing::debug!(frame = ?id, depth = self.live.len(), "frame entered");
        id
    }

    pub fn exit(&mut self, id: FrameId) {
        self.live.remove(&id);
        tracing::debug!(frame = ?id, depth = self.live.len(), "frame exited");
    }

    pub fn is_live(&self, id: FrameId) -> bool {
        self.live.contains(&id)
    }

    pub fn depth(&self) -> usize {
        self.live.len()
    }
}

/// Everything the evaluator needs, owned in one place.
pub struct Interpreter {
    pub symbols: SymbolTable,
    pub series: SeriesArena,
    pub chunks: ChunkStack<Cell>,
    pub dispatch: DispatchTable,
    pub functions: FunctionTable,
    pub frames: FrameRegistry,
    /// spec §4.7: a general-purpose, GC-rooted stack of pinned cells
    /// (roots include "the data stack"), available to dispatchers that
    /// need scratch working values protected across a call without
    /// building a context for them — e.g. a collecting native pushing
    /// partial results as it walks a series. Refinement out-of-order
    /// pickup (spec §4.4.1) is *not* implemented through this field in
    /// this crate: it's handled entirely by `eval::layout_params`
    /// classifying a paramlist's refinement segments up front and
    /// `call_function` walking `requested` in call order — see
    /// DESIGN.md's note on this simplification.
    pub data_stack: Vec<Cell>,
    /// spec §4.7: "a dedicated guard stack of pinned cells pushed with
    /// `PUSH_GUARD`".
    pub guard_stack: Vec<Cell>,
    pub root_context: ContextId,
    pub arena: Arena,
    pub stats: MemoryStats,
    pub config: Config,
    pub host: Box<dyn HostCallbacks>,
    halt_requested: bool,
}

impl Interpreter {
    pub fn new(host: Box<dyn HostCallbacks>) -> Result<Self, RuntimeError> {
        Self::with_config(host, Config::default())
    }

    pub fn with_config(host: Box<dyn HostCallbacks>, config: Config) -> Result<Self, RuntimeError> {
        crate::cell::assert_cell_layout();
        let mut series = SeriesArena::new();
        let root_context = crate::context::allocate(
            &mut series,
            crate::cell::ContextKind::Object,
            &[],
            &[],
        )?;
        series.make_managed(root_context)?;

        Ok(Interpreter {
            symbols: SymbolTable::new(),
            series,
            chunks: ChunkStack::new(),
            dispatch: DispatchTable::new(),
            functions: FunctionTable::new(),
            frames: FrameRegistry::default(),
            data_stack: Vec::new(),
            guard_stack: Vec::new(),
            root_context,
            arena: Arena::new(),
            stats: MemoryStats::new(),
            config,
            host,
            halt_requested: false,
        })
    }

    pub fn request_halt(&mut self) {
        self.halt_requested = true;
    }

    pub fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    pub fn clear_halt(&mut self) {
        self.halt_requested = false;
    }

    /// spec §4.7: "a dedicated guard stack of pinned cells pushed with
    /// `PUSH_GUARD`". Guarding a cell keeps any series it references alive
    /// across a GC cycle even if nothing else reaches it yet.
    pub fn push_guard(&mut self, cell: Cell) {
        self.guard_stack.push(cell);
    }

    pub fn pop_guard(&mut self) -> Option<Cell> {
        self.guard_stack.pop()
    }

    pub fn run_gc(&mut self) -> usize {
        if self.config.gc_disabled {
            return 0;
        }
        let roots = Roots {
            root_context: self.root_context,
            data_stack: &self.data_stack,
            guard_stack: &self.guard_stack,
            chunk_cells: self.chunks.all_slots(),
        };
        let reclaimed = crate::gc::collect(&mut self.series, &roots);
        self.stats.note_gc_cycle(reclaimed);
        self.stats.note_series_count(self.series.live_count());
        tracing::debug!(reclaimed, live = self.series.live_count(), "gc cycle complete");
        reclaimed
    }
}
