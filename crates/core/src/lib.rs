//! relic-core: foundation primitives for a REBOL/Ren-C family evaluator.
//!
//! This crate is deliberately small and has no knowledge of cells, series,
//! or the evaluator — those live in `relic-runtime` and are built on top of
//! what's here. `relic-core` provides the things that are language-agnostic
//! across any stack-discipline interpreter built this way:
//!
//! # Modules
//!
//! - `symbol`: instance-owned identifier interning.
//! - `error`: the fatal-error taxonomy (Script/Math/Access/Internal).
//! - `chunk_stack`: the contiguous, chunked argument-storage allocator.
//! - `arena`: bump allocation for transient byte/string data.
//! - `memory_stats`: a single-instance registry for diagnostic snapshots.
//!
//! None of these hold process-wide statics; every piece of state here is
//! owned by whichever `Interpreter` (in `relic-runtime`) constructs it.

pub mod arena;
pub mod chunk_stack;
pub mod error;
pub mod memory_stats;
pub mod symbol;

pub use chunk_stack::{ChunkHandle, ChunkStack};
pub use error::RuntimeError;
pub use memory_stats::MemoryStats;
pub use symbol::{SymbolId, SymbolTable};
