//! relic-runtime: the evaluator core of a REBOL/Ren-C family language —
//! cells, series, contexts, functions, frames, and `Do_Core` (spec §1-§6).
//!
//! Built on top of `relic-core` (symbol interning, the fatal-error
//! taxonomy, the chunk stack, arena allocation). Everything that needs to
//! know what a `Cell` or a `Series` is lives here instead.

pub mod apply;
pub mod cell;
pub mod context;
pub mod eval;
pub mod frame;
pub mod function;
pub mod gc;
pub mod host;
pub mod ids;
pub mod interpreter;
pub mod mold;
pub mod pixel;
pub mod series;
pub mod throw;

pub use apply::{apply, do_block};
pub use cell::{BindingTarget, Cell, Kind, Payload};
pub use context::{Key, KeyFlags};
pub use eval::{do_next, do_single};
pub use frame::{EvalType, Feed, Frame};
pub use function::{Dispatcher, DispatchTable, FunctionDef, FunctionTable, NativeFn, Param, ParamClass};
pub use host::{HostCallbacks, NullHost};
pub use ids::{ContextId, FrameId, FunctionId, SeriesId};
pub use interpreter::{Config, Interpreter};
pub use mold::mold;
pub use series::{Series, SeriesArena, SeriesData, SeriesFlags};
pub use throw::{DoOutcome, ThrowLabel, Thrown, TrapGuard};
