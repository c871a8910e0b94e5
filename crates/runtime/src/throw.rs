//! Non-local exits (spec §4.6) and fatal-error unwinding (spec §4.6, §9).
//!
//! The source expresses a throw as a bit on a value and propagates it by
//! having every dispatcher/evaluator step return a "did this throw" flag
//! the caller must check. Spec §9 directs re-expressing that as a sum
//! type instead: `DoOutcome` is that type. The thrown bit still exists on
//! the `Cell` itself (`Cell::thrown`) purely for debugger inspection, as
//! the design note allows, but nothing in this crate branches on it —
//! everything branches on `DoOutcome`.

use relic_core::RuntimeError;

use crate::cell::Cell;
use crate::ids::FunctionId;

/// The identity a throw unwinds toward (spec §4.6: "RETURN and LEAVE
/// throws carry the target function's paramlist as their identity").
#[derive(Debug, Clone, PartialEq)]
pub enum ThrowLabel {
    /// A named THROW/CATCH pair; the label is an arbitrary value compared
    /// by the catching native.
    Named(Cell),
    /// A plain `THROW value` with no `/name`.
    Unnamed,
    /// RETURN or LEAVE targeting a specific function's frame.
    Function(FunctionId),
    /// BREAK out of the nearest enclosing loop body.
    Break,
    /// CONTINUE the nearest enclosing loop body, carrying the value to
    /// treat as this iteration's result.
    Continue(Cell),
    /// Cooperative cancellation (spec §5: "Cancellation is expressed by a
    /// throw whose label is a reserved halt value").
    Halt,
}

/// A thrown value: its label plus the payload it carries (spec: `throw
/// 42` — label unnamed, payload 42; `throw/name 1 'foo` — label `foo`,
/// payload 1).
#[derive(Debug, Clone, PartialEq)]
pub struct Thrown {
    pub label: ThrowLabel,
    pub value: Cell,
}

/// The result of one evaluator step or dispatcher call (spec §9: "the
/// evaluator returning a sum type {Ok, Thrown(Cell), Fatal(Error)}").
pub enum DoOutcome {
    Value(Cell),
    Thrown(Thrown),
    Fatal(RuntimeError),
}

impl DoOutcome {
    pub fn is_thrown(&self) -> bool {
        matches!(self, DoOutcome::Thrown(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DoOutcome::Fatal(_))
    }

    /// Converts a `Result` returned by ordinary (non-throwing) code into a
    /// `DoOutcome`, the usual way dispatchers written as plain `fn(...) ->
    /// Result<Cell, RuntimeError>` plug into the evaluator.
    pub fn from_result(r: Result<Cell, RuntimeError>) -> Self {
        match r {
            Ok(v) => DoOutcome::Value(v),
            Err(e) => DoOutcome::Fatal(e),
        }
    }
}

/// Whether a CATCH point accepts `thrown` (spec §4.6: "the runtime
/// inspects the thrown cell's payload to decide whether to catch"). Only
/// THROW-style labels (`Named`/`Unnamed`) are ever caught here —
/// BREAK/CONTINUE/RETURN/LEAVE/HALT always keep propagating regardless of
/// `name`, since CATCH is not their catch point.
///
/// A bare `catch` (`name == None`) accepts any THROW, named or not. A
/// `catch/name` only accepts a `Named` throw whose label equals `name`.
pub fn catch_named(thrown: Thrown, name: Option<&Cell>) -> Result<Cell, Thrown> {
    match (&thrown.label, name) {
        (ThrowLabel::Unnamed, None) => Ok(thrown.value),
        (ThrowLabel::Named(_), None) => Ok(thrown.value),
        (ThrowLabel::Named(label), Some(name)) if label == name => Ok(thrown.value),
        _ => Err(thrown),
    }
}

pub fn catch_function_return(thrown: Thrown, target: FunctionId) -> Result<Cell, Thrown> {
    match &thrown.label {
        ThrowLabel::Function(f) if *f == target => Ok(thrown.value),
        _ => Err(thrown),
    }
}

pub fn catch_loop_break(thrown: Thrown) -> Result<Option<Cell>, Thrown> {
    match thrown.label {
        ThrowLabel::Break => Ok(None),
        ThrowLabel::Continue(v) => Ok(Some(v)),
        _ => Err(thrown),
    }
}

/// RAII guard restoring interpreter state torn down by a fatal error
/// (spec §4.6: "`PUSH_TRAP` installs a handler... chunk stacks are
/// unwound to the level at trap-push time; unmanaged series allocated in
/// the torn region are freed", re-expressed per spec §9 as "a RAII-style
/// guard per frame" instead of setjmp/longjmp).
///
/// `TrapGuard` records the chunk-stack depth and the set of unmanaged
/// series allocated since it was installed; if it drops while a fatal
/// `Result::Err` is unwinding past it (`armed` stays true), it rewinds the
/// chunk stack and frees those series. A normal return disarms it.
pub struct TrapGuard {
    chunk_depth_at_push: usize,
    unmanaged_since_push: Vec<crate::ids::SeriesId>,
    armed: bool,
}

impl TrapGuard {
    pub fn new(chunk_depth_at_push: usize) -> Self {
        TrapGuard {
            chunk_depth_at_push,
            unmanaged_since_push: Vec::new(),
            armed: true,
        }
    }

    pub fn track_unmanaged(&mut self, id: crate::ids::SeriesId) {
        self.unmanaged_since_push.push(id);
    }

    /// Call on the success path before the guard drops, so unwinding logic
    /// does not run.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Roll back: truncate the chunk stack to the recorded depth and free
    /// every unmanaged series allocated since this guard was pushed.
    /// Called explicitly by the fatal-error propagation path in
    /// `crate::eval` rather than from `Drop`, since freeing needs access
    /// to the owning `Interpreter`'s arena (a `Drop` impl can't borrow it).
    pub fn unwind(
        &mut self,
        chunks: &mut relic_core::ChunkStack<Cell>,
        series: &mut crate::series::SeriesArena,
    ) {
        if !self.armed {
            return;
        }
        // In practice `eval`'s own per-call chunk handles already pop their
        // chunks before a `TrapGuard::unwind` is ever reached; this is a
        // backstop for stragglers left by a frame that unwound without
        // popping its own, not the primary mechanism.
        chunks.truncate_to_depth(self.chunk_depth_at_push);
        for id in self.unmanaged_since_push.drain(..) {
            if series.get(id).map(|s| !s.flags.contains(crate::series::SeriesFlags::MANAGED)).unwrap_or(false) {
                series.free(id);
            }
        }
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, Immediate, Payload};

    fn int(n: i64) -> Cell {
        Cell::new(Payload::Immediate(Immediate::Integer(n)))
    }

    #[test]
    fn bare_catch_accepts_an_unnamed_throw() {
        let thrown = Thrown {
            label: ThrowLabel::Unnamed,
            value: int(42),
        };
        let caught = catch_named(thrown, None).unwrap();
        assert_eq!(caught, int(42));
    }

    #[test]
    fn bare_catch_accepts_any_named_throw_too() {
        let thrown = Thrown {
            label: ThrowLabel::Named(int(0)),
            value: int(42),
        };
        let caught = catch_named(thrown, None).unwrap();
        assert_eq!(caught, int(42));
    }

    #[test]
    fn named_catch_does_not_accept_an_unnamed_throw() {
        let thrown = Thrown {
            label: ThrowLabel::Unnamed,
            value: int(1),
        };
        let name = int(1);
        assert!(catch_named(thrown, Some(&name)).is_err());
    }

    #[test]
    fn named_catch_rejects_mismatched_label() {
        let thrown = Thrown {
            label: ThrowLabel::Named(int(1)),
            value: int(1),
        };
        let name = int(2);
        assert!(catch_named(thrown, Some(&name)).is_err());
    }

    #[test]
    fn named_catch_accepts_matching_label() {
        let thrown = Thrown {
            label: ThrowLabel::Named(int(7)),
            value: int(1),
        };
        let name = int(7);
        assert_eq!(catch_named(thrown, Some(&name)).unwrap(), int(1));
    }

    #[test]
    fn function_return_only_catches_its_own_target() {
        use crate::ids::SeriesId;
        let target = SeriesId::new(1, 0);
        let other = SeriesId::new(2, 0);
        let thrown = Thrown {
            label: ThrowLabel::Function(target),
            value: int(5),
        };
        assert!(catch_function_return(thrown.clone(), other).is_err());
        assert_eq!(catch_function_return(thrown, target).unwrap(), int(5));
    }

    #[test]
    fn break_and_continue_distinguish_via_loop_break_catch() {
        let brk = Thrown {
            label: ThrowLabel::Break,
            value: int(0),
        };
        assert_eq!(catch_loop_break(brk).unwrap(), None);

        let cont = Thrown {
            label: ThrowLabel::Continue(int(9)),
            value: int(0),
        };
        assert_eq!(catch_loop_break(cont).unwrap(), Some(int(9)));
    }

    #[test]
    fn unwind_truncates_the_chunk_stack_back_to_the_pushed_depth() {
        let mut chunks: relic_core::ChunkStack<Cell> = relic_core::ChunkStack::new();
        let mut series = crate::series::SeriesArena::new();
        chunks.push_chunk(2);
        let mut guard = TrapGuard::new(chunks.depth());
        chunks.push_chunk(3);
        assert_eq!(chunks.depth(), 2);

        guard.unwind(&mut chunks, &mut series);
        assert_eq!(chunks.depth(), 1);
    }

    #[test]
    fn unwind_frees_unmanaged_series_tracked_since_the_push() {
        let mut chunks: relic_core::ChunkStack<Cell> = relic_core::ChunkStack::new();
        let mut series = crate::series::SeriesArena::new();
        let mut guard = TrapGuard::new(chunks.depth());

        let id = series.create(crate::series::SeriesData::Cells(vec![]));
        guard.track_unmanaged(id);
        assert!(series.get(id).is_ok());

        guard.unwind(&mut chunks, &mut series);
        assert!(series.get(id).is_err());
    }

    #[test]
    fn disarm_prevents_unwind_from_doing_anything() {
        let mut chunks: relic_core::ChunkStack<Cell> = relic_core::ChunkStack::new();
        let mut series = crate::series::SeriesArena::new();
        chunks.push_chunk(1);
        let mut guard = TrapGuard::new(chunks.depth());
        chunks.push_chunk(1);

        guard.disarm();
        guard.unwind(&mut chunks, &mut series);
        assert_eq!(chunks.depth(), 2);
    }
}
