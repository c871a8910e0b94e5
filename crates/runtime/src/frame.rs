//! The evaluator frame (spec §4.5): "The frame has: `source`... `value`...
//! `out`... `cell`... `eval_type`... `gotten`... `pending`."
//!
//! Frames here live on the native Rust call stack for the duration of one
//! `Do_Core` invocation (`crate::eval`); a frame is only copied into a
//! managed context (spec §3.4 "frame context") on demand, via
//! [`Frame::reify`].

use relic_core::RuntimeError;

use crate::cell::{Cell, Kind};
use crate::ids::{ContextId, FrameId};
use crate::series::SeriesArena;

/// spec §4.5.2: "A frame may be driven by a C-style variable argument
/// pointer rather than a cell array." Without a real C ABI to receive
/// values through, this crate's variadic feed is a pre-collected queue a
/// native hands the evaluator one value at a time (e.g. `Apply`'s Rust
/// call sites); `reify` still applies the same way: collect whatever is
/// left into a managed array.
#[derive(Debug, Default)]
pub struct VariadicFeed {
    pending: std::collections::VecDeque<Cell>,
}

impl VariadicFeed {
    pub fn new(values: impl IntoIterator<Item = Cell>) -> Self {
        VariadicFeed {
            pending: values.into_iter().collect(),
        }
    }

    fn next(&mut self) -> Option<Cell> {
        self.pending.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// spec §4.5: "`source`: an array+index or a C variadic pointer."
pub enum Feed {
    Array { series: crate::ids::SeriesId, index: usize },
    Variadic(VariadicFeed),
}

impl Feed {
    pub fn is_at_end(&self, arena: &SeriesArena) -> Result<bool, RuntimeError> {
        match self {
            Feed::Array { series, index } => Ok(*index >= arena.get(*series)?.len()),
            Feed::Variadic(v) => Ok(v.is_empty()),
        }
    }

    /// spec §4.5.2: "When such a frame needs to produce an error
    /// referring to source position, or needs to GC-protect any unread
    /// values, it reifies the remaining feed into a managed array and
    /// switches mode."
    pub fn reify(&mut self, arena: &mut SeriesArena) -> Result<(), RuntimeError> {
        if let Feed::Variadic(v) = self {
            let mut cells = Vec::new();
            while let Some(c) = v.next() {
                cells.push(c);
            }
            let series = arena.create(crate::series::SeriesData::Cells(cells));
            arena.make_managed(series)?;
            *self = Feed::Array { series, index: 0 };
        }
        Ok(())
    }
}

/// spec §4.5: "fast dispatch tag distinguishing function, lookback-
/// function, inert, bar, word, set-word, get-word, lit-word, group, path,
/// set-path, get-path, lit-path." `Function`/`LookbackFunction` are
/// resolved dynamically from a bound word's value, not from `Kind` alone —
/// everything else comes straight out of [`base_eval_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalType {
    Inert,
    Bar,
    LitBar,
    Word,
    SetWord,
    GetWord,
    LitWord,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
}

/// spec §4.5: "Dispatch table: for each kind, the table gives either
/// INERT (emit value as-is) or an eval_type. The table is indexed
/// directly by kind byte for branch-predictor-friendly speed." `Kind`'s
/// discriminant already gives us that O(1) indexing property (spec §9);
/// this match compiles to the same jump table spec asks for.
pub fn base_eval_type(kind: Kind) -> EvalType {
    match kind {
        Kind::Bar => EvalType::Bar,
        Kind::LitBar => EvalType::LitBar,
        Kind::Word | Kind::Issue => EvalType::Word,
        Kind::SetWord => EvalType::SetWord,
        Kind::GetWord => EvalType::GetWord,
        Kind::LitWord | Kind::Refinement => EvalType::LitWord,
        Kind::Group => EvalType::Group,
        Kind::Path => EvalType::Path,
        Kind::SetPath => EvalType::SetPath,
        Kind::GetPath => EvalType::GetPath,
        Kind::LitPath => EvalType::LitPath,
        _ => EvalType::Inert,
    }
}

/// One evaluator call frame (spec §4.5). Lives on the Rust stack; `id`
/// identifies it in `Interpreter::frames` for reification liveness checks
/// (spec §3.4).
pub struct Frame {
    pub feed: Feed,
    pub specifier: ContextId,
    pub out: Cell,
    pub cell: Cell,
    pub gotten: Option<Cell>,
    pub pending: Option<Cell>,
    pub id: FrameId,
}

impl Frame {
    pub fn new(feed: Feed, specifier: ContextId, id: FrameId) -> Self {
        Frame {
            feed,
            specifier,
            out: Cell::void(),
            cell: Cell::end(),
            gotten: None,
            pending: None,
            id,
        }
    }

    /// spec §4.5.1 EVAL instruction: "the evaluator writes the value into
    /// `cell`, sets `pending` to point at it, and the next fetch returns
    /// `cell` while advancing `pending` to null."
    pub fn inject(&mut self, value: Cell) {
        self.cell = value;
        self.pending = Some(self.cell);
    }

    /// Fetch the next raw cell from the feed without advancing past it —
    /// `crate::eval` calls `advance` separately once it's decided how much
    /// of the feed this step consumes.
    pub fn peek(&self, arena: &SeriesArena) -> Result<Cell, RuntimeError> {
        if let Some(pending) = self.pending {
            return Ok(pending);
        }
        match &self.feed {
            Feed::Array { series, index } => {
                let s = arena.get(*series)?;
                Ok(s.cells()?.get(*index).copied().unwrap_or_else(Cell::end))
            }
            Feed::Variadic(v) => Ok(v.pending.front().copied().unwrap_or_else(Cell::end)),
        }
    }

    /// Advance the feed cursor past the cell `peek` last returned.
    pub fn advance(&mut self) -> Result<(), RuntimeError> {
        if self.pending.take().is_some() {
            return Ok(());
        }
        match &mut self.feed {
            Feed::Array { index, .. } => {
                *index += 1;
                Ok(())
            }
            Feed::Variadic(v) => {
                v.next();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Immediate, Payload};

    fn int(n: i64) -> Cell {
        Cell::new(Payload::Immediate(Immediate::Integer(n)))
    }

    #[test]
    fn base_eval_type_maps_inert_kinds_to_inert() {
        assert_eq!(base_eval_type(Kind::Integer), EvalType::Inert);
        assert_eq!(base_eval_type(Kind::Block), EvalType::Inert);
    }

    #[test]
    fn base_eval_type_maps_evaluable_kinds() {
        assert_eq!(base_eval_type(Kind::Word), EvalType::Word);
        assert_eq!(base_eval_type(Kind::SetWord), EvalType::SetWord);
        assert_eq!(base_eval_type(Kind::Group), EvalType::Group);
        assert_eq!(base_eval_type(Kind::Path), EvalType::Path);
    }

    #[test]
    fn inject_is_consumed_exactly_once() {
        let mut arena = SeriesArena::new();
        let series = arena.create(crate::series::SeriesData::Cells(vec![int(1)]));
        let ctx = crate::context::allocate(&mut arena, crate::cell::ContextKind::Object, &[], &[]).unwrap();
        let mut frame = Frame::new(Feed::Array { series, index: 0 }, ctx, FrameId(0));

        frame.inject(int(99));
        assert_eq!(frame.peek(&arena).unwrap(), int(99));
        frame.advance().unwrap();
        assert_eq!(frame.peek(&arena).unwrap(), int(1));
    }

    #[test]
    fn variadic_feed_reifies_into_managed_array() {
        let mut arena = SeriesArena::new();
        let ctx = crate::context::allocate(&mut arena, crate::cell::ContextKind::Object, &[], &[]).unwrap();
        let mut frame = Frame::new(
            Feed::Variadic(VariadicFeed::new([int(1), int(2)])),
            ctx,
            FrameId(0),
        );
        frame.feed.reify(&mut arena).unwrap();
        match &frame.feed {
            Feed::Array { series, index } => {
                assert_eq!(*index, 0);
                assert!(arena.is_managed(*series).unwrap());
                assert_eq!(arena.get(*series).unwrap().len(), 2);
            }
            Feed::Variadic(_) => panic!("expected reification to switch to Array"),
        }
    }
}
