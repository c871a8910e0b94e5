//! `Do_Core` (spec §4.5): the evaluator step loop, argument fulfillment
//! (spec §4.4), and word/path/group handling (spec §4.1, §4.3).
//!
//! Two entry points drive the loop: [`do_next`] evaluates one full
//! expression, including any enfix operator it chains into on its right;
//! [`do_single`] evaluates exactly one step and stops there. The split
//! exists for one reason (spec §4.5's worked boundary case `1 + 2 * 3` =
//! `9`, left-to-right): an enfix operator's own right-hand argument must be
//! gathered with `do_single`, or it would itself chain into the next enfix
//! operator and associate right-to-left instead. A prefix function's
//! ordinary arguments are gathered with `do_next`, which does chase enfix
//! (so `print 1 + 2` still prints `3`).

use std::rc::Rc;

use relic_core::{RuntimeError, SymbolId};

use crate::cell::{
    BindingTarget, Cell, FunctionPayload, Immediate, Kind, Payload, SeriesKind, VarargsPayload,
    WordKind, WordPayload,
};
use crate::context;
use crate::frame::{base_eval_type, EvalType, Feed, Frame};
use crate::function::{Dispatcher, FunctionDef, NativeFn, Param, ParamClass};
use crate::ids::{ContextId, FrameId, FunctionId, SeriesId};
use crate::interpreter::Interpreter;
use crate::throw::{catch_function_return, DoOutcome, TrapGuard};

/// Resolve a word's binding to a concrete context (spec §3.1.3,
/// redesigned per spec §9). A `Relative` binding resolves against
/// whichever context is the active call's specifier — this crate does not
/// implement full `derelativize`-on-read tracking through intermediate
/// frames; a word only ever gets evaluated while some call's specifier is
/// live, and that's the context a relative binding means (see DESIGN.md).
fn resolve_ctx(w: &WordPayload, specifier: ContextId) -> Result<ContextId, RuntimeError> {
    match w.binding {
        Some(BindingTarget::Specific(ctx)) => Ok(ctx),
        Some(BindingTarget::Relative(_)) => Ok(specifier),
        None => Err(RuntimeError::script("word is unbound")),
    }
}

fn word_index(interp: &Interpreter, w: &WordPayload, ctx: ContextId) -> Result<usize, RuntimeError> {
    context::index_of(&interp.series, &interp.symbols, ctx, w.symbol)?
        .ok_or_else(|| RuntimeError::script(format!("unbound word: {}", interp.symbols.text(w.symbol))))
}

pub(crate) fn get_word_value(
    interp: &Interpreter,
    w: &WordPayload,
    specifier: ContextId,
) -> Result<Cell, RuntimeError> {
    let ctx = resolve_ctx(w, specifier)?;
    let idx = word_index(interp, w, ctx)?;
    context::get_var(&interp.series, ctx, idx)
}

fn set_word_value(
    interp: &mut Interpreter,
    w: &WordPayload,
    specifier: ContextId,
    value: Cell,
) -> Result<(), RuntimeError> {
    let ctx = resolve_ctx(w, specifier)?;
    let idx = word_index(interp, w, ctx)?;
    context::set_var(&mut interp.series, ctx, idx, value)
}

fn as_word(cell: &Cell) -> Option<WordPayload> {
    match cell.payload() {
        Payload::Word(w) => Some(*w),
        _ => None,
    }
}

/// Evaluate exactly one step of the feed: a literal, a word lookup (which
/// may itself be a prefix function call consuming further feed), a
/// set/get/lit-word, a group, or a path. Never chases a trailing enfix
/// operator — see the module doc comment.
pub fn do_single(interp: &mut Interpreter, frame: &mut Frame) -> DoOutcome {
    eval_step(interp, frame)
}

/// Evaluate one full expression: a `do_single` step, then greedily chain
/// into any enfix operator immediately following (spec §4.5).
pub fn do_next(interp: &mut Interpreter, frame: &mut Frame) -> DoOutcome {
    let mut lhs = match eval_step(interp, frame) {
        DoOutcome::Value(v) => v,
        other => return other,
    };

    loop {
        if interp.halt_requested() || interp.host.halt_requested() {
            return DoOutcome::Thrown(crate::throw::Thrown {
                label: crate::throw::ThrowLabel::Halt,
                value: Cell::void(),
            });
        }

        let next = match frame.peek(&interp.series) {
            Ok(c) => c,
            Err(e) => return DoOutcome::Fatal(e),
        };
        if next.is_end() {
            return DoOutcome::Value(lhs);
        }
        if matches!(next.kind(), Some(Kind::Bar) | Some(Kind::LitBar)) {
            return DoOutcome::Value(lhs);
        }

        let enfix = match as_word(&next) {
            Some(w) => match get_word_value(interp, &w, frame.specifier) {
                Ok(v) => match v.payload() {
                    Payload::Func(f) if f.enfix => Some(*f),
                    _ => None,
                },
                Err(e) => return DoOutcome::Fatal(e),
            },
            None => None,
        };
        let func = match enfix {
            Some(f) => f,
            None => return DoOutcome::Value(lhs),
        };

        if let Err(e) = frame.advance() {
            return DoOutcome::Fatal(e);
        }
        match call_function(interp, frame, func, Some(lhs), true, &[]) {
            DoOutcome::Value(v) => lhs = v,
            other => return other,
        }
    }
}

fn eval_step(interp: &mut Interpreter, frame: &mut Frame) -> DoOutcome {
    let _span = tracing::trace_span!("do_core_step", frame = ?frame.id).entered();
    let cell = match frame.peek(&interp.series) {
        Ok(c) => c,
        Err(e) => return DoOutcome::Fatal(e),
    };
    if cell.is_end() {
        return DoOutcome::Value(Cell::void());
    }
    let kind = match cell.kind() {
        Some(k) => k,
        None => return DoOutcome::Value(cell),
    };

    match base_eval_type(kind) {
        EvalType::Inert => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            DoOutcome::Value(cell)
        }
        EvalType::Bar => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            DoOutcome::Value(Cell::void())
        }
        EvalType::LitBar => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            DoOutcome::Value(Cell::new(Payload::Immediate(Immediate::Bar)))
        }
        EvalType::Word => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            if kind == Kind::Issue {
                return DoOutcome::Value(cell);
            }
            let w = as_word(&cell).expect("base_eval_type(Word) implies a Word payload");
            eval_word(interp, frame, &w)
        }
        EvalType::SetWord => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            let w = as_word(&cell).expect("base_eval_type(SetWord) implies a Word payload");
            let value = match do_next(interp, frame) {
                DoOutcome::Value(v) => v,
                other => return other,
            };
            if let Err(e) = set_word_value(interp, &w, frame.specifier, value) {
                return DoOutcome::Fatal(e);
            }
            DoOutcome::Value(value)
        }
        EvalType::GetWord => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            let w = as_word(&cell).expect("base_eval_type(GetWord) implies a Word payload");
            match get_word_value(interp, &w, frame.specifier) {
                Ok(v) => DoOutcome::Value(v),
                Err(e) => DoOutcome::Fatal(e),
            }
        }
        EvalType::LitWord => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            if kind == Kind::Refinement {
                return DoOutcome::Value(cell);
            }
            let w = as_word(&cell).expect("base_eval_type(LitWord) implies a Word payload");
            DoOutcome::Value(Cell::new(Payload::Word(WordPayload {
                kind: WordKind::Word,
                ..w
            })))
        }
        EvalType::Group => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            let s = match cell.payload() {
                Payload::Series(s) => *s,
                _ => return DoOutcome::Fatal(RuntimeError::script("expected a group payload")),
            };
            run_block_from(interp, s.series, s.index as usize, frame.specifier)
        }
        eval_type @ (EvalType::Path | EvalType::SetPath | EvalType::GetPath | EvalType::LitPath) => {
            if let Err(e) = frame.advance() {
                return DoOutcome::Fatal(e);
            }
            eval_path(interp, frame, &cell, eval_type)
        }
    }
}

fn eval_word(interp: &mut Interpreter, frame: &mut Frame, w: &WordPayload) -> DoOutcome {
    let value = match get_word_value(interp, w, frame.specifier) {
        Ok(v) => v,
        Err(e) => return DoOutcome::Fatal(e),
    };
    if let Payload::Func(f) = value.payload() {
        if f.enfix {
            return DoOutcome::Fatal(RuntimeError::script(
                "enfix function called without a left-hand argument",
            ));
        }
        return call_function(interp, frame, *f, None, false, &[]);
    }
    DoOutcome::Value(value)
}

fn segment_word(cell: &Cell) -> Result<WordPayload, RuntimeError> {
    as_word(cell).ok_or_else(|| RuntimeError::script("path segment must be a word"))
}

fn step_into_context(interp: &Interpreter, current: &Cell, w: &WordPayload) -> Result<Cell, RuntimeError> {
    let ctx = match current.payload() {
        Payload::Context(c) => c.varlist,
        _ => return Err(RuntimeError::script("path segment: value is not a context")),
    };
    let idx = context::index_of(&interp.series, &interp.symbols, ctx, w.symbol)?
        .ok_or_else(|| RuntimeError::script("no such field in context"))?;
    context::get_var(&interp.series, ctx, idx)
}

/// Walk a value path's trailing word segments as repeated object-field
/// reads, simplification documented in DESIGN.md: only word segments are
/// supported (no integer/string indexing into general series).
fn walk_value_path(interp: &Interpreter, base: &Cell, rest: &[Cell]) -> Result<Cell, RuntimeError> {
    let mut current = *base;
    for seg in rest {
        let w = segment_word(seg)?;
        current = step_into_context(interp, &current, &w)?;
    }
    Ok(current)
}

fn eval_path(interp: &mut Interpreter, frame: &mut Frame, cell: &Cell, eval_type: EvalType) -> DoOutcome {
    let s = match cell.payload() {
        Payload::Series(s) => *s,
        _ => return DoOutcome::Fatal(RuntimeError::script("expected a path payload")),
    };

    if eval_type == EvalType::LitPath {
        let mut lit = s;
        lit.kind = SeriesKind::Path;
        return DoOutcome::Value(Cell::new(Payload::Series(lit)));
    }

    let segs: Vec<Cell> = match interp.series.get(s.series).and_then(|ser| ser.cells().map(|c| c.to_vec())) {
        Ok(cells) => cells[(s.index as usize)..].to_vec(),
        Err(e) => return DoOutcome::Fatal(e),
    };
    if segs.is_empty() {
        return DoOutcome::Fatal(RuntimeError::script("path has no segments"));
    }
    let first = match segment_word(&segs[0]) {
        Ok(w) => w,
        Err(e) => return DoOutcome::Fatal(e),
    };
    let specifier = frame.specifier;
    let base = match get_word_value(interp, &first, specifier) {
        Ok(v) => v,
        Err(e) => return DoOutcome::Fatal(e),
    };

    match eval_type {
        EvalType::GetPath => match walk_value_path(interp, &base, &segs[1..]) {
            Ok(v) => DoOutcome::Value(v),
            Err(e) => DoOutcome::Fatal(e),
        },
        EvalType::Path => {
            if let Payload::Func(f) = base.payload() {
                let mut refinements: Vec<SymbolId> = Vec::with_capacity(segs.len() - 1);
                for seg in &segs[1..] {
                    match segment_word(seg) {
                        Ok(w) => refinements.push(w.symbol),
                        Err(e) => return DoOutcome::Fatal(e),
                    }
                }
                call_function(interp, frame, *f, None, false, &refinements)
            } else {
                match walk_value_path(interp, &base, &segs[1..]) {
                    Ok(v) => DoOutcome::Value(v),
                    Err(e) => DoOutcome::Fatal(e),
                }
            }
        }
        EvalType::SetPath => {
            if segs.len() < 2 {
                return DoOutcome::Fatal(RuntimeError::script(
                    "set-path needs at least one field segment",
                ));
            }
            let mut current = base;
            for seg in &segs[1..segs.len() - 1] {
                let w = match segment_word(seg) {
                    Ok(w) => w,
                    Err(e) => return DoOutcome::Fatal(e),
                };
                current = match step_into_context(interp, &current, &w) {
                    Ok(v) => v,
                    Err(e) => return DoOutcome::Fatal(e),
                };
            }
            let ctx = match current.payload() {
                Payload::Context(c) => c.varlist,
                _ => return DoOutcome::Fatal(RuntimeError::script("set-path target is not a context")),
            };
            let last = match segment_word(&segs[segs.len() - 1]) {
                Ok(w) => w,
                Err(e) => return DoOutcome::Fatal(e),
            };
            let index = match context::index_of(&interp.series, &interp.symbols, ctx, last.symbol) {
                Ok(Some(i)) => i,
                Ok(None) => return DoOutcome::Fatal(RuntimeError::script("no such field")),
                Err(e) => return DoOutcome::Fatal(e),
            };
            let value = match do_next(interp, frame) {
                DoOutcome::Value(v) => v,
                other => return other,
            };
            if let Err(e) = context::set_var(&mut interp.series, ctx, index, value) {
                return DoOutcome::Fatal(e);
            }
            DoOutcome::Value(value)
        }
        EvalType::LitPath => unreachable!("handled above"),
        _ => DoOutcome::Fatal(RuntimeError::script("not a path eval type")),
    }
}

/// spec §4.4: classify a paramlist's non-local entries into the leading
/// (pre-first-refinement) run and the refinement segments that follow it,
/// each segment owning the sub-params declared after its own refinement
/// word up to the next one.
struct ParamLayout {
    leading: Vec<usize>,
    segments: Vec<(usize, SymbolId, Vec<usize>)>,
}

fn layout_params(def: &FunctionDef) -> ParamLayout {
    let mut leading = Vec::new();
    let mut segments: Vec<(usize, SymbolId, Vec<usize>)> = Vec::new();
    for (idx, p) in def.params.iter().enumerate() {
        if p.class.is_local() {
            continue;
        }
        if p.class == ParamClass::Refinement {
            segments.push((idx, p.symbol, Vec::new()));
        } else if let Some(seg) = segments.last_mut() {
            seg.2.push(idx);
        } else {
            leading.push(idx);
        }
    }
    ParamLayout { leading, segments }
}

/// spec §4.4 point 3: fulfill one non-local, non-refinement argument slot
/// according to its parameter class.
fn fulfill_arg(interp: &mut Interpreter, frame: &mut Frame, class: ParamClass, use_single: bool) -> DoOutcome {
    match class {
        ParamClass::HardQuoted => take_raw(interp, frame),
        ParamClass::SoftQuoted => {
            let raw = match frame.peek(&interp.series) {
                Ok(c) => c,
                Err(e) => return DoOutcome::Fatal(e),
            };
            match raw.kind() {
                Some(Kind::Group) | Some(Kind::GetWord) | Some(Kind::GetPath) => {
                    if use_single {
                        do_single(interp, frame)
                    } else {
                        do_next(interp, frame)
                    }
                }
                _ => take_raw(interp, frame),
            }
        }
        ParamClass::Variadic => gather_varargs(interp, frame),
        _ if use_single => do_single(interp, frame),
        _ => do_next(interp, frame),
    }
}

/// Copy the next feed cell literally, without evaluating it (spec §4.4
/// point 3: "hard-quoted: copies the next source cell literally").
fn take_raw(interp: &mut Interpreter, frame: &mut Frame) -> DoOutcome {
    let raw = match frame.peek(&interp.series) {
        Ok(c) => c,
        Err(e) => return DoOutcome::Fatal(e),
    };
    if raw.is_end() {
        return DoOutcome::Fatal(RuntimeError::script("quoted parameter has nothing to take"));
    }
    if let Err(e) = frame.advance() {
        return DoOutcome::Fatal(e);
    }
    DoOutcome::Value(raw)
}

/// spec §4.4 point 3: "variadic: stores a varargs cell that holds a
/// reference to this frame; callee later pulls from the feed on demand."
/// This crate eagerly reifies the remainder of the feed (stopping at the
/// next bar, if any, the same expression boundary `run_block_from` stops
/// at) into a managed block rather than holding a live pointer into a
/// frame that may outlive the call — mirrors `Feed::reify`'s own
/// array/variadic boundary (see [`VarargsPayload`]'s doc comment).
fn gather_varargs(interp: &mut Interpreter, frame: &mut Frame) -> DoOutcome {
    let mut cells = Vec::new();
    loop {
        match frame.feed.is_at_end(&interp.series) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => return DoOutcome::Fatal(e),
        }
        let raw = match frame.peek(&interp.series) {
            Ok(c) => c,
            Err(e) => return DoOutcome::Fatal(e),
        };
        if matches!(raw.kind(), Some(Kind::Bar) | Some(Kind::LitBar)) {
            break;
        }
        if let Err(e) = frame.advance() {
            return DoOutcome::Fatal(e);
        }
        cells.push(raw);
    }
    let series = interp.series.create(crate::series::SeriesData::Cells(cells));
    if let Err(e) = interp.series.make_managed(series) {
        return DoOutcome::Fatal(e);
    }
    DoOutcome::Value(Cell::new(Payload::Varargs(VarargsPayload { frame: frame.id, series })))
}

/// spec §4.4 point 4: fail with a script error if `value`'s kind isn't in
/// `param`'s typeset. Untyped parameters (`typeset: None`) and void/kindless
/// values are exempt.
fn check_typeset(interp: &Interpreter, param: &Param, value: &Cell) -> Result<(), RuntimeError> {
    let mask = match param.typeset {
        Some(m) => m,
        None => return Ok(()),
    };
    let kind = match value.kind() {
        Some(k) => k,
        None => return Ok(()),
    };
    if mask & kind.bit() == 0 {
        let msg = format!("{}: arg of wrong type", interp.symbols.text(param.symbol));
        tracing::warn!(param = %interp.symbols.text(param.symbol), ?kind, "{msg}");
        return Err(RuntimeError::script(msg));
    }
    Ok(())
}

/// spec §4.4 points 1-4: fulfill every non-local argument slot of `def`
/// into the chunk `handle` names, in-place, checking each against its
/// parameter's typeset as it lands. Returns the filled slots as an owned
/// vec (the chunk itself is popped by the caller right after, per point
/// 6: "drops the chunk... once reified").
#[allow(clippy::too_many_arguments)]
fn gather_args(
    interp: &mut Interpreter,
    frame: &mut Frame,
    def: &FunctionDef,
    layout: &ParamLayout,
    mut lhs: Option<Cell>,
    use_single: bool,
    requested: &[SymbolId],
    chunk: relic_core::ChunkHandle,
) -> Result<Vec<Cell>, DoOutcome> {
    for idx in &layout.leading {
        let value = if let Some(v) = lhs.take() {
            v
        } else {
            match fulfill_arg(interp, frame, def.params[*idx].class, use_single) {
                DoOutcome::Value(v) => v,
                other => return Err(other),
            }
        };
        check_typeset(interp, &def.params[*idx], &value).map_err(DoOutcome::Fatal)?;
        interp.chunks.chunk_mut(chunk)[*idx] = value;
    }

    let mut activated = vec![false; layout.segments.len()];
    for req in requested {
        let pos = match layout
            .segments
            .iter()
            .position(|(_, sym, _)| interp.symbols.canon_eq(*sym, *req))
        {
            Some(p) => p,
            None => return Err(DoOutcome::Fatal(RuntimeError::script("function has no such refinement"))),
        };
        activated[pos] = true;
        let subargs = layout.segments[pos].2.clone();
        for idx in subargs {
            let value = match fulfill_arg(interp, frame, def.params[idx].class, use_single) {
                DoOutcome::Value(v) => v,
                other => return Err(other),
            };
            check_typeset(interp, &def.params[idx], &value).map_err(DoOutcome::Fatal)?;
            interp.chunks.chunk_mut(chunk)[idx] = value;
        }
    }
    for (i, (ref_idx, _, _)) in layout.segments.iter().enumerate() {
        interp.chunks.chunk_mut(chunk)[*ref_idx] = Cell::new(Payload::Immediate(Immediate::Logic(activated[i])));
    }

    Ok(interp.chunks.chunk(chunk).to_vec())
}

/// spec §4.4: fulfill a function call's arguments and dispatch its body.
///
/// `lhs`, when present, is an already-evaluated value an enfix call
/// supplies for the first leading parameter instead of reading one from
/// the feed. `use_single` selects `do_single` over `do_next` for every
/// argument this call still has to read from the feed — true for an
/// enfix call's own arguments (to preserve left-to-right associativity,
/// see the module doc comment), false for an ordinary prefix call.
/// `requested` is the refinement symbols named by a calling path, in the
/// order the caller wrote them (spec §4.4.1's out-of-order pickup: their
/// sub-arguments are read from the feed in this call order, not paramlist
/// declaration order).
fn call_function(
    interp: &mut Interpreter,
    frame: &mut Frame,
    func: FunctionPayload,
    lhs: Option<Cell>,
    use_single: bool,
    requested: &[SymbolId],
) -> DoOutcome {
    if interp.frames.depth() >= interp.config.max_frame_depth {
        tracing::error!("stack depth exceeded at frame depth {}", interp.frames.depth());
        return DoOutcome::Fatal(RuntimeError::script("stack depth exceeded"));
    }

    let paramlist = func.paramlist;
    let def = match interp.functions.get(paramlist) {
        Ok(d) => d.clone(),
        Err(e) => return DoOutcome::Fatal(e),
    };
    let layout = layout_params(&def);

    // Arguments are gathered into a chunk-stack allocation (spec §4.4
    // points 1 and 6), not a bare local vec, so a GC cycle triggered by a
    // nested call's own argument evaluation can still see in-progress
    // fulfillment through `Roots::chunk_cells`.
    let trap_depth_at_push = interp.chunks.depth();
    let chunk = interp.chunks.push_chunk(def.params.len());
    let args = match gather_args(interp, frame, &def, &layout, lhs, use_single, requested, chunk) {
        Ok(a) => a,
        Err(outcome) => {
            interp.chunks.pop_chunk(chunk);
            return outcome;
        }
    };
    interp.chunks.pop_chunk(chunk);

    let keys: Vec<context::Key> = def
        .params
        .iter()
        .map(|p| context::Key {
            symbol: p.symbol,
            typeset: p.typeset.unwrap_or(!0),
            flags: if p.hidden {
                context::KeyFlags::HIDDEN
            } else {
                context::KeyFlags::empty()
            },
        })
        .collect();

    let frame_id = interp.frames.enter();
    let arg_ctx = match context::reify_from_frame(&mut interp.series, frame_id, &keys, &args) {
        Ok(c) => c,
        Err(e) => {
            interp.frames.exit(frame_id);
            return DoOutcome::Fatal(e);
        }
    };
    // Reified frame contexts are GC-managed (spec §3.4/§4.7): once this
    // call's frame ends and nothing else references `arg_ctx`, the
    // collector reclaims it like any other unreferenced series.
    if let Err(e) = interp.series.make_managed(arg_ctx) {
        interp.frames.exit(frame_id);
        return DoOutcome::Fatal(e);
    }

    // Guards the dispatch call below (spec §4.6: "chunk stacks are
    // unwound to the level at trap-push time"). A backstop in practice —
    // every nested `call_function` invoked from within dispatch pops its
    // own chunk before returning, fatally or not — but real and armed,
    // not a theoretical one.
    let push_trap_span = tracing::trace_span!("push_trap", chunk_depth = trap_depth_at_push).entered();
    let mut trap = TrapGuard::new(trap_depth_at_push);
    let outcome = finish_call(interp, &def, arg_ctx, frame_id, paramlist);
    if let DoOutcome::Fatal(e) = &outcome {
        tracing::error!(error = %e, "fatal error propagating past push_trap scope");
        trap.unwind(&mut interp.chunks, &mut interp.series);
    }
    drop(push_trap_span);
    outcome
}

/// Forward an already-reified argument context into `def`'s dispatcher,
/// catching a RETURN/LEAVE throw targeted at `return_target`, then retire
/// the call's frame (spec §3.4: a frame-context is inaccessible once its
/// call ends). Shared by [`call_function`] and `crate::apply::apply`.
pub(crate) fn finish_call(
    interp: &mut Interpreter,
    def: &FunctionDef,
    arg_ctx: ContextId,
    frame_id: FrameId,
    return_target: FunctionId,
) -> DoOutcome {
    let outcome = dispatch_body(interp, def, arg_ctx, frame_id);
    let outcome = match outcome {
        DoOutcome::Thrown(t) => match catch_function_return(t, return_target) {
            Ok(v) => DoOutcome::Value(v),
            Err(t) => DoOutcome::Thrown(t),
        },
        other => other,
    };
    interp.frames.exit(frame_id);
    if let Err(e) = context::mark_frame_ended(&mut interp.series, arg_ctx) {
        return DoOutcome::Fatal(e);
    }
    outcome
}

enum DispatchKind {
    Native(Rc<NativeFn>),
    Plain(SeriesId),
    Specializer(FunctionId),
    Adapter(SeriesId, FunctionId),
    Chainer(Vec<FunctionId>),
    Hijacker(FunctionId),
    Routine,
    Action(Vec<(Kind, Rc<NativeFn>)>),
}

impl DispatchKind {
    fn label(&self) -> &'static str {
        match self {
            DispatchKind::Native(_) => "native",
            DispatchKind::Plain(_) => "plain",
            DispatchKind::Specializer(_) => "specializer",
            DispatchKind::Adapter(..) => "adapter",
            DispatchKind::Chainer(_) => "chainer",
            DispatchKind::Hijacker(_) => "hijacker",
            DispatchKind::Routine => "routine",
            DispatchKind::Action(_) => "action",
        }
    }
}

/// Run `def`'s body against `arg_ctx` (spec §3.5's dispatcher kinds).
/// Cloning the matched arm out of `DispatchTable` before dispatch releases
/// the borrow on `interp.dispatch`, since every arm below needs `&mut
/// Interpreter` to actually run.
pub(crate) fn dispatch_body(
    interp: &mut Interpreter,
    def: &FunctionDef,
    arg_ctx: ContextId,
    _frame_id: FrameId,
) -> DoOutcome {
    let kind = match interp.dispatch.get(def.dispatcher) {
        Ok(Dispatcher::Native(f)) => DispatchKind::Native(f.clone()),
        Ok(Dispatcher::Plain { body }) => DispatchKind::Plain(*body),
        Ok(Dispatcher::Specializer { exemplar }) => DispatchKind::Specializer(*exemplar),
        Ok(Dispatcher::Adapter { prelude, inner }) => DispatchKind::Adapter(*prelude, *inner),
        Ok(Dispatcher::Chainer { pipeline }) => DispatchKind::Chainer(pipeline.clone()),
        Ok(Dispatcher::Hijacker { target }) => DispatchKind::Hijacker(*target),
        Ok(Dispatcher::Routine) => DispatchKind::Routine,
        Ok(Dispatcher::Action(arms)) => DispatchKind::Action(arms.clone()),
        Err(e) => return DoOutcome::Fatal(e),
    };
    tracing::trace!(dispatch = kind.label(), "dispatching function body");

    match kind {
        DispatchKind::Native(f) => f(interp, arg_ctx),
        DispatchKind::Plain(body) => run_block(interp, body, arg_ctx),
        DispatchKind::Adapter(prelude, inner) => {
            match run_block(interp, prelude, arg_ctx) {
                DoOutcome::Value(_) => {}
                other => return other,
            }
            call_existing_function(interp, inner, arg_ctx)
        }
        DispatchKind::Specializer(exemplar) => call_existing_function(interp, exemplar, arg_ctx),
        DispatchKind::Hijacker(target) => call_existing_function(interp, target, arg_ctx),
        DispatchKind::Chainer(pipeline) => {
            let first = match interp.series.get(arg_ctx).and_then(|s| s.cells().map(|c| c.get(1).copied())) {
                Ok(Some(c)) => c,
                Ok(None) => Cell::void(),
                Err(e) => return DoOutcome::Fatal(e),
            };
            let mut current = first;
            for fid in pipeline {
                match crate::apply::apply(interp, fid, vec![current]) {
                    DoOutcome::Value(v) => current = v,
                    other => return other,
                }
            }
            DoOutcome::Value(current)
        }
        DispatchKind::Routine => DoOutcome::Fatal(RuntimeError::script("FFI routines are not supported")),
        DispatchKind::Action(arms) => {
            // Type-action dispatch (spec §3.5): select the arm matching
            // the first declared (non-local) argument's concrete kind,
            // mirroring how `Chainer` above reads the same varlist slot.
            let first = match interp.series.get(arg_ctx).and_then(|s| s.cells().map(|c| c.get(1).copied())) {
                Ok(Some(c)) => c,
                Ok(None) => Cell::void(),
                Err(e) => return DoOutcome::Fatal(e),
            };
            let kind = match first.kind() {
                Some(k) => k,
                None => {
                    return DoOutcome::Fatal(RuntimeError::script(
                        "action dispatch: first argument has no concrete type",
                    ))
                }
            };
            match arms.iter().find(|(k, _)| *k == kind) {
                Some((_, f)) => f(interp, arg_ctx),
                None => DoOutcome::Fatal(RuntimeError::script(format!(
                    "action dispatch: no arm handles {kind:?}!"
                ))),
            }
        }
    }
}

/// Forward an already-built argument context to another function's
/// dispatcher (used by `Specializer`/`Adapter`/`Hijacker`, which all reuse
/// the calling function's frame rather than building their own). This
/// assumes the forwarded-to function's paramlist shape is compatible with
/// `arg_ctx`'s keylist — true by construction for every one of this
/// crate's own dispatcher-composition helpers, but not a general
/// reshaping; see DESIGN.md.
fn call_existing_function(interp: &mut Interpreter, target: FunctionId, arg_ctx: ContextId) -> DoOutcome {
    let def = match interp.functions.get(target) {
        Ok(d) => d.clone(),
        Err(e) => return DoOutcome::Fatal(e),
    };
    let frame_id = interp.frames.enter();
    let outcome = dispatch_body(interp, &def, arg_ctx, frame_id);
    interp.frames.exit(frame_id);
    outcome
}

/// Evaluate every expression in `series[start..]`, in order, returning the
/// last value produced (void if the range is empty). A standalone `|`
/// between expressions is consumed as a separator, not an expression of
/// its own (spec §4.5's bar semantics).
pub(crate) fn run_block_from(
    interp: &mut Interpreter,
    series: SeriesId,
    start: usize,
    specifier: ContextId,
) -> DoOutcome {
    let frame_id = interp.frames.enter();
    let mut frame = Frame::new(Feed::Array { series, index: start }, specifier, frame_id);
    let mut result = Cell::void();

    loop {
        match frame.feed.is_at_end(&interp.series) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => {
                interp.frames.exit(frame_id);
                return DoOutcome::Fatal(e);
            }
        }
        match do_next(interp, &mut frame) {
            DoOutcome::Value(v) => result = v,
            other => {
                interp.frames.exit(frame_id);
                return other;
            }
        }
        match frame.peek(&interp.series) {
            Ok(c) if matches!(c.kind(), Some(Kind::Bar)) => {
                if let Err(e) = frame.advance() {
                    interp.frames.exit(frame_id);
                    return DoOutcome::Fatal(e);
                }
            }
            _ => {}
        }
    }

    interp.frames.exit(frame_id);
    DoOutcome::Value(result)
}

pub(crate) fn run_block(interp: &mut Interpreter, series: SeriesId, specifier: ContextId) -> DoOutcome {
    run_block_from(interp, series, 0, specifier)
}
