//! Shared helpers for the boundary-scenario integration tests (spec §8).
//! Builds cells and blocks by hand, the way a host embedding this crate
//! would before a real scanner/loader exists (out of scope per spec §1's
//! Non-goals) — nothing here drives a text reader.

use relic_runtime::cell::{
    BindingTarget, FunctionKind, FunctionPayload, Immediate, SeriesKind, SeriesPayload, WordKind,
    WordPayload,
};
use relic_runtime::context::{self, Key, KeyFlags};
use relic_runtime::function::{make_function, Dispatcher};
use relic_runtime::series::SeriesData;
use relic_runtime::{Cell, ContextId, FunctionId, Interpreter, NullHost, Param, ParamClass, Payload, SeriesId};

pub fn new_interp() -> Interpreter {
    Interpreter::new(Box::new(NullHost)).unwrap()
}

pub fn int(n: i64) -> Cell {
    Cell::new(Payload::Immediate(Immediate::Integer(n)))
}

pub fn as_int(c: &Cell) -> i64 {
    match c.payload() {
        Payload::Immediate(Immediate::Integer(n)) => *n,
        other => panic!("expected an integer, got {other:?}"),
    }
}

/// A plain word, bound specifically to `ctx`.
pub fn word(interp: &mut Interpreter, ctx: ContextId, kind: WordKind, name: &str) -> Cell {
    let symbol = interp.symbols.intern(name);
    Cell::new(Payload::Word(WordPayload {
        kind,
        binding: Some(BindingTarget::Specific(ctx)),
        cached_index: 0,
        symbol,
    }))
}

/// Declare a fresh variable in `ctx`, giving it an initial value. Mirrors
/// what a scanner binding a SET-WORD for the first time would do: the key
/// has to exist before `set_var`/`get_var` can touch it by index (spec
/// §4.3).
pub fn declare(interp: &mut Interpreter, ctx: ContextId, name: &str, initial: Cell) {
    let symbol = interp.symbols.intern(name);
    let key = Key { symbol, typeset: !0, flags: KeyFlags::empty() };
    context::append_key(&mut interp.series, ctx, key, initial, false).unwrap();
}

/// Build an unmanaged, then-managed `Cells` series and the `SeriesPayload`
/// block cell referencing it, end-terminated as every array is (spec §3.2).
pub fn block_series(interp: &mut Interpreter, mut cells: Vec<Cell>) -> SeriesId {
    cells.push(Cell::end());
    let id = interp.series.create(SeriesData::Cells(cells));
    interp.series.make_managed(id).unwrap();
    id
}

pub fn block_cell(interp: &mut Interpreter, cells: Vec<Cell>) -> Cell {
    let id = block_series(interp, cells);
    Cell::new(Payload::Series(SeriesPayload {
        kind: SeriesKind::Block,
        series: id,
        index: 0,
        binding: None,
    }))
}

pub fn block_cell_of(series: SeriesId) -> Cell {
    Cell::new(Payload::Series(SeriesPayload {
        kind: SeriesKind::Block,
        series,
        index: 0,
        binding: None,
    }))
}

/// A path cell over a sequence of bare word segments (spec §3.1.2 "ANY-PATH!
/// stores a reference to a series of word/get-word/etc cells").
pub fn path_cell(interp: &mut Interpreter, ctx: ContextId, segment_names: &[&str]) -> Cell {
    let segs: Vec<Cell> = segment_names
        .iter()
        .map(|n| word(interp, ctx, WordKind::Word, n))
        .collect();
    let id = block_series(interp, segs);
    Cell::new(Payload::Series(SeriesPayload {
        kind: SeriesKind::Path,
        series: id,
        index: 0,
        binding: None,
    }))
}

/// Declare a native function as a variable in `ctx`, returning its
/// `FunctionId` (== paramlist `SeriesId`, spec §3.5).
pub fn declare_native(
    interp: &mut Interpreter,
    ctx: ContextId,
    name: &str,
    params: Vec<(&str, ParamClass)>,
    enfix: bool,
    native: impl Fn(&mut Interpreter, ContextId) -> relic_runtime::DoOutcome + 'static,
) -> FunctionId {
    let params: Vec<Param> = params
        .into_iter()
        .map(|(n, class)| Param {
            symbol: interp.symbols.intern(n),
            class,
            typeset: None,
            hidden: false,
        })
        .collect();

    let fid = make_function(
        &mut interp.series,
        &mut interp.functions,
        &mut interp.dispatch,
        params,
        Dispatcher::Native(std::rc::Rc::new(native)),
    )
    .unwrap();

    let func_cell = Cell::new(Payload::Func(FunctionPayload {
        kind: FunctionKind::Function,
        paramlist: fid,
        body: fid,
        exit_from: None,
        enfix,
    }));
    declare(interp, ctx, name, func_cell);
    fid
}

/// Positional param slots of an already-reified call context start at 1
/// (slot 0 is the context's own self-cell, spec §3.4) — read the `n`th
/// declared parameter (1-based).
pub fn arg(interp: &Interpreter, ctx: ContextId, n: usize) -> Cell {
    context::get_var(&interp.series, ctx, n).unwrap()
}
