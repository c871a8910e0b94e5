//! Functions and their paramlists (spec §3.5).
//!
//! A function's identity is its paramlist's `SeriesId` (see
//! `crate::ids`); this module only adds the parameter-class metadata and
//! dispatcher table that sit on top of a plain array series.

use std::collections::HashMap;
use std::rc::Rc;

use relic_core::{RuntimeError, SymbolId};

use crate::cell::{Cell, Kind, Payload};
use crate::ids::{ContextId, FunctionId};
use crate::interpreter::Interpreter;
use crate::throw::DoOutcome;

/// spec §4.4 point 3: the parameter classes the arg-walk distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    Normal,
    HardQuoted,
    SoftQuoted,
    Refinement,
    PureLocal,
    Return,
    Leave,
    Variadic,
}

impl ParamClass {
    /// Pure-local/return/leave parameters are never fulfilled from the
    /// source feed (spec §4.4 point 3).
    pub fn is_local(self) -> bool {
        matches!(
            self,
            ParamClass::PureLocal | ParamClass::Return | ParamClass::Leave
        )
    }
}

/// One entry of a paramlist (spec §3.4 keylist: "symbol id plus
/// allowed-type bitset plus per-key flags", specialized here to the
/// function case by also carrying the parameter class).
#[derive(Debug, Clone)]
pub struct Param {
    pub symbol: SymbolId,
    pub class: ParamClass,
    /// Allowed-type bitset; `None` means "accepts anything" (spec §3.4's
    /// typeset key, not yet narrowed down to 64 flags since `Kind` has 48
    /// variants and is still growing room — see `crate::cell::Kind`).
    pub typeset: Option<u64>,
    pub hidden: bool,
}

/// Opaque identifier for a registered dispatcher (spec §3.3 `misc`:
/// "the dispatcher function pointer" on a body array's series header).
/// A plain integer index into `DispatchTable` rather than a raw function
/// pointer, so a body array's `SeriesMisc::Dispatcher` can be `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatcherId(pub(crate) u32);

/// A native's body: given the interpreter and the reified argument context
/// for this call (spec §3.4 "frame context"), produce the outcome. Native
/// closures read their arguments out of `arg_ctx` via `crate::context`,
/// rather than through a `Frame`'s feed — they have no source text left to
/// read, every argument was already gathered by the time a native runs.
///
/// `Rc` rather than `Box` so `crate::eval::dispatch_body` can clone the
/// closure out of `DispatchTable` before calling it — the table is reached
/// through `&interp.dispatch`, and invoking the closure needs `&mut
/// Interpreter`, which a borrow held on one of its fields would forbid.
pub type NativeFn = dyn Fn(&mut Interpreter, ContextId) -> DoOutcome;

/// The calling convention a body array's dispatcher implements (spec
/// §3.5): "plain interpreted body, type-action, native, specializer
/// (body[0] is an exemplar frame), adapter (prelude + inner), chainer
/// (pipeline), routine (FFI), hijacker."
///
/// `Routine` (FFI) carries no payload here: FFI/struct-bridge machinery is
/// out of scope (spec §1 Non-goals) so this variant exists only so a
/// `Kind::Routine` function cell has somewhere to point; invoking one
/// unconditionally fails.
pub enum Dispatcher {
    Plain { body: crate::ids::SeriesId },
    Native(Rc<NativeFn>),
    Specializer { exemplar: FunctionId },
    Adapter { prelude: crate::ids::SeriesId, inner: FunctionId },
    Chainer { pipeline: Vec<FunctionId> },
    Routine,
    Hijacker { target: FunctionId },
    /// Type-action dispatch (spec §3.5): one native per `Kind` it handles,
    /// selected by the first non-local argument's concrete type (e.g.
    /// `APPEND` runs a different native for a block than for a string).
    /// Fails with a script error if that argument is void/untyped or no
    /// arm matches its kind.
    Action(Vec<(Kind, Rc<NativeFn>)>),
}

/// Registry of dispatchers, owned by the `Interpreter` (spec §9: no
/// process-wide statics). `DispatcherId`s index into it.
#[derive(Default)]
pub struct DispatchTable {
    entries: Vec<Dispatcher>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dispatcher: Dispatcher) -> DispatcherId {
        let id = DispatcherId(self.entries.len() as u32);
        self.entries.push(dispatcher);
        id
    }

    pub fn get(&self, id: DispatcherId) -> Result<&Dispatcher, RuntimeError> {
        self.entries
            .get(id.0 as usize)
            .ok_or_else(|| RuntimeError::access("dispatcher handle is invalid"))
    }
}

/// A function's parameter-class metadata plus its dispatcher (spec §3.5).
/// The paramlist series itself (a plain array of typeset cells, spec
/// §3.4/§3.5) stays the GC-visible, type-checkable source of truth;
/// `Param::class` lives here because `Payload::Typeset` has no room for it.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub params: Vec<Param>,
    pub dispatcher: DispatcherId,
}

/// Side table keyed by `FunctionId` (= paramlist `SeriesId`), owned by the
/// `Interpreter` alongside `DispatchTable` (spec §9: no process-wide
/// statics).
#[derive(Default)]
pub struct FunctionTable {
    defs: HashMap<FunctionId, FunctionDef>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FunctionId) -> Result<&FunctionDef, RuntimeError> {
        self.defs
            .get(&id)
            .ok_or_else(|| RuntimeError::access("function handle is invalid"))
    }

    pub fn insert(&mut self, id: FunctionId, def: FunctionDef) {
        self.defs.insert(id, def);
    }
}

/// spec §4.4: allocate a function's paramlist (a literal array of typeset
/// cells, slot 0 reserved for the function's own self-reference cell) and
/// register its parameter classes and dispatcher. Returns the paramlist's
/// `SeriesId`, which doubles as the function's `FunctionId`.
pub fn make_function(
    arena: &mut crate::series::SeriesArena,
    functions: &mut FunctionTable,
    dispatch: &mut DispatchTable,
    params: Vec<Param>,
    dispatcher: Dispatcher,
) -> Result<FunctionId, RuntimeError> {
    let mut cells = Vec::with_capacity(params.len() + 1);
    cells.push(Cell::end());
    for p in &params {
        cells.push(Cell::new(Payload::Typeset(crate::cell::TypesetPayload {
            symbol: Some(p.symbol),
            bits: p.typeset.unwrap_or(!0),
        })));
    }
    let mut series = crate::series::new_cell_series(cells);
    series.flags.insert(crate::series::SeriesFlags::IS_PARAMLIST);
    let paramlist_id = arena.adopt(series);

    let dispatcher_id = dispatch.register(dispatcher);
    arena.get_mut(paramlist_id)?.misc = crate::series::SeriesMisc::Dispatcher(dispatcher_id);

    functions.insert(
        paramlist_id,
        FunctionDef {
            params,
            dispatcher: dispatcher_id,
        },
    );
    Ok(paramlist_id)
}
