//! The tagged value cell (spec §3.1) and its 48-of-64-kind type system
//! (spec §3.1.1).
//!
//! The source material packs a `kind` byte directly into the header word
//! alongside the flag bits, and separately unions the payload across a
//! closed set of shapes that differ only per *category* of kind (immediate
//! scalars, series-like, word-like, context-like, function-like, datatype,
//! typeset — spec §3.1.2). Re-expressed as a tagged enum (spec §9: "map to
//! a tagged enum with explicit discriminant layout; the 64-kind cap is an
//! implementation detail, not a language feature"), the concrete `Kind` of
//! a cell is *derived* from which payload variant it holds (and, for the
//! categories with more than one kind sharing a payload shape, a small
//! sub-enum picked from the same closed set spec §3.1.2 describes) rather
//! than stored a second time in the header. `CellHeader` therefore only
//! carries the flag bits spec §3.1 actually needs a single branchless test
//! for — `kind` is not among them.

use crate::ids::{ContextId, FrameId, FunctionId, SeriesId};

// ============================================================================
// Kind
// ============================================================================

/// One of the 48 concrete datatypes in use (spec allows up to 64; the
/// unused range is headroom, not a language guarantee). Discriminants are
/// assigned in the same order spec §3.1.1 lists them in, which already
/// groups each `ANY-*!` category into a contiguous run — see
/// [`Kind::is_any_word`] etc.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Blank = 0,
    Bar,
    LitBar,
    Logic,
    Integer,
    Decimal,
    Percent,
    Money,
    Char,
    Pair,
    Tuple,
    Time,
    Date,
    Binary,
    // ANY-STRING! run
    Str,
    File,
    Email,
    Url,
    Tag,
    // end ANY-STRING!
    Bitset,
    Image,
    // ANY-ARRAY! run
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
    // end ANY-ARRAY!
    // ANY-WORD! run
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
    // end ANY-WORD!
    Issue,
    Datatype,
    Typeset,
    Map,
    // ANY-CONTEXT! run
    Object,
    Module,
    Error,
    Port,
    Frame,
    // end ANY-CONTEXT!
    Gob,
    Event,
    Handle,
    Struct,
    // ANY-FUNCTION! run
    Routine,
    Function,
    // end ANY-FUNCTION!
    Varargs,
}

impl Kind {
    pub fn is_any_string(self) -> bool {
        (Kind::Str..=Kind::Tag).contains(&self)
    }

    pub fn is_any_array(self) -> bool {
        (Kind::Block..=Kind::LitPath).contains(&self)
    }

    pub fn is_any_word(self) -> bool {
        (Kind::Word..=Kind::Refinement).contains(&self)
    }

    pub fn is_any_context(self) -> bool {
        (Kind::Object..=Kind::Frame).contains(&self)
    }

    pub fn is_any_function(self) -> bool {
        (Kind::Routine..=Kind::Function).contains(&self)
    }

    pub fn is_any_path(self) -> bool {
        matches!(
            self,
            Kind::Path | Kind::SetPath | Kind::GetPath | Kind::LitPath
        )
    }

    /// This kind's membership bit in a packed typeset (spec §3.1.2's
    /// typeset payload; [`context::pack_typeset`](crate::context::pack_typeset)
    /// packs the same 48 low bits, reserving the high 16 for `KeyFlags`).
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

// ============================================================================
// Binding target (spec §3.1.3, redesigned per spec §9)
// ============================================================================

/// The lookup scope a word or a relative array's cells resolve against.
///
/// `Relative` binding (spec §3.1.3: "the target is a function... to whose
/// body the cell textually belongs") becomes `Specific` once a
/// [`crate::frame::Specifier`] resolves it (spec §4.1 `derelativize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    Specific(ContextId),
    Relative(FunctionId),
}

impl BindingTarget {
    pub fn is_relative(&self) -> bool {
        matches!(self, BindingTarget::Relative(_))
    }
}

// ============================================================================
// Payload categories (spec §3.1.2)
// ============================================================================

/// Immediate scalars: bits stored inline, no series involved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    Blank,
    Bar,
    LitBar,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Percent(f64),
    Money(i64),
    Char(char),
    Pair(i32, i32),
    Tuple([u8; 12]),
    Time(i64),
    Date { ymd: i32, time: i64 },
    Handle(u64),
}

impl Immediate {
    fn kind(&self) -> Kind {
        match self {
            Immediate::Blank => Kind::Blank,
            Immediate::Bar => Kind::Bar,
            Immediate::LitBar => Kind::LitBar,
            Immediate::Logic(_) => Kind::Logic,
            Immediate::Integer(_) => Kind::Integer,
            Immediate::Decimal(_) => Kind::Decimal,
            Immediate::Percent(_) => Kind::Percent,
            Immediate::Money(_) => Kind::Money,
            Immediate::Char(_) => Kind::Char,
            Immediate::Pair(..) => Kind::Pair,
            Immediate::Tuple(_) => Kind::Tuple,
            Immediate::Time(_) => Kind::Time,
            Immediate::Date { .. } => Kind::Date,
            Immediate::Handle(_) => Kind::Handle,
        }
    }
}

/// The concrete kind of a series-backed value, shared across one payload
/// shape (spec §3.1.2: "series-like... store {series pointer, 0-based
/// index, binding target}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Binary,
    Str,
    File,
    Email,
    Url,
    Tag,
    Bitset,
    Image,
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
    Map,
}

impl SeriesKind {
    pub fn kind(self) -> Kind {
        match self {
            SeriesKind::Binary => Kind::Binary,
            SeriesKind::Str => Kind::Str,
            SeriesKind::File => Kind::File,
            SeriesKind::Email => Kind::Email,
            SeriesKind::Url => Kind::Url,
            SeriesKind::Tag => Kind::Tag,
            SeriesKind::Bitset => Kind::Bitset,
            SeriesKind::Image => Kind::Image,
            SeriesKind::Block => Kind::Block,
            SeriesKind::Group => Kind::Group,
            SeriesKind::Path => Kind::Path,
            SeriesKind::SetPath => Kind::SetPath,
            SeriesKind::GetPath => Kind::GetPath,
            SeriesKind::LitPath => Kind::LitPath,
            SeriesKind::Map => Kind::Map,
        }
    }

    pub fn is_array_like(self) -> bool {
        matches!(
            self,
            SeriesKind::Block
                | SeriesKind::Group
                | SeriesKind::Path
                | SeriesKind::SetPath
                | SeriesKind::GetPath
                | SeriesKind::LitPath
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPayload {
    pub kind: SeriesKind,
    pub series: SeriesId,
    pub index: u32,
    pub binding: Option<BindingTarget>,
}

/// The concrete kind of a word-like value (spec groups Issue in here too —
/// see DESIGN.md for the rationale: an issue behaves like an unbound,
/// un-evaluated symbol rather than a series).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
    Issue,
}

impl WordKind {
    pub fn kind(self) -> Kind {
        match self {
            WordKind::Word => Kind::Word,
            WordKind::SetWord => Kind::SetWord,
            WordKind::GetWord => Kind::GetWord,
            WordKind::LitWord => Kind::LitWord,
            WordKind::Refinement => Kind::Refinement,
            WordKind::Issue => Kind::Issue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordPayload {
    pub kind: WordKind,
    pub binding: Option<BindingTarget>,
    /// Cached slot index in the bound context's varlist, to skip the
    /// symbol search on repeated lookups of an already-bound word.
    pub cached_index: u32,
    pub symbol: relic_core::SymbolId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Object,
    Module,
    Error,
    Port,
    Frame,
}

impl ContextKind {
    pub fn kind(self) -> Kind {
        match self {
            ContextKind::Object => Kind::Object,
            ContextKind::Module => Kind::Module,
            ContextKind::Error => Kind::Error,
            ContextKind::Port => Kind::Port,
            ContextKind::Frame => Kind::Frame,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextPayload {
    pub kind: ContextKind,
    pub varlist: ContextId,
    pub spec: Option<SeriesId>,
    pub body: Option<SeriesId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Routine,
}

impl FunctionKind {
    pub fn kind(self) -> Kind {
        match self {
            FunctionKind::Function => Kind::Function,
            FunctionKind::Routine => Kind::Routine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionPayload {
    pub kind: FunctionKind,
    pub paramlist: FunctionId,
    pub body: SeriesId,
    pub exit_from: Option<BindingTarget>,
    /// Lookback/infix dispatch (spec §4.5 "lookback-function" eval_type):
    /// when true, the evaluator passes the already-produced left-hand
    /// value as this function's first argument instead of evaluating one
    /// from the feed.
    pub enfix: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatatypePayload {
    pub of_kind: Kind,
    pub spec: Option<SeriesId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypesetPayload {
    pub symbol: Option<relic_core::SymbolId>,
    pub bits: u64,
}

/// A variadic argument cursor (spec §4.4 point 3, "variadic: stores a
/// varargs cell that holds a reference to this frame; callee later pulls
/// from the feed on demand"). This crate eagerly reifies the remainder of
/// the calling frame's feed into `series` at the point the parameter is
/// fulfilled rather than holding a live pointer into a frame that may
/// have already returned — see [`crate::frame::Feed::reify`], the same
/// array/variadic-feed boundary this mirrors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarargsPayload {
    pub frame: FrameId,
    pub series: SeriesId,
}

/// The full payload union (spec §3.1.2), plus the two sentinel shapes that
/// never count as one of the 64 datatype kinds: `End` (spec §3.2) and
/// `Void` (spec §3.1.1: "the cell state for variables that are not set...
/// not a storable data type in user-visible arrays").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    End,
    Void,
    Immediate(Immediate),
    Series(SeriesPayload),
    Word(WordPayload),
    Context(ContextPayload),
    Func(FunctionPayload),
    Datatype(DatatypePayload),
    Typeset(TypesetPayload),
    Varargs(VarargsPayload),
}

// ============================================================================
// Header (spec §3.1)
// ============================================================================

const NOT_END: u16 = 1 << 0;
const IS_CELL: u16 = 1 << 1;
const FALSEY: u16 = 1 << 2;
const RELATIVE: u16 = 1 << 3;
const THROWN: u16 = 1 << 4;
const UNEVALUATED: u16 = 1 << 5;
const STACK_LIFETIME: u16 = 1 << 6;
const LINE: u16 = 1 << 7;

/// The flag bits of spec §3.1's header word. `kind` is deliberately not a
/// field here — see the module doc comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellHeader(u16);

impl CellHeader {
    fn with(mut self, bit: u16, set: bool) -> Self {
        if set {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
        self
    }

    pub fn not_end(self) -> bool {
        self.0 & NOT_END != 0
    }
    pub fn is_cell(self) -> bool {
        self.0 & IS_CELL != 0
    }
    pub fn falsey(self) -> bool {
        self.0 & FALSEY != 0
    }
    pub fn relative(self) -> bool {
        self.0 & RELATIVE != 0
    }
    pub fn thrown(self) -> bool {
        self.0 & THROWN != 0
    }
    pub fn unevaluated(self) -> bool {
        self.0 & UNEVALUATED != 0
    }
    pub fn stack_lifetime(self) -> bool {
        self.0 & STACK_LIFETIME != 0
    }
    pub fn line(self) -> bool {
        self.0 & LINE != 0
    }

    pub fn set_thrown(self, v: bool) -> Self {
        self.with(THROWN, v)
    }
    pub fn set_unevaluated(self, v: bool) -> Self {
        self.with(UNEVALUATED, v)
    }
    pub fn set_stack_lifetime(self, v: bool) -> Self {
        self.with(STACK_LIFETIME, v)
    }
    pub fn set_line(self, v: bool) -> Self {
        self.with(LINE, v)
    }
    pub fn set_relative(self, v: bool) -> Self {
        self.with(RELATIVE, v)
    }
}

// ============================================================================
// Cell
// ============================================================================

/// The unit of all values (spec §3.1). Every live variable, stack slot,
/// array element, and function argument is a `Cell`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    header: CellHeader,
    payload: Payload,
}

impl Cell {
    /// An end marker (spec §3.2): `not_end=0`, payload meaningless.
    pub fn end() -> Cell {
        Cell {
            header: CellHeader::default(),
            payload: Payload::End,
        }
    }

    /// The void cell state (spec §3.1.1): a formatted, non-end cell that
    /// nonetheless holds no storable datatype.
    pub fn void() -> Cell {
        Cell {
            header: CellHeader::default().with(NOT_END, true).with(IS_CELL, true),
            payload: Payload::Void,
        }
    }

    /// `reset_header` (spec §4.1): overwrite this slot's payload and flags
    /// with a freshly-formatted cell of the given payload. Falsey-ness is
    /// computed automatically from the payload so callers can never forget
    /// to set it (spec §3.1: "This permits truth tests with a single
    /// header test").
    pub fn reset(&mut self, payload: Payload) {
        let falsey = matches!(payload, Payload::Immediate(Immediate::Logic(false)) | Payload::Immediate(Immediate::Blank));
        self.header = CellHeader::default()
            .with(NOT_END, true)
            .with(IS_CELL, true)
            .with(FALSEY, falsey);
        self.payload = payload;
    }

    pub fn new(payload: Payload) -> Cell {
        let mut c = Cell::end();
        c.reset(payload);
        c
    }

    pub fn header(&self) -> CellHeader {
        self.header
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn is_end(&self) -> bool {
        !self.header.not_end()
    }

    pub fn is_void(&self) -> bool {
        matches!(self.payload, Payload::Void)
    }

    /// `kind` is derived, not stored (see module doc comment). Returns
    /// `None` for end markers and void cells, neither of which is one of
    /// the 64 datatype kinds.
    pub fn kind(&self) -> Option<Kind> {
        match &self.payload {
            Payload::End | Payload::Void => None,
            Payload::Immediate(i) => Some(i.kind()),
            Payload::Series(s) => Some(s.kind.kind()),
            Payload::Word(w) => Some(w.kind.kind()),
            Payload::Context(c) => Some(c.kind.kind()),
            Payload::Func(f) => Some(f.kind.kind()),
            Payload::Datatype(_) => Some(Kind::Datatype),
            Payload::Typeset(_) => Some(Kind::Typeset),
            Payload::Varargs(_) => Some(Kind::Varargs),
        }
    }

    /// `is_truthy`/`is_falsey` (spec §4.1): both fail on void.
    pub fn is_truthy(&self) -> Result<bool, relic_core::RuntimeError> {
        if self.is_void() {
            return Err(relic_core::RuntimeError::script(
                "cannot test truth of a void value",
            ));
        }
        Ok(!self.header.falsey())
    }

    pub fn is_falsey(&self) -> Result<bool, relic_core::RuntimeError> {
        self.is_truthy().map(|t| !t)
    }

    pub fn relative(&self) -> bool {
        self.header.relative()
    }

    pub fn thrown(&self) -> bool {
        self.header.thrown()
    }

    pub fn set_thrown(&mut self, thrown: bool) {
        self.header = self.header.set_thrown(thrown);
    }

    pub fn unevaluated(&self) -> bool {
        self.header.unevaluated()
    }

    pub fn set_unevaluated(&mut self, v: bool) {
        self.header = self.header.set_unevaluated(v);
    }

    pub fn stack_lifetime(&self) -> bool {
        self.header.stack_lifetime()
    }

    pub fn set_stack_lifetime(&mut self, v: bool) {
        self.header = self.header.set_stack_lifetime(v);
    }

    /// The binding target of a word/context/function-like cell, if any.
    pub fn binding(&self) -> Option<BindingTarget> {
        match &self.payload {
            Payload::Word(w) => w.binding,
            Payload::Func(f) => f.exit_from,
            _ => None,
        }
    }

    /// `move_value` (spec §4.1): copy `src` into `self`, preserving
    /// `self`'s own `stack-lifetime` bit (the destination's lifetime
    /// discipline doesn't change just because a new value moved in).
    ///
    /// The source's note on reifying stack-bound relative bindings into a
    /// concrete context before copy is left unimplemented in the original
    /// (spec §4.1: "not yet implemented in source; specified as a stub
    /// that asserts non-reifiable-case does not occur") — this
    /// reimplementation keeps that same boundary: moving a `relative` cell
    /// whose binding would need reification for `dst`'s lifetime is an
    /// internal invariant violation here too, not a silently-wrong copy.
    pub fn move_value(&mut self, src: &Cell) {
        let keep_stack_lifetime = self.header.stack_lifetime();
        if src.relative() && !keep_stack_lifetime {
            // dst outlives the call that gave src its relative binding;
            // reification would be required here. Not implemented
            // upstream either (spec §4.1) — treat as a programmer error
            // at the call site rather than guess at semantics.
            debug_assert!(
                false,
                "move_value: copying a relative cell into a longer-lived slot requires \
                 reification, which is unspecified (spec §4.1) and not implemented"
            );
        }
        self.header = src.header.set_stack_lifetime(keep_stack_lifetime);
        self.payload = src.payload;
        tracing::trace!(kind = ?self.kind(), "move_value");
    }

    /// `derelativize` (spec §4.1): produce a cell with `relative=0`.
    ///
    /// If `src` is already specific, equivalent to `move_value`. If
    /// `src` is relative, `specifier` (the context representing the
    /// current call's bindings) replaces the function reference to yield
    /// a specific binding.
    pub fn derelativize(&mut self, src: &Cell, specifier: ContextId) {
        self.payload = src.payload;
        self.header = src.header;
        if src.relative() {
            match &mut self.payload {
                Payload::Word(w) => w.binding = Some(BindingTarget::Specific(specifier)),
                Payload::Func(f) => f.exit_from = Some(BindingTarget::Specific(specifier)),
                _ => {}
            }
            self.header = self.header.set_relative(false);
        }
        tracing::trace!(kind = ?self.kind(), relative = src.relative(), "derelativize");
    }
}

/// spec §6 / SPEC_FULL §4 [CELL]: the original targets a fixed 4-word cell
/// (header word + three payload words, payload reinterpreted per category
/// via a C union). This crate represents `Cell` as `{ header: CellHeader,
/// payload: Payload }` where `Payload` is a tagged Rust enum, not a union —
/// the in-memory size is the header plus the discriminant plus the
/// *largest* payload variant, which is measurably larger than 4 machine
/// words on a 64-bit target (see DESIGN.md's cell-layout note for the
/// actual number and the variants that drive it). This function doesn't
/// enforce the 4-word budget; it logs the real size once at startup so the
/// deviation is visible rather than silent.
pub fn assert_cell_layout() {
    let size = std::mem::size_of::<Cell>();
    let target = std::mem::size_of::<usize>() * 4;
    if size > target {
        tracing::info!(
            actual_bytes = size,
            target_bytes = target,
            "Cell is larger than the spec's 4-word target (tagged-enum payload, not a union; see DESIGN.md)"
        );
    } else {
        tracing::info!(actual_bytes = size, target_bytes = target, "Cell meets the 4-word target");
    }
}

impl Default for Cell {
    /// The chunk stack (spec §4.4 point 1) fills fresh argument slots with
    /// end markers "so the GC can see in-progress fulfillment" — modeled
    /// here as `Cell::default()` so generic code (`ChunkStack<T: Default>`)
    /// doesn't need to know this is an end marker specifically.
    fn default() -> Self {
        Cell::end()
    }
}
