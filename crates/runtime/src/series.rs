//! The series abstraction (spec §3.3) and its owning arena.
//!
//! Spec §9's redesign note replaces the source's raw-pointer series graph
//! ("elements are Cells and the storage includes one extra element holding
//! the end marker") with an arena of stable `SeriesId` handles (see
//! `crate::ids`). `SeriesData` plays the role of the source's `wide` +
//! tagged storage union: which variant a series holds tells you its
//! element width and shape, so there is no separate `wide` field to keep
//! in sync with it.

use std::collections::HashMap;

use relic_core::RuntimeError;

use crate::cell::Cell;
use crate::ids::SeriesId;

/// The element storage a series owns (spec §3.3: "wide: element size in
/// bytes"). Each variant is one of the concrete widths the source
/// supports; `Cells` backs every `ANY-ARRAY!` kind plus varlists,
/// keylists, and paramlists.
#[derive(Debug, Clone)]
pub enum SeriesData {
    Bytes(Vec<u8>),
    Wide(Vec<u16>),
    Cells(Vec<Cell>),
    Bitset(Vec<u64>),
    Image { width: u32, height: u32, pixels: Vec<u8> },
    Map(HashMap<MapKey, Cell>),
}

/// A map's key must be hashable and comparable without reaching into the
/// arena (spec doesn't mandate a representation; this mirrors the
/// restriction the source places on map keys — words, strings, and
/// scalars, not arrays).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Symbol(relic_core::SymbolId),
    Integer(i64),
    Str(String),
}

bitflags::bitflags! {
    /// spec §3.3 `flags`. `IS_ARRAY` is implied by `SeriesData::Cells` and
    /// not tracked redundantly here; every other flag needs explicit state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeriesFlags: u16 {
        const MANAGED          = 1 << 0;
        const FIXED_SIZE       = 1 << 1;
        const PROTECTED        = 1 << 2;
        const LOCKED           = 1 << 3;
        const INACCESSIBLE     = 1 << 4;
        const RUNNING          = 1 << 5;
        const CONTEXT_VARLIST  = 1 << 6;
        const CONTEXT_KEYLIST  = 1 << 7;
        const IS_PARAMLIST     = 1 << 8;
        const STACK            = 1 << 9;
    }
}

/// spec §3.3 `misc`: polymorphic, meaning differs by what the series is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMisc {
    None,
    /// Owning frame of a varlist with the `STACK` flag set.
    OwningFrame(crate::ids::FrameId),
    /// Dispatcher slot of a function body array.
    Dispatcher(crate::function::DispatcherId),
    /// Subfeed pointer for a chained variadic.
    Subfeed(SeriesId),
    ImageDims { width: u32, height: u32 },
}

/// spec §3.3 `link`: for an array, the keylist (if varlist) or
/// meta-context (if keylist/paramlist).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesLink {
    None,
    Keylist(SeriesId),
    MetaContext(SeriesId),
}

/// One series: its storage plus the bookkeeping fields of spec §3.3.
pub struct Series {
    pub data: SeriesData,
    pub flags: SeriesFlags,
    pub misc: SeriesMisc,
    pub link: SeriesLink,
    /// Bias-amortized head-room would matter for a `Vec`-backed prepend
    /// fast path; tracked here only as a diagnostic counter (spec §4.2
    /// "resize (with bias amortization)") since `Vec::insert(0, _)`
    /// already amortizes the underlying allocation for us.
    pub bias_hint: u32,
}

/// Build a plain, unmanaged array series from a vector of cells, with no
/// flags set. `crate::context` uses this directly (rather than
/// `SeriesArena::create`) when it needs to set flags/link before the
/// series is adopted into the arena, e.g. copy-on-write keylist cloning.
pub fn new_cell_series(cells: Vec<Cell>) -> Series {
    Series::new(SeriesData::Cells(cells))
}

impl Series {
    fn new(data: SeriesData) -> Self {
        Series {
            data,
            flags: SeriesFlags::empty(),
            misc: SeriesMisc::None,
            link: SeriesLink::None,
            bias_hint: 0,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.data, SeriesData::Cells(_))
    }

    pub fn len(&self) -> usize {
        match &self.data {
            SeriesData::Bytes(v) => v.len(),
            SeriesData::Wide(v) => v.len(),
            SeriesData::Cells(v) => v.len(),
            SeriesData::Bitset(v) => v.len() * 64,
            SeriesData::Image { width, height, .. } => (*width as usize) * (*height as usize),
            SeriesData::Map(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cells(&self) -> Result<&[Cell], RuntimeError> {
        match &self.data {
            SeriesData::Cells(v) => Ok(v),
            _ => Err(RuntimeError::script("series is not an array")),
        }
    }

    pub fn cells_mut(&mut self) -> Result<&mut Vec<Cell>, RuntimeError> {
        match &mut self.data {
            SeriesData::Cells(v) => Ok(v),
            _ => Err(RuntimeError::script("series is not an array")),
        }
    }

    fn check_mutable(&self) -> Result<(), RuntimeError> {
        if self.flags.contains(SeriesFlags::INACCESSIBLE) {
            return Err(RuntimeError::access("series is inaccessible"));
        }
        if self.flags.contains(SeriesFlags::PROTECTED) || self.flags.contains(SeriesFlags::LOCKED)
        {
            return Err(RuntimeError::access("series is protected"));
        }
        Ok(())
    }

    /// spec §4.2: append one element.
    pub fn append_cell(&mut self, cell: Cell) -> Result<(), RuntimeError> {
        self.check_mutable()?;
        self.cells_mut()?.push(cell);
        Ok(())
    }

    pub fn insert_cell(&mut self, index: usize, cell: Cell) -> Result<(), RuntimeError> {
        self.check_mutable()?;
        let cells = self.cells_mut()?;
        if index > cells.len() {
            return Err(RuntimeError::script("insert index out of range"));
        }
        cells.insert(index, cell);
        Ok(())
    }

    pub fn remove_cell(&mut self, index: usize) -> Result<Cell, RuntimeError> {
        self.check_mutable()?;
        let cells = self.cells_mut()?;
        if index >= cells.len() {
            return Err(RuntimeError::script("remove index out of range"));
        }
        Ok(cells.remove(index))
    }

    pub fn clear(&mut self) -> Result<(), RuntimeError> {
        self.check_mutable()?;
        match &mut self.data {
            SeriesData::Bytes(v) => v.clear(),
            SeriesData::Wide(v) => v.clear(),
            SeriesData::Cells(v) => v.clear(),
            SeriesData::Bitset(v) => v.clear(),
            SeriesData::Image { pixels, width, height } => {
                pixels.clear();
                *width = 0;
                *height = 0;
            }
            SeriesData::Map(m) => m.clear(),
        }
        Ok(())
    }
}

/// Generational arena owning every series in one interpreter instance
/// (spec §9: "implement series as arena-allocated nodes referenced by
/// stable indices or handles; the GC traces the arena").
#[derive(Default)]
pub struct SeriesArena {
    slots: Vec<Option<Series>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl SeriesArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Create an unmanaged series (spec §3.3.1) and return its handle.
    pub fn create(&mut self, data: SeriesData) -> SeriesId {
        self.adopt(Series::new(data))
    }

    /// Take ownership of an already-built `Series` (e.g. one
    /// `crate::context` configured flags/link on before handing it over)
    /// and return its handle.
    pub fn adopt(&mut self, series: Series) -> SeriesId {
        if let Some(index) = self.free_list.pop() {
            let gen = self.generations[index as usize];
            self.slots[index as usize] = Some(series);
            SeriesId::new(index, gen)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(series));
            self.generations.push(0);
            SeriesId::new(index, 0)
        }
    }

    fn check(&self, id: SeriesId) -> Result<usize, RuntimeError> {
        let index = id.index as usize;
        if index >= self.slots.len() || self.generations[index] != id.generation {
            return Err(RuntimeError::access("series handle is stale or invalid"));
        }
        Ok(index)
    }

    pub fn get(&self, id: SeriesId) -> Result<&Series, RuntimeError> {
        let index = self.check(id)?;
        self.slots[index]
            .as_ref()
            .ok_or_else(|| RuntimeError::access("series has been freed"))
    }

    pub fn get_mut(&mut self, id: SeriesId) -> Result<&mut Series, RuntimeError> {
        let index = self.check(id)?;
        self.slots[index]
            .as_mut()
            .ok_or_else(|| RuntimeError::access("series has been freed"))
    }

    /// spec §4.2 "managed-transition is idempotent and monotonic".
    pub fn make_managed(&mut self, id: SeriesId) -> Result<(), RuntimeError> {
        let s = self.get_mut(id)?;
        s.flags.insert(SeriesFlags::MANAGED);
        Ok(())
    }

    pub fn is_managed(&self, id: SeriesId) -> Result<bool, RuntimeError> {
        Ok(self.get(id)?.flags.contains(SeriesFlags::MANAGED))
    }

    /// spec §4.2 "free": explicit deallocation of an unmanaged series.
    /// Bumps the generation so any lingering handle reads as stale rather
    /// than aliasing whatever reuses this slot.
    ///
    /// # Panics
    /// Panics if `id` names a managed series — freeing those is the GC's
    /// job (`crate::gc`), never a direct caller's; calling this on a
    /// managed series is an internal invariant violation.
    pub fn free(&mut self, id: SeriesId) {
        let index = self.check(id).expect("free: invalid series handle");
        let managed = self.slots[index]
            .as_ref()
            .map(|s| s.flags.contains(SeriesFlags::MANAGED))
            .unwrap_or(false);
        assert!(!managed, "free: called on a GC-managed series");
        self.slots[index] = None;
        self.generations[index] += 1;
        self.free_list.push(index as u32);
    }

    /// Iterate over every currently-live series handle, for the GC sweep.
    pub fn live_ids(&self) -> Vec<SeriesId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| SeriesId::new(i as u32, self.generations[i])))
            .collect()
    }

    /// GC sweep hook: free every slot in `dead` (must all be managed,
    /// unreferenced series — the GC is the only caller).
    pub(crate) fn sweep(&mut self, dead: &[SeriesId]) -> usize {
        let mut reclaimed = 0;
        for &id in dead {
            if let Ok(index) = self.check(id) {
                if self.slots[index].is_some() {
                    self.slots[index] = None;
                    self.generations[index] += 1;
                    self.free_list.push(index as u32);
                    reclaimed += 1;
                }
            }
        }
        reclaimed
    }
}
