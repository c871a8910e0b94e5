//! Contexts: objects, modules, errors, ports, and reified frames (spec
//! §3.4, §4.3).
//!
//! A context is the pair of series spec §3.4 describes (`varlist` +
//! `keylist`); this module is the typed view over that pair, not a third
//! storage location. `ContextId` (see `crate::ids`) names the varlist;
//! the keylist is reached through the varlist's `SeriesLink::Keylist`.

use relic_core::{RuntimeError, SymbolId};

use crate::cell::{Cell, ContextKind, ContextPayload, Payload};
use crate::ids::ContextId;
use crate::series::{Series, SeriesArena, SeriesFlags, SeriesLink};

bitflags::bitflags! {
    /// Per-key flags (spec §3.4: "hidden, locked, unbindable, durable,
    /// variadic, endable, lookback").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyFlags: u16 {
        const HIDDEN     = 1 << 0;
        const LOCKED     = 1 << 1;
        const UNBINDABLE = 1 << 2;
        const DURABLE    = 1 << 3;
        const VARIADIC   = 1 << 4;
        const ENDABLE    = 1 << 5;
        const LOOKBACK   = 1 << 6;
    }
}

/// One keylist slot (spec §3.4: "a symbol id plus allowed-type bitset plus
/// per-key flags").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Key {
    pub symbol: SymbolId,
    pub typeset: u64,
    pub flags: KeyFlags,
}

/// Allocate a fresh context of `kind` with the given keys and matching
/// initial values (spec §4.3: "Allocate with N keys"). `values.len()` must
/// equal `keys.len()`; slot 0 of both series (the rootkey / context-kind
/// cell) is synthesized here and is not part of `keys`/`values`.
pub fn allocate(
    arena: &mut SeriesArena,
    kind: ContextKind,
    keys: &[Key],
    values: &[Cell],
) -> Result<ContextId, RuntimeError> {
    if keys.len() != values.len() {
        return Err(RuntimeError::script(
            "allocate: keys and initial values must be the same length",
        ));
    }

    let mut keylist_cells = Vec::with_capacity(keys.len() + 1);
    keylist_cells.push(Cell::new(Payload::Typeset(crate::cell::TypesetPayload {
        symbol: None,
        bits: 0,
    })));
    for k in keys {
        keylist_cells.push(Cell::new(Payload::Typeset(crate::cell::TypesetPayload {
            symbol: Some(k.symbol),
            bits: k.typeset,
        })));
    }
    let mut keylist_series = crate::series::new_cell_series(keylist_cells);
    keylist_series.flags.insert(SeriesFlags::CONTEXT_KEYLIST);
    let keylist_id = arena.adopt(keylist_series);

    let mut varlist_cells = Vec::with_capacity(values.len() + 1);
    // Placeholder; slot 0 is overwritten below once we know our own id.
    varlist_cells.push(Cell::end());
    varlist_cells.extend_from_slice(values);
    let mut varlist_series = crate::series::new_cell_series(varlist_cells);
    varlist_series.flags.insert(SeriesFlags::CONTEXT_VARLIST);
    varlist_series.link = SeriesLink::Keylist(keylist_id);
    let varlist_id = arena.adopt(varlist_series);

    let self_cell = Cell::new(Payload::Context(ContextPayload {
        kind,
        varlist: varlist_id,
        spec: None,
        body: None,
    }));
    arena.get_mut(varlist_id)?.cells_mut()?[0] = self_cell;

    Ok(varlist_id)
}

/// Index of `symbol` in `ctx`'s keylist (1-based; 0 is the rootkey), or
/// `None` if absent (spec §4.3: "resolve symbol→index by linear or hashed
/// search").
pub fn index_of(
    arena: &SeriesArena,
    symbols: &relic_core::SymbolTable,
    ctx: ContextId,
    symbol: SymbolId,
) -> Result<Option<usize>, RuntimeError> {
    let varlist = arena.get(ctx)?;
    let keylist_id = match varlist.link {
        SeriesLink::Keylist(id) => id,
        _ => return Err(RuntimeError::script("not a context varlist")),
    };
    let keylist = arena.get(keylist_id)?;
    for (i, cell) in keylist.cells()?.iter().enumerate().skip(1) {
        if let Payload::Typeset(ts) = cell.payload() {
            if let Some(key_sym) = ts.symbol {
                if symbols.canon_eq(key_sym, symbol) {
                    return Ok(Some(i));
                }
            }
        }
    }
    Ok(None)
}

/// spec §4.3 "get var by index".
pub fn get_var(arena: &SeriesArena, ctx: ContextId, index: usize) -> Result<Cell, RuntimeError> {
    let varlist = arena.get(ctx)?;
    if varlist.flags.contains(SeriesFlags::INACCESSIBLE) {
        return Err(RuntimeError::access(
            "context is inaccessible: its frame has ended",
        ));
    }
    varlist
        .cells()?
        .get(index)
        .copied()
        .ok_or_else(|| RuntimeError::script("var index out of range"))
}

/// spec §4.3 "set var by index, respecting the key's locked and protected
/// flags".
pub fn set_var(
    arena: &mut SeriesArena,
    ctx: ContextId,
    index: usize,
    value: Cell,
) -> Result<(), RuntimeError> {
    let keylist_id = match arena.get(ctx)?.link {
        SeriesLink::Keylist(id) => id,
        _ => return Err(RuntimeError::script("not a context varlist")),
    };
    let keylist = arena.get(keylist_id)?;
    if keylist.cells()?.get(index).is_none() {
        return Err(RuntimeError::script("var index out of range"));
    }
    if key_flags_locked(keylist, index)? {
        return Err(RuntimeError::access("word is protected"));
    }

    let varlist = arena.get_mut(ctx)?;
    if varlist.flags.contains(SeriesFlags::INACCESSIBLE) {
        return Err(RuntimeError::access(
            "context is inaccessible: its frame has ended",
        ));
    }
    if varlist.flags.contains(SeriesFlags::PROTECTED) {
        return Err(RuntimeError::access("context is protected"));
    }
    let cells = varlist.cells_mut()?;
    let slot = cells
        .get_mut(index)
        .ok_or_else(|| RuntimeError::script("var index out of range"))?;
    slot.move_value(&value);
    Ok(())
}

/// The keylist doesn't carry `KeyFlags` directly in this representation
/// (spec's typeset cell only carries the allowed-type bitset); per-key
/// flags live in the high bits of that same 64-bit field, matching the
/// source's own "typeset plus flags packed together" layout.
const KEY_FLAG_SHIFT: u32 = 48;

fn key_flags_locked(keylist: &Series, index: usize) -> Result<bool, RuntimeError> {
    match keylist.cells()?[index].payload() {
        Payload::Typeset(ts) => {
            let flags = KeyFlags::from_bits_truncate((ts.bits >> KEY_FLAG_SHIFT) as u16);
            Ok(flags.contains(KeyFlags::LOCKED))
        }
        _ => Err(RuntimeError::script("keylist slot is not a typeset")),
    }
}

/// Pack `KeyFlags` into the high 16 bits of a key's typeset bitset,
/// leaving the low 48 bits for `Kind` membership flags (48 kinds, spec
/// §3.1.1).
pub fn pack_typeset(kind_bits: u64, flags: KeyFlags) -> u64 {
    (kind_bits & ((1u64 << KEY_FLAG_SHIFT) - 1)) | ((flags.bits() as u64) << KEY_FLAG_SHIFT)
}

/// spec §4.3: "append key (copy-on-write on shared keylist)".
///
/// Appending a key when the keylist is referenced by more than one varlist
/// would corrupt the other varlists' view of it; this representation
/// tracks "shared" via a reference count on the keylist's own series
/// header rather than a separate table, so callers must pass the set of
/// other varlists currently pointing at the same keylist explicitly when
/// more than one context shares it (objects created by cloning another's
/// keylist, e.g. `make object!`).
pub fn append_key(
    arena: &mut SeriesArena,
    ctx: ContextId,
    key: Key,
    initial: Cell,
    shared_by_others: bool,
) -> Result<usize, RuntimeError> {
    let keylist_id = match arena.get(ctx)?.link {
        SeriesLink::Keylist(id) => id,
        _ => return Err(RuntimeError::script("not a context varlist")),
    };

    let keylist_id = if shared_by_others {
        let cloned = arena.get(keylist_id)?.cells()?.to_vec();
        let mut series = crate::series::new_cell_series(cloned);
        series.flags.insert(SeriesFlags::CONTEXT_KEYLIST);
        let new_id = arena.adopt(series);
        arena.get_mut(ctx)?.link = SeriesLink::Keylist(new_id);
        new_id
    } else {
        keylist_id
    };

    let key_cell = Cell::new(Payload::Typeset(crate::cell::TypesetPayload {
        symbol: Some(key.symbol),
        bits: pack_typeset(key.typeset, key.flags),
    }));
    arena.get_mut(keylist_id)?.append_cell(key_cell)?;
    arena.get_mut(ctx)?.append_cell(initial)?;

    Ok(arena.get(ctx)?.len() - 1)
}

/// spec §4.3, §3.4: "A context may be 'reified' from a live frame". Copies
/// the frame's current argument slots into a freshly-allocated varlist
/// (see `crate::frame::Frame::reify`); this function is the
/// context-construction half of that operation.
pub fn reify_from_frame(
    arena: &mut SeriesArena,
    frame_id: crate::ids::FrameId,
    keys: &[Key],
    values: &[Cell],
) -> Result<ContextId, RuntimeError> {
    let ctx = allocate(arena, ContextKind::Frame, keys, values)?;
    let varlist = arena.get_mut(ctx)?;
    varlist.flags.insert(SeriesFlags::STACK);
    varlist.misc = crate::series::SeriesMisc::OwningFrame(frame_id);
    Ok(ctx)
}

/// Called when a reified frame's call ends (spec §3.3.1: "when the frame
/// exits, `misc` is cleared and the series is marked inaccessible").
pub fn mark_frame_ended(arena: &mut SeriesArena, ctx: ContextId) -> Result<(), RuntimeError> {
    let varlist = arena.get_mut(ctx)?;
    varlist.misc = crate::series::SeriesMisc::None;
    varlist.flags.insert(SeriesFlags::INACCESSIBLE);
    Ok(())
}

pub fn self_cell(arena: &SeriesArena, ctx: ContextId) -> Result<Cell, RuntimeError> {
    get_var(arena, ctx, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Immediate;

    fn int(n: i64) -> Cell {
        Cell::new(Payload::Immediate(Immediate::Integer(n)))
    }

    fn table_with(words: &[&str]) -> (relic_core::SymbolTable, Vec<SymbolId>) {
        let mut t = relic_core::SymbolTable::new();
        let ids = words.iter().map(|w| t.intern(w)).collect();
        (t, ids)
    }

    #[test]
    fn allocate_round_trips_values() {
        let mut arena = SeriesArena::new();
        let (symbols, ids) = table_with(&["x", "y"]);
        let keys = vec![
            Key { symbol: ids[0], typeset: !0, flags: KeyFlags::empty() },
            Key { symbol: ids[1], typeset: !0, flags: KeyFlags::empty() },
        ];
        let ctx = allocate(&mut arena, ContextKind::Object, &keys, &[int(10), int(20)]).unwrap();

        let ix = index_of(&arena, &symbols, ctx, ids[0]).unwrap().unwrap();
        assert_eq!(get_var(&arena, ctx, ix).unwrap(), int(10));
        let iy = index_of(&arena, &symbols, ctx, ids[1]).unwrap().unwrap();
        assert_eq!(get_var(&arena, ctx, iy).unwrap(), int(20));
    }

    #[test]
    fn set_var_respects_locked_key() {
        let mut arena = SeriesArena::new();
        let (_symbols, ids) = table_with(&["x"]);
        let keys = vec![Key {
            symbol: ids[0],
            typeset: !0,
            flags: KeyFlags::LOCKED,
        }];
        let ctx = allocate(&mut arena, ContextKind::Object, &keys, &[int(1)]).unwrap();
        let err = set_var(&mut arena, ctx, 1, int(2)).unwrap_err();
        assert!(matches!(err, RuntimeError::Access { .. }));
    }

    #[test]
    fn set_var_updates_unlocked_key() {
        let mut arena = SeriesArena::new();
        let (_symbols, ids) = table_with(&["x"]);
        let keys = vec![Key {
            symbol: ids[0],
            typeset: !0,
            flags: KeyFlags::empty(),
        }];
        let ctx = allocate(&mut arena, ContextKind::Object, &keys, &[int(1)]).unwrap();
        set_var(&mut arena, ctx, 1, int(99)).unwrap();
        assert_eq!(get_var(&arena, ctx, 1).unwrap(), int(99));
    }

    #[test]
    fn self_cell_refers_back_to_own_varlist() {
        let mut arena = SeriesArena::new();
        let ctx = allocate(&mut arena, ContextKind::Object, &[], &[]).unwrap();
        let cell = self_cell(&arena, ctx).unwrap();
        match cell.payload() {
            Payload::Context(p) => assert_eq!(p.varlist, ctx),
            _ => panic!("expected a context cell"),
        }
    }

    #[test]
    fn mark_frame_ended_makes_context_inaccessible() {
        let mut arena = SeriesArena::new();
        let ctx = allocate(&mut arena, ContextKind::Frame, &[], &[]).unwrap();
        mark_frame_ended(&mut arena, ctx).unwrap();
        assert!(get_var(&arena, ctx, 0).is_err());
    }

    #[test]
    fn append_key_grows_both_series_in_lockstep() {
        let mut arena = SeriesArena::new();
        let (symbols, ids) = table_with(&["x", "y"]);
        let keys = vec![Key {
            symbol: ids[0],
            typeset: !0,
            flags: KeyFlags::empty(),
        }];
        let ctx = allocate(&mut arena, ContextKind::Object, &keys, &[int(1)]).unwrap();
        let new_key = Key {
            symbol: ids[1],
            typeset: !0,
            flags: KeyFlags::empty(),
        };
        let idx = append_key(&mut arena, ctx, new_key, int(2), false).unwrap();
        assert_eq!(get_var(&arena, ctx, idx).unwrap(), int(2));
        let iy = index_of(&arena, &symbols, ctx, ids[1]).unwrap().unwrap();
        assert_eq!(iy, idx);
    }
}
