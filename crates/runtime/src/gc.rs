//! Mark-and-sweep garbage collection over the managed series pool (spec
//! §4.7).
//!
//! Marking is iterative (a work-list, not recursion) specifically because
//! of spec §8 boundary scenario 10: "Form a cyclic block... GC completes
//! without infinite recursion." A `HashSet` of already-visited handles
//! makes re-entering a cycle a no-op; an explicit work-list means that
//! check happens without growing the native call stack per edge.

use std::collections::{HashSet, VecDeque};

use crate::cell::{BindingTarget, Cell, Payload};
use crate::ids::SeriesId;
use crate::series::{SeriesArena, SeriesData, SeriesLink, SeriesMisc};

/// The root set spec §4.7 enumerates, borrowed for the duration of one
/// collection cycle. `current_frame_cells` is omitted here since the
/// frame chain's scratch/cached cells live on the Rust native call stack
/// during evaluation (`crate::eval`), not in any pool this module can see
/// from the outside — each `Do_Core` recursion level guards its own
/// live cells with `Interpreter::push_guard` before calling back into
/// anything that might trigger a GC cycle.
pub struct Roots<'a> {
    pub root_context: SeriesId,
    pub data_stack: &'a [Cell],
    pub guard_stack: &'a [Cell],
    pub chunk_cells: &'a [Cell],
}

/// Run one collection cycle: mark everything reachable from `roots`, free
/// every managed series not reached. Returns the number of series
/// reclaimed.
pub fn collect(arena: &mut SeriesArena, roots: &Roots) -> usize {
    let mut reachable: HashSet<SeriesId> = HashSet::new();
    let mut work: VecDeque<SeriesId> = VecDeque::new();

    work.push_back(roots.root_context);
    for cell in roots
        .data_stack
        .iter()
        .chain(roots.guard_stack.iter())
        .chain(roots.chunk_cells.iter())
    {
        queue_cell(cell, &mut work);
    }

    while let Some(id) = work.pop_front() {
        if !reachable.insert(id) {
            continue;
        }
        let series = match arena.get(id) {
            Ok(s) => s,
            Err(_) => continue,
        };
        match series.link {
            SeriesLink::Keylist(k) => work.push_back(k),
            SeriesLink::MetaContext(m) => work.push_back(m),
            SeriesLink::None => {}
        }
        if let SeriesMisc::Subfeed(s) = series.misc {
            work.push_back(s);
        }
        match &series.data {
            SeriesData::Cells(cells) => {
                for cell in cells {
                    queue_cell(cell, &mut work);
                }
            }
            SeriesData::Map(m) => {
                for value in m.values() {
                    queue_cell(value, &mut work);
                }
            }
            SeriesData::Bytes(_) | SeriesData::Wide(_) | SeriesData::Bitset(_) | SeriesData::Image { .. } => {}
        }
    }

    let dead: Vec<SeriesId> = arena
        .live_ids()
        .into_iter()
        .filter(|id| arena.is_managed(*id).unwrap_or(false) && !reachable.contains(id))
        .collect();
    arena.sweep(&dead)
}

/// Queue the series (if any) that `cell`'s payload points to (spec §4.7:
/// "Marking follows series flags to reach only those payload words that
/// point to series or contexts").
fn queue_cell(cell: &Cell, work: &mut VecDeque<SeriesId>) {
    match cell.payload() {
        Payload::Series(s) => work.push_back(s.series),
        Payload::Word(w) => queue_binding(w.binding, work),
        Payload::Context(c) => {
            work.push_back(c.varlist);
            if let Some(spec) = c.spec {
                work.push_back(spec);
            }
            if let Some(body) = c.body {
                work.push_back(body);
            }
        }
        Payload::Func(f) => {
            work.push_back(f.paramlist);
            work.push_back(f.body);
            queue_binding(f.exit_from, work);
        }
        Payload::Datatype(d) => {
            if let Some(spec) = d.spec {
                work.push_back(spec);
            }
        }
        Payload::Varargs(v) => work.push_back(v.series),
        Payload::Immediate(_) | Payload::Typeset(_) | Payload::End | Payload::Void => {}
    }
}

fn queue_binding(binding: Option<BindingTarget>, work: &mut VecDeque<SeriesId>) {
    match binding {
        Some(BindingTarget::Specific(ctx)) => work.push_back(ctx),
        Some(BindingTarget::Relative(func)) => work.push_back(func),
        None => {}
    }
}
