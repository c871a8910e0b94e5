//! spec §8 boundary scenario 10: a cyclic block is collected once nothing
//! roots it, and collection doesn't hang chasing the cycle (spec §4.7).
//! `crate::gc`'s own unit tests cover the arena-level mechanics; this
//! drives the same scenario through the public `Interpreter` surface a
//! host actually has.

mod support;

use relic_runtime::series::SeriesData;
use support::*;

#[test]
fn unrooted_cyclic_block_is_reclaimed_by_run_gc() {
    let mut interp = new_interp();

    let a = interp.series.create(SeriesData::Cells(vec![]));
    let b = interp.series.create(SeriesData::Cells(vec![]));
    interp.series.make_managed(a).unwrap();
    interp.series.make_managed(b).unwrap();

    interp.series.get_mut(a).unwrap().append_cell(block_cell_of(b)).unwrap();
    interp.series.get_mut(b).unwrap().append_cell(block_cell_of(a)).unwrap();

    interp.run_gc();

    assert!(interp.series.get(a).is_err());
    assert!(interp.series.get(b).is_err());
}

#[test]
fn cyclic_block_survives_while_rooted_on_the_data_stack() {
    let mut interp = new_interp();

    let a = interp.series.create(SeriesData::Cells(vec![]));
    let b = interp.series.create(SeriesData::Cells(vec![]));
    interp.series.make_managed(a).unwrap();
    interp.series.make_managed(b).unwrap();

    interp.series.get_mut(a).unwrap().append_cell(block_cell_of(b)).unwrap();
    interp.series.get_mut(b).unwrap().append_cell(block_cell_of(a)).unwrap();

    // Rooting only `a` on the data stack reaches `b` too, via the cycle.
    interp.data_stack.push(block_cell_of(a));

    interp.run_gc();

    assert!(interp.series.get(a).is_ok());
    assert!(interp.series.get(b).is_ok());

    interp.data_stack.pop();
    interp.run_gc();

    assert!(interp.series.get(a).is_err());
    assert!(interp.series.get(b).is_err());
}
