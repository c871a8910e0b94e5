//! spec §8 boundary scenarios for refinement calls (spec §4.4.1): a plain
//! in-order refinement call, and out-of-order pickup where the path names
//! refinements in a different order than the function declared them.

mod support;

use relic_runtime::function::ParamClass;
use relic_runtime::{do_block, DoOutcome};
use support::*;

#[test]
fn refinement_call_reads_its_sub_argument_after_the_leading_ones() {
    let mut interp = new_interp();
    let root = interp.root_context;

    declare_native(
        &mut interp,
        root,
        "f",
        vec![
            ("a", ParamClass::Normal),
            ("b", ParamClass::Refinement),
            ("x", ParamClass::Normal),
        ],
        false,
        |interp, ctx| {
            let a = as_int(&arg(interp, ctx, 1));
            let x = as_int(&arg(interp, ctx, 3));
            DoOutcome::Value(int(a * 100 + x))
        },
    );

    // `f/b 1 2` -> a=1, x=2.
    let path = path_cell(&mut interp, root, &["f", "b"]);
    let series = block_series(&mut interp, vec![path, int(1), int(2)]);

    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert_eq!(as_int(&v), 102),
        other => panic!("expected a value, got a {}", outcome_label(&other)),
    }
}

#[test]
fn refinements_named_out_of_order_are_filled_in_call_order() {
    let mut interp = new_interp();
    let root = interp.root_context;

    declare_native(
        &mut interp,
        root,
        "g",
        vec![
            ("a", ParamClass::Refinement),
            ("m", ParamClass::Normal),
            ("b", ParamClass::Refinement),
            ("n", ParamClass::Normal),
        ],
        false,
        |interp, ctx| {
            let m = as_int(&arg(interp, ctx, 2));
            let n = as_int(&arg(interp, ctx, 4));
            DoOutcome::Value(int(m * 100 + n))
        },
    );

    // `g/b/a 10 20`: calling in `b`, then `a` order means `b`'s sub-arg
    // `n` is read first (10), then `a`'s sub-arg `m` (20) — even though
    // `a` was declared first.
    let path = path_cell(&mut interp, root, &["g", "b", "a"]);
    let series = block_series(&mut interp, vec![path, int(10), int(20)]);

    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert_eq!(as_int(&v), 2010),
        other => panic!("expected a value, got a {}", outcome_label(&other)),
    }
}

fn outcome_label(o: &DoOutcome) -> &'static str {
    match o {
        DoOutcome::Value(_) => "Value",
        DoOutcome::Thrown(_) => "Thrown",
        DoOutcome::Fatal(_) => "Fatal",
    }
}
