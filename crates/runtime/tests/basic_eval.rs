//! spec §8 boundary scenarios around `Do_Core`'s step/expression loop:
//! empty input, left-to-right enfix ordering, multi-expression reduction,
//! and object-field assignment through a bound context.

mod support;

use relic_runtime::cell::WordKind;
use relic_runtime::function::ParamClass;
use relic_runtime::{do_block, do_next, DoOutcome, Feed, Frame};
use support::*;

#[test]
fn empty_source_evaluates_to_void() {
    let mut interp = new_interp();
    let series = block_series(&mut interp, vec![]);
    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert!(v.is_void()),
        other => panic!("expected void, got a non-value outcome: {}", outcome_label(&other)),
    }
}

fn declare_arith(interp: &mut relic_runtime::Interpreter) {
    let root = interp.root_context;
    declare_native(
        interp,
        root,
        "+",
        vec![("left", ParamClass::Normal), ("right", ParamClass::Normal)],
        true,
        |interp, ctx| DoOutcome::Value(int(as_int(&arg(interp, ctx, 1)) + as_int(&arg(interp, ctx, 2)))),
    );
    declare_native(
        interp,
        root,
        "*",
        vec![("left", ParamClass::Normal), ("right", ParamClass::Normal)],
        true,
        |interp, ctx| DoOutcome::Value(int(as_int(&arg(interp, ctx, 1)) * as_int(&arg(interp, ctx, 2)))),
    );
}

#[test]
fn enfix_chains_left_to_right_not_by_precedence() {
    let mut interp = new_interp();
    declare_arith(&mut interp);
    let root = interp.root_context;

    // `1 + 2 * 3`: left-to-right gives 9, not 7 (which would need `*` to
    // bind tighter than `+`) — spec §4.5's worked case.
    let series = block_series(
        &mut interp,
        vec![
            int(1),
            word(&mut interp, root, WordKind::Word, "+"),
            int(2),
            word(&mut interp, root, WordKind::Word, "*"),
            int(3),
        ],
    );

    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert_eq!(as_int(&v), 9),
        other => panic!("expected a value, got {}", outcome_label(&other)),
    }
}

#[test]
fn reduce_style_loop_collects_one_result_per_expression() {
    let mut interp = new_interp();
    declare_arith(&mut interp);
    let root = interp.root_context;

    // `[1 + 2 3 + 4]` reduced expression-by-expression: [3 7].
    let series = block_series(
        &mut interp,
        vec![
            int(1),
            word(&mut interp, root, WordKind::Word, "+"),
            int(2),
            int(3),
            word(&mut interp, root, WordKind::Word, "+"),
            int(4),
        ],
    );

    let frame_id = interp.frames.enter();
    let mut frame = Frame::new(Feed::Array { series, index: 0 }, root, frame_id);
    let mut results = Vec::new();
    loop {
        if frame.feed.is_at_end(&interp.series).unwrap() {
            break;
        }
        match do_next(&mut interp, &mut frame) {
            DoOutcome::Value(v) => results.push(as_int(&v)),
            other => panic!("expected a value, got {}", outcome_label(&other)),
        }
    }
    interp.frames.exit(frame_id);

    assert_eq!(results, vec![3, 7]);
}

#[test]
fn set_word_then_read_through_an_enfix_expression() {
    let mut interp = new_interp();
    declare_arith(&mut interp);
    let root = interp.root_context;
    declare(&mut interp, root, "x", support_void());
    declare(&mut interp, root, "y", support_void());

    // `x: 10  y: x + 5  y` -> 15, with x left at 10.
    let series = block_series(
        &mut interp,
        vec![
            word(&mut interp, root, WordKind::SetWord, "x"),
            int(10),
            word(&mut interp, root, WordKind::SetWord, "y"),
            word(&mut interp, root, WordKind::Word, "x"),
            word(&mut interp, root, WordKind::Word, "+"),
            int(5),
            word(&mut interp, root, WordKind::Word, "y"),
        ],
    );

    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert_eq!(as_int(&v), 15),
        other => panic!("expected a value, got {}", outcome_label(&other)),
    }

    let x_sym = interp.symbols.intern("x");
    let x_idx = relic_runtime::context::index_of(&interp.series, &interp.symbols, root, x_sym)
        .unwrap()
        .unwrap();
    assert_eq!(as_int(&arg(&interp, root, x_idx)), 10);
}

fn support_void() -> relic_runtime::Cell {
    relic_runtime::Cell::void()
}

fn outcome_label(o: &DoOutcome) -> &'static str {
    match o {
        DoOutcome::Value(_) => "Value",
        DoOutcome::Thrown(_) => "Thrown",
        DoOutcome::Fatal(_) => "Fatal",
    }
}
