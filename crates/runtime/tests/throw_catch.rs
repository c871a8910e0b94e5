//! spec §8 boundary scenarios for THROW/CATCH (spec §4.6): a bare catch
//! accepts any throw, a named catch only accepts a matching label, and a
//! mismatched name keeps propagating past the catch point.

mod support;

use relic_runtime::cell::WordKind;
use relic_runtime::function::ParamClass;
use relic_runtime::throw::{catch_named, ThrowLabel, Thrown};
use relic_runtime::{do_block, DoOutcome};
use support::*;

fn declare_throw_catch(interp: &mut relic_runtime::Interpreter) {
    let root = interp.root_context;

    declare_native(
        interp,
        root,
        "throw1",
        vec![("val", ParamClass::Normal)],
        false,
        |interp, ctx| {
            DoOutcome::Thrown(Thrown {
                label: ThrowLabel::Unnamed,
                value: arg(interp, ctx, 1),
            })
        },
    );

    declare_native(
        interp,
        root,
        "catch1",
        vec![("body", ParamClass::Normal)],
        false,
        |interp, ctx| {
            let body = arg(interp, ctx, 1);
            let series = match body.payload() {
                relic_runtime::Payload::Series(s) => s.series,
                _ => panic!("catch1's body argument is not a block"),
            };
            match do_block(interp, series) {
                DoOutcome::Thrown(t) => match catch_named(t, None) {
                    Ok(v) => DoOutcome::Value(v),
                    Err(t) => DoOutcome::Thrown(t),
                },
                other => other,
            }
        },
    );

    declare_native(
        interp,
        root,
        "throw_named",
        vec![("val", ParamClass::Normal), ("name", ParamClass::Normal)],
        false,
        |interp, ctx| {
            DoOutcome::Thrown(Thrown {
                label: ThrowLabel::Named(arg(interp, ctx, 2)),
                value: arg(interp, ctx, 1),
            })
        },
    );

    declare_native(
        interp,
        root,
        "catch_named_fn",
        vec![("body", ParamClass::Normal), ("name", ParamClass::Normal)],
        false,
        |interp, ctx| {
            let body = arg(interp, ctx, 1);
            let name = arg(interp, ctx, 2);
            let series = match body.payload() {
                relic_runtime::Payload::Series(s) => s.series,
                _ => panic!("catch_named_fn's body argument is not a block"),
            };
            match do_block(interp, series) {
                DoOutcome::Thrown(t) => match catch_named(t, Some(&name)) {
                    Ok(v) => DoOutcome::Value(v),
                    Err(t) => DoOutcome::Thrown(t),
                },
                other => other,
            }
        },
    );
}

#[test]
fn bare_catch_catches_an_unnamed_throw() {
    let mut interp = new_interp();
    declare_throw_catch(&mut interp);
    let root = interp.root_context;

    let inner = block_cell(
        &mut interp,
        vec![word(&mut interp, root, WordKind::Word, "throw1"), int(42)],
    );
    let series = block_series(
        &mut interp,
        vec![word(&mut interp, root, WordKind::Word, "catch1"), inner],
    );

    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert_eq!(as_int(&v), 42),
        other => panic!("expected the throw to be caught, got {}", outcome_label(&other)),
    }
}

#[test]
fn named_catch_accepts_a_matching_label() {
    let mut interp = new_interp();
    declare_throw_catch(&mut interp);
    let root = interp.root_context;

    let foo = word(&mut interp, root, WordKind::LitWord, "foo");
    let inner = block_cell(
        &mut interp,
        vec![
            word(&mut interp, root, WordKind::Word, "throw_named"),
            int(1),
            foo,
        ],
    );
    let foo_again = word(&mut interp, root, WordKind::LitWord, "foo");
    let series = block_series(
        &mut interp,
        vec![
            word(&mut interp, root, WordKind::Word, "catch_named_fn"),
            inner,
            foo_again,
        ],
    );

    match do_block(&mut interp, series) {
        DoOutcome::Value(v) => assert_eq!(as_int(&v), 1),
        other => panic!("expected the named throw to be caught, got {}", outcome_label(&other)),
    }
}

#[test]
fn named_catch_does_not_catch_a_mismatched_label() {
    let mut interp = new_interp();
    declare_throw_catch(&mut interp);
    let root = interp.root_context;

    let foo = word(&mut interp, root, WordKind::LitWord, "foo");
    let inner = block_cell(
        &mut interp,
        vec![
            word(&mut interp, root, WordKind::Word, "throw_named"),
            int(1),
            foo,
        ],
    );
    let bar = word(&mut interp, root, WordKind::LitWord, "bar");
    let series = block_series(
        &mut interp,
        vec![
            word(&mut interp, root, WordKind::Word, "catch_named_fn"),
            inner,
            bar,
        ],
    );

    match do_block(&mut interp, series) {
        DoOutcome::Thrown(t) => assert!(matches!(t.label, ThrowLabel::Named(_))),
        other => panic!("expected the throw to keep propagating, got {}", outcome_label(&other)),
    }
}

fn outcome_label(o: &DoOutcome) -> &'static str {
    match o {
        DoOutcome::Value(_) => "Value",
        DoOutcome::Thrown(_) => "Thrown",
        DoOutcome::Fatal(_) => "Fatal",
    }
}
