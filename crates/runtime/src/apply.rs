//! External call entry points (spec §6): `Do` runs a block of source, `Apply`
//! invokes a function directly with pre-evaluated arguments, bypassing the
//! feed entirely. Both are thin callers into `crate::eval`'s machinery.

use crate::cell::Cell;
use crate::context::{self, Key, KeyFlags};
use crate::ids::{FunctionId, SeriesId};
use crate::interpreter::Interpreter;
use crate::throw::DoOutcome;

/// spec §6 `Do`: evaluate every expression in `series` against the root
/// context and return the value of the last one.
pub fn do_block(interp: &mut Interpreter, series: SeriesId) -> DoOutcome {
    let root = interp.root_context;
    crate::eval::run_block(interp, series, root)
}

/// spec §6 `Apply`: call `func` with `args` supplied directly, positionally
/// filling its non-local, non-refinement parameters in declaration order.
/// No refinement can be activated this way — a caller wanting to set one
/// must go through `Do` over a refinement-call path instead (spec §4.4.1).
pub fn apply(interp: &mut Interpreter, func: FunctionId, args: Vec<Cell>) -> DoOutcome {
    let def = match interp.functions.get(func) {
        Ok(d) => d.clone(),
        Err(e) => return DoOutcome::Fatal(e),
    };

    let leading: Vec<usize> = def
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.class.is_local() && p.class != crate::function::ParamClass::Refinement)
        .map(|(i, _)| i)
        .collect();

    let mut slots = vec![Cell::void(); def.params.len()];
    for (slot, value) in leading.into_iter().zip(args) {
        slots[slot] = value;
    }

    let keys: Vec<Key> = def
        .params
        .iter()
        .map(|p| Key {
            symbol: p.symbol,
            typeset: p.typeset.unwrap_or(!0),
            flags: if p.hidden { KeyFlags::HIDDEN } else { KeyFlags::empty() },
        })
        .collect();

    let frame_id = interp.frames.enter();
    let arg_ctx = match context::reify_from_frame(&mut interp.series, frame_id, &keys, &slots) {
        Ok(c) => c,
        Err(e) => {
            interp.frames.exit(frame_id);
            return DoOutcome::Fatal(e);
        }
    };
    if let Err(e) = interp.series.make_managed(arg_ctx) {
        interp.frames.exit(frame_id);
        return DoOutcome::Fatal(e);
    }

    crate::eval::finish_call(interp, &def, arg_ctx, frame_id, func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Immediate, Payload};
    use crate::function::{Dispatcher, Param, ParamClass};
    use crate::host::NullHost;

    fn int(n: i64) -> Cell {
        Cell::new(Payload::Immediate(Immediate::Integer(n)))
    }

    #[test]
    fn apply_calls_a_native_with_positional_args() {
        let mut interp = Interpreter::new(Box::new(NullHost)).unwrap();
        let a = interp.symbols.intern("a");
        let b = interp.symbols.intern("b");

        let params = vec![
            Param { symbol: a, class: ParamClass::Normal, typeset: None, hidden: false },
            Param { symbol: b, class: ParamClass::Normal, typeset: None, hidden: false },
        ];
        let add = crate::function::make_function(
            &mut interp.series,
            &mut interp.functions,
            &mut interp.dispatch,
            params,
            Dispatcher::Native(std::rc::Rc::new(|interp, ctx| {
                // varlist slot 0 is the context's own self-cell (spec §3.4);
                // parameters start at slot 1, in paramlist declaration order.
                let x = match context::get_var(&interp.series, ctx, 1) {
                    Ok(v) => v,
                    Err(e) => return DoOutcome::Fatal(e),
                };
                let y = match context::get_var(&interp.series, ctx, 2) {
                    Ok(v) => v,
                    Err(e) => return DoOutcome::Fatal(e),
                };
                let (Payload::Immediate(Immediate::Integer(x)), Payload::Immediate(Immediate::Integer(y))) =
                    (x.payload(), y.payload())
                else {
                    return DoOutcome::Fatal(relic_core::RuntimeError::script("expected integers"));
                };
                DoOutcome::Value(int(x + y))
            })),
        )
        .unwrap();

        match apply(&mut interp, add, vec![int(3), int(4)]) {
            DoOutcome::Value(v) => assert_eq!(v, int(7)),
            _ => panic!("expected a value"),
        }
    }
}
