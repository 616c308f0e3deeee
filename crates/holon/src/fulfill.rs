//! The argument fulfiller (spec §4.6): walks a function's paramlist in
//! declaration order, matching refinements named out of order at the call
//! site via a pickup pass, consuming ordinary arguments by the quoting class
//! each parameter declares, and applying specialization prefill and
//! refinement revocation along the way.
//!
//! This is the evaluator's most intricate component; nothing in the teacher
//! maps onto it directly (Python has no refinement-style optional named
//! parameters with a pickup pass), so the shape here follows spec §9 Design
//! Notes' own suggested state mapping rather than a teacher file. The
//! surrounding idiom — small, `#[must_use]`-annotated helper methods, a
//! single fallible entry point returning `Result<_, EvalError>`, inline unit
//! tests building fixtures by hand — matches the rest of this crate and, by
//! extension, the teacher.

use smallvec::SmallVec;

use crate::error::{EvalError, Fault};
use crate::feed::Feed;
use crate::frame::{Frame, Refine};
use crate::function::FunctionRef;
use crate::typeset::{Param, ParamClass};
use crate::value::{Cell, Kind, SymbolId};

/// Counts how many params starting at `start` belong to the refinement
/// declared at `start - 1` (i.e. every param up to, but not including, the
/// next `Refinement`-class param or the end of the paramlist).
fn refinement_span(facade: &[Param], start: usize) -> usize {
    facade[start..].iter().take_while(|p| p.class != ParamClass::Refinement).count()
}

enum GroupState {
    /// This refinement's slot is being filled normally: consume its args.
    Active,
    /// This refinement's first argument evaluated to void; remaining slots
    /// in the group are forced to void without further evaluation.
    Revoked,
}

/// Runs the full parameter walk for `func` against the caller's feed,
/// producing one [`Cell`] per paramlist entry.
///
/// `requested` lists the refinement words named at the call site, in the
/// order they were written (spec §4.4: a path like `foo/b/a` pushes `b`
/// then `a`). `eval_argument` performs the actual per-class consumption of
/// one unit of input from `caller`'s feed (sub-evaluation for
/// `Normal`/`Tight`, verbatim copy for `HardQuote`, conditional evaluation
/// for `SoftQuote`) — that requires driving the evaluator loop recursively,
/// which belongs to `eval`, not here.
///
/// `lookback`, when `Some`, is the already-evaluated left-hand value an
/// enfix call picked up during post-switch lookahead (spec §4.6 step 6); it
/// is handed to the first ordinary argument-consuming parameter in place of
/// pulling from `caller`'s feed, then never again for the rest of this call.
pub fn fulfill(
    func: &FunctionRef,
    caller: &mut Frame,
    requested: &[SymbolId],
    lookback: Option<Cell>,
    mut eval_argument: impl FnMut(&mut Frame, &Param) -> Result<Cell, EvalError>,
) -> Result<SmallVec<[Cell; 8]>, EvalError> {
    let facade = func.facade.as_slice();
    let mut args: SmallVec<[Cell; 8]> = smallvec::smallvec![Cell::void(); facade.len()];
    let mut pending: Vec<usize> = Vec::new();
    let mut claimed = vec![false; requested.len()];
    let mut lookback = lookback;

    let mut i = 0;
    while i < facade.len() {
        let param = &facade[i];
        caller.set_param_cursor(i);

        if let Some(exemplar) = &func.exemplar {
            if let Some(prefilled) = exemplar.get(i) {
                if param.class == ParamClass::Refinement {
                    if prefilled.kind() != Kind::Logic {
                        return Err(EvalError::new(Fault::NonLogicRefinement)
                            .with_label(symbol_label(param.spelling)));
                    }
                } else {
                    check_type(prefilled, param)?;
                }
                args[i] = prefilled.clone();
                i += 1;
                continue;
            }
        }

        match param.class {
            ParamClass::Refinement => {
                let slot = requested.iter().position(|&w| w == param.spelling).filter(|&idx| !claimed[idx]);
                match slot {
                    Some(idx) if is_next_due(requested, &claimed, idx) => {
                        claimed[idx] = true;
                        args[i] = Cell::logic(true);
                        let span = refinement_span(facade, i + 1);
                        fulfill_group(caller, facade, &mut args, i + 1, span, &mut lookback, &mut eval_argument)?;
                        i += 1 + span;
                    }
                    Some(idx) => {
                        // Requested, but a differently-spelled refinement
                        // earlier in the call-site path hasn't had its args
                        // consumed yet: defer this one to the pickup pass.
                        claimed[idx] = true;
                        args[i] = Cell::logic(true);
                        pending.push(i);
                        let span = refinement_span(facade, i + 1);
                        i += 1 + span;
                    }
                    None => {
                        args[i] = Cell::logic(false);
                        let span = refinement_span(facade, i + 1);
                        for slot in &mut args[i + 1..i + 1 + span] {
                            *slot = Cell::void();
                        }
                        i += 1 + span;
                    }
                }
            }
            ParamClass::Local => {
                args[i] = Cell::void();
                i += 1;
            }
            ParamClass::Return | ParamClass::Leave => {
                // Not fulfilled from the call site at all (spec §3); the
                // concrete return/leave primitive bound to this call's
                // frame id is installed by `dispatch` just before the
                // dispatcher runs, since only then does the callee frame
                // have a settled identity.
                args[i] = Cell::void();
                i += 1;
            }
            _ => {
                args[i] = fulfill_one(caller, param, &mut lookback, &mut eval_argument)?;
                i += 1;
            }
        }
    }

    if requested.iter().enumerate().any(|(idx, _)| !claimed[idx]) {
        return Err(EvalError::new(Fault::BadRefine)
            .with_detail("refinement named at the call site is not declared by this function"));
    }

    for refinement_index in pending {
        caller.set_refine(Refine::Fulfilling(u16::try_from(refinement_index).unwrap_or(u16::MAX)));
        let span = refinement_span(facade, refinement_index + 1);
        fulfill_group(caller, facade, &mut args, refinement_index + 1, span, &mut lookback, &mut eval_argument)?;
    }
    caller.set_refine(Refine::OrdinaryArg);

    Ok(args)
}

/// A requested refinement at `idx` is "next due" if every other requested
/// refinement before it in call-site order has already been claimed —
/// i.e. no earlier-named refinement is still waiting on its own args.
fn is_next_due(requested: &[SymbolId], claimed: &[bool], idx: usize) -> bool {
    claimed[..idx].iter().all(|&c| c)
}

fn fulfill_group(
    caller: &mut Frame,
    facade: &[Param],
    args: &mut [Cell],
    start: usize,
    span: usize,
    lookback: &mut Option<Cell>,
    eval_argument: &mut impl FnMut(&mut Frame, &Param) -> Result<Cell, EvalError>,
) -> Result<(), EvalError> {
    let mut state = GroupState::Active;
    for offset in 0..span {
        let index = start + offset;
        let param = &facade[index];
        caller.set_param_cursor(index);
        match state {
            GroupState::Active => {
                let value = fulfill_one(caller, param, lookback, eval_argument)?;
                if offset == 0 && value.is_void() {
                    state = GroupState::Revoked;
                    // Revoking flips the refinement's own logic slot back
                    // to false (spec §4.6: a void first argument revokes).
                    if start > 0 {
                        args[start - 1] = Cell::logic(false);
                    }
                }
                args[index] = value;
            }
            GroupState::Revoked => {
                args[index] = Cell::void();
            }
        }
    }
    Ok(())
}

/// Consumes one unit of call-site input for a single ordinary (non-local,
/// non-refinement) parameter, honoring `endable` and the expression-barrier
/// rule (spec §4.10 `ExpressionBarrier`).
fn fulfill_one(
    caller: &mut Frame,
    param: &Param,
    lookback: &mut Option<Cell>,
    eval_argument: &mut impl FnMut(&mut Frame, &Param) -> Result<Cell, EvalError>,
) -> Result<Cell, EvalError> {
    if param.variadic {
        // Spec §4.6 step 7: a variadic parameter captures a handle linking
        // back to this frame rather than consuming from the feed now; the
        // handle's holder pulls further values from the frame's feed later,
        // at its own pace.
        let offset = u32::try_from(caller.param_cursor()).unwrap_or(u32::MAX);
        return Ok(Cell::varargs(caller.id(), offset));
    }

    if param.class.consumes_call_site_input() {
        if let Some(value) = lookback.take() {
            check_type(&value, param).map_err(|e| e.with_detail("lookback argument failed type check"))?;
            return Ok(value);
        }
    }

    if caller.feed().at_end() {
        return if param.endable {
            Ok(Cell::void())
        } else {
            Err(EvalError::new(Fault::NoArg).with_label(symbol_label(param.spelling)))
        };
    }

    let current_kind = caller.feed_mut().current().map(crate::value::Cell::kind);

    if current_kind == Some(Kind::Bar) && param.class != ParamClass::HardQuote {
        return if param.endable {
            Ok(Cell::void())
        } else {
            Err(EvalError::new(Fault::ExpressionBarrier).with_label(symbol_label(param.spelling)))
        };
    }

    let value = eval_argument(caller, param)?;
    check_type(&value, param)?;
    Ok(value)
}

/// Type-check step (spec §4.6 step 11). A `Varargs`-flagged parameter must
/// receive a value of kind `Varargs` itself (`Fault::NotVarargs` otherwise);
/// every other parameter checks its cell's kind against its accepted
/// typeset, with `endable` permitting void through regardless.
fn check_type(value: &Cell, param: &Param) -> Result<(), EvalError> {
    if value.is_void() && param.endable {
        return Ok(());
    }
    if param.variadic {
        return if value.kind() == Kind::Varargs {
            Ok(())
        } else {
            Err(EvalError::new(Fault::NotVarargs).with_label(symbol_label(param.spelling)).with_kind(value.kind()))
        };
    }
    if !param.accepted.accepts(value.kind()) {
        return Err(EvalError::new(Fault::NoArg)
            .with_label(symbol_label(param.spelling))
            .with_detail(format!("argument did not match accepted typeset (got {:?})", value.kind()))
            .with_kind(value.kind()));
    }
    Ok(())
}

pub(crate) fn symbol_label(symbol: SymbolId) -> String {
    format!("sym#{}", symbol.0)
}
