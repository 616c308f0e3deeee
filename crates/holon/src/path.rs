//! The path walker (spec §4.4): resolves a path's selector chain for
//! reading, for writing, or — when the head resolves to a function — for
//! dispatch with pushed refinements.
//!
//! Concrete selector semantics (indexing into a block, picking a field off
//! an object, routing through a port) are an out-of-scope external
//! collaborator (spec §1 non-goals: "concrete data-type operations"), so
//! they're abstracted behind [`PathActor`] rather than implemented here —
//! the same boundary the teacher draws around its own `heap`/type-dispatch
//! layer, just inverted into a trait the host supplies instead of a
//! closed `Value` match.

use crate::bind;
use crate::context::{ContextArena, ContextId};
use crate::error::{EvalError, Fault};
use crate::function::FunctionRef;
use crate::value::{Cell, Kind, SeriesRef, SymbolId};

/// Host-supplied selector semantics (spec §4.4).
pub trait PathActor {
    fn select(&self, base: &Cell, selector: &Cell) -> Result<Cell, EvalError>;
    fn select_set(&self, base: &Cell, selector: &Cell, value: Cell) -> Result<(), EvalError>;
}

/// What a resolved path turns out to mean (spec §4.4).
pub enum PathResolution {
    /// An ordinary read: the path named a value, not a call.
    Value(Cell),
    /// The path's head was a function; the remaining selectors are the
    /// refinement words it pushed, ready for `fulfill::fulfill`.
    Call { function: FunctionRef, requested: Vec<SymbolId> },
}

fn resolve_head(
    arena: &ContextArena,
    series: &SeriesRef,
    specifier: Option<ContextId>,
) -> Result<Cell, EvalError> {
    let head = series.array.cells.first().ok_or_else(|| EvalError::new(Fault::NoValue))?;
    match head.kind() {
        Kind::Word => {
            Ok(bind::get(arena, head.symbol().expect("word cell carries a symbol"), head.binding(), specifier)?.clone())
        }
        _ => Ok(head.copy_inert()),
    }
}

fn resolve_selector(
    arena: &ContextArena,
    selector: &Cell,
    specifier: Option<ContextId>,
) -> Result<Cell, EvalError> {
    match selector.kind() {
        Kind::Word => Ok(bind::get(
            arena,
            selector.symbol().expect("word cell carries a symbol"),
            selector.binding(),
            specifier,
        )?
        .clone()),
        _ => Ok(selector.copy_inert()),
    }
}

/// Read resolution (spec §4.4): walks every selector after the head,
/// dispatching to `PathActor::select` at each step. If the head resolves to
/// a function, returns [`PathResolution::Call`] instead of walking further —
/// the remaining selectors are refinement names, not data selectors.
pub fn resolve(
    arena: &ContextArena,
    actor: &dyn PathActor,
    series: &SeriesRef,
    specifier: Option<ContextId>,
) -> Result<PathResolution, EvalError> {
    let base = resolve_head(arena, series, specifier)?;

    if base.kind() == Kind::Function {
        return resolve_call(base, series, specifier);
    }

    let mut current = base;
    for selector in &series.array.cells[1..] {
        let sel_value = resolve_selector(arena, selector, specifier)?;
        current = actor.select(&current, &sel_value)?;
    }
    Ok(PathResolution::Value(current))
}

/// Write resolution (spec §4.4): walks every selector but the last to find
/// the mutable base, then applies `PathActor::select_set` once with `value`.
pub fn resolve_set(
    arena: &ContextArena,
    actor: &dyn PathActor,
    series: &SeriesRef,
    specifier: Option<ContextId>,
    value: Cell,
) -> Result<(), EvalError> {
    let base = resolve_head(arena, series, specifier)?;
    let selectors = &series.array.cells[1..];
    let Some((last, init)) = selectors.split_last() else {
        return Err(EvalError::new(Fault::NeedValue).with_detail("set-path has no selector to assign through"));
    };

    let mut current = base;
    for selector in init {
        let sel_value = resolve_selector(arena, selector, specifier)?;
        current = actor.select(&current, &sel_value)?;
    }
    let last_value = resolve_selector(arena, last, specifier)?;
    actor.select_set(&current, &last_value, value)
}

/// Refinement words named after a function head (spec §4.4, §9 Open
/// Questions: enfix/invisible dispatch through a path is explicitly
/// rejected rather than given new semantics — a function reached this way
/// that is itself enfixed or invisible can never have been intended to
/// serve as a lookback argument or a silently-absorbed call, since a path
/// head is never itself an infix operator's left-hand side).
fn resolve_call(
    function: Cell,
    series: &SeriesRef,
    _specifier: Option<ContextId>,
) -> Result<PathResolution, EvalError> {
    if function.is_enfixed() {
        return Err(EvalError::new(Fault::LookbackQuoteTooLate)
            .with_detail("a function reached through a path cannot also be enfixed"));
    }
    if function.flags().contains(crate::value::CellFlags::INVISIBLE) {
        return Err(EvalError::new(Fault::LookbackQuoteTooLate)
            .with_detail("a function reached through a path cannot be invisible"));
    }

    let mut requested = Vec::with_capacity(series.array.cells.len().saturating_sub(1));
    for selector in &series.array.cells[1..] {
        match selector.kind() {
            Kind::Word | Kind::LitWord => {
                requested.push(selector.symbol().expect("word cell carries a symbol"));
            }
            other => {
                return Err(EvalError::new(Fault::BadRefine)
                    .with_detail(format!("path selector after a function head must be a refinement word, found {other:?}")));
            }
        }
    }

    let function = function.function_ref().expect("checked kind == Function above").clone();
    Ok(PathResolution::Call { function, requested })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{DispatchCode, Dispatcher, Function};
    use crate::typeset::{Param, ParamClass};
    use crate::value::ArrayData;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Noop;
    impl Dispatcher for Noop {
        fn call(&self, frame: &mut crate::frame::Frame) -> Result<DispatchCode, EvalError> {
            let _ = frame;
            Ok(DispatchCode::Void)
        }
    }

    struct BlockActor;
    impl PathActor for BlockActor {
        fn select(&self, base: &Cell, selector: &Cell) -> Result<Cell, EvalError> {
            let series = base.series_ref().ok_or_else(|| EvalError::new(Fault::NoValue))?;
            let crate::value::Payload::Integer(index) = selector.payload() else {
                return Err(EvalError::new(Fault::NoValue));
            };
            series
                .array
                .cells
                .get(*index as usize)
                .cloned()
                .ok_or_else(|| EvalError::new(Fault::NoValue))
        }
        fn select_set(&self, _base: &Cell, _selector: &Cell, _value: Cell) -> Result<(), EvalError> {
            Ok(())
        }
    }

    #[test]
    fn plain_path_walks_through_actor() {
        let mut arena = ContextArena::new();
        let ctx = arena.push(1).unwrap();
        let block = Cell::series(
            Kind::Block,
            SeriesRef::new(ArrayData::new(vec![Cell::integer(10), Cell::integer(20)]), 0),
            None,
        );
        arena.get_mut(ctx).define(SymbolId(1), block);
        let path_array = ArrayData::new(vec![Cell::word(Kind::Word, SymbolId(1), Some(ctx)), Cell::integer(1)]);
        let series = SeriesRef::new(path_array, 0);
        let actor = BlockActor;
        let result = resolve(&arena, &actor, &series, None).unwrap();
        match result {
            PathResolution::Value(cell) => assert_eq!(cell.kind(), Kind::Integer),
            PathResolution::Call { .. } => panic!("expected a value resolution"),
        }
    }

    #[test]
    fn function_head_collects_refinement_words() {
        let mut arena = ContextArena::new();
        let ctx = arena.push(1).unwrap();
        let func = Function::new(
            vec![Param::new(ParamClass::Refinement, SymbolId(2))],
            Rc::new(Noop),
            None,
        );
        arena.get_mut(ctx).define(SymbolId(1), Cell::function(func, None));
        let path_array = ArrayData::new(vec![
            Cell::word(Kind::Word, SymbolId(1), Some(ctx)),
            Cell::word(Kind::Word, SymbolId(2), Some(ctx)),
        ]);
        let series = SeriesRef::new(path_array, 0);
        let actor = BlockActor;
        let result = resolve(&arena, &actor, &series, None).unwrap();
        match result {
            PathResolution::Call { requested, .. } => assert_eq!(requested, vec![SymbolId(2)]),
            PathResolution::Value(_) => panic!("expected a call resolution"),
        }
    }

    #[test]
    fn enfixed_function_through_path_is_rejected() {
        let func = Function::new(vec![], Rc::new(Noop), None);
        let mut cell = Cell::function(func, None);
        cell.flags_mut().insert(crate::value::CellFlags::ENFIXED);
        let path_array = ArrayData::new(vec![cell]);
        let series = SeriesRef::new(path_array, 0);
        let err = resolve_call(series.current().unwrap().clone(), &series, None).unwrap_err();
        assert_eq!(err.fault, Fault::LookbackQuoteTooLate);
    }

    #[test]
    fn invisible_function_through_path_is_rejected() {
        let func = Function::new(vec![], Rc::new(Noop), None);
        let mut cell = Cell::function(func, None);
        cell.flags_mut().insert(crate::value::CellFlags::INVISIBLE);
        let path_array = ArrayData::new(vec![cell]);
        let series = SeriesRef::new(path_array, 0);
        let err = resolve_call(series.current().unwrap().clone(), &series, None).unwrap_err();
        assert_eq!(err.fault, Fault::LookbackQuoteTooLate);
    }
}
