//! End-to-end evaluator scenarios driven entirely through the crate's
//! public surface (`Engine`/`eval`/`ArrayFeed`), the way a host embedding
//! this evaluator actually would, rather than reaching into any module
//! internals the way the crate's own inline unit tests do.

use std::rc::Rc;

use holon_core::{
    eval, ArrayData, ArrayFeed, Cell, CellFlags, ContextArena, Engine, EntryFlags, EvalError, Fault, Function, Kind,
    NoLimitTracker, NoopTracer, Param, ParamClass, PathActor, SeriesRef, SymbolId, TypesetMask,
};
use holon_core::{DispatchCode, Dispatcher, Frame};

#[derive(Debug)]
struct NullActor;
impl PathActor for NullActor {
    fn select(&self, _base: &Cell, _selector: &Cell) -> Result<Cell, EvalError> {
        Err(EvalError::new(Fault::NoValue))
    }
    fn select_set(&self, _base: &Cell, _selector: &Cell, _value: Cell) -> Result<(), EvalError> {
        Err(EvalError::new(Fault::NoValue))
    }
}

fn harness<'a>(actor: &'a NullActor, resources: &'a mut NoLimitTracker, tracer: &'a mut NoopTracer) -> Engine<'a> {
    Engine::new(actor, resources, tracer)
}

fn block_feed(cells: Vec<Cell>, specifier: Option<holon_core::ContextId>) -> Box<ArrayFeed> {
    Box::new(ArrayFeed::new(SeriesRef::new(ArrayData::new(cells), 0), specifier))
}

fn int(cell: &Cell) -> i64 {
    match cell.payload() {
        holon_core::Payload::Integer(v) => *v,
        other => panic!("expected an integer payload, found {other:?}"),
    }
}

#[derive(Debug)]
struct AddDispatcher;
impl Dispatcher for AddDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        frame.set_out(Cell::integer(int(frame.arg(0)) + int(frame.arg(1))));
        Ok(DispatchCode::Out)
    }
}

fn define_plus(contexts: &mut ContextArena, ctx: holon_core::ContextId, symbol: SymbolId) {
    let paramlist = vec![
        Param::new(ParamClass::Normal, symbol).with_accepted(TypesetMask::of(&[Kind::Integer])),
        Param::new(ParamClass::Normal, symbol).with_accepted(TypesetMask::of(&[Kind::Integer])),
    ];
    let function = Function::new(paramlist, Rc::new(AddDispatcher), Some(ctx));
    let mut cell = Cell::function(function, Some(ctx));
    cell.flags_mut().insert(CellFlags::ENFIXED);
    contexts.get_mut(ctx).define(symbol, cell);
}

/// Scenario 1 (spec §8): `1 + 2` evaluates the enfix `+` with the
/// already-produced left-hand `1` and the sub-evaluated right-hand `2`.
#[test]
fn scenario_plus_combines_left_and_right() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    define_plus(engine.contexts_mut(), ctx, SymbolId(1));

    let source = vec![Cell::integer(1), Cell::word(Kind::Word, SymbolId(1), Some(ctx)), Cell::integer(2)];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 3);
}

#[derive(Debug)]
struct SquareDispatcher;
impl Dispatcher for SquareDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        let n = int(frame.arg(0));
        frame.set_out(Cell::integer(n * n));
        Ok(DispatchCode::Out)
    }
}

fn define_square(contexts: &mut ContextArena, ctx: holon_core::ContextId, symbol: SymbolId, class: ParamClass) {
    let paramlist = vec![Param::new(class, symbol).with_accepted(TypesetMask::of(&[Kind::Integer]))];
    let function = Function::new(paramlist, Rc::new(SquareDispatcher), Some(ctx));
    contexts.get_mut(ctx).define(symbol, Cell::function(function, Some(ctx)));
}

/// Scenario 2 (spec §8): a `normal`-class argument lets enfix lookahead run
/// inside its own sub-evaluation, so `sqr 2 + 1` evaluates `2 + 1` first and
/// squares the sum (9). A `tight`-class argument suppresses that lookahead,
/// so it only consumes the bare `2`; the squared result (4) then becomes the
/// left-hand operand for the `+ 1` that follows, continuing the same
/// top-level expression sequence to 5.
#[test]
fn scenario_normal_vs_tight_argument_consumption() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    define_plus(engine.contexts_mut(), ctx, SymbolId(1));
    define_square(engine.contexts_mut(), ctx, SymbolId(2), ParamClass::Normal);

    let source = vec![
        Cell::word(Kind::Word, SymbolId(2), Some(ctx)),
        Cell::integer(2),
        Cell::word(Kind::Word, SymbolId(1), Some(ctx)),
        Cell::integer(1),
    ];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 9);

    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    define_plus(engine.contexts_mut(), ctx, SymbolId(1));
    define_square(engine.contexts_mut(), ctx, SymbolId(2), ParamClass::Tight);

    let source = vec![
        Cell::word(Kind::Word, SymbolId(2), Some(ctx)),
        Cell::integer(2),
        Cell::word(Kind::Word, SymbolId(1), Some(ctx)),
        Cell::integer(1),
    ];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 5);
}

#[derive(Debug)]
struct IfDispatcher;
impl Dispatcher for IfDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        if frame.arg(0).is_truthy() {
            frame.set_out(frame.arg(1).clone());
        } else if frame.arg(2).is_truthy() {
            frame.set_out(frame.arg(3).clone());
        } else {
            frame.set_out(Cell::void());
        }
        Ok(DispatchCode::Out)
    }
}

fn define_if(contexts: &mut ContextArena, ctx: holon_core::ContextId, if_symbol: SymbolId, else_symbol: SymbolId) {
    let paramlist = vec![
        Param::new(ParamClass::Normal, if_symbol),
        Param::new(ParamClass::Normal, if_symbol),
        Param::new(ParamClass::Refinement, else_symbol),
        Param::new(ParamClass::Normal, else_symbol),
    ];
    let function = Function::new(paramlist, Rc::new(IfDispatcher), Some(ctx));
    contexts.get_mut(ctx).define(if_symbol, Cell::function(function, Some(ctx)));
}

/// Scenario 3 (spec §8): `if`/`else` dispatch via a refinement. A refinement
/// is only "requested" when named through a path's selector chain (spec
/// §4.4), so the `else` branch is reached as `if/else`, not as a bare word
/// sitting in source position — a plain `if true 1 else 2` would leave
/// `else` as an ordinary (unbound) word starting the next expression.
#[test]
fn scenario_if_else_refinement_dispatch() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    let if_symbol = SymbolId(1);
    let else_symbol = SymbolId(2);
    define_if(engine.contexts_mut(), ctx, if_symbol, else_symbol);

    // `if/else true 1 2` takes the truthy branch.
    let head = Cell::word(Kind::Word, if_symbol, Some(ctx));
    let else_word = Cell::word(Kind::Word, else_symbol, Some(ctx));
    let source =
        vec![path_cell(head, vec![else_word], ctx), Cell::logic(true), Cell::integer(1), Cell::integer(2)];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 1);
}

#[test]
fn scenario_if_without_else_on_false_condition_is_void() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    let if_symbol = SymbolId(1);
    let else_symbol = SymbolId(2);
    define_if(engine.contexts_mut(), ctx, if_symbol, else_symbol);

    // Plain (pathless) call: `else` is never requested, so its own argument
    // slot is forced to void without consuming anything further from the
    // feed, and a false condition with no taken branch yields void.
    let source = vec![Cell::word(Kind::Word, if_symbol, Some(ctx)), Cell::logic(false), Cell::integer(1)];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert!(result.is_void());
}

#[derive(Debug)]
struct CaptureDispatcher;
impl Dispatcher for CaptureDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        let b = int(frame.arg(1));
        let d = int(frame.arg(3));
        frame.set_out(Cell::integer(b * 100 + d));
        Ok(DispatchCode::Out)
    }
}

fn define_foo(contexts: &mut ContextArena, ctx: holon_core::ContextId, foo: SymbolId, b: SymbolId, d: SymbolId) {
    let paramlist = vec![
        Param::new(ParamClass::Refinement, b),
        Param::new(ParamClass::Normal, b).with_accepted(TypesetMask::of(&[Kind::Integer])),
        Param::new(ParamClass::Refinement, d),
        Param::new(ParamClass::Normal, d).with_accepted(TypesetMask::of(&[Kind::Integer])),
    ];
    let function = Function::new(paramlist, Rc::new(CaptureDispatcher), Some(ctx));
    contexts.get_mut(ctx).define(foo, Cell::function(function, Some(ctx)));
}

fn path_cell(head: Cell, selectors: Vec<Cell>, ctx: holon_core::ContextId) -> Cell {
    let mut cells = vec![head];
    cells.extend(selectors);
    Cell::series(Kind::Path, SeriesRef::new(ArrayData::new(cells), 0), Some(ctx))
}

/// Scenario 4 (spec §8): `foo/b/d 10 20` vs `foo/d/b 10 20` — refinements
/// named in a different order at the call site consume the trailing source
/// values in the order each refinement becomes due during the pickup pass,
/// not in the order the refinements were declared. `b` is declared before
/// `d`, so naming `d` first at the call site defers `b` to the pickup pass:
/// `d` claims the first trailing value and `b` claims the second, the
/// reverse of what `foo/b/d` produces from the same trailing values.
#[test]
fn scenario_path_refinement_order_controls_argument_binding() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    let foo = SymbolId(1);
    let b = SymbolId(2);
    let d = SymbolId(3);
    define_foo(engine.contexts_mut(), ctx, foo, b, d);

    let head = Cell::word(Kind::Word, foo, Some(ctx));
    let b_word = Cell::word(Kind::Word, b, Some(ctx));
    let d_word = Cell::word(Kind::Word, d, Some(ctx));

    let source = vec![
        path_cell(head.clone(), vec![b_word.clone(), d_word.clone()], ctx),
        Cell::integer(10),
        Cell::integer(20),
    ];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 10 * 100 + 20);

    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    define_foo(engine.contexts_mut(), ctx, foo, b, d);
    let head = Cell::word(Kind::Word, foo, Some(ctx));
    let b_word = Cell::word(Kind::Word, b, Some(ctx));
    let d_word = Cell::word(Kind::Word, d, Some(ctx));

    let source =
        vec![path_cell(head, vec![d_word, b_word], ctx), Cell::integer(10), Cell::integer(20)];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 20 * 100 + 10);
}

/// Scenario 5 (spec §8): `x: y: 10 + 5` evaluates the right-hand expression
/// exactly once and assigns the same result to every target in the chain.
#[test]
fn scenario_chained_set_word_assigns_same_value_to_every_target() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    define_plus(engine.contexts_mut(), ctx, SymbolId(1));
    let x = SymbolId(10);
    let y = SymbolId(11);

    let source = vec![
        Cell::word(Kind::SetWord, x, Some(ctx)),
        Cell::word(Kind::SetWord, y, Some(ctx)),
        Cell::integer(10),
        Cell::word(Kind::Word, SymbolId(1), Some(ctx)),
        Cell::integer(5),
    ];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 15);
    assert_eq!(int(engine.contexts().get(ctx).get(x).unwrap()), 15);
    assert_eq!(int(engine.contexts().get(ctx).get(y).unwrap()), 15);
}

#[test]
fn scenario_set_word_with_nothing_after_is_need_value() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    let x = SymbolId(10);
    let source = vec![Cell::word(Kind::SetWord, x, Some(ctx))];
    let err = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap_err();
    assert_eq!(err.fault, Fault::NeedValue);
}

#[derive(Debug)]
struct CommentDispatcher;
impl Dispatcher for CommentDispatcher {
    fn call(&self, _frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        Ok(DispatchCode::Invisible)
    }
}

/// Scenario 6 (spec §8): `comment "hi" 1 + 2` — the invisible `comment`
/// call consumes its own hard-quoted argument and produces no output of its
/// own, but must not block the `1 + 2` that follows it from completing as
/// ordinary enfix dispatch.
#[test]
fn scenario_invisible_call_does_not_block_following_enfix() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let ctx = engine.contexts_mut().push(4).unwrap();
    define_plus(engine.contexts_mut(), ctx, SymbolId(1));

    let comment_symbol = SymbolId(20);
    let comment_paramlist = vec![Param::new(ParamClass::HardQuote, comment_symbol)];
    let comment_fn = Function::new(comment_paramlist, Rc::new(CommentDispatcher), Some(ctx));
    engine.contexts_mut().get_mut(ctx).define(comment_symbol, Cell::function(comment_fn, Some(ctx)));

    let source = vec![
        Cell::word(Kind::Word, comment_symbol, Some(ctx)),
        Cell::word(Kind::Word, SymbolId(99), Some(ctx)), // hard-quoted verbatim, never looked up
        Cell::integer(1),
        Cell::word(Kind::Word, SymbolId(1), Some(ctx)),
        Cell::integer(2),
    ];
    let result = eval(&mut engine, block_feed(source, Some(ctx)), EntryFlags::TO_END).unwrap();
    assert_eq!(int(&result), 3);
}

/// Boundary case: an empty source feed evaluates to void.
#[test]
fn boundary_empty_source_is_void() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let result = eval(&mut engine, block_feed(vec![], None), EntryFlags::TO_END).unwrap();
    assert!(result.is_void());
}

/// Boundary case: a bare expression barrier mid-feed does not itself raise
/// an error when no pending argument fulfillment is quoting past it.
#[test]
fn boundary_bare_bar_sequence_evaluates_to_void() {
    let actor = NullActor;
    let mut resources = NoLimitTracker;
    let mut tracer = NoopTracer;
    let mut engine = harness(&actor, &mut resources, &mut tracer);
    let source = vec![Cell::bar(), Cell::bar()];
    let result = eval(&mut engine, block_feed(source, None), EntryFlags::TO_END).unwrap();
    assert!(result.is_void());
}
