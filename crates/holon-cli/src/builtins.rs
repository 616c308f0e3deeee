//! A handful of hand-written dispatchers so the REPL has something to
//! evaluate. None of this is part of the evaluator core — concrete
//! data-type operations are an explicit host responsibility — but without
//! *some* functions bound into the top-level context there is nothing for
//! the loop to call. The `+`/`-` enfix pair and the `if` prefix function
//! mirror the evaluator crate's own inline test fixtures (its
//! `AddDispatcher` and the refinement/enfix scenarios in its test modules),
//! just registered into a real context instead of a throwaway one.

use std::rc::Rc;

use holon_core::{
    Cell, CellFlags, ContextArena, ContextId, DispatchCode, Dispatcher, EvalError, Frame, Function, Kind, Param,
    ParamClass, SymbolId, TypesetMask,
};

use crate::parser::SymbolTable;

fn arg_integer(frame: &Frame, index: usize) -> i64 {
    match frame.arg(index).payload() {
        holon_core::Payload::Integer(v) => *v,
        _ => 0,
    }
}

#[derive(Debug)]
struct AddDispatcher;
impl Dispatcher for AddDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        frame.set_out(Cell::integer(arg_integer(frame, 0) + arg_integer(frame, 1)));
        Ok(DispatchCode::Out)
    }
}

#[derive(Debug)]
struct SubDispatcher;
impl Dispatcher for SubDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        frame.set_out(Cell::integer(arg_integer(frame, 0) - arg_integer(frame, 1)));
        Ok(DispatchCode::Out)
    }
}

#[derive(Debug)]
struct MulDispatcher;
impl Dispatcher for MulDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        frame.set_out(Cell::integer(arg_integer(frame, 0) * arg_integer(frame, 1)));
        Ok(DispatchCode::Out)
    }
}

/// Prefix `if condition then else` — the `else` branch is a refinement so
/// `if cond then` alone is legal and yields void when the condition is
/// falsey and no `else` was supplied.
#[derive(Debug)]
struct IfDispatcher;
impl Dispatcher for IfDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        let condition = frame.arg(0).is_truthy();
        if condition {
            frame.set_out(frame.arg(1).clone());
        } else if frame.arg(2).is_truthy() {
            frame.set_out(frame.arg(3).clone());
        } else {
            frame.set_out(Cell::void());
        }
        Ok(DispatchCode::Out)
    }
}

/// Invisible comment-like function: takes one hard-quoted argument and
/// discards it, leaving `out` untouched (spec-visible `Invisible` outcome).
#[derive(Debug)]
struct CommentDispatcher;
impl Dispatcher for CommentDispatcher {
    fn call(&self, _frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        Ok(DispatchCode::Invisible)
    }
}

#[derive(Debug)]
struct PrintDispatcher;
impl Dispatcher for PrintDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        println!("{}", describe(frame.arg(0)));
        frame.set_out(Cell::void());
        Ok(DispatchCode::Out)
    }
}

fn describe(cell: &Cell) -> String {
    match cell.payload() {
        holon_core::Payload::Integer(v) => v.to_string(),
        holon_core::Payload::Decimal(v) => v.to_string(),
        holon_core::Payload::Logic(v) => v.to_string(),
        holon_core::Payload::Symbol(s) => format!("word#{}", s.0),
        _ => format!("{:?}", cell.kind()),
    }
}

fn int_typeset() -> TypesetMask {
    TypesetMask::of(&[Kind::Integer])
}

/// Registers `+`, `-`, `*`, `if`, `comment`, and `print` into a fresh
/// top-level context and returns its id, ready to hand to the parser as
/// every word's binding.
pub fn install(contexts: &mut ContextArena, symbols: &mut SymbolTable) -> ContextId {
    let ctx = contexts.push(16).expect("top-level context always fits under the depth ceiling");

    let binary = |dispatcher: Rc<dyn Dispatcher>| {
        let paramlist = vec![
            Param::new(ParamClass::Normal, SymbolId(0)).with_accepted(int_typeset()),
            Param::new(ParamClass::Normal, SymbolId(0)).with_accepted(int_typeset()),
        ];
        Function::new(paramlist, dispatcher, Some(ctx))
    };

    let mut define_enfix = |name: &str, dispatcher: Rc<dyn Dispatcher>| {
        let symbol = symbols.intern(name);
        let function = binary(dispatcher).named(symbol);
        let mut cell = Cell::function(function, Some(ctx));
        cell.flags_mut().insert(CellFlags::ENFIXED);
        contexts.get_mut(ctx).define(symbol, cell);
    };
    define_enfix("+", Rc::new(AddDispatcher));
    define_enfix("-", Rc::new(SubDispatcher));
    define_enfix("*", Rc::new(MulDispatcher));

    let if_symbol = symbols.intern("if");
    let else_symbol = symbols.intern("else");
    let if_paramlist = vec![
        Param::new(ParamClass::Normal, if_symbol),
        Param::new(ParamClass::Normal, if_symbol),
        Param::new(ParamClass::Refinement, else_symbol),
        Param::new(ParamClass::Normal, else_symbol),
    ];
    let if_fn = Function::new(if_paramlist, Rc::new(IfDispatcher), Some(ctx)).named(if_symbol);
    contexts.get_mut(ctx).define(if_symbol, Cell::function(if_fn, Some(ctx)));

    let comment_symbol = symbols.intern("comment");
    let comment_paramlist = vec![Param::new(ParamClass::HardQuote, comment_symbol)];
    let comment_fn = Function::new(comment_paramlist, Rc::new(CommentDispatcher), Some(ctx)).named(comment_symbol);
    contexts.get_mut(ctx).define(comment_symbol, Cell::function(comment_fn, Some(ctx)));

    let print_symbol = symbols.intern("print");
    let print_paramlist = vec![Param::new(ParamClass::Normal, print_symbol)];
    let print_fn = Function::new(print_paramlist, Rc::new(PrintDispatcher), Some(ctx)).named(print_symbol);
    contexts.get_mut(ctx).define(print_symbol, Cell::function(print_fn, Some(ctx)));

    ctx
}
