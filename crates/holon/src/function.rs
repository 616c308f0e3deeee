//! Functions (spec §3): an immutable specification pairing a parameter
//! list with a concrete dispatcher, plus an optional specialization
//! prefill.
//!
//! Grounded on the teacher's `function::Function` (name, signature, and
//! compiled body bundled into one immutable, `Rc`-shared record) but
//! reshaped around spec §3's four named parts — paramlist, facade,
//! exemplar, dispatcher — since Holon's "body" is a host-supplied
//! [`Dispatcher`] rather than compiled bytecode (the compiler is out of
//! scope, spec §1).

use std::fmt;
use std::rc::Rc;

use crate::context::ContextId;
use crate::error::EvalError;
use crate::frame::Frame;
use crate::typeset::Param;
use crate::value::Cell;

/// The result a dispatcher hands back to the evaluator loop (spec §4.7).
/// Defined here (rather than in `dispatch`) because `Dispatcher::call`'s
/// signature needs it and `dispatch` in turn needs `Function`; keeping the
/// shared type on the function side avoids a cycle.
#[derive(Debug)]
pub enum DispatchCode {
    False,
    True,
    Blank,
    Bar,
    Void,
    /// `out` already holds the result.
    Out,
    /// As `Out`, but also sets the `unevaluated` flag on the result.
    OutUnevaluated,
    OutTrueIfWritten,
    OutVoidIfUnwritten,
    OutVoidIfUnwrittenTruthify,
    /// `out` carries a throw; the loop inspects its binding for a catch.
    Thrown,
    /// Rerun the dispatcher against the same frame; args are revalidated.
    RedoChecked,
    /// Rerun without revalidation (the dispatcher itself changed phase).
    RedoUnchecked,
    /// Move the scratch cell back to current-value and restart the switch.
    Reevaluate,
    ReevaluateOnly,
    /// The body was comment-like; `out` is unchanged.
    Invisible,
}

/// The concrete callable implementing a function's body (spec §3, §4.7).
///
/// A trait object rather than an enum of builtins: the evaluator core
/// never enumerates concrete operations (arithmetic, string ops, I/O — all
/// out of scope, spec §1), so every dispatcher is supplied by the host.
pub trait Dispatcher: fmt::Debug {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError>;
}

/// A specialization prefill (spec §3 "exemplar"): one slot per parameter in
/// the paramlist, `Some(cell)` when that argument is pre-supplied.
#[derive(Debug, Clone, Default)]
pub struct Exemplar {
    pub slots: Vec<Option<Cell>>,
}

impl Exemplar {
    #[must_use]
    pub fn for_paramlist(paramlist: &[Param]) -> Self {
        Self { slots: vec![None; paramlist.len()] }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.slots.get(index).and_then(Option::as_ref)
    }
}

/// The function specification (spec §3).
#[derive(Debug)]
pub struct Function {
    pub name: Option<crate::value::SymbolId>,
    /// Ordered parameters (spec §3 "paramlist").
    pub paramlist: Vec<Param>,
    /// Type-erased view used during fulfillment (spec §3 "facade"). For a
    /// plain function this is identical to `paramlist`; a specialization's
    /// facade is its *underlying* function's paramlist, since fulfillment
    /// must still walk every original parameter to apply the exemplar
    /// (spec §4.6: "Specialized arg ... copy it and jump to type check").
    pub facade: Rc<Vec<Param>>,
    /// Specialization prefill, if this function is a specialization of
    /// another (spec §3 "exemplar").
    pub exemplar: Option<Exemplar>,
    pub dispatcher: Rc<dyn Dispatcher>,
    pub binding: Option<ContextId>,
}

pub type FunctionRef = Rc<Function>;

impl Function {
    #[must_use]
    pub fn new(paramlist: Vec<Param>, dispatcher: Rc<dyn Dispatcher>, binding: Option<ContextId>) -> FunctionRef {
        let facade = Rc::new(paramlist.clone());
        Rc::new(Self { name: None, paramlist, facade, exemplar: None, dispatcher, binding })
    }

    #[must_use]
    pub fn named(mut self, name: crate::value::SymbolId) -> Self {
        self.name = Some(name);
        self
    }

    /// Derives a specialization: same facade (so fulfillment still honors
    /// every original parameter's position and quoting class), a fresh
    /// exemplar prefilled from `prefill`, and the same dispatcher (spec §3:
    /// specialization pre-supplies arguments, it does not change the body).
    #[must_use]
    pub fn specialize(base: &FunctionRef, prefill: Exemplar) -> FunctionRef {
        Rc::new(Self {
            name: base.name,
            paramlist: base.paramlist.clone(),
            facade: Rc::clone(&base.facade),
            exemplar: Some(prefill),
            dispatcher: Rc::clone(&base.dispatcher),
            binding: base.binding,
        })
    }

    #[must_use]
    pub fn refinement_count(&self) -> usize {
        self.paramlist.iter().filter(|p| p.is_refinement()).count()
    }
}
