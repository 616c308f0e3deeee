//! The dispatcher protocol, loop side (spec §4.7): interprets the
//! [`DispatchCode`] a function body hands back, including the `redo` and
//! `reevaluate` replay codes and invisible-body handling, and installs the
//! `return`/`leave` primitives into a callee frame just before its
//! dispatcher runs.
//!
//! Grounded on the teacher's `tracer::TraceEvent::{Call, Return}` pairing
//! (every dispatch is bracketed by a traced call/return, mirrored here via
//! [`crate::trace::EvalTracer`]) and on `resource::ResourceTracker`'s
//! call-depth accounting, reused here through [`crate::signal`].

use crate::error::EvalError;
use crate::frame::Frame;
use crate::function::{DispatchCode, FunctionRef};
use crate::signal::{LeaveDispatcher, ReturnDispatcher};
use crate::typeset::ParamClass;
use crate::value::{Cell, CellFlags};

/// What the evaluator loop must do after one dispatcher invocation settles
/// (spec §4.7). Distinct from [`DispatchCode`]: this collapses the dozen
/// result codes down to the five shapes of follow-up action the loop
/// actually takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `frame.out()` holds the finished result; nothing more to do.
    Done,
    /// `frame.out()` carries a throw; the loop must unwind looking for a
    /// catcher (spec §4.9).
    Thrown,
    /// Rerun the same dispatcher against the same frame. `revalidate`
    /// distinguishes `RedoChecked` (args must pass fulfillment's type
    /// checks again) from `RedoUnchecked` (the dispatcher itself changed
    /// phase and the args are already known good).
    Redo { revalidate: bool },
    /// Move `frame.scratch()` back into current-value position and restart
    /// the evaluator switch without consuming further input.
    Reevaluate { only: bool },
    /// The call was invisible (a comment-like body); `out` is unchanged and
    /// the calling expression's own lookahead continues as though the call
    /// had never happened.
    Invisible,
}

/// Installs the `return`/`leave` primitives a paramlist declares (spec §3:
/// "not fulfilled from the call site at all"), binding each to `callee`'s
/// own frame id so a later invocation of the primitive throws back to
/// exactly this call.
pub fn install_return_leave(callee: &mut Frame, func: &FunctionRef) {
    for (index, param) in func.paramlist.iter().enumerate() {
        let cell = match param.class {
            ParamClass::Return => Some(Cell::function(ReturnDispatcher::bound_to(callee.id()), None)),
            ParamClass::Leave => Some(Cell::function(LeaveDispatcher::bound_to(callee.id()), None)),
            _ => None,
        };
        if let Some(cell) = cell {
            *callee.arg_mut(index) = cell;
        }
    }
}

/// Runs exactly one dispatcher invocation and classifies the result (spec
/// §4.7). Does not loop on `Redo`/`Reevaluate` itself — re-fulfillment (for
/// `RedoChecked`) and switch restart (for `Reevaluate`) are `eval`'s job,
/// since both need state this module doesn't own.
pub fn dispatch_once(callee: &mut Frame, func: &FunctionRef) -> Result<Outcome, EvalError> {
    let code = func.dispatcher.call(callee)?;
    Ok(match code {
        DispatchCode::False => {
            callee.set_out(Cell::logic(false));
            Outcome::Done
        }
        DispatchCode::True => {
            callee.set_out(Cell::logic(true));
            Outcome::Done
        }
        DispatchCode::Blank => {
            callee.set_out(Cell::blank());
            Outcome::Done
        }
        DispatchCode::Bar => {
            callee.set_out(Cell::bar());
            Outcome::Done
        }
        DispatchCode::Void => {
            callee.set_out(Cell::void());
            Outcome::Done
        }
        DispatchCode::Out => Outcome::Done,
        DispatchCode::OutUnevaluated => {
            callee.out_mut().flags_mut().insert(CellFlags::UNEVALUATED);
            Outcome::Done
        }
        DispatchCode::OutTrueIfWritten => {
            let written = !callee.out().is_void();
            callee.set_out(Cell::logic(written));
            Outcome::Done
        }
        DispatchCode::OutVoidIfUnwritten => Outcome::Done,
        DispatchCode::OutVoidIfUnwrittenTruthify => {
            if !callee.out().is_void() {
                let truthy = callee.out().is_truthy();
                callee.set_out(Cell::logic(truthy));
            }
            Outcome::Done
        }
        DispatchCode::Thrown => Outcome::Thrown,
        DispatchCode::RedoChecked => Outcome::Redo { revalidate: true },
        DispatchCode::RedoUnchecked => Outcome::Redo { revalidate: false },
        DispatchCode::Reevaluate => Outcome::Reevaluate { only: false },
        DispatchCode::ReevaluateOnly => Outcome::Reevaluate { only: true },
        DispatchCode::Invisible => Outcome::Invisible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ArrayFeed;
    use crate::function::{Dispatcher, Function};
    use crate::value::{ArrayData, Kind, SeriesRef};
    use std::rc::Rc;

    #[derive(Debug)]
    struct Fixed(DispatchCode);
    impl Dispatcher for Fixed {
        fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
            let _ = frame;
            Ok(match self.0 {
                DispatchCode::False => DispatchCode::False,
                DispatchCode::Invisible => DispatchCode::Invisible,
                _ => DispatchCode::Void,
            })
        }
    }

    fn empty_frame() -> Frame {
        let feed = ArrayFeed::new(SeriesRef::new(ArrayData::new(vec![]), 0), None);
        Frame::new(0, Box::new(feed), 0)
    }

    #[test]
    fn false_code_writes_logic_false() {
        let func = Function::new(vec![], Rc::new(Fixed(DispatchCode::False)), None);
        let mut frame = empty_frame();
        let outcome = dispatch_once(&mut frame, &func).unwrap();
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(frame.out().kind(), Kind::Logic);
        assert!(!frame.out().is_truthy());
    }

    #[test]
    fn invisible_code_leaves_out_untouched() {
        let func = Function::new(vec![], Rc::new(Fixed(DispatchCode::Invisible)), None);
        let mut frame = empty_frame();
        frame.set_out(Cell::integer(5));
        let outcome = dispatch_once(&mut frame, &func).unwrap();
        assert_eq!(outcome, Outcome::Invisible);
        assert_eq!(frame.out().kind(), Kind::Integer);
    }

    #[test]
    fn install_return_binds_to_callee_frame_id() {
        let paramlist = vec![crate::typeset::Param::new(ParamClass::Return, crate::value::SymbolId(0))];
        let func = Function::new(paramlist, Rc::new(Fixed(DispatchCode::Void)), None);
        let mut callee = empty_frame();
        install_return_leave(&mut callee, &func);
        assert_eq!(callee.arg(0).kind(), Kind::Function);
    }
}
