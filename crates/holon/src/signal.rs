//! Signal and throw plumbing (spec §4.9), plus resource accounting (spec
//! §4.10, §5).
//!
//! The `ResourceTracker` trait is grounded directly on the teacher's
//! `resource::ResourceTracker` (`on_allocate`, `on_container_insert`,
//! `on_free`, `check_time`, `check_recursion_depth`, `check_large_result`,
//! `allocation_count`, `current_memory_bytes`) — the same shape, scoped down
//! to what an evaluator core (rather than a full managed runtime) needs to
//! track. `return`/`leave` are implemented as ordinary [`Dispatcher`]s that
//! produce a throw, exactly like any other non-local exit a host function
//! might raise; the evaluator core has no privileged knowledge of them
//! beyond the paramlist classes that install them (`dispatch::
//! install_return_leave`).

use std::rc::Rc;

use crate::error::EvalError;
use crate::frame::Frame;
use crate::function::{DispatchCode, Dispatcher, Function, FunctionRef};
use crate::typeset::{Param, ParamClass};
use crate::value::{Cell, SymbolId};

/// Reserved spelling for a `return`/`leave` primitive's own sole parameter.
/// Never produced by a reader (out of scope, spec §1), so it can't collide
/// with a user-visible symbol.
const RETURN_VALUE_SYMBOL: SymbolId = SymbolId(u32::MAX);

/// Resource accounting hooks (spec §4.10 `stack-overflow` and the
/// surrounding resource-limit faults; spec §5 "Resource accounting").
/// A host with no limits at all can use [`NoLimitTracker`].
pub trait ResourceTracker {
    fn on_allocate(&mut self, bytes: usize);
    fn on_container_insert(&mut self, count: usize);
    fn on_free(&mut self, bytes: usize);
    fn check_time(&self) -> Result<(), EvalError>;
    fn check_recursion_depth(&self, depth: usize) -> Result<(), EvalError>;
    fn check_large_result(&self, size: usize) -> Result<(), EvalError>;
    fn allocation_count(&self) -> u64;
    fn current_memory_bytes(&self) -> u64;
}

/// A tracker that never objects, for hosts (and tests) that don't need
/// resource limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn on_allocate(&mut self, _bytes: usize) {}
    fn on_container_insert(&mut self, _count: usize) {}
    fn on_free(&mut self, _bytes: usize) {}
    fn check_time(&self) -> Result<(), EvalError> {
        Ok(())
    }
    fn check_recursion_depth(&self, _depth: usize) -> Result<(), EvalError> {
        Ok(())
    }
    fn check_large_result(&self, _size: usize) -> Result<(), EvalError> {
        Ok(())
    }
    fn allocation_count(&self) -> u64 {
        0
    }
    fn current_memory_bytes(&self) -> u64 {
        0
    }
}

/// Cooperative interrupt checkpoint (spec §4.9 "cooperative interrupt
/// checks"): rather than every evaluator step paying for a syscall-backed
/// time check, the loop ticks this counter and only calls into
/// `ResourceTracker::check_time` once every `period` steps.
#[derive(Debug, Clone, Copy)]
pub struct SignalCounter {
    ticks: u32,
    period: u32,
}

impl SignalCounter {
    #[must_use]
    pub fn new(period: u32) -> Self {
        Self { ticks: 0, period: period.max(1) }
    }

    /// Advances the counter by one step; returns `true` exactly when the
    /// caller should run its expensive check this time.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.period {
            self.ticks = 0;
            true
        } else {
            false
        }
    }
}

impl Default for SignalCounter {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Classifies a frame's `out` cell once a dispatcher reports `Thrown` (spec
/// §4.9): `Ok(value)` if this frame is the throw's target (the frame should
/// treat `value` as its own result and stop unwinding); `Err(rethrow)` if
/// the throw belongs to some enclosing frame and must keep propagating.
pub fn catch(out: Cell, this_frame_id: u32) -> Result<Cell, Cell> {
    match out.into_throw() {
        Some((value, Some(target), _)) if target == this_frame_id => Ok(value),
        Some((value, target, label)) => Err(Cell::throw(value, target, label)),
        None => Ok(out),
    }
}

/// Dispatcher for a `return` primitive bound to one call (spec §3 "Return":
/// "captures a return-primitive bound to the current frame"). Invoking it
/// throws its one argument, targeted at `target_frame_id`.
#[derive(Debug)]
pub struct ReturnDispatcher {
    target_frame_id: u32,
}

impl ReturnDispatcher {
    #[must_use]
    pub fn bound_to(target_frame_id: u32) -> FunctionRef {
        let paramlist = vec![Param::new(ParamClass::Normal, RETURN_VALUE_SYMBOL).endable()];
        Function::new(paramlist, Rc::new(Self { target_frame_id }), None)
    }
}

impl Dispatcher for ReturnDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        let value = frame.arg(0).clone();
        frame.set_out(Cell::throw(value, Some(self.target_frame_id), None));
        Ok(DispatchCode::Thrown)
    }
}

/// Dispatcher for a `leave` primitive (spec §3 "Leave"): like `return` but
/// takes no argument, always throwing void.
#[derive(Debug)]
pub struct LeaveDispatcher {
    target_frame_id: u32,
}

impl LeaveDispatcher {
    #[must_use]
    pub fn bound_to(target_frame_id: u32) -> FunctionRef {
        Function::new(vec![], Rc::new(Self { target_frame_id }), None)
    }
}

impl Dispatcher for LeaveDispatcher {
    fn call(&self, frame: &mut Frame) -> Result<DispatchCode, EvalError> {
        frame.set_out(Cell::throw(Cell::void(), Some(self.target_frame_id), None));
        Ok(DispatchCode::Thrown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_claims_throw_targeted_at_this_frame() {
        let thrown = Cell::throw(Cell::integer(9), Some(3), None);
        let result = catch(thrown, 3).unwrap();
        assert_eq!(result.kind(), crate::value::Kind::Integer);
    }

    #[test]
    fn catch_rethrows_when_target_differs() {
        let thrown = Cell::throw(Cell::integer(9), Some(3), None);
        let err = catch(thrown, 4).unwrap_err();
        assert!(err.is_thrown());
    }

    #[test]
    fn non_throw_out_passes_through_unchanged() {
        let value = Cell::integer(1);
        let result = catch(value, 0).unwrap();
        assert_eq!(result.kind(), crate::value::Kind::Integer);
    }

    #[test]
    fn signal_counter_fires_once_per_period() {
        let mut counter = SignalCounter::new(3);
        assert!(!counter.tick());
        assert!(!counter.tick());
        assert!(counter.tick());
        assert!(!counter.tick());
    }
}
