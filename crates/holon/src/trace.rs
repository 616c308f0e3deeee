//! Evaluator tracing infrastructure.
//!
//! Provides a trait-based tracing system for the evaluator loop with
//! zero-cost abstraction: when [`NoopTracer`] is used, every trace call
//! compiles away entirely via monomorphization. This is the evaluator's only
//! diagnostics/logging layer — grounded on the teacher's `tracer::VmTracer`,
//! which plays the same role for its bytecode VM. Neither crate pulls in a
//! `log`/`tracing` dependency; a pluggable trait serves both production
//! (silent) and development (recorded/printed) needs.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable per-step log to stderr |
//! | [`RecordingTracer`] | Full event log, used by tests to assert on evaluator behavior |

use crate::value::Kind;

/// One evaluator-visible event worth tracing.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// An expression step began dispatching on a cell of the given kind.
    Step { kind: Kind },
    /// A frame was pushed for a function call.
    FramePush { label: Option<String>, depth: usize },
    /// A frame was popped after its dispatcher completed.
    FramePop { depth: usize },
    /// The enfix scheduler decided to continue into a lookback call.
    EnfixContinue { label: Option<String> },
    /// A one-shot deferred lookback resumed at the parent frame.
    DeferredResume { depth: usize },
    /// A throw was raised and is unwinding past this frame.
    ThrowUnwind { depth: usize },
    /// A throw was caught because its binding matched this frame.
    ThrowCaught { depth: usize },
}

/// Hook points the evaluator loop calls at key execution events.
///
/// Implementations that don't care about a given event accept the default
/// (empty) body; only [`RecordingTracer`]/[`StderrTracer`] override more than
/// a couple of methods.
pub trait EvalTracer {
    fn on_step(&mut self, _kind: Kind) {}
    fn on_frame_push(&mut self, _label: Option<&str>, _depth: usize) {}
    fn on_frame_pop(&mut self, _depth: usize) {}
    fn on_enfix_continue(&mut self, _label: Option<&str>) {}
    fn on_deferred_resume(&mut self, _depth: usize) {}
    fn on_throw_unwind(&mut self, _depth: usize) {}
    fn on_throw_caught(&mut self, _depth: usize) {}
}

/// Production default: every hook is a no-op, and the optimizer removes the
/// calls entirely since `NoopTracer` carries no state to observe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl EvalTracer for NoopTracer {}

/// Prints each event to stderr as it happens. Useful for manually driving
/// the demo CLI (`holon-cli`) with `--trace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl EvalTracer for StderrTracer {
    fn on_step(&mut self, kind: Kind) {
        eprintln!("step: {kind:?}");
    }

    fn on_frame_push(&mut self, label: Option<&str>, depth: usize) {
        eprintln!("push[{depth}]: {}", label.unwrap_or("<anon>"));
    }

    fn on_frame_pop(&mut self, depth: usize) {
        eprintln!("pop[{depth}]");
    }

    fn on_enfix_continue(&mut self, label: Option<&str>) {
        eprintln!("enfix-continue: {}", label.unwrap_or("<anon>"));
    }

    fn on_deferred_resume(&mut self, depth: usize) {
        eprintln!("deferred-resume[{depth}]");
    }

    fn on_throw_unwind(&mut self, depth: usize) {
        eprintln!("throw-unwind[{depth}]");
    }

    fn on_throw_caught(&mut self, depth: usize) {
        eprintln!("throw-caught[{depth}]");
    }
}

/// Captures every event in order, for tests that assert on evaluator
/// behavior (e.g. "the deferred chain resumes at most once per frame").
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

impl EvalTracer for RecordingTracer {
    fn on_step(&mut self, kind: Kind) {
        self.events.push(TraceEvent::Step { kind });
    }

    fn on_frame_push(&mut self, label: Option<&str>, depth: usize) {
        self.events.push(TraceEvent::FramePush { label: label.map(str::to_owned), depth });
    }

    fn on_frame_pop(&mut self, depth: usize) {
        self.events.push(TraceEvent::FramePop { depth });
    }

    fn on_enfix_continue(&mut self, label: Option<&str>) {
        self.events.push(TraceEvent::EnfixContinue { label: label.map(str::to_owned) });
    }

    fn on_deferred_resume(&mut self, depth: usize) {
        self.events.push(TraceEvent::DeferredResume { depth });
    }

    fn on_throw_unwind(&mut self, depth: usize) {
        self.events.push(TraceEvent::ThrowUnwind { depth });
    }

    fn on_throw_caught(&mut self, depth: usize) {
        self.events.push(TraceEvent::ThrowCaught { depth });
    }
}
