//! Failure taxonomy for the evaluator (spec §4.10, §7).
//!
//! Source-level errors (`Fault`) unwind through frame-drop and are always
//! recoverable by the host; they are never silently swallowed inside the
//! core. Invariant violations (an unknown value kind reaching the switch, an
//! internal sentinel escaping into a user-visible position) are bugs in the
//! evaluator itself and panic with the offending cell for diagnostics rather
//! than being folded into this enum.

use std::fmt;

use strum::{Display, EnumString};

use crate::value::{Cell, Kind};

/// The closed set of source-level failures the evaluator can raise.
///
/// Mirrors the teacher's `ExcType` in shape (a flat `enum` with
/// `strum`-derived `Display`/`EnumString` so hosts can match on the kind or
/// render it without a second lookup table) but is scoped to exactly the
/// failures spec §4.10 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Fault {
    /// A word resolved to an unset (never-assigned) variable.
    NoValue,
    /// Argument fulfillment ran out of input before a required parameter.
    NoArg,
    /// A bar (`|`) was encountered mid-expression where the parameter
    /// fulfilling it is neither hard-quoted nor endable.
    ExpressionBarrier,
    /// A path named a refinement this function does not have, or pushed
    /// refinements were left over after the primary and pickup passes.
    BadRefine,
    /// A non-void argument was supplied to a refinement that was revoked
    /// (its first argument evaluated to void) or never requested.
    BadRefineRevoke,
    /// A specialized or pushed refinement slot held a non-logic value.
    NonLogicRefinement,
    /// An enfix function was discovered too late to serve as a lookback
    /// argument (e.g. reached through a path; see spec §9 Open Questions).
    LookbackQuoteTooLate,
    /// A value claiming to be a variadic handle did not originate from a
    /// variadic parameter.
    NotVarargs,
    /// A set-word chain had no right-hand expression to assign.
    NeedValue,
    /// A `return`/`leave` parameter's primitive escaped to an incompatible
    /// frame, or a dispatcher returned a value failing its own return typeset.
    BadReturnType,
    /// The chunk stack (or the native call stack backing frame recursion)
    /// would be exceeded by pushing another frame.
    StackOverflow,
    /// A `punctuates`-flagged function was reached where the expression
    /// grammar forbids it from continuing the current expression.
    PunctuatorHit,
}

impl Fault {
    /// Evaluator-facing invariant violations that must panic rather than
    /// return a `Fault`. Kept here only as documentation of the boundary;
    /// see spec §7 kind 2. Call sites reaching an unreachable value kind or
    /// an internal sentinel in user-visible position should `panic!`
    /// directly with the offending cell, not route through `Fault`.
    pub const INVARIANT_VIOLATION_NOTE: &'static str =
        "unknown value kind or internal sentinel in user position is a bug, not a Fault";
}

/// A `Fault` together with the evaluator context needed to report it.
///
/// Analogous to the teacher's `RunError::Exc(Box<ExceptionRaise>)`: the bare
/// failure kind plus enough positional/label context for a host to print a
/// useful message, without forcing every call site to carry a full
/// `StackFrame` chain the way a language-level exception would.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub fault: Fault,
    /// Spelling of the word/path label active when the fault was raised, if
    /// any (e.g. the refinement name in `BadRefine`, the function name in
    /// `NoArg`).
    pub label: Option<String>,
    /// Human-readable detail beyond what the bare `Fault` conveys.
    pub detail: Option<String>,
    /// The value kind involved, when relevant (e.g. the non-logic value
    /// supplied to a refinement slot).
    pub kind: Option<Kind>,
    /// Set when this value is not really a `Fault` at all, but a throw in
    /// flight being relayed through a `Result<_, EvalError>`-shaped call
    /// chain (argument fulfillment has no other channel to carry one: spec
    /// §4.6 "Atomicity of failure" treats a throw during fulfillment exactly
    /// like an error for unwind purposes). `fault` is a meaningless
    /// placeholder whenever this is `Some`; callers must check `thrown`
    /// first, via [`Self::into_thrown`].
    pub thrown: Option<Box<Cell>>,
}

impl EvalError {
    pub fn new(fault: Fault) -> Self {
        Self { fault, label: None, detail: None, kind: None, thrown: None }
    }

    /// Wraps a thrown value so it can travel through fulfillment's
    /// `Result<_, EvalError>` closures without a dedicated error channel.
    #[must_use]
    pub fn thrown(cell: Cell) -> Self {
        Self { fault: Fault::NoValue, label: None, detail: None, kind: None, thrown: Some(Box::new(cell)) }
    }

    /// Recovers the thrown value, if this is one (see [`Self::thrown`]).
    #[must_use]
    pub fn into_thrown(self) -> Option<Cell> {
        self.thrown.map(|boxed| *boxed)
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fault)?;
        if let Some(label) = &self.label {
            write!(f, " ({label})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

#[cfg(feature = "report-json")]
impl serde::Serialize for EvalError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("EvalError", 4)?;
        state.serialize_field("fault", &self.fault.to_string())?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("detail", &self.detail)?;
        state.serialize_field("kind", &self.kind.map(|k| k.to_string()))?;
        state.end()
    }
}

/// Result alias used throughout the evaluator for fallible, non-throw paths.
pub type EvalResult<T> = Result<T, EvalError>;
