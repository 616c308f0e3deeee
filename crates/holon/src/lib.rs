//! Holon: the central evaluator of a homoiconic, block-structured language
//! in the Rebol/Ren-C lineage.
//!
//! This crate owns exactly the evaluator loop (the expression-step switch,
//! §4.5), the function-application machinery built around it (argument
//! fulfillment with refinement pickups, §4.6; the dispatcher protocol,
//! §4.7; the enfix/lookahead scheduler, §4.8), and the chunk-based argument
//! stack that backs every call frame (§4.2). Everything a concrete language
//! needs beyond that — a reader/lexer, a garbage collector, concrete
//! data-type operations, port/IO, a debugger, host glue — is an external
//! collaborator this crate only ever talks to through a trait: see
//! [`PathActor`], [`Dispatcher`], and [`ResourceTracker`].
//!
//! Most module internals (`Frame`, the `Refine` sentinel, chunk handles)
//! are crate-private; a host builds [`Cell`]s, [`Function`]s, and a
//! [`PathActor`]/[`ResourceTracker`] pair, then drives everything through
//! [`eval`].

mod bind;
mod chunk;
mod context;
mod dispatch;
mod enfix;
mod error;
mod eval;
mod feed;
mod frame;
mod fulfill;
mod function;
mod path;
mod signal;
mod trace;
mod typeset;
mod value;

#[cfg(feature = "snapshot")]
pub use crate::context::{ContextSnapshot, SnapshotValue, decode, encode};
pub use crate::{
    context::{Context, ContextArena, ContextId, DEFAULT_MAX_RECURSION_DEPTH},
    error::{EvalError, EvalResult, Fault},
    eval::{Engine, EntryFlags, eval},
    feed::{ArrayFeed, Feed, VariadicFeed},
    frame::Frame,
    function::{DispatchCode, Dispatcher, Exemplar, Function, FunctionRef},
    path::{PathActor, PathResolution},
    signal::{NoLimitTracker, ResourceTracker, SignalCounter},
    trace::{EvalTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    typeset::{Param, ParamClass, TypesetMask},
    value::{ArrayData, Cell, CellFlags, Kind, OpaqueHandle, Payload, SeriesRef, SymbolId},
};
