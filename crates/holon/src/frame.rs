//! The frame (spec §3): the activation record for one in-flight expression
//! step, one nested array traversal, or one function call.
//!
//! Grounded on the teacher's `bytecode::vm::CallFrame` (`code, ip,
//! stack_base, namespace_idx, function_id, cells, call_position, ...`), but
//! reshaped from a bytecode-VM activation into a tree/array-walking one:
//! `ip`/`stack_base` become the [`feed::Feed`] cursor, and `cells` (the
//! teacher's per-frame local-variable slots) becomes `args`, the frame's own
//! fulfilled-argument storage. The chunk stack (`chunk::ChunkStack`) is used
//! as scratch workspace during fulfillment itself — the pickup pass walks
//! back and forth across parameter slots in an order the call site's surface
//! syntax does not dictate, which needs a LIFO-friendly shared arena more
//! than it needs per-frame ownership — but a frame's *settled* arguments live
//! here, in `args`, so that [`crate::function::Dispatcher::call`] (a
//! host-supplied trait impl, possibly outside this crate) can read and write
//! them through `&mut Frame` alone, without also threading a `&mut
//! ChunkStack` through every dispatcher call site.

use smallvec::SmallVec;

use crate::bind::GottenCache;
use crate::feed::Feed;
use crate::function::FunctionRef;
use crate::value::{Cell, SymbolId};

/// Per-parameter fulfillment state (spec §9 Design Notes' suggested mapping:
/// "a tagged variant `{OrdinaryArg, LookbackArg, UnusedRefinement,
/// RevokedRefinement, Skipping, Fulfilling(slot_index)}`"). Lives on the
/// frame because the fulfiller (`fulfill`) must track it across a single
/// parameter walk that can suspend mid-step — e.g. to sub-evaluate a
/// `Normal`-class argument — and resume where it left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refine {
    /// Not currently inside refinement handling; the next slot is an
    /// ordinary positional argument.
    OrdinaryArg,
    /// The argument now being gathered is a lookback (enfix) argument.
    LookbackArg,
    /// The current refinement was not requested at the call site; its
    /// arguments (if any) must not be consumed from the feed.
    UnusedRefinement,
    /// The current refinement's first argument evaluated to void, revoking
    /// it; any further arguments of this refinement must themselves be void.
    RevokedRefinement,
    /// Walking parameters belonging to a refinement whose own arguments are
    /// being skipped over (distinct from `UnusedRefinement`: this is the
    /// "pass over without consuming or revoking" case during the primary
    /// left-to-right pass, before the pickup pass visits it).
    Skipping,
    /// Out-of-order refinement found at `slot_index` in the paramlist;
    /// fulfillment jumped here via the pickup pass (spec §4.6).
    Fulfilling(u16),
}

/// One-shot deferred-lookback state (spec §9 Design Notes: "a one-shot
/// `dampen_defer` flag that's checked once and then reset, rather than a
/// counter"; spec §4.8). Lives on the *parent* frame — the one whose
/// sub-evaluation produced a left-hand value that an enfix function
/// downstream might claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeferredLookback {
    #[default]
    None,
    /// An enfix function was found during post-switch lookahead but its
    /// lookback argument slot isn't ready yet; `arg_slot` records which
    /// pending slot will claim the completed left-hand value.
    Pending(u16),
    /// The deferral already resolved this step; further lookahead must not
    /// re-trigger it until the next full expression (spec §4.8: one-shot).
    Dampened,
}

/// Evaluator-visible frame flags, hand-rolled in the same style as
/// [`crate::value::CellFlags`] rather than pulled from the `bitflags` crate
/// (the teacher doesn't reach for it either).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Suppresses post-switch lookahead for exactly the next step (spec
    /// §4.8: a `tight`-class argument just consumed one expression without
    /// enfix lookahead, and the scheduler must not retroactively apply it).
    pub const NO_LOOKAHEAD: Self = Self(1 << 0);
    /// Set while the argument fulfiller is actively walking this frame's
    /// paramlist; guards against re-entrant fulfillment on the same frame.
    pub const FULFILLING: Self = Self(1 << 1);
    /// A bar was encountered and rejected by the current parameter (spec
    /// §4.10 `ExpressionBarrier`); kept for diagnostics on unwind.
    pub const EXPRESSION_BARRIER_HIT: Self = Self(1 << 2);
    /// This frame's dispatcher returned `RedoChecked`/`RedoUnchecked` at
    /// least once (spec §4.7); informational, used by tracers.
    pub const REDONE: Self = Self(1 << 3);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// The activation record itself (spec §3).
pub struct Frame {
    id: u32,
    feed: Box<dyn Feed>,
    out: Cell,
    /// Holding cell for `Reevaluate`/`ReevaluateOnly` dispatch (spec §4.7):
    /// the value moved back to current-value position to restart the
    /// switch without re-consuming input from the feed.
    scratch: Cell,
    /// Settled argument storage (spec §3's "arg slots"), small-vector
    /// optimized since most calls bind a handful of parameters.
    args: SmallVec<[Cell; 8]>,
    function: Option<FunctionRef>,
    param_cursor: usize,
    refine: Refine,
    deferred: DeferredLookback,
    /// Spelling of the word/path currently driving this frame, used in
    /// error labels (spec §4.10) and trace events.
    label: Option<SymbolId>,
    flags: FrameFlags,
    /// Chunk-stack depth recorded at frame entry (spec §8 invariant: "at
    /// frame drop, `dsp(current) == F.dsp_on_entry`").
    dsp_on_entry: usize,
    /// One-step "last word resolved" cache (spec §4.3), consulted by the
    /// evaluator loop's word-lookup call sites before falling back to a
    /// fresh `bind::get_with_enfix_flag`. Lives on the frame rather than the
    /// engine because it tracks one array-walk's most recent lookup, not a
    /// global one.
    gotten: GottenCache,
}

impl Frame {
    #[must_use]
    pub fn new(id: u32, feed: Box<dyn Feed>, dsp_on_entry: usize) -> Self {
        Self {
            id,
            feed,
            out: Cell::void(),
            scratch: Cell::void(),
            args: SmallVec::new(),
            function: None,
            param_cursor: 0,
            refine: Refine::OrdinaryArg,
            deferred: DeferredLookback::None,
            label: None,
            flags: FrameFlags::empty(),
            dsp_on_entry,
            gotten: GottenCache::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Rebinds this frame's identity to a fresh call (spec §3: one `Frame`
    /// covers one array-walk, but a function call reuses that same frame for
    /// its call-scoped fields rather than allocating a new one — see
    /// `eval::call_function`). Callers must restore the prior id afterward.
    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    #[must_use]
    pub fn feed(&self) -> &dyn Feed {
        self.feed.as_ref()
    }

    pub fn feed_mut(&mut self) -> &mut dyn Feed {
        self.feed.as_mut()
    }

    #[must_use]
    pub fn out(&self) -> &Cell {
        &self.out
    }

    pub fn out_mut(&mut self) -> &mut Cell {
        &mut self.out
    }

    pub fn set_out(&mut self, value: Cell) {
        self.out = value;
    }

    /// Replaces `out` with a fresh void cell, returning the prior value
    /// (used when the loop hands a completed result up to its caller).
    pub fn take_out(&mut self) -> Cell {
        std::mem::replace(&mut self.out, Cell::void())
    }

    #[must_use]
    pub fn scratch(&self) -> &Cell {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut Cell {
        &mut self.scratch
    }

    pub fn set_scratch(&mut self, value: Cell) {
        self.scratch = value;
    }

    #[must_use]
    pub fn function(&self) -> Option<&FunctionRef> {
        self.function.as_ref()
    }

    pub(crate) fn set_function(&mut self, function: Option<FunctionRef>) {
        self.function = function;
    }

    /// Reads a fulfilled argument by paramlist position. Panics if `index`
    /// is out of range: the fulfiller guarantees `args.len() ==
    /// paramlist.len()` before a dispatcher is ever invoked (spec §4.6), so
    /// an out-of-range read here is an evaluator bug, not a `Fault`.
    #[must_use]
    pub fn arg(&self, index: usize) -> &Cell {
        &self.args[index]
    }

    pub fn arg_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.args[index]
    }

    #[must_use]
    pub fn args(&self) -> &[Cell] {
        &self.args
    }

    pub(crate) fn set_args(&mut self, args: SmallVec<[Cell; 8]>) {
        self.args = args;
    }

    /// Takes the settled argument vector, leaving an empty one behind (used
    /// when saving a call's working state before restoring the frame to its
    /// enclosing array-walk).
    pub(crate) fn take_args(&mut self) -> SmallVec<[Cell; 8]> {
        std::mem::take(&mut self.args)
    }

    #[must_use]
    pub fn param_cursor(&self) -> usize {
        self.param_cursor
    }

    pub(crate) fn set_param_cursor(&mut self, cursor: usize) {
        self.param_cursor = cursor;
    }

    #[must_use]
    pub fn refine(&self) -> Refine {
        self.refine
    }

    pub(crate) fn set_refine(&mut self, refine: Refine) {
        self.refine = refine;
    }

    #[must_use]
    pub fn deferred(&self) -> DeferredLookback {
        self.deferred
    }

    pub(crate) fn set_deferred(&mut self, deferred: DeferredLookback) {
        self.deferred = deferred;
    }

    #[must_use]
    pub fn label(&self) -> Option<SymbolId> {
        self.label
    }

    pub(crate) fn set_label(&mut self, label: Option<SymbolId>) {
        self.label = label;
    }

    #[must_use]
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FrameFlags {
        &mut self.flags
    }

    #[must_use]
    pub fn dsp_on_entry(&self) -> usize {
        self.dsp_on_entry
    }

    /// Rebases the entry-depth watermark when this frame is reused for a
    /// nested call (spec §8 invariant: "at frame drop, `dsp(current) ==
    /// F.dsp_on_entry`" must hold for the call's own scope, not the
    /// enclosing array-walk's). Paired with [`Self::set_id`]; callers must
    /// restore the prior value afterward.
    pub(crate) fn set_dsp_on_entry(&mut self, dsp: usize) {
        self.dsp_on_entry = dsp;
    }

    #[must_use]
    pub fn gotten(&self) -> &GottenCache {
        &self.gotten
    }

    pub(crate) fn gotten_mut(&mut self) -> &mut GottenCache {
        &mut self.gotten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ArrayFeed;
    use crate::value::{ArrayData, SeriesRef};

    fn empty_feed() -> Box<dyn Feed> {
        Box::new(ArrayFeed::new(SeriesRef::new(ArrayData::new(vec![]), 0), None))
    }

    #[test]
    fn new_frame_starts_void_and_unfulfilled() {
        let frame = Frame::new(0, empty_feed(), 0);
        assert!(frame.out().is_void());
        assert!(frame.args().is_empty());
        assert_eq!(frame.refine(), Refine::OrdinaryArg);
        assert_eq!(frame.deferred(), DeferredLookback::None);
    }

    #[test]
    fn take_out_leaves_void_behind() {
        let mut frame = Frame::new(0, empty_feed(), 0);
        frame.set_out(Cell::integer(9));
        let taken = frame.take_out();
        assert_eq!(taken.kind(), crate::value::Kind::Integer);
        assert!(frame.out().is_void());
    }

    #[test]
    fn frame_flags_are_independent_bits() {
        let mut frame = Frame::new(0, empty_feed(), 0);
        frame.flags_mut().insert(FrameFlags::NO_LOOKAHEAD);
        assert!(frame.flags().contains(FrameFlags::NO_LOOKAHEAD));
        assert!(!frame.flags().contains(FrameFlags::FULFILLING));
    }

    #[test]
    fn args_round_trip_by_position() {
        let mut frame = Frame::new(0, empty_feed(), 0);
        frame.set_args(SmallVec::from_vec(vec![Cell::integer(1), Cell::integer(2)]));
        assert_eq!(frame.arg(1).kind(), crate::value::Kind::Integer);
    }

    #[test]
    fn new_frame_starts_with_an_empty_gotten_cache() {
        use crate::context::ContextArena;
        use crate::value::SymbolId;

        let mut frame = Frame::new(0, empty_feed(), 0);
        let mut arena = ContextArena::new();
        let ctx = arena.push(1).unwrap();
        arena.get_mut(ctx).define(SymbolId(1), Cell::integer(1));
        assert!(frame.gotten().hit(&arena, SymbolId(1), ctx).is_none());
        frame.gotten_mut().store(SymbolId(1), ctx, false);
        assert!(frame.gotten().hit(&arena, SymbolId(1), ctx).is_some());
        frame.gotten_mut().invalidate();
        assert!(frame.gotten().hit(&arena, SymbolId(1), ctx).is_none());
    }
}
