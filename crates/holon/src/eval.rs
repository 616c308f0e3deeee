//! The evaluator loop itself (spec §4.5–§4.9): the expression-step switch,
//! the pre-/post-switch lookahead integration, argument-call plumbing, and
//! the `Engine` bundle a host constructs once and drives repeatedly.
//!
//! Everything else in this crate is a component this module wires together:
//! `feed` supplies input, `bind`/`context` resolve words, `path` walks
//! selector chains, `fulfill` gathers a call's arguments, `dispatch` runs one
//! dispatcher invocation and classifies its result, `enfix` decides whether a
//! completed value continues into a lookback call, and `signal` turns a
//! dispatcher's `Thrown` result into either a caught value or a continuing
//! unwind. None of those modules call back into this one; `eval` only calls
//! out.

use std::rc::Rc;

use crate::bind;
use crate::chunk::ChunkStack;
use crate::context::{ContextArena, ContextId};
use crate::dispatch::{self, Outcome};
use crate::enfix::{self, PostSwitch, PreSwitch, PostSwitchInputs, PreSwitchInputs};
use crate::error::{EvalError, Fault};
use crate::feed::{ArrayFeed, Feed};
use crate::frame::{DeferredLookback, Frame, FrameFlags};
use crate::fulfill;
use crate::function::FunctionRef;
use crate::path::{self, PathActor};
use crate::signal::{self, ResourceTracker, SignalCounter};
use crate::trace::EvalTracer;
use crate::typeset::{Param, ParamClass};
use crate::value::{Cell, CellFlags, Kind, SymbolId};

/// Caller-supplied entry flags (spec §6): govern how far one call into the
/// loop runs and what evaluator-visible state it's already operating inside
/// of. Hand-rolled in the same style as [`crate::value::CellFlags`] and
/// [`crate::frame::FrameFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags(u16);

impl EntryFlags {
    /// Run every expression in the feed, not just the next one.
    pub const TO_END: Self = Self(1 << 0);
    /// Stop after exactly one expression step.
    pub const SINGLE_STEP: Self = Self(1 << 1);
    /// The feed's current value is already a resolved function to call
    /// directly, bypassing word lookup (host-driven `apply`).
    pub const APPLY: Self = Self(1 << 2);
    /// The host is re-entering the switch on a value that did not come from
    /// ordinary source position (spec §4.5 void handling, `Reevaluate`).
    pub const EXPLICIT_EVALUATE: Self = Self(1 << 3);
    /// This call is gathering one argument of an enclosing call.
    pub const FULFILLING_ARG: Self = Self(1 << 4);
    /// This call is gathering the right-hand side of a set-word/set-path
    /// chain.
    pub const FULFILLING_SET: Self = Self(1 << 5);
    /// Set internally once a step's post-switch lookahead has already run,
    /// so a recursive re-entry doesn't run it twice.
    pub const POST_SWITCH: Self = Self(1 << 6);
    /// Suppresses post-switch lookahead for the next step (spec §4.8,
    /// `Tight`-class argument consumption).
    pub const NO_LOOKAHEAD: Self = Self(1 << 7);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// The host-supplied collaborators plus mutable evaluator state an `eval`
/// call threads through every recursive step (spec §5, §6). A host
/// constructs one `Engine` per top-level evaluation (or reuses one across
/// several top-level calls that should share bindings).
pub struct Engine<'a> {
    contexts: ContextArena,
    stack: ChunkStack,
    actor: &'a dyn PathActor,
    resources: &'a mut dyn ResourceTracker,
    tracer: &'a mut dyn EvalTracer,
    signals: SignalCounter,
    next_frame_id: u32,
    call_depth: usize,
}

impl<'a> Engine<'a> {
    #[must_use]
    pub fn new(
        actor: &'a dyn PathActor,
        resources: &'a mut dyn ResourceTracker,
        tracer: &'a mut dyn EvalTracer,
    ) -> Self {
        Self {
            contexts: ContextArena::new(),
            stack: ChunkStack::new(),
            actor,
            resources,
            tracer,
            signals: SignalCounter::default(),
            next_frame_id: 0,
            call_depth: 0,
        }
    }

    #[must_use]
    pub fn contexts(&self) -> &ContextArena {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextArena {
        &mut self.contexts
    }

    #[must_use]
    pub fn stack(&self) -> &ChunkStack {
        &self.stack
    }

    fn alloc_frame_id(&mut self) -> u32 {
        self.next_frame_id += 1;
        self.next_frame_id
    }
}

/// Runs `feed` to completion (or for one step, if `flags` requests it),
/// returning the final expression's result.
pub fn eval(engine: &mut Engine, feed: Box<dyn Feed>, flags: EntryFlags) -> Result<Cell, EvalError> {
    let id = engine.alloc_frame_id();
    let dsp = engine.stack.depth();
    let mut frame = Frame::new(id, feed, dsp);
    run_to_end(engine, &mut frame, flags)?;
    Ok(frame.take_out())
}

fn run_to_end(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags) -> Result<(), EvalError> {
    loop {
        if frame.feed().at_end() {
            return Ok(());
        }
        eval_one_expression(engine, frame, flags)?;
        if flags.contains(EntryFlags::SINGLE_STEP) {
            return Ok(());
        }
    }
}

/// Resolves a word through `frame`'s one-step [`bind::GottenCache`] before
/// falling back to a fresh `bind::get_with_enfix_flag` lookup (spec §4.3): the
/// enfix scheduler's lookahead and the switch's own resolution of the same
/// word, one step apart, hit the same cached entry instead of walking the
/// context arena twice.
fn lookup_cached(
    engine: &Engine,
    frame: &mut Frame,
    symbol: SymbolId,
    word_binding: Option<ContextId>,
    specifier: Option<ContextId>,
) -> Result<(Cell, bool), EvalError> {
    let ctx = bind::effective_context(word_binding, specifier);
    if let Some(ctx) = ctx {
        if let Some((cell, enfixed)) = frame.gotten().hit(&engine.contexts, symbol, ctx) {
            return Ok((cell.clone(), enfixed));
        }
    }
    let (cell, enfixed) = bind::get_with_enfix_flag(&engine.contexts, symbol, word_binding, specifier)?;
    let result = (cell.clone(), enfixed);
    if let Some(ctx) = ctx {
        frame.gotten_mut().store(symbol, ctx, enfixed);
    }
    Ok(result)
}

/// Peeks the word at the feed's current position (without consuming it) and,
/// if it resolves to a function, returns that function's flags.
fn current_function_flags(engine: &Engine, frame: &mut Frame) -> Result<Option<CellFlags>, EvalError> {
    let specifier = frame.feed().specifier();
    let Some(current) = frame.feed_mut().current().cloned() else {
        return Ok(None);
    };
    if current.kind() != Kind::Word {
        return Ok(None);
    }
    let symbol = current.symbol().expect("word cell carries a symbol");
    match lookup_cached(engine, frame, symbol, current.binding(), specifier) {
        Ok((cell, _)) if cell.kind() == Kind::Function => Ok(Some(cell.flags())),
        Ok(_) | Err(_) => Ok(None),
    }
}

/// Like [`current_function_flags`] but for the *next* position (one past
/// current), used by pre-switch lookahead before current has been consumed.
fn lookahead_function_flags(engine: &Engine, frame: &mut Frame) -> Result<Option<CellFlags>, EvalError> {
    let specifier = frame.feed().specifier();
    let Some(next) = frame.feed_mut().lookahead().cloned() else {
        return Ok(None);
    };
    if next.kind() != Kind::Word {
        return Ok(None);
    }
    let symbol = next.symbol().expect("word cell carries a symbol");
    match lookup_cached(engine, frame, symbol, next.binding(), specifier) {
        Ok((cell, _)) if cell.kind() == Kind::Function => Ok(Some(cell.flags())),
        Ok(_) | Err(_) => Ok(None),
    }
}

fn resolve_function_cell(
    engine: &Engine,
    frame: &mut Frame,
    word: &Cell,
    specifier: Option<ContextId>,
) -> Result<(FunctionRef, SymbolId), EvalError> {
    let symbol = word.symbol().expect("word cell carries a symbol");
    let (resolved, _) = lookup_cached(engine, frame, symbol, word.binding(), specifier)?;
    let function = resolved.function_ref().expect("caller checked kind == Function").clone();
    Ok((function, symbol))
}

/// One full expression step (spec §4.5 + §4.8): dispatches the current value
/// and then, unless lookahead is suppressed, runs the post-switch scheduler.
fn eval_one_expression(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags) -> Result<(), EvalError> {
    if engine.signals.tick() {
        engine.resources.check_time()?;
    }

    if frame.feed().at_end() {
        frame.set_out(Cell::void());
        return Ok(());
    }

    let current = frame.feed_mut().current().cloned().expect("checked not at end above");
    engine.tracer.on_step(current.kind());

    if current.kind() == Kind::Bar {
        frame.feed_mut().advance();
        frame.set_out(Cell::void());
        return Ok(());
    }

    if current.kind() == Kind::Word {
        if let Some(next_flags) = lookahead_function_flags(engine, frame)? {
            let decision = enfix::decide_pre_switch(PreSwitchInputs {
                current_is_word: true,
                next_function_flags: Some(next_flags),
            });
            if decision == PreSwitch::Continue {
                return eval_prefix_quote(engine, frame, flags, current);
            }
        }
    }

    frame.feed_mut().advance();
    dispatch_switch(engine, frame, flags, current, false)?;

    if !flags.contains(EntryFlags::NO_LOOKAHEAD) {
        post_switch_loop(engine, frame, flags)?;
    }
    Ok(())
}

/// Grants a lookback-quoting enfix function to the right left-hand
/// precedence over the current word (spec §4.8 pre-switch): the current
/// word is handed over unevaluated instead of being resolved normally.
fn eval_prefix_quote(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags, current: Cell) -> Result<(), EvalError> {
    frame.feed_mut().advance();
    let specifier = frame.feed().specifier();
    let word = frame.feed_mut().current().cloned().expect("lookahead confirmed a word here");
    frame.feed_mut().advance();
    let (function, symbol) = resolve_function_cell(engine, frame, &word, specifier)?;
    let lookback = current.copy_inert();
    call_function(engine, frame, &function, Some(symbol), Vec::new(), Some(lookback), flags)?;
    if !flags.contains(EntryFlags::NO_LOOKAHEAD) {
        post_switch_loop(engine, frame, flags)?;
    }
    Ok(())
}

/// Post-switch lookahead (spec §4.8): repeatedly checks whether the value
/// now at the feed's current position is an enfixed function wanting the
/// just-produced `out` as its lookback argument.
fn post_switch_loop(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags) -> Result<(), EvalError> {
    loop {
        let next_flags = current_function_flags(engine, frame)?;
        let decision = enfix::decide_post_switch(PostSwitchInputs {
            next_function_flags: next_flags,
            single_step: flags.contains(EntryFlags::SINGLE_STEP),
            fulfilling_arg: flags.contains(EntryFlags::FULFILLING_ARG),
            deferred: frame.deferred(),
        });
        match decision {
            PostSwitch::Stop => return Ok(()),
            PostSwitch::Defer => {
                let slot = u16::try_from(frame.param_cursor()).unwrap_or(u16::MAX);
                frame.set_deferred(DeferredLookback::Pending(slot));
                return Ok(());
            }
            PostSwitch::Continue => {
                let specifier = frame.feed().specifier();
                let word = frame.feed_mut().current().cloned().expect("decision required a function here");
                frame.feed_mut().advance();
                let (function, symbol) = resolve_function_cell(engine, frame, &word, specifier)?;
                engine.tracer.on_enfix_continue(Some(&fulfill::symbol_label(symbol)));
                let lookback = frame.take_out();
                call_function(engine, frame, &function, Some(symbol), Vec::new(), Some(lookback), flags)?;
            }
        }
    }
}

/// The switch itself (spec §4.5): dispatches a single already-fetched value.
/// `allow_void` is only set by the `Reevaluate` handling inside
/// [`call_function`], where a dispatcher explicitly re-enters the switch on
/// a scratch value that may legitimately be void.
fn dispatch_switch(
    engine: &mut Engine,
    frame: &mut Frame,
    flags: EntryFlags,
    current: Cell,
    allow_void: bool,
) -> Result<(), EvalError> {
    match current.kind() {
        Kind::Void => {
            if allow_void {
                frame.set_out(current);
                Ok(())
            } else {
                Err(EvalError::new(Fault::NoValue).with_detail("void may not appear literally in source position"))
            }
        }
        Kind::PickupMarker => panic!("{}", Fault::INVARIANT_VIOLATION_NOTE),
        Kind::Word => eval_word(engine, frame, flags, current),
        Kind::SetWord => eval_set_word_chain(engine, frame, flags, current),
        Kind::GetWord => {
            let specifier = frame.feed().specifier();
            let symbol = current.symbol().expect("word cell carries a symbol");
            let value = bind::get_permissive(&engine.contexts, symbol, current.binding(), specifier)?.clone();
            frame.set_out(value);
            Ok(())
        }
        Kind::LitWord | Kind::LitPath | Kind::LitBar => {
            frame.set_out(current.to_plain());
            Ok(())
        }
        Kind::Group => eval_group(engine, frame, current),
        Kind::Path => eval_path(engine, frame, flags, current),
        Kind::SetPath => eval_set_path(engine, frame, flags, current),
        Kind::Bar => {
            // Reachable only via `Reevaluate`, never via ordinary feed
            // traversal (handled earlier in `eval_one_expression`).
            frame.set_out(Cell::void());
            Ok(())
        }
        Kind::Function => {
            let function = current.function_ref().expect("kind checked above").clone();
            frame.set_out(Cell::void());
            call_function(engine, frame, &function, None, Vec::new(), None, flags)
        }
        _ => {
            frame.set_out(current.copy_inert());
            Ok(())
        }
    }
}

fn eval_word(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags, word: Cell) -> Result<(), EvalError> {
    let specifier = frame.feed().specifier();
    let symbol = word.symbol().expect("word cell carries a symbol");
    let (resolved, _) = lookup_cached(engine, frame, symbol, word.binding(), specifier)?;
    if resolved.kind() == Kind::Function {
        let function = resolved.function_ref().expect("checked kind above").clone();
        call_function(engine, frame, &function, Some(symbol), Vec::new(), None, flags)
    } else {
        frame.set_out(resolved);
        Ok(())
    }
}

/// Walks a (possibly chained) set-word and evaluates its right-hand
/// expression exactly once, assigning the result to every target in the
/// chain (spec §8 scenario 5: `x: y: 10 + 5`). Chain targets are held on
/// the chunk stack, one slot each, matching `ChunkStack`'s documented role
/// as the evaluator's scratch workspace (spec §4.2).
fn eval_set_word_chain(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags, first: Cell) -> Result<(), EvalError> {
    let mut handles: Vec<crate::chunk::ChunkHandle> = Vec::new();
    let handle = engine.stack.push(1);
    engine.stack.set(handle, 0, first);
    handles.push(handle);

    loop {
        if frame.feed().at_end() {
            break;
        }
        if frame.feed_mut().current().map(Cell::kind) != Some(Kind::SetWord) {
            break;
        }
        let next = frame.feed_mut().current().cloned().expect("checked Some above");
        frame.feed_mut().advance();
        let handle = engine.stack.push(1);
        engine.stack.set(handle, 0, next);
        handles.push(handle);
    }

    if frame.feed().at_end() {
        unwind_handles(engine, &mut handles);
        return Err(EvalError::new(Fault::NeedValue).with_detail("set-word has no right-hand expression to assign"));
    }

    let sub_flags = flags.union(EntryFlags::FULFILLING_SET);
    eval_one_expression(engine, frame, sub_flags)?;
    let value = frame.take_out();
    if value.is_void() {
        unwind_handles(engine, &mut handles);
        return Err(EvalError::new(Fault::NeedValue).with_detail("cannot assign void to a set-word"));
    }

    let specifier = frame.feed().specifier();
    while let Some(handle) = handles.pop() {
        let target = engine.stack.slice(handle)[0].clone();
        let symbol = target.symbol().expect("set-word cell carries a symbol");
        let ctx = bind::effective_context(target.binding(), specifier)
            .ok_or_else(|| EvalError::new(Fault::NeedValue).with_detail("set-word has no binding context"))?;
        engine.contexts.get_mut(ctx).define(symbol, value.clone());
        engine.stack.pop(handle)?;
    }

    frame.set_out(value);
    Ok(())
}

fn unwind_handles(engine: &mut Engine, handles: &mut Vec<crate::chunk::ChunkHandle>) {
    while let Some(handle) = handles.pop() {
        let _ = engine.stack.pop(handle);
    }
}

/// Recurses into a group's body, starting a fresh sub-frame over its own
/// array (spec §4.5 Group: runs to the end of the inner array, the group's
/// own last expression becomes the result).
fn eval_group(engine: &mut Engine, frame: &mut Frame, group: Cell) -> Result<(), EvalError> {
    let series = group.series_ref().expect("group carries a series payload").clone();
    let specifier = group.binding().or_else(|| frame.feed().specifier());

    engine.call_depth += 1;
    let check = engine.resources.check_recursion_depth(engine.call_depth);
    if check.is_err() {
        engine.call_depth -= 1;
        return check;
    }

    let sub_feed: Box<dyn Feed> = Box::new(ArrayFeed::new(series, specifier));
    let sub_id = engine.alloc_frame_id();
    let dsp = engine.stack.depth();
    let mut sub_frame = Frame::new(sub_id, sub_feed, dsp);
    engine.tracer.on_frame_push(None, engine.call_depth);
    let result = run_to_end(engine, &mut sub_frame, EntryFlags::TO_END);
    engine.tracer.on_frame_pop(engine.call_depth);
    engine.call_depth -= 1;
    result?;
    frame.set_out(sub_frame.take_out());
    Ok(())
}

fn eval_path(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags, value: Cell) -> Result<(), EvalError> {
    let series = value.series_ref().expect("path carries a series payload").clone();
    let specifier = value.binding().or_else(|| frame.feed().specifier());
    match path::resolve(&engine.contexts, engine.actor, &series, specifier)? {
        path::PathResolution::Value(result) => {
            frame.set_out(result);
            Ok(())
        }
        path::PathResolution::Call { function, requested } => {
            call_function(engine, frame, &function, None, requested, None, flags)
        }
    }
}

fn eval_set_path(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags, value: Cell) -> Result<(), EvalError> {
    let series = value.series_ref().expect("set-path carries a series payload").clone();
    let specifier = value.binding().or_else(|| frame.feed().specifier());

    if frame.feed().at_end() {
        return Err(EvalError::new(Fault::NeedValue).with_detail("set-path has no right-hand expression to assign"));
    }
    let sub_flags = flags.union(EntryFlags::FULFILLING_SET);
    eval_one_expression(engine, frame, sub_flags)?;
    let value_out = frame.take_out();
    if value_out.is_void() {
        return Err(EvalError::new(Fault::NeedValue).with_detail("cannot assign void through a set-path"));
    }
    path::resolve_set(&engine.contexts, engine.actor, &series, specifier, value_out.clone())?;
    frame.set_out(value_out);
    Ok(())
}

/// Consumes one unit of call-site input for a single parameter, per its
/// quoting class (spec §4.6 step 10). This is the `eval_argument` closure
/// `fulfill::fulfill` drives; everything it needs beyond the caller frame
/// and the parameter itself comes from `engine`/`flags` captured by its
/// caller.
fn eval_argument_for_param(
    engine: &mut Engine,
    frame: &mut Frame,
    param: &Param,
    flags: EntryFlags,
) -> Result<Cell, EvalError> {
    match param.class {
        ParamClass::HardQuote => {
            let value = frame.feed_mut().current().cloned().expect("fulfill_one checked not at end");
            frame.feed_mut().advance();
            Ok(value.copy_inert())
        }
        ParamClass::SoftQuote => {
            let kind = frame.feed_mut().current().map(Cell::kind).expect("fulfill_one checked not at end");
            if kind.is_soft_quotable() {
                eval_sub_expression(engine, frame, flags, false)
            } else {
                let value = frame.feed_mut().current().cloned().expect("checked above");
                frame.feed_mut().advance();
                Ok(value.copy_inert())
            }
        }
        ParamClass::Tight => eval_sub_expression(engine, frame, flags, true),
        ParamClass::Normal => eval_sub_expression(engine, frame, flags, false),
        ParamClass::Refinement | ParamClass::Local | ParamClass::Return | ParamClass::Leave => {
            unreachable!("fulfill only invokes eval_argument for call-site-consuming classes")
        }
    }
}

/// Sub-evaluates exactly one expression for a `Normal`/`Tight` argument,
/// resuming a one-shot deferred lookback (spec §4.6 step 8, spec §4.8) if
/// the sub-evaluation left one pending on this same, reused frame.
fn eval_sub_expression(engine: &mut Engine, frame: &mut Frame, flags: EntryFlags, tight: bool) -> Result<Cell, EvalError> {
    let mut sub_flags = flags.union(EntryFlags::FULFILLING_ARG);
    if tight {
        sub_flags = sub_flags.union(EntryFlags::NO_LOOKAHEAD);
    }

    eval_one_expression(engine, frame, sub_flags)?;
    let mut value = frame.take_out();

    if matches!(frame.deferred(), DeferredLookback::Pending(_)) {
        frame.set_deferred(DeferredLookback::Dampened);
        frame.set_out(value);
        post_switch_loop(engine, frame, flags.without(EntryFlags::FULFILLING_ARG))?;
        value = frame.take_out();
        frame.set_deferred(DeferredLookback::None);
    }

    Ok(value)
}

/// Calls `function`, reusing `frame` for the callee's call-scoped fields
/// rather than allocating a new activation record (spec §3; see
/// `frame::Frame`'s module docs). Caller-scoped fields are saved before the
/// call and restored after, regardless of outcome.
#[allow(clippy::too_many_arguments)]
fn call_function(
    engine: &mut Engine,
    frame: &mut Frame,
    function: &FunctionRef,
    label: Option<SymbolId>,
    requested: Vec<SymbolId>,
    lookback: Option<Cell>,
    flags: EntryFlags,
) -> Result<(), EvalError> {
    engine.call_depth += 1;
    if let Err(err) = engine.resources.check_recursion_depth(engine.call_depth) {
        engine.call_depth -= 1;
        return Err(err);
    }

    // Spec §4.3: a call may rebind, redefine, or free the slot a cached
    // lookup pointed at, so every call invalidates the frame's one-step
    // gotten cache before doing anything else.
    frame.gotten_mut().invalidate();

    let saved_id = frame.id();
    let saved_function = frame.function().cloned();
    let saved_args = frame.take_args();
    let saved_cursor = frame.param_cursor();
    let saved_refine = frame.refine();
    let saved_deferred = frame.deferred();
    let saved_label = frame.label();
    let saved_dsp = frame.dsp_on_entry();

    let callee_id = engine.alloc_frame_id();
    frame.set_id(callee_id);
    frame.set_function(Some(Rc::clone(function)));
    frame.set_deferred(DeferredLookback::None);
    frame.set_label(label);
    frame.set_dsp_on_entry(engine.stack.depth());
    frame.flags_mut().remove(FrameFlags::REDONE);

    engine.tracer.on_frame_push(label.map(|s| fulfill::symbol_label(s)).as_deref(), engine.call_depth);

    let result = run_call(engine, frame, function, &requested, lookback, flags);

    engine.tracer.on_frame_pop(engine.call_depth);
    engine.call_depth -= 1;

    frame.set_id(saved_id);
    frame.set_function(saved_function);
    frame.set_args(saved_args);
    frame.set_param_cursor(saved_cursor);
    frame.set_refine(saved_refine);
    frame.set_deferred(saved_deferred);
    frame.set_label(saved_label);
    frame.set_dsp_on_entry(saved_dsp);

    result
}

fn run_call(
    engine: &mut Engine,
    frame: &mut Frame,
    function: &FunctionRef,
    requested: &[SymbolId],
    lookback: Option<Cell>,
    flags: EntryFlags,
) -> Result<(), EvalError> {
    let args = fulfill::fulfill(function, frame, requested, lookback, |frame, param| {
        eval_argument_for_param(engine, frame, param, flags)
    })?;
    frame.set_args(args);
    dispatch::install_return_leave(frame, function);

    loop {
        match dispatch::dispatch_once(frame, function)? {
            Outcome::Done | Outcome::Invisible => return Ok(()),
            Outcome::Thrown => {
                let out = frame.take_out();
                match signal::catch(out, frame.id()) {
                    Ok(value) => {
                        engine.tracer.on_throw_caught(engine.call_depth);
                        frame.set_out(value);
                        return Ok(());
                    }
                    Err(rethrow) => {
                        engine.tracer.on_throw_unwind(engine.call_depth);
                        frame.set_out(rethrow);
                        return Ok(());
                    }
                }
            }
            Outcome::Redo { revalidate } => {
                if revalidate {
                    for (arg, param) in frame.args().iter().zip(function.facade.iter()) {
                        if !param.accepted.accepts(arg.kind()) && !(arg.is_void() && param.endable) {
                            return Err(EvalError::new(Fault::BadReturnType)
                                .with_detail("redo-checked argument failed re-validation"));
                        }
                    }
                }
                frame.flags_mut().insert(FrameFlags::REDONE);
            }
            Outcome::Reevaluate { only } => {
                let value = frame.scratch_mut().clone();
                dispatch_switch(engine, frame, flags, value, true)?;
                if !only {
                    post_switch_loop(engine, frame, flags)?;
                }
                return Ok(());
            }
        }
    }
}
