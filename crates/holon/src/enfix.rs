//! The enfix / lookahead scheduler (spec §4.8): decides, from already
//! gathered flags, whether a just-completed value continues into the next
//! word's function as a lookback (enfix) call, defers that decision to an
//! enclosing fulfillment, or stops.
//!
//! Deliberately split from `eval`: fetching the next cell, resolving its
//! binding, and performing the call are all evaluator-loop concerns that
//! need the full `EvalContext`; the *decision* of what to do with the
//! result is a handful of flag checks that read cleanly as pure functions
//! and are worth testing in isolation, the way `dispatch::dispatch_once`
//! separates "what does this result code mean" from "how do we act on it".

use crate::frame::DeferredLookback;
use crate::value::CellFlags;

/// What the scheduler decided to do with a just-completed value (spec
/// §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSwitch {
    /// `out` is the final result for this expression step.
    Stop,
    /// Continue into the next word's enfixed function as a lookback call.
    Continue,
    /// Record a one-shot deferral; the enclosing fulfillment resumes this
    /// when it starts consuming its next parameter (spec §4.6 step 8).
    Defer,
}

/// Inputs the post-switch decision needs (spec §4.8). Gathered by `eval`
/// from the frame and the next cell's resolved binding.
#[derive(Debug, Clone, Copy)]
pub struct PostSwitchInputs {
    /// Flags on the function value the next word resolved to, if it
    /// resolved to a function at all. `None` means the next token isn't a
    /// word bound to a function (most common case: ordinary data follows).
    pub next_function_flags: Option<CellFlags>,
    /// The caller requested a single expression step rather than running to
    /// the end of the source (spec §6 `single-step` entry flag).
    pub single_step: bool,
    /// This frame is itself in the middle of fulfilling one argument of an
    /// enclosing call (spec §4.8: "this frame is fulfilling an argument").
    pub fulfilling_arg: bool,
    /// This frame's one-shot deferral state.
    pub deferred: DeferredLookback,
}

/// Post-switch lookahead decision (spec §4.8).
#[must_use]
pub fn decide_post_switch(inputs: PostSwitchInputs) -> PostSwitch {
    let Some(flags) = inputs.next_function_flags else {
        return PostSwitch::Stop;
    };
    if !flags.contains(CellFlags::ENFIXED) {
        return PostSwitch::Stop;
    }

    let invisible = flags.contains(CellFlags::INVISIBLE);
    if inputs.single_step && !invisible {
        return PostSwitch::Stop;
    }

    if flags.contains(CellFlags::DEFERS_LOOKBACK)
        && inputs.fulfilling_arg
        && inputs.deferred == DeferredLookback::None
    {
        return PostSwitch::Defer;
    }

    // Either this function doesn't defer, we're not inside a fulfillment, or
    // the one-shot deferral already ran once at this level (`Dampened`) —
    // in every case the call proceeds as an ordinary lookback continuation
    // rather than being deferred a second time (spec §4.8 "dampen").
    PostSwitch::Continue
}

/// Pre-switch lookahead decision (spec §4.8): before dispatching the
/// current value, grant left-hand-side precedence to a lookback-quoting
/// enfix function named by the *next* word, provided the current value is
/// itself a word (spec §9 Open Questions: the interaction with paths is
/// explicitly left unresolved upstream, so Holon only grants this for a
/// bare word current value — see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreSwitch {
    /// Dispatch `current` normally; no quoting precedence applies.
    Stop,
    /// Grant left-hand precedence: fetch the next function immediately and
    /// supply `current`, unevaluated, as its lookback argument.
    Continue,
}

#[derive(Debug, Clone, Copy)]
pub struct PreSwitchInputs {
    pub current_is_word: bool,
    pub next_function_flags: Option<CellFlags>,
}

#[must_use]
pub fn decide_pre_switch(inputs: PreSwitchInputs) -> PreSwitch {
    if !inputs.current_is_word {
        return PreSwitch::Stop;
    }
    match inputs.next_function_flags {
        Some(flags) if flags.contains(CellFlags::ENFIXED) && flags.contains(CellFlags::QUOTES_FIRST) => {
            PreSwitch::Continue
        }
        _ => PreSwitch::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enfixed() -> CellFlags {
        CellFlags::ENFIXED
    }

    #[test]
    fn no_function_next_stops() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: None,
            single_step: false,
            fulfilling_arg: false,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Stop);
    }

    #[test]
    fn non_enfixed_function_stops() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(CellFlags::empty()),
            single_step: false,
            fulfilling_arg: false,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Stop);
    }

    #[test]
    fn plain_enfix_continues() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(enfixed()),
            single_step: false,
            fulfilling_arg: false,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Continue);
    }

    #[test]
    fn single_step_stops_visible_enfix() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(enfixed()),
            single_step: true,
            fulfilling_arg: false,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Stop);
    }

    #[test]
    fn single_step_still_continues_invisible() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(enfixed() | CellFlags::INVISIBLE),
            single_step: true,
            fulfilling_arg: false,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Continue);
    }

    #[test]
    fn defers_lookback_inside_fulfillment_defers_once() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(enfixed() | CellFlags::DEFERS_LOOKBACK),
            single_step: false,
            fulfilling_arg: true,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Defer);
    }

    #[test]
    fn defers_lookback_outside_fulfillment_continues_immediately() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(enfixed() | CellFlags::DEFERS_LOOKBACK),
            single_step: false,
            fulfilling_arg: false,
            deferred: DeferredLookback::None,
        });
        assert_eq!(decision, PostSwitch::Continue);
    }

    #[test]
    fn dampened_deferral_never_defers_twice() {
        let decision = decide_post_switch(PostSwitchInputs {
            next_function_flags: Some(enfixed() | CellFlags::DEFERS_LOOKBACK),
            single_step: false,
            fulfilling_arg: true,
            deferred: DeferredLookback::Dampened,
        });
        assert_eq!(decision, PostSwitch::Continue);
    }

    #[test]
    fn pre_switch_requires_word_current() {
        let decision = decide_pre_switch(PreSwitchInputs {
            current_is_word: false,
            next_function_flags: Some(enfixed() | CellFlags::QUOTES_FIRST),
        });
        assert_eq!(decision, PreSwitch::Stop);
    }

    #[test]
    fn pre_switch_requires_quotes_first_and_enfixed() {
        let decision = decide_pre_switch(PreSwitchInputs {
            current_is_word: true,
            next_function_flags: Some(CellFlags::QUOTES_FIRST),
        });
        assert_eq!(decision, PreSwitch::Stop);

        let decision = decide_pre_switch(PreSwitchInputs {
            current_is_word: true,
            next_function_flags: Some(enfixed() | CellFlags::QUOTES_FIRST),
        });
        assert_eq!(decision, PreSwitch::Continue);
    }
}
