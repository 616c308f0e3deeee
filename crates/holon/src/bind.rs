//! The binding resolver (spec §4.3): turns a word cell plus the specifier
//! in effect where it was read into a concrete context slot.
//!
//! Grounded on `context::Context`'s three entry points (`get`,
//! `get_permissive`, `get_mut`, `get_with_enfix_flag`), which this module
//! merely fronts with the relative-vs-specific resolution rule spec §3
//! calls out: a word's own `binding` field wins when present (it is
//! "specifically bound"); otherwise the enclosing array's specifier
//! applies (the word is "relatively bound").

use crate::context::{Context, ContextArena, ContextId};
use crate::error::{EvalError, Fault};
use crate::value::{Cell, SymbolId};

/// Picks the context a word actually resolves against (spec §3: "a word's
/// binding is either specific ... or relative to the specifier in force
/// where the word is read").
#[must_use]
pub fn effective_context(word_binding: Option<ContextId>, specifier: Option<ContextId>) -> Option<ContextId> {
    word_binding.or(specifier)
}

fn resolve<'a>(
    arena: &'a ContextArena,
    word_binding: Option<ContextId>,
    specifier: Option<ContextId>,
) -> Result<&'a Context, EvalError> {
    let ctx = effective_context(word_binding, specifier).ok_or_else(|| EvalError::new(Fault::NoValue))?;
    Ok(arena.get(ctx))
}

/// Read-only resolution (spec §4.3's primary entry point).
pub fn get<'a>(
    arena: &'a ContextArena,
    symbol: SymbolId,
    word_binding: Option<ContextId>,
    specifier: Option<ContextId>,
) -> Result<&'a Cell, EvalError> {
    resolve(arena, word_binding, specifier)?.get(symbol)
}

/// Permissive resolution, allowing a void result through (spec §4.5
/// get-word handling).
pub fn get_permissive<'a>(
    arena: &'a ContextArena,
    symbol: SymbolId,
    word_binding: Option<ContextId>,
    specifier: Option<ContextId>,
) -> Result<&'a Cell, EvalError> {
    resolve(arena, word_binding, specifier)?.get_permissive(symbol)
}

/// Writable resolution (spec §4.3's separate writable entry point).
pub fn get_mut<'a>(
    arena: &'a mut ContextArena,
    symbol: SymbolId,
    word_binding: Option<ContextId>,
    specifier: Option<ContextId>,
) -> Result<&'a mut Cell, EvalError> {
    let ctx = effective_context(word_binding, specifier).ok_or_else(|| EvalError::new(Fault::NoValue))?;
    arena.get_mut(ctx).get_mut(symbol)
}

/// Resolution plus the "is this an enfixed function" flag, used by the
/// enfix scheduler's lookahead without committing to a full fetch (spec
/// §4.3's third entry point).
pub fn get_with_enfix_flag<'a>(
    arena: &'a ContextArena,
    symbol: SymbolId,
    word_binding: Option<ContextId>,
    specifier: Option<ContextId>,
) -> Result<(&'a Cell, bool), EvalError> {
    resolve(arena, word_binding, specifier)?.get_with_enfix_flag(symbol)
}

/// A one-step "last word resolved" cache (spec §4.3: "a one-step cache of
/// the most recently resolved word, invalidated by any function call").
/// Speeds up the common case of re-reading the same word immediately after
/// the enfix scheduler's lookahead already resolved it, without risking
/// staleness across a call (which might have rebound or redefined it).
#[derive(Debug, Default, Clone, Copy)]
pub struct GottenCache {
    entry: Option<(SymbolId, ContextId, bool)>,
}

impl GottenCache {
    #[must_use]
    pub fn new() -> Self {
        Self { entry: None }
    }

    /// Returns the cached `(cell, is_enfixed)` lookup if it matches
    /// `symbol`/`context` exactly.
    pub fn hit<'a>(&self, arena: &'a ContextArena, symbol: SymbolId, context: ContextId) -> Option<(&'a Cell, bool)> {
        match self.entry {
            Some((s, c, enfixed)) if s == symbol && c == context => {
                arena.get(c).get(symbol).ok().map(|cell| (cell, enfixed))
            }
            _ => None,
        }
    }

    pub fn store(&mut self, symbol: SymbolId, context: ContextId, enfixed: bool) {
        self.entry = Some((symbol, context, enfixed));
    }

    /// Invalidates the cache (spec §4.3: "invalidated by any function
    /// call" — a call may have rebound, redefined, or freed the cached
    /// slot).
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    #[test]
    fn word_binding_wins_over_specifier() {
        let mut arena = ContextArena::new();
        let specific = arena.push(1).unwrap();
        let relative = arena.push(1).unwrap();
        arena.get_mut(specific).define(SymbolId(1), Cell::integer(1));
        arena.get_mut(relative).define(SymbolId(1), Cell::integer(2));

        let resolved = get(&arena, SymbolId(1), Some(specific), Some(relative)).unwrap();
        assert_eq!(resolved.kind(), Kind::Integer);
        let value = match resolved.payload() {
            crate::value::Payload::Integer(v) => *v,
            _ => panic!("expected integer payload"),
        };
        assert_eq!(value, 1);
    }

    #[test]
    fn falls_back_to_specifier_when_word_is_relative() {
        let mut arena = ContextArena::new();
        let relative = arena.push(1).unwrap();
        arena.get_mut(relative).define(SymbolId(5), Cell::integer(42));
        let resolved = get(&arena, SymbolId(5), None, Some(relative)).unwrap();
        assert!(matches!(resolved.payload(), crate::value::Payload::Integer(42)));
    }

    #[test]
    fn unbound_word_with_no_specifier_is_no_value() {
        let arena = ContextArena::new();
        let err = get(&arena, SymbolId(1), None, None).unwrap_err();
        assert_eq!(err.fault, Fault::NoValue);
    }

    #[test]
    fn gotten_cache_hits_only_on_exact_match() {
        let mut arena = ContextArena::new();
        let ctx = arena.push(1).unwrap();
        arena.get_mut(ctx).define(SymbolId(7), Cell::integer(1));
        let mut cache = GottenCache::new();
        assert!(cache.hit(&arena, SymbolId(7), ctx).is_none());
        cache.store(SymbolId(7), ctx, false);
        assert!(cache.hit(&arena, SymbolId(7), ctx).is_some());
        assert!(cache.hit(&arena, SymbolId(8), ctx).is_none());
        cache.invalidate();
        assert!(cache.hit(&arena, SymbolId(7), ctx).is_none());
    }
}
