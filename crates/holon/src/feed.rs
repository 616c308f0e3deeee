//! The source feed (spec §4.1): a forward-only cursor over either an
//! indexable array of cells or an opaque variadic pull source, both
//! implementing the same [`Feed`] trait so the evaluator loop never has to
//! know which backing it is walking.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::context::ContextId;
use crate::value::{ArrayData, Cell, SeriesRef};

/// Shared interface both feed backings implement (spec §4.1). The feed is
/// read-only for the caller: nothing here ever mutates the underlying
/// array, matching spec §5's "Locking" requirement that the source array be
/// logically read-only for the duration of its traversal.
pub trait Feed: fmt::Debug {
    fn current(&mut self) -> Option<&Cell>;
    /// One-step peek past `current`, without advancing.
    fn lookahead(&mut self) -> Option<&Cell>;
    fn advance(&mut self);
    fn at_end(&self) -> bool;
    /// The context used to resolve relative words encountered directly in
    /// this feed (spec §3 "specifier").
    fn specifier(&self) -> Option<ContextId>;
}

/// A feed backed by an indexable, immutable array (the common case: a
/// block or group body).
#[derive(Debug, Clone)]
pub struct ArrayFeed {
    series: SeriesRef,
    specifier: Option<ContextId>,
}

impl ArrayFeed {
    #[must_use]
    pub fn new(series: SeriesRef, specifier: Option<ContextId>) -> Self {
        Self { series, specifier }
    }

    #[must_use]
    pub fn remaining(&self) -> &[Cell] {
        &self.series.array.cells[self.series.index..]
    }
}

impl Feed for ArrayFeed {
    fn current(&mut self) -> Option<&Cell> {
        self.series.current()
    }

    fn lookahead(&mut self) -> Option<&Cell> {
        self.series.array.cells.get(self.series.index + 1)
    }

    fn advance(&mut self) {
        self.series.index += 1;
    }

    fn at_end(&self) -> bool {
        self.series.at_end()
    }

    fn specifier(&self) -> Option<ContextId> {
        self.specifier
    }
}

/// A feed backed by an opaque, lazily-pulled variadic sequence (e.g. a
/// host-side C-style variadic argument list). Pulled values are buffered
/// just enough to support `current`/`lookahead` without re-pulling.
pub struct VariadicFeed {
    source: Box<dyn Iterator<Item = Cell>>,
    buffer: VecDeque<Cell>,
    exhausted: bool,
    specifier: Option<ContextId>,
}

impl fmt::Debug for VariadicFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariadicFeed").field("buffered", &self.buffer.len()).field("exhausted", &self.exhausted).finish()
    }
}

impl VariadicFeed {
    pub fn new(source: impl Iterator<Item = Cell> + 'static, specifier: Option<ContextId>) -> Self {
        Self { source: Box::new(source), buffer: VecDeque::new(), exhausted: false, specifier }
    }

    fn ensure_buffered(&mut self, count: usize) {
        while self.buffer.len() < count && !self.exhausted {
            match self.source.next() {
                Some(cell) => self.buffer.push_back(cell),
                None => self.exhausted = true,
            }
        }
    }

    /// Reifies the remainder of this variadic source into an ordinary
    /// array (spec §4.1: "Reifying a variadic source into an array is
    /// permitted at any expression boundary"). Drains the internal buffer
    /// and the rest of the host iterator eagerly.
    pub fn reify(&mut self) -> Rc<ArrayData> {
        let mut cells: Vec<Cell> = self.buffer.drain(..).collect();
        for cell in self.source.by_ref() {
            cells.push(cell);
        }
        self.exhausted = true;
        ArrayData::new(cells)
    }
}

impl Feed for VariadicFeed {
    fn current(&mut self) -> Option<&Cell> {
        self.ensure_buffered(1);
        self.buffer.front()
    }

    fn lookahead(&mut self) -> Option<&Cell> {
        self.ensure_buffered(2);
        self.buffer.get(1)
    }

    fn advance(&mut self) {
        self.ensure_buffered(1);
        self.buffer.pop_front();
        self.ensure_buffered(1);
    }

    fn at_end(&self) -> bool {
        self.buffer.is_empty() && self.exhausted
    }

    fn specifier(&self) -> Option<ContextId> {
        self.specifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    fn sample_array() -> SeriesRef {
        let array = ArrayData::new(vec![Cell::integer(1), Cell::integer(2), Cell::integer(3)]);
        SeriesRef::new(array, 0)
    }

    #[test]
    fn array_feed_walks_forward_only() {
        let mut feed = ArrayFeed::new(sample_array(), None);
        assert_eq!(feed.current().unwrap().kind(), Kind::Integer);
        assert!(feed.lookahead().is_some());
        feed.advance();
        feed.advance();
        feed.advance();
        assert!(feed.at_end());
        assert!(feed.current().is_none());
    }

    #[test]
    fn variadic_feed_buffers_just_enough() {
        let mut feed = VariadicFeed::new(vec![Cell::integer(10), Cell::integer(20)].into_iter(), None);
        assert!(!feed.at_end());
        assert_eq!(feed.lookahead().unwrap().kind(), Kind::Integer);
        feed.advance();
        feed.advance();
        assert!(feed.at_end());
    }

    #[test]
    fn variadic_feed_reify_drains_remainder() {
        let mut feed = VariadicFeed::new(vec![Cell::integer(1), Cell::integer(2)].into_iter(), None);
        feed.advance();
        let array = feed.reify();
        assert_eq!(array.cells.len(), 1);
    }
}
