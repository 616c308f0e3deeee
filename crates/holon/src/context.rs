//! Binding contexts: the storage backing the binding resolver (spec §4.3).
//!
//! Grounded directly on the teacher's `namespace::{NamespaceId, Namespaces}`:
//! an index-based arena with a free list for reuse, and recursion-depth
//! accounting performed at context-creation time (mirroring
//! `Namespaces::new_namespace`'s depth check before allocating). The
//! difference from the teacher is what a slot holds: the teacher's
//! `Namespace` is a flat `Vec<Value>` addressed by compile-time-resolved
//! slot index, because its compiler already resolved every variable
//! reference to a namespace index. Holon's reader/compiler is out of scope
//! (spec §1), so a word's binding is resolved dynamically by spelling
//! (`SymbolId`) against a context's symbol table — see [`Context::get`].
//!
//! Binding contexts outlive every frame that references them (spec §3
//! Invariants); nothing in this module ever frees a context early. Garbage
//! collecting unreachable contexts is the external collaborator's job
//! (spec §1: "garbage collector ... out of scope").

use std::collections::HashMap;

use crate::error::{EvalError, Fault};
use crate::value::{Cell, Payload, SymbolId};

/// Index into the context arena (spec §9 Design Notes: "every node is an
/// index into a generation-tracked pool"). Holon's contexts are never
/// reclaimed within the evaluator's own lifetime (reclamation is the GC's
/// job), so no generation counter is needed to detect reuse — only the
/// chunk stack (`chunk::ChunkStack`) reuses slots at a fine enough grain to
/// need one, and it never exposes raw handles to user-visible bindings
/// (spec §9 Design Notes: "Never surface raw pointers ... into user-visible
/// bindings").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One binding context: a flat symbol table mapping a word's spelling to a
/// variable slot (spec §4.3: "returns a shared reference to the current
/// slot of the named variable").
#[derive(Debug, Default)]
pub struct Context {
    names: HashMap<SymbolId, u32>,
    slots: Vec<Cell>,
    /// Set once a context has been reified from a chunk-stack frame slice
    /// (spec §4.2: "any attempt to keep one alive must first reify it into
    /// a heap context"). Informational only; nothing in this module enforces
    /// it, since enforcement lives at the chunk-stack boundary.
    reified: bool,
}

impl Context {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { names: HashMap::with_capacity(capacity), slots: Vec::with_capacity(capacity), reified: false }
    }

    /// Defines a new variable, or overwrites an existing one of the same
    /// spelling in place (re-`DEFINE`/`SET` semantics, not shadowing).
    pub fn define(&mut self, name: SymbolId, value: Cell) {
        if let Some(&slot) = self.names.get(&name) {
            self.slots[slot as usize] = value;
        } else {
            let slot = u32::try_from(self.slots.len()).expect("context slot count exceeds u32");
            self.names.insert(name, slot);
            self.slots.push(value);
        }
    }

    /// Resolves a word's spelling to a shared reference (spec §4.3's
    /// primary read-only entry point).
    pub fn get(&self, name: SymbolId) -> Result<&Cell, EvalError> {
        let slot = self.names.get(&name).copied().ok_or_else(|| EvalError::new(Fault::NoValue))?;
        let cell = &self.slots[slot as usize];
        if cell.is_void() {
            return Err(EvalError::new(Fault::NoValue));
        }
        Ok(cell)
    }

    /// Like [`Self::get`] but permissive of void (spec §4.5 get-word:
    /// "resolve permissively; void is allowed to pass through").
    pub fn get_permissive(&self, name: SymbolId) -> Result<&Cell, EvalError> {
        let slot = self.names.get(&name).copied().ok_or_else(|| EvalError::new(Fault::NoValue))?;
        Ok(&self.slots[slot as usize])
    }

    /// The writable entry point (spec §4.3: "a separate entry point returns
    /// a writable reference").
    pub fn get_mut(&mut self, name: SymbolId) -> Result<&mut Cell, EvalError> {
        let slot = self.names.get(&name).copied().ok_or_else(|| EvalError::new(Fault::NoValue))?;
        Ok(&mut self.slots[slot as usize])
    }

    /// Returns a read-only reference plus whether the bound value is an
    /// enfixed function (spec §4.3's third entry point, used by the enfix
    /// scheduler's lookahead without committing to a full fetch).
    pub fn get_with_enfix_flag(&self, name: SymbolId) -> Result<(&Cell, bool), EvalError> {
        let cell = self.get(name)?;
        let enfixed = cell.kind() == crate::value::Kind::Function && cell.is_enfixed();
        Ok((cell, enfixed))
    }

    #[must_use]
    pub fn contains(&self, name: SymbolId) -> bool {
        self.names.contains_key(&name)
    }

    pub fn mark_reified(&mut self) {
        self.reified = true;
    }

    #[must_use]
    pub fn is_reified(&self) -> bool {
        self.reified
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Default recursion ceiling, mirroring the teacher's
/// `DEFAULT_MAX_RECURSION_DEPTH`. Exceeding it raises `Fault::StackOverflow`
/// rather than exhausting the native call stack the evaluator's own
/// recursive sub-frames (spec §5: "recursive sub-frames for nested arrays,
/// groups, and function calls") run on.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1_000;

/// Storage for all binding contexts created during an evaluation
/// (grounded on `namespace::Namespaces`).
#[derive(Debug, Default)]
pub struct ContextArena {
    contexts: Vec<Context>,
    reuse_ids: Vec<ContextId>,
    max_depth: usize,
}

impl ContextArena {
    #[must_use]
    pub fn new() -> Self {
        Self { contexts: Vec::new(), reuse_ids: Vec::new(), max_depth: DEFAULT_MAX_RECURSION_DEPTH }
    }

    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth, ..Self::new() }
    }

    /// Current active depth, matching the teacher's accounting: total
    /// contexts minus freed (reusable) ones.
    #[must_use]
    pub fn active_depth(&self) -> usize {
        self.contexts.len().saturating_sub(self.reuse_ids.len())
    }

    /// Allocates a new context, checking the recursion ceiling first
    /// (spec §4.10 `stack-overflow`), mirroring
    /// `Namespaces::new_namespace`'s "check depth before allocating".
    pub fn push(&mut self, capacity: usize) -> Result<ContextId, EvalError> {
        if self.active_depth() >= self.max_depth {
            return Err(EvalError::new(Fault::StackOverflow).with_detail(format!("depth limit {}", self.max_depth)));
        }
        if let Some(id) = self.reuse_ids.pop() {
            self.contexts[id.index()] = Context::with_capacity(capacity);
            Ok(id)
        } else {
            let id = ContextId::new(u32::try_from(self.contexts.len()).expect("context arena overflow"));
            self.contexts.push(Context::with_capacity(capacity));
            Ok(id)
        }
    }

    /// Releases a context's slot strictly LIFO with respect to frame
    /// lifetime (the caller — `frame::Frame` drop — enforces the ordering);
    /// this just marks the slot reusable. A context that was reified
    /// (`Context::is_reified`) must not be released by the caller; it is
    /// the host/GC's responsibility from that point on.
    pub fn release(&mut self, id: ContextId) {
        debug_assert!(!self.contexts[id.index()].is_reified(), "reified contexts outlive their frame");
        self.reuse_ids.push(id);
    }

    #[must_use]
    pub fn get(&self, id: ContextId) -> &Context {
        &self.contexts[id.index()]
    }

    pub fn get_mut(&mut self, id: ContextId) -> &mut Context {
        &mut self.contexts[id.index()]
    }
}

/// A snapshot-safe mirror of [`Payload`] (feature `snapshot`), used to
/// persist a reified context's slots across a process boundary (spec §9
/// Design Notes: "any attempt to keep one alive must first copy the arg
/// slice into the heap-owned context store"; this is that store's on-disk
/// form). Grounded on the teacher's `Namespaces::deep_clone`/session
/// snapshotting via `postcard`.
///
/// Kinds backed by host-owned or non-serializable state — `Function`
/// (a dispatcher is a `dyn Trait`, not data), `Series` (would require
/// snapshotting the whole backing array graph), `Context`, `Varargs`,
/// `Pickup`, and `Throw` (all evaluator-internal or frame-relative) — are
/// not round-tripped; they are recorded as [`SnapshotValue::Unsupported`]
/// carrying the original kind's name for diagnostics, matching the
/// teacher's own practice of declining to snapshot unpicklable host
/// objects rather than guessing at a representation for them.
#[cfg(feature = "snapshot")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SnapshotValue {
    None,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Char(char),
    Symbol(u32),
    Opaque(u64),
    Unsupported(String),
}

#[cfg(feature = "snapshot")]
impl SnapshotValue {
    fn from_cell(cell: &Cell) -> Self {
        match cell.payload() {
            Payload::None => Self::None,
            Payload::Logic(v) => Self::Logic(*v),
            Payload::Integer(v) => Self::Integer(*v),
            Payload::Decimal(v) => Self::Decimal(*v),
            Payload::Char(v) => Self::Char(*v),
            Payload::Symbol(s) => Self::Symbol(s.0),
            Payload::Opaque(handle) => Self::Opaque(handle.0),
            Payload::Series(_)
            | Payload::Function(_)
            | Payload::Context(_)
            | Payload::Pickup(_)
            | Payload::Varargs(_)
            | Payload::Throw(_) => Self::Unsupported(format!("{:?}", cell.kind())),
        }
    }

    fn into_cell(self) -> Cell {
        match self {
            Self::None => Cell::void(),
            Self::Logic(v) => Cell::logic(v),
            Self::Integer(v) => Cell::integer(v),
            Self::Decimal(v) => Cell::decimal(v),
            Self::Char(v) => Cell::new(
                crate::value::Kind::Char,
                Payload::Char(v),
                crate::value::CellFlags::empty(),
                None,
            ),
            Self::Symbol(raw) => Cell::word(crate::value::Kind::Word, SymbolId(raw), None),
            Self::Opaque(raw) => Cell::opaque(crate::value::Kind::Binary, crate::value::OpaqueHandle(raw)),
            // An unsupported slot round-trips as void; the host is expected
            // to re-populate function/series-valued bindings itself after
            // restoring a snapshot (they are rebuilt from the host's own
            // program, not carried in the snapshot).
            Self::Unsupported(_) => Cell::void(),
        }
    }
}

/// On-disk shape of one [`Context`] (feature `snapshot`): its symbol table
/// plus slot values, in slot order.
#[cfg(feature = "snapshot")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContextSnapshot {
    names: Vec<(u32, u32)>,
    slots: Vec<SnapshotValue>,
}

#[cfg(feature = "snapshot")]
impl Context {
    /// Captures this context's current bindings into a serializable form.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            names: self.names.iter().map(|(&sym, &slot)| (sym.0, slot)).collect(),
            slots: self.slots.iter().map(SnapshotValue::from_cell).collect(),
        }
    }

    /// Rebuilds a context from a snapshot (not marked reified: the caller
    /// decides whether the restored context re-enters the arena as a fresh,
    /// poppable context or is adopted directly as heap-owned storage).
    #[must_use]
    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        let slots = snapshot.slots.into_iter().map(SnapshotValue::into_cell).collect();
        let names = snapshot.names.into_iter().map(|(sym, slot)| (SymbolId(sym), slot)).collect();
        Self { names, slots, reified: false }
    }
}

/// Encodes a context snapshot to its `postcard` binary form (feature
/// `snapshot`).
#[cfg(feature = "snapshot")]
pub fn encode(snapshot: &ContextSnapshot) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(snapshot)
}

/// Decodes a context snapshot from its `postcard` binary form (feature
/// `snapshot`).
#[cfg(feature = "snapshot")]
pub fn decode(bytes: &[u8]) -> Result<ContextSnapshot, postcard::Error> {
    postcard::from_bytes(bytes)
}
