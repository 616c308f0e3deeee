//! The value cell (spec §3).
//!
//! A fixed-size, kind-tagged union carrying a closed-set `Kind`, an
//! evaluator-visible flag set, a kind-discriminated `Payload`, and an
//! optional `binding`. Unlike the teacher's `Value` (a plain Rust `enum`
//! whose variants carry their own data, appropriate for a Python object
//! model with no orthogonal flag bits), spec §3 requires flags and binding
//! that apply *across* kinds — `unevaluated` on an integer, `enfixed` on a
//! bound word, a binding on a block distinct from the binding on the word
//! inside it. That calls for a struct of (kind, flags, payload, binding)
//! rather than a bare enum; `Payload` plays the role the teacher's `Value`
//! variants play, nested one level down.
//!
//! Cells have location-bound lifetime (spec §3): a cell in an array is
//! owned by the array's `Rc<ArrayData>`; a cell in a frame's argument slice
//! is owned by the chunk-stack slice; a cell in the output slot is owned by
//! the caller. `Cell` is therefore plain data (`Clone`, no destructor side
//! effects) — ownership discipline is enforced by where a `Cell` is allowed
//! to live, not by a `Drop` impl, which is a deliberate departure from the
//! teacher's `Value` (which intentionally does *not* derive `Clone` because
//! heap values need reference-count bookkeeping on copy). Holon's concrete
//! data-type operations are out of scope (spec §1), so nothing here needs
//! that bookkeeping.

use std::fmt;
use std::rc::Rc;

use strum::Display;

use crate::context::ContextId;
use crate::function::FunctionRef;

/// Interned spelling handle for words. Interning itself belongs to the
/// reader/lexer, which is out of scope; the evaluator only ever compares
/// and copies `SymbolId`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// The closed set of value kinds the evaluator dispatches on (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Kind {
    Void,
    Blank,
    Logic,
    Integer,
    Decimal,
    Char,
    Pair,
    Date,
    Str,
    Binary,
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
    Word,
    SetWord,
    GetWord,
    LitWord,
    Bar,
    LitBar,
    Function,
    Frame,
    Object,
    Port,
    Error,
    Varargs,
    /// Internal sentinel kind used by the argument fulfiller (spec §4.6) to
    /// mark a pushed-refinement slot deferred to the pickup pass. Never
    /// legal in a user-visible position; reaching the evaluator switch with
    /// this kind is an invariant violation (spec §7 kind 2) and must panic,
    /// not raise a `Fault`.
    PickupMarker,
}

impl Kind {
    /// Kinds dispatched by plain copy-into-output in the evaluator switch
    /// (spec §4.5 "inert kinds"). Everything not covered by a dedicated
    /// switch arm (word, set-word, get-word, lit-*, group, path, set-path,
    /// bar) is inert.
    #[must_use]
    pub fn is_inert(self) -> bool {
        !matches!(
            self,
            Self::Word
                | Self::SetWord
                | Self::GetWord
                | Self::LitWord
                | Self::LitPath
                | Self::LitBar
                | Self::Group
                | Self::Path
                | Self::SetPath
                | Self::Bar
                | Self::Void
                | Self::Function
                | Self::PickupMarker
        )
    }

    /// Soft-quotable forms accepted by a soft-quote parameter (spec §4.6
    /// step 10): a group or a get-word/get-path, evaluated rather than
    /// copied verbatim.
    #[must_use]
    pub fn is_soft_quotable(self) -> bool {
        matches!(self, Self::Group | Self::GetWord | Self::GetPath)
    }
}

/// Evaluator-visible flag bits (spec §3). Hand-rolled rather than pulled
/// from the `bitflags` crate: the teacher never reaches for `bitflags`
/// either, preferring small `const`-based bit constants on its own packed
/// representations (see `ouros::value`'s payload tags), so Holon follows
/// the same idiom here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellFlags(u16);

impl CellFlags {
    pub const ENFIXED: Self = Self(1 << 0);
    pub const UNEVALUATED: Self = Self(1 << 1);
    pub const EVAL_FLIP: Self = Self(1 << 2);
    pub const ENDABLE: Self = Self(1 << 3);
    pub const VARIADIC: Self = Self(1 << 4);
    pub const QUOTES_FIRST: Self = Self(1 << 5);
    pub const DEFERS_LOOKBACK: Self = Self(1 << 6);
    pub const INVISIBLE: Self = Self(1 << 7);
    pub const PUNCTUATES: Self = Self(1 << 8);
    pub const RETURN: Self = Self(1 << 9);

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

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for CellFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Backing storage for block/group/path-family cells: a shared, append-only
/// array of cells plus the specifier context used to resolve relative words
/// that appear directly inside it (spec §3 "specifier").
///
/// Shared via `Rc` because Rebol-family blocks are reference types: copying
/// a block cell copies the `(array, index)` pair, not the array's contents.
/// Mutation is a host/reader concern (spec §1 non-goal); the evaluator only
/// ever reads through a `SeriesRef`, and requires the array be logically
/// read-only for the duration of its traversal (spec §5 "Locking").
#[derive(Debug)]
pub struct ArrayData {
    pub cells: Vec<Cell>,
}

impl ArrayData {
    #[must_use]
    pub fn new(cells: Vec<Cell>) -> Rc<Self> {
        Rc::new(Self { cells })
    }
}

/// A position within a shared array: the payload of block/group/path-family
/// cells (spec §3 payload: "series reference + index").
#[derive(Debug, Clone)]
pub struct SeriesRef {
    pub array: Rc<ArrayData>,
    pub index: usize,
}

impl SeriesRef {
    #[must_use]
    pub fn new(array: Rc<ArrayData>, index: usize) -> Self {
        Self { array, index }
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        self.index >= self.array.cells.len()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Cell> {
        self.array.cells.get(self.index)
    }

    #[must_use]
    pub fn advanced(&self, by: usize) -> Self {
        Self { array: Rc::clone(&self.array), index: self.index + by }
    }
}

impl PartialEq for SeriesRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.array, &other.array) && self.index == other.index
    }
}

/// Opaque handle to host-owned data for kinds whose internals are an
/// out-of-scope external collaborator (spec §1: "concrete data-type
/// operations ... out of scope"). Covers `String`, `Binary`, `Pair`,
/// `Date`, `Object`, `Port`, `Error` — the evaluator never interprets these
/// beyond copying the handle verbatim (inert dispatch, spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueHandle(pub u64);

/// Payload for a parameter currently being fulfilled via the pickup pass
/// (spec §4.6): the (param, arg) cursor pair saved onto the data stack in
/// place of the refinement word when an out-of-order refinement is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupData {
    pub param_index: u16,
    pub arg_index: u16,
}

/// Payload linking a variadic value back to the frame that produced it
/// (spec §4.6 step 7: "Construct a variadic value linking back to this
/// frame"; spec §3 payload: "varargs offset+facade").
#[derive(Debug, Clone, Copy)]
pub struct VarargsData {
    pub frame_id: u32,
    pub offset: u32,
}

/// Payload for a throw in flight (spec §4.9): a value together with the id
/// of the frame whose `return`/`leave` primitive raised it (or `None` for a
/// generic, label-caught throw that any matching catcher may claim).
/// Reuses `Kind::Error` rather than adding a dedicated kind — a throw in
/// flight *is* an exceptional value from the evaluator switch's point of
/// view; only the payload shape distinguishes it from an ordinary,
/// host-constructed error value.
#[derive(Debug, Clone)]
pub struct ThrowPayload {
    pub value: Box<Cell>,
    pub target_frame_id: Option<u32>,
    pub label: Option<SymbolId>,
}

/// Kind-discriminated payload (spec §3).
#[derive(Debug, Clone)]
pub enum Payload {
    /// Blank, bar, lit-bar, void: no payload beyond the kind itself.
    None,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Char(char),
    /// Word, set-word, get-word, lit-word spelling.
    Symbol(SymbolId),
    Series(SeriesRef),
    Function(FunctionRef),
    /// A reified frame-as-context value (the `frame` kind) or any other
    /// evaluator-relevant handle into the context arena.
    Context(ContextId),
    Pickup(PickupData),
    Varargs(VarargsData),
    Opaque(OpaqueHandle),
    Throw(Box<ThrowPayload>),
}

/// The value cell itself (spec §3).
#[derive(Debug, Clone)]
pub struct Cell {
    kind: Kind,
    flags: CellFlags,
    payload: Payload,
    binding: Option<ContextId>,
}

impl Cell {
    #[must_use]
    pub fn new(kind: Kind, payload: Payload, flags: CellFlags, binding: Option<ContextId>) -> Self {
        Self { kind, flags, payload, binding }
    }

    #[must_use]
    pub fn void() -> Self {
        Self::new(Kind::Void, Payload::None, CellFlags::empty(), None)
    }

    #[must_use]
    pub fn blank() -> Self {
        Self::new(Kind::Blank, Payload::None, CellFlags::empty(), None)
    }

    #[must_use]
    pub fn logic(value: bool) -> Self {
        Self::new(Kind::Logic, Payload::Logic(value), CellFlags::empty(), None)
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::new(Kind::Integer, Payload::Integer(value), CellFlags::empty(), None)
    }

    #[must_use]
    pub fn decimal(value: f64) -> Self {
        Self::new(Kind::Decimal, Payload::Decimal(value), CellFlags::empty(), None)
    }

    #[must_use]
    pub fn bar() -> Self {
        Self::new(Kind::Bar, Payload::None, CellFlags::empty(), None)
    }

    #[must_use]
    pub fn lit_bar() -> Self {
        Self::new(Kind::LitBar, Payload::None, CellFlags::empty(), None)
    }

    #[must_use]
    pub fn word(kind: Kind, symbol: SymbolId, binding: Option<ContextId>) -> Self {
        debug_assert!(matches!(
            kind,
            Kind::Word | Kind::SetWord | Kind::GetWord | Kind::LitWord
        ));
        Self::new(kind, Payload::Symbol(symbol), CellFlags::empty(), binding)
    }

    #[must_use]
    pub fn series(kind: Kind, series: SeriesRef, binding: Option<ContextId>) -> Self {
        debug_assert!(matches!(
            kind,
            Kind::Block | Kind::Group | Kind::Path | Kind::SetPath | Kind::GetPath | Kind::LitPath
        ));
        Self::new(kind, Payload::Series(series), CellFlags::empty(), binding)
    }

    #[must_use]
    pub fn function(func: FunctionRef, binding: Option<ContextId>) -> Self {
        Self::new(Kind::Function, Payload::Function(func), CellFlags::empty(), binding)
    }

    #[must_use]
    pub fn pickup_marker(param_index: u16, arg_index: u16) -> Self {
        Self::new(
            Kind::PickupMarker,
            Payload::Pickup(PickupData { param_index, arg_index }),
            CellFlags::empty(),
            None,
        )
    }

    #[must_use]
    pub fn varargs(frame_id: u32, offset: u32) -> Self {
        Self::new(
            Kind::Varargs,
            Payload::Varargs(VarargsData { frame_id, offset }),
            CellFlags::empty(),
            None,
        )
    }

    #[must_use]
    pub fn opaque(kind: Kind, handle: OpaqueHandle) -> Self {
        Self::new(kind, Payload::Opaque(handle), CellFlags::empty(), None)
    }

    #[must_use]
    pub fn throw(value: Cell, target_frame_id: Option<u32>, label: Option<SymbolId>) -> Self {
        Self::new(
            Kind::Error,
            Payload::Throw(Box::new(ThrowPayload { value: Box::new(value), target_frame_id, label })),
            CellFlags::empty(),
            None,
        )
    }

    #[must_use]
    pub fn is_thrown(&self) -> bool {
        matches!(self.payload, Payload::Throw(_))
    }

    /// Unwraps a thrown cell into its carried value and target frame id.
    /// `None` if this cell is not actually a throw in flight.
    #[must_use]
    pub fn into_throw(self) -> Option<(Cell, Option<u32>, Option<SymbolId>)> {
        match self.payload {
            Payload::Throw(throw) => Some((*throw.value, throw.target_frame_id, throw.label)),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn flags(&self) -> CellFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut CellFlags {
        &mut self.flags
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn binding(&self) -> Option<ContextId> {
        self.binding
    }

    pub fn set_binding(&mut self, binding: Option<ContextId>) {
        self.binding = binding;
    }

    #[must_use]
    pub fn is_unevaluated(&self) -> bool {
        self.flags.contains(CellFlags::UNEVALUATED)
    }

    #[must_use]
    pub fn is_enfixed(&self) -> bool {
        self.flags.contains(CellFlags::ENFIXED)
    }

    #[must_use]
    pub fn symbol(&self) -> Option<SymbolId> {
        match self.payload {
            Payload::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn series_ref(&self) -> Option<&SeriesRef> {
        match &self.payload {
            Payload::Series(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn function_ref(&self) -> Option<&FunctionRef> {
        match &self.payload {
            Payload::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Truthiness used by `if`-style dispatchers and by the refinement
    /// pickup check in the fulfiller. Only `Logic(false)`, `Blank`, and
    /// `Void` are falsey; everything else (including `Integer(0)`) is
    /// truthy, matching the Rebol/Ren-C lineage rather than C-style zero
    /// falsiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(
            (&self.kind, &self.payload),
            (Kind::Logic, Payload::Logic(false)) | (Kind::Blank, _) | (Kind::Void, _)
        )
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self.kind, Kind::Void)
    }

    /// Inert dispatch copy (spec §4.5): clones the cell and marks it
    /// `unevaluated`. Used for every kind `Kind::is_inert` accepts.
    #[must_use]
    pub fn copy_inert(&self) -> Self {
        let mut copy = self.clone();
        copy.flags.insert(CellFlags::UNEVALUATED);
        copy
    }

    /// Lit-word / lit-path / lit-bar handling (spec §4.5): copies with the
    /// kind retargeted to its plain counterpart and `unevaluated` cleared
    /// (the cell is a produced evaluation result, not an echoed literal).
    ///
    /// # Panics
    /// Panics if called on a kind with no plain counterpart; callers should
    /// only invoke this from the `LitWord`/`LitPath`/`LitBar` switch arms.
    #[must_use]
    pub fn to_plain(&self) -> Self {
        let plain_kind = match self.kind {
            Kind::LitWord => Kind::Word,
            Kind::LitPath => Kind::Path,
            Kind::LitBar => Kind::Bar,
            other => panic!("to_plain called on non-literal kind {other:?}"),
        };
        let mut copy = self.clone();
        copy.kind = plain_kind;
        copy.flags.remove(CellFlags::UNEVALUATED);
        copy
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
