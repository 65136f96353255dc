//! Type guards for stages.
//!
//! Each stage declares the entity kinds it accepts and the kinds it may emit.
//! The compiler uses these to validate edges and to build the per-kind
//! dispatch table.

use crate::entity::EntityKind;
use std::fmt;

/// A set of [`EntityKind`]s, stored as a bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindSet(u16);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    pub const fn of(kinds: &[EntityKind]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1 << kinds[i].index();
            i += 1;
        }
        KindSet(bits)
    }

    pub const fn single(kind: EntityKind) -> Self {
        KindSet(1 << kind.index())
    }

    #[inline]
    pub const fn contains(self, kind: EntityKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    #[inline]
    pub const fn intersection(self, other: KindSet) -> KindSet {
        KindSet(self.0 & other.0)
    }

    #[inline]
    pub const fn union(self, other: KindSet) -> KindSet {
        KindSet(self.0 | other.0)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = EntityKind> {
        EntityKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl fmt::Debug for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Static guard declaration for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePorts {
    pub accepts: KindSet,
    pub emits: KindSet,
}

impl StagePorts {
    pub const fn new(accepts: KindSet, emits: KindSet) -> Self {
        Self { accepts, emits }
    }

    /// A terminal stage.
    pub const fn sink(accepts: KindSet) -> Self {
        Self {
            accepts,
            emits: KindSet::EMPTY,
        }
    }

    /// A stage that emits the same kinds it accepts.
    pub const fn pass_through(kinds: KindSet) -> Self {
        Self {
            accepts: kinds,
            emits: kinds,
        }
    }

    #[inline]
    pub fn is_sink(&self) -> bool {
        self.emits.is_empty()
    }
}
