use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a group of components that are activated together
pub type GroupId = i32;

/// An `EntityId` is the opaque identity of a simulation entity
///
/// The framework never interprets the value beyond comparing and hashing it,
/// the host decides what it maps to
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId(value)
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E[{}]", self.0)
    }
}

/// Names a library, the unit of code that contributes components to the
/// [crate::Registrar]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LibraryId(pub &'static str);

impl LibraryId {
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a single bound handler in the dispatch registries
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H[{}]", self.0)
    }
}

/// Hands out [HandlerId]'s from any thread. Cloning shares the counter
#[derive(Debug, Clone, Default)]
pub struct HandlerIds {
    count: Arc<AtomicU64>,
}

impl HandlerIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self) -> HandlerId {
        HandlerId(self.count.fetch_add(1u64, Ordering::SeqCst))
    }
}

/// A stable identity hash which is common across builds and runs. Used as the
/// final tie-break when ordering components and handlers
///
/// StableId's are simply a compile time FNV-1a hash of a name
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StableId(u64);

impl StableId {
    pub const fn of(name: &str) -> Self {
        StableId(const_fnv1a_hash::fnv1a_hash_str_64(name))
    }

    pub fn raw_id(&self) -> u64 {
        self.0
    }
}

impl Debug for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:016x}]", self.0)
    }
}

#[test]
fn test_stable_id() {
    let a = StableId::of("Navigator.update");
    let aa = StableId::of("Navigator.update");
    let b = StableId::of("Navigator.close");

    assert_eq!(a, aa);
    assert_ne!(a, b);
}

#[test]
fn test_handler_ids_are_shared() {
    let ids = HandlerIds::new();
    let other = ids.clone();

    let first = ids.alloc();
    let second = other.alloc();
    assert_ne!(first, second);
    assert!(second > first);
}
