//! Entity
//!
//! The host's description of an entity. Entities are only ever referenced by
//! their [EntityId], the rest of the record is what the host reports when the
//! entity is added

use std::fmt::Display;

use crate::EntityId;

/// The closed set of entity kinds components can attach to
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum EntityKind {
    Block,
    Character,
    Grid,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Block, EntityKind::Character, EntityKind::Grid];

    pub(crate) fn index(self) -> usize {
        match self {
            EntityKind::Block => 0,
            EntityKind::Character => 1,
            EntityKind::Grid => 2,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Block => write!(f, "Block"),
            EntityKind::Character => write!(f, "Character"),
            EntityKind::Grid => write!(f, "Grid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityInfo {
    id: EntityId,
    kind: EntityKind,
    sub_kind: Option<String>,
    parent: Option<EntityId>,
}

impl EntityInfo {
    pub fn new(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            sub_kind: None,
            parent: None,
        }
    }

    pub fn block(id: impl Into<EntityId>, sub_kind: impl Into<String>) -> Self {
        Self::new(id, EntityKind::Block).with_sub_kind(sub_kind)
    }

    pub fn character(id: impl Into<EntityId>) -> Self {
        Self::new(id, EntityKind::Character)
    }

    pub fn grid(id: impl Into<EntityId>) -> Self {
        Self::new(id, EntityKind::Grid)
    }

    /// Sets the definition type of the entity, blocks are matched against
    /// component sub-kind whitelists with it
    pub fn with_sub_kind(mut self, sub_kind: impl Into<String>) -> Self {
        self.sub_kind = Some(sub_kind.into());
        self
    }

    /// Sets the grid a block belongs to
    pub fn on_grid(mut self, grid: impl Into<EntityId>) -> Self {
        self.parent = Some(grid.into());
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn sub_kind(&self) -> Option<&str> {
        self.sub_kind.as_deref()
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }
}

impl Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sub_kind {
            Some(sub_kind) => write!(f, "{}:{}({})", self.kind, sub_kind, self.id),
            None => write!(f, "{}({})", self.kind, self.id),
        }
    }
}
