//! Attachment points of the body graph.
//!
//! A part slot links a parent (a part, or the body itself for the root) to
//! at most one child part of a fixed category. An organ slot links a part to
//! at most one organ of a fixed kind.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::parts::{OrganKind, PartCategory};
use crate::containers::{ContainerId, ContainerKind};
use crate::types::{EntityId, OrganSlotId, SlotId};

/// What a part slot hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotParent {
    /// The root slot of the body on this creature.
    Body(EntityId),
    Part(EntityId),
}

impl SlotParent {
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Body(id) | Self::Part(id) => *id,
        }
    }

    /// Container a part attached through this parent is stored in.
    pub fn container(&self) -> ContainerId {
        match self {
            Self::Body(id) => ContainerId::new(*id, ContainerKind::BodyRoot),
            Self::Part(id) => ContainerId::new(*id, ContainerKind::Parts),
        }
    }
}

/// Handle addressing one part slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub parent: SlotParent,
    pub id: SlotId,
}

impl SlotRef {
    pub fn body_root(creature: EntityId, id: impl Into<SlotId>) -> Self {
        Self { parent: SlotParent::Body(creature), id: id.into() }
    }

    pub fn on_part(part: EntityId, id: impl Into<SlotId>) -> Self {
        Self { parent: SlotParent::Part(part), id: id.into() }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parent.entity(), self.id)
    }
}

/// Handle addressing one organ slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganSlotRef {
    pub part: EntityId,
    pub id: OrganSlotId,
}

impl OrganSlotRef {
    pub fn new(part: EntityId, id: impl Into<OrganSlotId>) -> Self {
        Self { part, id: id.into() }
    }

    pub fn container(&self) -> ContainerId {
        ContainerId::new(self.part, ContainerKind::Organs)
    }
}

impl fmt::Display for OrganSlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.part, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSlot {
    pub id: SlotId,
    pub category: PartCategory,
    pub parent: SlotParent,
    pub child: Option<EntityId>,
}

impl PartSlot {
    pub fn new(id: SlotId, category: PartCategory, parent: SlotParent) -> Self {
        Self { id, category, parent, child: None }
    }

    pub fn is_empty(&self) -> bool {
        self.child.is_none()
    }

    pub fn slot_ref(&self) -> SlotRef {
        SlotRef { parent: self.parent, id: self.id.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganSlot {
    pub id: OrganSlotId,
    pub kind: OrganKind,
    pub part: EntityId,
    pub organ: Option<EntityId>,
}

impl OrganSlot {
    pub fn new(id: OrganSlotId, kind: OrganKind, part: EntityId) -> Self {
        Self { id, kind, part, organ: None }
    }

    pub fn is_empty(&self) -> bool {
        self.organ.is_none()
    }

    pub fn slot_ref(&self) -> OrganSlotRef {
        OrganSlotRef { part: self.part, id: self.id.clone() }
    }
}
