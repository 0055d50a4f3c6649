//! Body part and organ definitions
//!
//! Defines the categories, sizes and functions of parts and organs, and the
//! per-entity components the body graph stores for them.

use serde::{Deserialize, Serialize};

use super::slots::{OrganSlot, OrganSlotRef, PartSlot, SlotRef};
use crate::types::{EntityId, OrganSlotId, SlotId};

/// Categories of body parts. A part slot accepts exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartCategory {
    Torso,
    Head,
    Arm,
    Hand,
    Leg,
    Foot,
    Tail,
    Wing,
    Other,
}

impl PartCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Torso => "torso",
            Self::Head => "head",
            Self::Arm => "arm",
            Self::Hand => "hand",
            Self::Leg => "leg",
            Self::Foot => "foot",
            Self::Tail => "tail",
            Self::Wing => "wing",
            Self::Other => "other part",
        }
    }

    /// Functions a part of this category provides on its own.
    pub fn functions(&self) -> &'static [BodyFunction] {
        match self {
            Self::Leg => &[BodyFunction::Locomotion],
            Self::Foot => &[BodyFunction::Locomotion, BodyFunction::Balance],
            Self::Hand => &[BodyFunction::Grasping],
            Self::Wing => &[BodyFunction::Flight],
            Self::Tail => &[BodyFunction::Balance],
            Self::Torso | Self::Head | Self::Arm | Self::Other => &[],
        }
    }
}

/// Size of a body part, affecting hit probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartSize {
    Tiny,
    Small,
    #[default]
    Medium,
    Large,
    Huge,
}

impl PartSize {
    /// Returns the hit chance weight (0.0-1.0 scale factor)
    pub fn hit_weight(&self) -> f32 {
        match self {
            Self::Tiny => 0.05,
            Self::Small => 0.10,
            Self::Medium => 0.20,
            Self::Large => 0.25,
            Self::Huge => 0.40,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Huge => "huge",
        }
    }
}

/// Which side of the body a part belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartSymmetry {
    #[default]
    None,
    Left,
    Right,
}

/// Kinds of organs. An organ slot accepts exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganKind {
    Brain,
    Eyes,
    Heart,
    Lungs,
    Stomach,
    Liver,
    Kidneys,
    FireGland,
}

impl OrganKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Brain => "brain",
            Self::Eyes => "eyes",
            Self::Heart => "heart",
            Self::Lungs => "lungs",
            Self::Stomach => "stomach",
            Self::Liver => "liver",
            Self::Kidneys => "kidneys",
            Self::FireGland => "fire gland",
        }
    }

    pub fn functions(&self) -> &'static [BodyFunction] {
        match self {
            Self::Brain => &[BodyFunction::Thinking],
            Self::Eyes => &[BodyFunction::Vision],
            Self::Heart => &[BodyFunction::Circulation],
            Self::Lungs => &[BodyFunction::Breathing],
            Self::Stomach => &[BodyFunction::Digestion],
            Self::Liver | Self::Kidneys => &[BodyFunction::Filtration],
            Self::FireGland => &[BodyFunction::FireBreath],
        }
    }
}

/// Functions a body can provide through its parts and organs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyFunction {
    Locomotion,
    Grasping,
    Thinking,
    Vision,
    Breathing,
    Circulation,
    Digestion,
    Filtration,
    Flight,
    Balance,
    FireBreath,
}

impl BodyFunction {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Locomotion => "locomotion",
            Self::Grasping => "grasping",
            Self::Thinking => "thinking",
            Self::Vision => "vision",
            Self::Breathing => "breathing",
            Self::Circulation => "circulation",
            Self::Digestion => "digestion",
            Self::Filtration => "filtration",
            Self::Flight => "flight",
            Self::Balance => "balance",
            Self::FireBreath => "fire breath",
        }
    }
}

/// Name and prototype every spawned entity carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub prototype: String,
    pub name: String,
}

/// Body component of a creature: the root slot and dismemberment data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub root: Option<PartSlot>,
    pub template: String,
    pub gib_sound: Option<String>,
}

/// Part component: one body segment and its attachment points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub category: PartCategory,
    pub size: PartSize,
    pub symmetry: PartSymmetry,
    /// Creature whose body currently contains this part.
    pub body: Option<EntityId>,
    /// Slot this part is attached to. Used for detachment only.
    pub parent_slot: Option<SlotRef>,
    /// Child attachment points, in declaration order.
    pub slots: Vec<PartSlot>,
    pub organs: Vec<OrganSlot>,
}

impl Part {
    pub fn new(category: PartCategory, size: PartSize, symmetry: PartSymmetry) -> Self {
        Self {
            category,
            size,
            symmetry,
            body: None,
            parent_slot: None,
            slots: Vec::new(),
            organs: Vec::new(),
        }
    }

    pub fn slot(&self, id: &SlotId) -> Option<&PartSlot> {
        self.slots.iter().find(|s| &s.id == id)
    }

    pub fn organ_slot(&self, id: &OrganSlotId) -> Option<&OrganSlot> {
        self.organs.iter().find(|s| &s.id == id)
    }

    /// Ids of parts attached directly to this part
    pub fn child_parts(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().filter_map(|s| s.child)
    }

    /// Ids of organs housed directly in this part
    pub fn organ_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.organs.iter().filter_map(|s| s.organ)
    }

    pub fn is_attached(&self) -> bool {
        self.parent_slot.is_some()
    }
}

/// Organ component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organ {
    pub kind: OrganKind,
    pub body: Option<EntityId>,
    pub parent_slot: Option<OrganSlotRef>,
}

impl Organ {
    pub fn new(kind: OrganKind) -> Self {
        Self {
            kind,
            body: None,
            parent_slot: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::slots::SlotParent;

    #[test]
    fn test_hit_weights_grow_with_size() {
        let sizes = [PartSize::Tiny, PartSize::Small, PartSize::Medium, PartSize::Large, PartSize::Huge];
        for pair in sizes.windows(2) {
            assert!(pair[0].hit_weight() < pair[1].hit_weight());
        }
    }

    #[test]
    fn test_part_children_skip_empty_slots() {
        let mut part = Part::new(PartCategory::Torso, PartSize::Large, PartSymmetry::None);
        let owner = EntityId(1);
        part.slots.push(PartSlot::new("left arm".into(), PartCategory::Arm, SlotParent::Part(owner)));
        let mut filled = PartSlot::new("head".into(), PartCategory::Head, SlotParent::Part(owner));
        filled.child = Some(EntityId(2));
        part.slots.push(filled);

        assert_eq!(part.child_parts().collect::<Vec<_>>(), vec![EntityId(2)]);
        assert!(part.slot(&SlotId::from("left arm")).is_some());
        assert!(part.slot(&SlotId::from("tail")).is_none());
    }

    #[test]
    fn test_organ_functions() {
        assert!(OrganKind::Lungs.functions().contains(&BodyFunction::Breathing));
        assert!(PartCategory::Wing.functions().contains(&BodyFunction::Flight));
        assert!(PartCategory::Torso.functions().is_empty());
    }
}
