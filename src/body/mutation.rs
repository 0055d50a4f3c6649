//! Attaching, detaching and gibbing
//!
//! Every operation checks all of its preconditions before touching state, so
//! a failed call leaves slots, back-references and containers as they were.
//! A slot reference and the container holding the part always change
//! together.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::slots::{OrganSlotRef, PartSlot, SlotParent, SlotRef};
use super::system::BodySystem;
use crate::containers::{ContainerBinding, ContainerError};
use crate::error::{BodyError, Result};
use crate::types::{EntityId, SlotId};

/// Everything a gib released into the world
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GibResult {
    /// Freed parts, in traversal order.
    pub parts: Vec<EntityId>,
    /// Freed organs, part by part. Empty unless organs were included.
    pub organs: Vec<EntityId>,
    /// Dismemberment sound of the body the parts came from.
    pub sound: Option<String>,
}

impl GibResult {
    /// Parts followed by organs
    pub fn all(&self) -> Vec<EntityId> {
        self.parts.iter().chain(&self.organs).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.parts.len() + self.organs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.organs.is_empty()
    }
}

impl<C: ContainerBinding> BodySystem<C> {
    fn missing_slot(slot: &SlotRef) -> BodyError {
        BodyError::SlotNotFound { slot: slot.id.to_string(), owner: slot.parent.entity() }
    }

    /// Check whether `part` could be attached to `slot` right now.
    ///
    /// Returns `Ok(true)` when the part is already in that slot.
    fn check_attach(&self, slot: &SlotRef, part: EntityId) -> Result<bool> {
        let target = self.slot(slot).ok_or_else(|| Self::missing_slot(slot))?;
        let incoming = self.parts.get(&part).ok_or(BodyError::NotAPart(part))?;

        if incoming.category != target.category {
            return Err(BodyError::CategoryMismatch {
                slot: slot.id.clone(),
                expected: target.category,
                found: incoming.category,
            });
        }
        match target.child {
            Some(occupant) if occupant == part => return Ok(true),
            Some(occupant) => {
                return Err(BodyError::SlotOccupied { slot: slot.id.to_string(), occupant })
            }
            None => {}
        }
        if let Some(existing) = &incoming.parent_slot {
            return Err(BodyError::PartAlreadyAttached { part, slot: existing.id.clone() });
        }
        if let SlotParent::Part(host) = slot.parent {
            if host == part || self.is_descendant(host, part) {
                return Err(BodyError::WouldCreateCycle { part });
            }
        }
        if let Some(container) = self.containers.container_of(part) {
            return Err(ContainerError::AlreadyContained { entity: part, container }.into());
        }
        Ok(false)
    }

    /// Whether `part` sits somewhere below `ancestor`.
    fn is_descendant(&self, part: EntityId, ancestor: EntityId) -> bool {
        let mut current = self.parent_part(part);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_part(parent);
        }
        false
    }

    pub fn can_attach_part(&self, slot: &SlotRef, part: EntityId) -> bool {
        self.check_attach(slot, part).is_ok()
    }

    /// Attach a loose part to an empty slot of matching category.
    ///
    /// The part moves into the parent's container and its whole subtree
    /// joins the parent's body. Attaching a part to the slot already holding
    /// it succeeds without changes.
    pub fn attach_part(&mut self, slot: &SlotRef, part: EntityId) -> Result<()> {
        if self.check_attach(slot, part)? {
            return Ok(());
        }

        self.containers.insert(slot.parent.container(), part)?;
        if let Some(target) = self.slot_mut(slot) {
            target.child = Some(part);
        }
        let body = self.body_of_slot(slot);
        if let Some(p) = self.parts.get_mut(&part) {
            p.parent_slot = Some(slot.clone());
        }
        self.set_subtree_body(part, body);
        debug!(slot = %slot, part = %part, "attached part");
        Ok(())
    }

    /// Detach the part in `slot`, leaving it loose in the world with its own
    /// children and organs still attached. Returns the freed part.
    pub fn detach_part(&mut self, slot: &SlotRef) -> Result<EntityId> {
        let target = self.slot(slot).ok_or_else(|| Self::missing_slot(slot))?;
        let part = target
            .child
            .ok_or_else(|| BodyError::SlotEmpty { slot: slot.id.to_string() })?;

        let container = slot.parent.container();
        if self.containers.container_of(part) != Some(container) {
            return Err(ContainerError::NotContained { entity: part, container }.into());
        }

        self.unlink_part(slot, part);
        Ok(part)
    }

    /// Give a rootless body a root slot and attach `part` to it.
    pub fn set_root_part(
        &mut self,
        creature: EntityId,
        slot_id: impl Into<SlotId>,
        part: EntityId,
    ) -> Result<SlotRef> {
        let slot_id = slot_id.into();
        let category = self.parts.get(&part).ok_or(BodyError::NotAPart(part))?.category;
        let body = self.bodies.get(&creature).ok_or(BodyError::NoBody(creature))?;
        if let Some(root) = &body.root {
            return Err(BodyError::SlotAlreadyExists { slot: root.id.to_string(), owner: creature });
        }

        let slot_ref = SlotRef::body_root(creature, slot_id.clone());
        if let Some(body) = self.bodies.get_mut(&creature) {
            body.root = Some(PartSlot::new(slot_id, category, SlotParent::Body(creature)));
        }
        if let Err(err) = self.attach_part(&slot_ref, part) {
            if let Some(body) = self.bodies.get_mut(&creature) {
                body.root = None;
            }
            return Err(err);
        }
        Ok(slot_ref)
    }

    fn check_insert_organ(&self, slot: &OrganSlotRef, organ: EntityId) -> Result<bool> {
        let target = self.organ_slot(slot).ok_or_else(|| BodyError::SlotNotFound {
            slot: slot.id.to_string(),
            owner: slot.part,
        })?;
        let incoming = self.organs.get(&organ).ok_or(BodyError::NotAnOrgan(organ))?;

        if incoming.kind != target.kind {
            return Err(BodyError::OrganKindMismatch {
                slot: slot.id.clone(),
                expected: target.kind,
                found: incoming.kind,
            });
        }
        match target.organ {
            Some(occupant) if occupant == organ => return Ok(true),
            Some(occupant) => {
                return Err(BodyError::SlotOccupied { slot: slot.id.to_string(), occupant })
            }
            None => {}
        }
        if let Some(existing) = &incoming.parent_slot {
            return Err(BodyError::OrganAlreadyInserted { organ, slot: existing.id.clone() });
        }
        if let Some(container) = self.containers.container_of(organ) {
            return Err(ContainerError::AlreadyContained { entity: organ, container }.into());
        }
        Ok(false)
    }

    pub fn can_insert_organ(&self, slot: &OrganSlotRef, organ: EntityId) -> bool {
        self.check_insert_organ(slot, organ).is_ok()
    }

    /// Put a loose organ into an empty organ slot of matching kind.
    pub fn insert_organ(&mut self, slot: &OrganSlotRef, organ: EntityId) -> Result<()> {
        if self.check_insert_organ(slot, organ)? {
            return Ok(());
        }

        self.containers.insert(slot.container(), organ)?;
        if let Some(target) = self.organ_slot_mut(slot) {
            target.organ = Some(organ);
        }
        let body = self.parts.get(&slot.part).and_then(|p| p.body);
        if let Some(o) = self.organs.get_mut(&organ) {
            o.parent_slot = Some(slot.clone());
            o.body = body;
        }
        debug!(slot = %slot, organ = %organ, "inserted organ");
        Ok(())
    }

    /// Take the organ out of `slot`, leaving it loose. Returns the organ.
    pub fn remove_organ(&mut self, slot: &OrganSlotRef) -> Result<EntityId> {
        let target = self.organ_slot(slot).ok_or_else(|| BodyError::SlotNotFound {
            slot: slot.id.to_string(),
            owner: slot.part,
        })?;
        let organ = target
            .organ
            .ok_or_else(|| BodyError::SlotEmpty { slot: slot.id.to_string() })?;

        let container = slot.container();
        if self.containers.container_of(organ) != Some(container) {
            return Err(ContainerError::NotContained { entity: organ, container }.into());
        }

        self.unlink_organ(slot, organ);
        Ok(organ)
    }

    /// Tear apart the graph under `root`, releasing every part (and, with
    /// `include_organs`, every organ) loose into the world.
    ///
    /// `root` is a creature (its whole body, leaving an empty root slot) or a
    /// part (that part and everything below it). Detached parts keep their
    /// organs unless `include_organs` is set.
    pub fn gib(&mut self, root: EntityId, include_organs: bool) -> Result<GibResult> {
        let sound = if let Some(body) = self.bodies.get(&root) {
            body.gib_sound.clone()
        } else if self.parts.contains_key(&root) {
            self.body_of(root)
                .and_then(|creature| self.bodies.get(&creature))
                .and_then(|body| body.gib_sound.clone())
        } else if self.exists(root) {
            return Err(BodyError::NoBody(root));
        } else {
            return Err(BodyError::EntityNotFound(root));
        };

        let parts: Vec<EntityId> = self.subtree(root).collect();
        let organs: Vec<(OrganSlotRef, EntityId)> = if include_organs {
            parts
                .iter()
                .filter_map(|id| self.parts.get(id))
                .flat_map(|p| p.organs.iter())
                .filter_map(|slot| slot.organ.map(|organ| (slot.slot_ref(), organ)))
                .collect()
        } else {
            Vec::new()
        };

        for (slot, organ) in &organs {
            self.unlink_organ(slot, *organ);
        }
        for &part in parts.iter().rev() {
            let parent_slot = self.parts.get(&part).and_then(|p| p.parent_slot.clone());
            if let Some(slot) = parent_slot {
                self.unlink_part(&slot, part);
            }
        }

        info!(
            root = %root,
            parts = parts.len(),
            organs = organs.len(),
            sound = sound.as_deref().unwrap_or("none"),
            "gibbed"
        );
        Ok(GibResult {
            parts,
            organs: organs.into_iter().map(|(_, organ)| organ).collect(),
            sound,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::body::parts::{OrganKind, PartCategory};
    use crate::body::templates::{BodyTemplate, PrototypeRegistry, SlotDefinition, TemplateResolver};
    use crate::containers::ContainerKind;

    fn setup(template: &str) -> (PrototypeRegistry, BodySystem, EntityId) {
        let registry = PrototypeRegistry::builtin();
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "subject", Some(template)).unwrap();
        (registry, system, creature)
    }

    fn torso_slot(system: &BodySystem, creature: EntityId, slot: &str) -> SlotRef {
        SlotRef::on_part(system.root_part(creature).unwrap(), slot)
    }

    #[test]
    fn test_detach_then_attach_round_trip() {
        let (_, mut system, creature) = setup("humanoid");
        let slot = torso_slot(&system, creature, "left arm");
        let arm = system.slot(&slot).unwrap().child.unwrap();
        let hand = system.children(arm).next().unwrap();

        let freed = system.detach_part(&slot).unwrap();
        assert_eq!(freed, arm);
        assert!(system.slot(&slot).unwrap().is_empty());
        assert_eq!(system.containers().container_of(arm), None);
        assert_eq!(system.body_of(arm), None);
        // Detachment cuts the subtree but keeps it whole.
        assert_eq!(system.parent_part(hand), Some(arm));
        assert_eq!(system.body_of(hand), None);

        system.attach_part(&slot, arm).unwrap();
        assert_eq!(system.slot(&slot).unwrap().child, Some(arm));
        assert_eq!(system.body_of(hand), Some(creature));
        assert_eq!(system.detach_part(&slot).unwrap(), arm);
    }

    #[test]
    fn test_attach_category_mismatch_leaves_slot_unchanged() {
        let (registry, mut system, creature) = setup("humanoid");
        let slot = torso_slot(&system, creature, "head");
        let head = system.slot(&slot).unwrap().child.unwrap();
        let tail = system.spawn_part(registry.part("TailBeast").unwrap());

        let err = system.attach_part(&slot, tail).unwrap_err();
        assert!(matches!(
            err,
            BodyError::CategoryMismatch { expected: PartCategory::Head, found: PartCategory::Tail, .. }
        ));
        assert_eq!(system.slot(&slot).unwrap().child, Some(head));

        system.detach_part(&slot).unwrap();
        assert!(matches!(system.attach_part(&slot, tail), Err(BodyError::CategoryMismatch { .. })));
        assert!(system.slot(&slot).unwrap().is_empty());
        assert_eq!(system.containers().container_of(tail), None);
    }

    #[test]
    fn test_attach_to_occupied_slot() {
        let (registry, mut system, creature) = setup("humanoid");
        let slot = torso_slot(&system, creature, "head");
        let head = system.slot(&slot).unwrap().child.unwrap();
        let spare = system.spawn_part(registry.part("HeadHuman").unwrap());

        assert!(matches!(
            system.attach_part(&slot, spare),
            Err(BodyError::SlotOccupied { occupant, .. }) if occupant == head
        ));
        // Same part again is a no-op.
        system.attach_part(&slot, head).unwrap();
        assert_eq!(system.slot(&slot).unwrap().child, Some(head));
    }

    #[test]
    fn test_detach_empty_slot() {
        let (_, mut system, creature) = setup("humanoid");
        let slot = torso_slot(&system, creature, "head");
        system.detach_part(&slot).unwrap();
        assert!(matches!(system.detach_part(&slot), Err(BodyError::SlotEmpty { .. })));
        assert!(matches!(
            system.detach_part(&torso_slot(&system, creature, "wing")),
            Err(BodyError::SlotNotFound { .. })
        ));
    }

    #[test]
    fn test_part_cannot_be_attached_twice() {
        let (_, mut system, creature) = setup("humanoid");
        let torso = system.root_part(creature).unwrap();
        let left = SlotRef::on_part(torso, "left arm");
        let arm = system.slot(&left).unwrap().child.unwrap();
        let spare_slot = system.create_part_slot(torso, "third arm", PartCategory::Arm).unwrap();

        assert!(matches!(
            system.attach_part(&spare_slot, arm),
            Err(BodyError::PartAlreadyAttached { .. })
        ));
        assert!(!system.can_attach_part(&spare_slot, arm));

        system.detach_part(&left).unwrap();
        assert!(system.can_attach_part(&spare_slot, arm));
        system.attach_part(&spare_slot, arm).unwrap();
        assert_eq!(system.parent_part(arm), Some(torso));
    }

    #[test]
    fn test_attach_below_itself_is_rejected() {
        let (_, mut system, creature) = setup("humanoid");
        let slot = torso_slot(&system, creature, "left arm");
        let arm = system.detach_part(&slot).unwrap();
        let hand = system.children(arm).next().unwrap();
        let under_hand = system.create_part_slot(hand, "graft", PartCategory::Arm).unwrap();
        let under_arm = system.create_part_slot(arm, "graft", PartCategory::Arm).unwrap();

        assert!(matches!(
            system.attach_part(&under_hand, arm),
            Err(BodyError::WouldCreateCycle { .. })
        ));
        assert!(matches!(
            system.attach_part(&under_arm, arm),
            Err(BodyError::WouldCreateCycle { .. })
        ));
    }

    #[test]
    fn test_organ_insert_and_remove() {
        let (registry, mut system, creature) = setup("humanoid");
        let torso = system.root_part(creature).unwrap();
        let slot = OrganSlotRef::new(torso, "heart");
        let heart = system.organ_slot(&slot).unwrap().organ.unwrap();

        let removed = system.remove_organ(&slot).unwrap();
        assert_eq!(removed, heart);
        assert_eq!(system.body_of(heart), None);
        assert!(matches!(system.remove_organ(&slot), Err(BodyError::SlotEmpty { .. })));

        let lungs = system.spawn_organ(registry.organ("OrganLungs").unwrap());
        assert!(matches!(
            system.insert_organ(&slot, lungs),
            Err(BodyError::OrganKindMismatch { expected: OrganKind::Heart, found: OrganKind::Lungs, .. })
        ));
        assert!(!system.can_insert_organ(&slot, lungs));

        system.insert_organ(&slot, heart).unwrap();
        assert_eq!(system.body_of(heart), Some(creature));
        assert_eq!(
            system.containers().container_of(heart).map(|c| (c.owner, c.kind)),
            Some((torso, ContainerKind::Organs))
        );

        let spare = system.spawn_organ(registry.organ("OrganHeart").unwrap());
        assert!(matches!(system.insert_organ(&slot, spare), Err(BodyError::SlotOccupied { .. })));
    }

    #[test]
    fn test_set_root_part() {
        let (registry, mut system, creature) = setup("humanoid");
        let old_torso = system.root_part(creature).unwrap();
        assert!(matches!(
            system.set_root_part(creature, "core", old_torso),
            Err(BodyError::SlotAlreadyExists { .. })
        ));

        let loner = system.spawn_entity("Creature", "loner");
        assert!(matches!(system.set_root_part(loner, "torso", old_torso), Err(BodyError::NoBody(_))));

        let slime = system.spawn_creature(&registry, "slime", Some("humanoid")).unwrap();
        if let Some(body) = system.bodies.get_mut(&slime) {
            let root = body.root.take().unwrap();
            let torso = root.child.unwrap();
            system.containers.forget(torso);
            system.parts.get_mut(&torso).unwrap().parent_slot = None;
        }
        let core = system.spawn_part(registry.part("TorsoBeast").unwrap());
        let slot = system.set_root_part(slime, "core", core).unwrap();
        assert_eq!(system.root_part(slime), Some(core));
        assert_eq!(system.slot(&slot).unwrap().category, PartCategory::Torso);
    }

    #[test]
    fn test_gib_with_organs_frees_everything() {
        let (_, mut system, creature) = setup("humanoid");
        let parts: HashSet<EntityId> = system.children(creature).collect();
        let organs: HashSet<EntityId> = system.organs(creature).collect();

        let result = system.gib(creature, true).unwrap();

        assert_eq!(result.len(), parts.len() + organs.len());
        let freed: HashSet<EntityId> = result.all().into_iter().collect();
        assert_eq!(freed, parts.union(&organs).copied().collect());
        assert_eq!(result.sound.as_deref(), Some("gib_flesh"));

        assert_eq!(system.children(creature).count(), 0);
        assert_eq!(system.organs(creature).count(), 0);
        assert!(system.body(creature).unwrap().root.as_ref().unwrap().is_empty());
        for id in freed {
            assert_eq!(system.containers().container_of(id), None);
            assert_eq!(system.body_of(id), None);
            assert!(system.exists(id));
        }
        for part in parts {
            assert!(system.part(part).unwrap().slots.iter().all(|s| s.is_empty()));
            assert!(system.part(part).unwrap().organs.iter().all(|s| s.is_empty()));
        }
    }

    #[test]
    fn test_gib_without_organs_leaves_them_in_parts() {
        let mut registry = PrototypeRegistry::builtin();
        registry.add_template(
            BodyTemplate::new("example", "torso")
                .with_slot("torso", SlotDefinition::new("TorsoHuman").connect(&["leftArm", "rightArm"]))
                .with_slot("leftArm", SlotDefinition::new("ArmHumanLeft"))
                .with_slot("rightArm", SlotDefinition::new("ArmHumanRight")),
        );
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("example")).unwrap();
        let torso = system.root_part(creature).unwrap();
        let arms: Vec<EntityId> = system.children(torso).collect();

        let result = system.gib(torso, false).unwrap();

        assert_eq!(result.parts, vec![torso, arms[0], arms[1]]);
        assert!(result.organs.is_empty());
        assert_eq!(system.root_part(creature), None);
        assert!(system.body(creature).unwrap().root.is_some());

        let (_, mut system, creature) = setup("humanoid");
        let organs = system.organs(creature).count();
        let torso = system.root_part(creature).unwrap();
        system.gib(creature, false).unwrap();
        assert_eq!(system.organs(torso).count(), 5);
        assert!(organs > 5);
    }

    #[test]
    fn test_gib_subtree_only() {
        let (_, mut system, creature) = setup("humanoid");
        let slot = torso_slot(&system, creature, "right leg");
        let leg = system.slot(&slot).unwrap().child.unwrap();
        let before = system.children(creature).count();

        let result = system.gib(leg, true).unwrap();

        assert_eq!(result.parts.len(), 2);
        assert_eq!(result.parts[0], leg);
        assert!(system.slot(&slot).unwrap().is_empty());
        assert_eq!(system.children(creature).count(), before - 2);
        assert_eq!(system.children(leg).count(), 0);
    }

    #[test]
    fn test_gib_errors() {
        let (_, mut system, _) = setup("humanoid");
        let rock = system.spawn_entity("Rock", "rock");
        assert!(matches!(system.gib(rock, true), Err(BodyError::NoBody(_))));
        assert!(matches!(system.gib(EntityId(999), true), Err(BodyError::EntityNotFound(_))));
    }

    #[test]
    fn test_rebuild_after_gib_is_noop() {
        let (registry, mut system, creature) = setup("humanoid");
        system.gib(creature, true).unwrap();
        let count = system.entity_count();
        system.build_body(&registry, creature, "humanoid").unwrap();
        assert_eq!(system.entity_count(), count);
        assert_eq!(registry.resolve("humanoid").unwrap().root, SlotId::from("torso"));
    }
}
