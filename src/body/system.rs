//! Entity storage and lifecycle for the body graph
//!
//! `BodySystem` owns every creature, part and organ entity together with the
//! container binding that physically holds them. Construction lives in
//! `builder`, queries in `traversal`, and slot mutation in `mutation`.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use super::parts::{Body, EntityMeta, Organ, OrganKind, Part, PartCategory};
use super::slots::{OrganSlot, OrganSlotRef, PartSlot, SlotParent, SlotRef};
use super::templates::{OrganPrototype, PartPrototype, TemplateResolver};
use crate::config::BodyConfig;
use crate::containers::{ContainerBinding, ContainerManager};
use crate::error::{BodyError, Result};
use crate::types::{EntityId, IdGenerator, OrganSlotId, SlotId};

/// Simulation events the body graph reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyEvent {
    /// An entity was created, optionally referencing a body template.
    Spawned { entity: EntityId, template: Option<String> },
    /// An entity is about to be destroyed.
    Destroying { entity: EntityId },
}

/// Owner of all body graph state
#[derive(Debug, Clone)]
pub struct BodySystem<C = ContainerManager> {
    pub config: BodyConfig,
    pub(crate) entities: HashMap<EntityId, EntityMeta>,
    pub(crate) bodies: HashMap<EntityId, Body>,
    pub(crate) parts: HashMap<EntityId, Part>,
    pub(crate) organs: HashMap<EntityId, Organ>,
    pub(crate) containers: C,
    pub(crate) ids: IdGenerator,
}

impl BodySystem<ContainerManager> {
    pub fn new(config: BodyConfig) -> Self {
        Self::with_containers(config, ContainerManager::new())
    }
}

impl Default for BodySystem<ContainerManager> {
    fn default() -> Self {
        Self::new(BodyConfig::default())
    }
}

impl<C: ContainerBinding> BodySystem<C> {
    pub fn with_containers(config: BodyConfig, containers: C) -> Self {
        Self {
            config,
            entities: HashMap::new(),
            bodies: HashMap::new(),
            parts: HashMap::new(),
            organs: HashMap::new(),
            containers,
            ids: IdGenerator::new(),
        }
    }

    // === Entity access ===

    pub fn containers(&self) -> &C {
        &self.containers
    }

    pub fn exists(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn meta(&self, entity: EntityId) -> Option<&EntityMeta> {
        self.entities.get(&entity)
    }

    /// Display name of an entity, or its id if unknown
    pub fn name_of(&self, entity: EntityId) -> String {
        self.entities
            .get(&entity)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| entity.to_string())
    }

    pub fn body(&self, creature: EntityId) -> Option<&Body> {
        self.bodies.get(&creature)
    }

    pub fn part(&self, part: EntityId) -> Option<&Part> {
        self.parts.get(&part)
    }

    pub fn organ(&self, organ: EntityId) -> Option<&Organ> {
        self.organs.get(&organ)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Look up a part slot by handle
    pub fn slot(&self, slot: &SlotRef) -> Option<&PartSlot> {
        match slot.parent {
            SlotParent::Body(creature) => self
                .bodies
                .get(&creature)?
                .root
                .as_ref()
                .filter(|root| root.id == slot.id),
            SlotParent::Part(part) => self.parts.get(&part)?.slot(&slot.id),
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: &SlotRef) -> Option<&mut PartSlot> {
        match slot.parent {
            SlotParent::Body(creature) => self
                .bodies
                .get_mut(&creature)?
                .root
                .as_mut()
                .filter(|root| root.id == slot.id),
            SlotParent::Part(part) => self
                .parts
                .get_mut(&part)?
                .slots
                .iter_mut()
                .find(|s| s.id == slot.id),
        }
    }

    pub fn organ_slot(&self, slot: &OrganSlotRef) -> Option<&OrganSlot> {
        self.parts.get(&slot.part)?.organ_slot(&slot.id)
    }

    pub(crate) fn organ_slot_mut(&mut self, slot: &OrganSlotRef) -> Option<&mut OrganSlot> {
        self.parts
            .get_mut(&slot.part)?
            .organs
            .iter_mut()
            .find(|s| s.id == slot.id)
    }

    // === Spawning ===

    /// Create a plain entity with no components.
    pub fn spawn_entity(&mut self, prototype: impl Into<String>, name: impl Into<String>) -> EntityId {
        let id = self.ids.next_entity();
        self.entities.insert(id, EntityMeta { prototype: prototype.into(), name: name.into() });
        id
    }

    /// Spawn a loose part entity from a prototype.
    pub fn spawn_part(&mut self, prototype: &PartPrototype) -> EntityId {
        let id = self.spawn_entity(prototype.id.clone(), prototype.name.clone());
        self.parts.insert(id, Part::new(prototype.category, prototype.size, prototype.symmetry));
        id
    }

    /// Spawn a loose organ entity from a prototype.
    pub fn spawn_organ(&mut self, prototype: &OrganPrototype) -> EntityId {
        let id = self.spawn_entity(prototype.id.clone(), prototype.name.clone());
        self.organs.insert(id, Organ::new(prototype.kind));
        id
    }

    /// Spawn a creature and build its body from `template`, if given.
    pub fn spawn_creature(
        &mut self,
        resolver: &dyn TemplateResolver,
        name: impl Into<String>,
        template: Option<&str>,
    ) -> Result<EntityId> {
        let creature = self.spawn_entity("Creature", name);
        self.handle_event(
            resolver,
            BodyEvent::Spawned { entity: creature, template: template.map(str::to_string) },
        )?;
        Ok(creature)
    }

    /// React to a simulation event.
    pub fn handle_event(&mut self, resolver: &dyn TemplateResolver, event: BodyEvent) -> Result<()> {
        match event {
            BodyEvent::Spawned { entity, template: Some(template) } => {
                self.build_body(resolver, entity, &template)
            }
            BodyEvent::Spawned { template: None, .. } => Ok(()),
            BodyEvent::Destroying { entity } => self.destroy(entity).map(|_| ()),
        }
    }

    // === Slot creation ===

    /// Add an empty child slot to a part.
    pub fn create_part_slot(
        &mut self,
        part: EntityId,
        id: impl Into<SlotId>,
        category: PartCategory,
    ) -> Result<SlotRef> {
        let id = id.into();
        let host = self.parts.get_mut(&part).ok_or(BodyError::NotAPart(part))?;
        if host.slot(&id).is_some() {
            return Err(BodyError::SlotAlreadyExists { slot: id.to_string(), owner: part });
        }
        let slot = PartSlot::new(id, category, SlotParent::Part(part));
        let slot_ref = slot.slot_ref();
        host.slots.push(slot);
        Ok(slot_ref)
    }

    /// Add an empty organ slot to a part.
    pub fn create_organ_slot(
        &mut self,
        part: EntityId,
        id: impl Into<OrganSlotId>,
        kind: OrganKind,
    ) -> Result<OrganSlotRef> {
        let id = id.into();
        let host = self.parts.get_mut(&part).ok_or(BodyError::NotAPart(part))?;
        if host.organ_slot(&id).is_some() {
            return Err(BodyError::SlotAlreadyExists { slot: id.to_string(), owner: part });
        }
        let slot = OrganSlot::new(id, kind, part);
        let slot_ref = slot.slot_ref();
        host.organs.push(slot);
        Ok(slot_ref)
    }

    // === Destruction ===

    /// Delete an entity and everything its body graph owns.
    ///
    /// A creature takes its whole body with it; a part takes its subtree and
    /// organs after being cut from its parent slot; an organ is removed from
    /// its slot first. Returns every deleted entity, `entity` first.
    pub fn destroy(&mut self, entity: EntityId) -> Result<Vec<EntityId>> {
        if !self.exists(entity) {
            return Err(BodyError::EntityNotFound(entity));
        }

        let mut doomed = vec![entity];
        if self.bodies.contains_key(&entity) {
            doomed.extend(self.children(entity));
            doomed.extend(self.organs(entity));
        } else if let Some(part) = self.parts.get(&entity) {
            if let Some(slot) = part.parent_slot.clone() {
                self.unlink_part(&slot, entity);
            }
            doomed.extend(self.children(entity));
            doomed.extend(self.organs(entity));
        } else if let Some(organ) = self.organs.get(&entity) {
            if let Some(slot) = organ.parent_slot.clone() {
                self.unlink_organ(&slot, entity);
            }
        }

        for &id in &doomed {
            self.containers.forget(id);
            self.bodies.remove(&id);
            self.parts.remove(&id);
            self.organs.remove(&id);
            self.entities.remove(&id);
        }
        debug!(entity = %entity, deleted = doomed.len(), "destroyed entity");
        Ok(doomed)
    }

    // === Internal slot bookkeeping shared by builder, mutation and destroy ===

    /// Creature owning the graph a slot belongs to.
    pub(crate) fn body_of_slot(&self, slot: &SlotRef) -> Option<EntityId> {
        match slot.parent {
            SlotParent::Body(creature) => Some(creature),
            SlotParent::Part(part) => self.parts.get(&part).and_then(|p| p.body),
        }
    }

    /// Point every part and organ under `part` at `body`.
    pub(crate) fn set_subtree_body(&mut self, part: EntityId, body: Option<EntityId>) {
        let subtree: Vec<EntityId> = self.subtree(part).collect();
        let organs: Vec<EntityId> = self.organs(part).collect();
        for id in subtree {
            if let Some(p) = self.parts.get_mut(&id) {
                p.body = body;
            }
        }
        for id in organs {
            if let Some(o) = self.organs.get_mut(&id) {
                o.body = body;
            }
        }
    }

    /// Cut `part` out of `slot` after preconditions have been checked.
    pub(crate) fn unlink_part(&mut self, slot: &SlotRef, part: EntityId) {
        if let Err(err) = self.containers.remove(slot.parent.container(), part) {
            warn!(slot = %slot, part = %part, "container out of sync: {}", err);
        }
        match self.slot_mut(slot) {
            Some(target) if target.child == Some(part) => target.child = None,
            _ => error!(slot = %slot, part = %part, "slot did not reference part"),
        }
        if let Some(p) = self.parts.get_mut(&part) {
            p.parent_slot = None;
        }
        self.set_subtree_body(part, None);
        debug!(slot = %slot, part = %part, "detached part");
    }

    /// Take `organ` out of `slot` after preconditions have been checked.
    pub(crate) fn unlink_organ(&mut self, slot: &OrganSlotRef, organ: EntityId) {
        if let Err(err) = self.containers.remove(slot.container(), organ) {
            warn!(slot = %slot, organ = %organ, "container out of sync: {}", err);
        }
        match self.organ_slot_mut(slot) {
            Some(target) if target.organ == Some(organ) => target.organ = None,
            _ => error!(slot = %slot, organ = %organ, "organ slot did not reference organ"),
        }
        if let Some(o) = self.organs.get_mut(&organ) {
            o.parent_slot = None;
            o.body = None;
        }
        debug!(slot = %slot, organ = %organ, "removed organ");
    }
}
