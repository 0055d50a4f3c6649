//! Body construction from templates
//!
//! Walks a template's connection graph from its root slot and instantiates
//! one part per slot. Connections are followed in both directions, and a
//! visited set keyed by slot id turns links declared from both ends, or in
//! cycles, into a spanning tree.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, warn};

use super::parts::{Body, PartCategory};
use super::slots::{PartSlot, SlotParent, SlotRef};
use super::templates::{BodyTemplate, SlotDefinition, TemplateResolver};
use super::system::BodySystem;
use crate::containers::ContainerBinding;
use crate::error::{BodyError, Result};
use crate::types::{EntityId, SlotId};

/// State shared by one walk over a template.
struct TemplateWalk<'t> {
    resolver: &'t dyn TemplateResolver,
    template: &'t BodyTemplate,
    adjacency: HashMap<&'t SlotId, Vec<&'t SlotId>>,
    visited: HashSet<SlotId>,
}

impl<C: ContainerBinding> BodySystem<C> {
    /// Build the body of `creature` from the template `template_id`.
    ///
    /// Does nothing if the creature already has a root slot. A slot whose
    /// part or organ prototype cannot be resolved is logged and skipped
    /// together with everything beneath it; the rest of the body is built.
    pub fn build_body(
        &mut self,
        resolver: &dyn TemplateResolver,
        creature: EntityId,
        template_id: &str,
    ) -> Result<()> {
        if !self.exists(creature) {
            return Err(BodyError::EntityNotFound(creature));
        }
        if self.bodies.get(&creature).map_or(false, |b| b.root.is_some()) {
            debug!(creature = %creature, "body already built");
            return Ok(());
        }

        let template = resolver.resolve(template_id).map_err(|err| {
            error!(creature = %creature, template = template_id, "{}", err);
            err
        })?;

        let root_id = template.root.clone();
        let root_part = template
            .slots
            .get(&root_id)
            .ok_or_else(|| BodyError::SlotDefinitionInvalid {
                slot: root_id.clone(),
                reason: "root slot is not declared".to_string(),
            })
            .and_then(|definition| self.instantiate_part(resolver, &root_id, definition))
            .map_err(|err| {
                error!(creature = %creature, template = template_id, "{}", err);
                err
            })?;

        let category = self.parts[&root_part].category;
        let gib_sound = template
            .gib_sound
            .clone()
            .or_else(|| self.config.default_gib_sound.clone());
        self.bodies.insert(
            creature,
            Body {
                root: Some(PartSlot::new(root_id.clone(), category, SlotParent::Body(creature))),
                template: template_id.to_string(),
                gib_sound,
            },
        );
        self.attach_part(&SlotRef::body_root(creature, root_id.clone()), root_part)?;

        let mut walk = TemplateWalk {
            resolver,
            template,
            adjacency: template.adjacency(),
            visited: HashSet::from([root_id.clone()]),
        };
        self.init_part(&mut walk, root_part, &root_id, 0);

        info!(
            creature = %creature,
            template = template_id,
            parts = self.children(creature).count(),
            organs = self.organs(creature).count(),
            "built body"
        );
        Ok(())
    }

    /// Spawn the part for one template slot, checking its declared category.
    fn instantiate_part(
        &mut self,
        resolver: &dyn TemplateResolver,
        slot: &SlotId,
        definition: &SlotDefinition,
    ) -> Result<EntityId> {
        let prototype = resolver.part(&definition.part).ok_or_else(|| {
            BodyError::SlotDefinitionInvalid {
                slot: slot.clone(),
                reason: format!("unknown part prototype '{}'", definition.part),
            }
        })?;
        if let Some(declared) = definition.category {
            if declared != prototype.category {
                return Err(BodyError::SlotDefinitionInvalid {
                    slot: slot.clone(),
                    reason: format!(
                        "declared {} but prototype '{}' is a {}",
                        declared.display_name(),
                        prototype.id,
                        prototype.category.display_name()
                    ),
                });
            }
        }
        Ok(self.spawn_part(prototype))
    }

    /// Populate organs of `part` and recurse into unvisited neighbours.
    fn init_part<'t>(
        &mut self,
        walk: &mut TemplateWalk<'t>,
        part: EntityId,
        slot: &SlotId,
        depth: usize,
    ) {
        let template = walk.template;
        let definition = match template.slots.get(slot) {
            Some(definition) => definition,
            None => return,
        };

        for (organ_slot, prototype_id) in &definition.organs {
            let prototype = match walk.resolver.organ(prototype_id) {
                Some(prototype) => prototype,
                None => {
                    error!(
                        template = %template.id,
                        slot = %slot,
                        organ_slot = %organ_slot,
                        "unknown organ prototype '{}', skipping",
                        prototype_id
                    );
                    continue;
                }
            };
            let organ = self.spawn_organ(prototype);
            let inserted = self
                .create_organ_slot(part, organ_slot.clone(), prototype.kind)
                .and_then(|slot_ref| self.insert_organ(&slot_ref, organ));
            if let Err(err) = inserted {
                error!(template = %template.id, slot = %slot, "{}", err);
                if let Err(err) = self.destroy(organ) {
                    error!(organ = %organ, "failed to discard organ: {}", err);
                }
            }
        }

        if self.config.max_depth.map_or(false, |max| depth >= max) {
            warn!(
                template = %template.id,
                slot = %slot,
                depth,
                "maximum body depth reached, not expanding further"
            );
            return;
        }

        let neighbours: Vec<&'t SlotId> = walk.adjacency.get(slot).cloned().unwrap_or_default();
        for connection in neighbours {
            if !walk.visited.insert(connection.clone()) {
                continue;
            }
            let child = match template.slots.get(connection) {
                Some(child_definition) => {
                    self.instantiate_part(walk.resolver, connection, child_definition)
                }
                None => Err(BodyError::SlotDefinitionInvalid {
                    slot: connection.clone(),
                    reason: format!("connected from '{}' but never declared", slot),
                }),
            };
            let child = match child {
                Ok(child) => child,
                Err(err) => {
                    error!(template = %template.id, "{}, skipping branch", err);
                    continue;
                }
            };

            let category: PartCategory = self.parts[&child].category;
            let attached = self
                .create_part_slot(part, connection.clone(), category)
                .and_then(|slot_ref| self.attach_part(&slot_ref, child));
            if let Err(err) = attached {
                error!(template = %template.id, slot = %connection, "{}, skipping branch", err);
                if let Err(err) = self.destroy(child) {
                    error!(part = %child, "failed to discard part: {}", err);
                }
                continue;
            }

            self.init_part(walk, child, connection, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::parts::OrganKind;
    use crate::body::templates::{PrototypeRegistry, SlotDefinition};
    use crate::config::BodyConfig;
    use crate::containers::{ContainerError, ContainerId, ContainerKind, ContainerManager};

    fn registry_with(template: BodyTemplate) -> PrototypeRegistry {
        let mut registry = PrototypeRegistry::builtin();
        registry.add_template(template);
        registry
    }

    fn two_armed() -> BodyTemplate {
        BodyTemplate::new("two-armed", "torso")
            .with_slot("torso", SlotDefinition::new("TorsoHuman").connect(&["leftArm", "rightArm"]))
            .with_slot("leftArm", SlotDefinition::new("ArmHumanLeft"))
            .with_slot("rightArm", SlotDefinition::new("ArmHumanRight"))
    }

    #[test]
    fn test_builds_one_part_per_slot() {
        let registry = registry_with(two_armed());
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("two-armed")).unwrap();

        let parts: Vec<EntityId> = system.children(creature).collect();
        assert_eq!(parts.len(), 3);

        let torso = system.root_part(creature).unwrap();
        assert_eq!(system.part(torso).unwrap().category, PartCategory::Torso);
        let limbs: Vec<EntityId> = system.children(torso).collect();
        assert_eq!(limbs.len(), 2);
        for limb in limbs {
            let part = system.part(limb).unwrap();
            assert_eq!(part.category, PartCategory::Arm);
            assert_eq!(part.body, Some(creature));
            assert_eq!(
                system.containers().container_of(limb),
                Some(ContainerId::new(torso, ContainerKind::Parts))
            );
        }
        assert_eq!(
            system.containers().container_of(torso),
            Some(ContainerId::new(creature, ContainerKind::BodyRoot))
        );
    }

    #[test]
    fn test_builtin_humanoid() {
        let registry = PrototypeRegistry::builtin();
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("humanoid")).unwrap();

        assert_eq!(system.children(creature).count(), 10);
        assert_eq!(system.organs(creature).count(), 7);
        let body = system.body(creature).unwrap();
        assert_eq!(body.template, "humanoid");
        assert_eq!(body.gib_sound.as_deref(), Some("gib_flesh"));

        let head = system.children_of_category(creature, PartCategory::Head).next().unwrap();
        let kinds: Vec<OrganKind> = system
            .part_organs(head)
            .map(|o| system.organ(o).unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![OrganKind::Brain, OrganKind::Eyes]);
    }

    #[test]
    fn test_redundant_and_cyclic_connections_build_once() {
        let template = BodyTemplate::new("cyclic", "a")
            .with_slot("a", SlotDefinition::new("TorsoHuman").connect(&["b", "c"]))
            .with_slot("b", SlotDefinition::new("HeadHuman").connect(&["a", "c"]))
            .with_slot("c", SlotDefinition::new("TailBeast").connect(&["a", "b", "c"]));
        let registry = registry_with(template);
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "loop", Some("cyclic")).unwrap();

        let parts: Vec<EntityId> = system.children(creature).collect();
        assert_eq!(parts.len(), 3);
        let mut prototypes: Vec<String> = parts
            .iter()
            .map(|p| system.meta(*p).unwrap().prototype.clone())
            .collect();
        prototypes.sort();
        assert_eq!(prototypes, vec!["HeadHuman", "TailBeast", "TorsoHuman"]);

        // Depth first: "b" is reached from "a" first, so "c" hangs off "b".
        let b = system.slot(&SlotRef::on_part(parts[0], "b")).unwrap().child.unwrap();
        assert!(system.slot(&SlotRef::on_part(b, "c")).unwrap().child.is_some());
        assert!(system.slot(&SlotRef::on_part(parts[0], "c")).is_none());
    }

    #[test]
    fn test_rebuild_is_noop() {
        let registry = PrototypeRegistry::builtin();
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("humanoid")).unwrap();
        let before = system.entity_count();

        system.build_body(&registry, creature, "humanoid").unwrap();
        system.build_body(&registry, creature, "dragon").unwrap();

        assert_eq!(system.entity_count(), before);
        assert_eq!(system.body(creature).unwrap().template, "humanoid");
    }

    #[test]
    fn test_unknown_template() {
        let registry = PrototypeRegistry::builtin();
        let mut system = BodySystem::default();
        let result = system.spawn_creature(&registry, "bob", Some("kraken"));

        assert!(matches!(result, Err(BodyError::TemplateNotFound(id)) if id == "kraken"));
        assert_eq!(system.entity_count(), 1);
    }

    #[test]
    fn test_bad_branch_is_skipped() {
        let template = BodyTemplate::new("patchy", "torso")
            .with_slot(
                "torso",
                SlotDefinition::new("TorsoHuman")
                    .connect(&["head", "ghost arm", "mislabelled", "phantom"])
                    .organ("heart", "OrganHeart")
                    .organ("spleen", "OrganSpleen"),
            )
            .with_slot("head", SlotDefinition::new("HeadHuman"))
            .with_slot("ghost arm", SlotDefinition::new("ArmSpectral").connect(&["ghost hand"]))
            .with_slot("ghost hand", SlotDefinition::new("HandHumanLeft"))
            .with_slot(
                "mislabelled",
                SlotDefinition::new("TailBeast").with_category(PartCategory::Leg),
            );
        let registry = registry_with(template);
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("patchy")).unwrap();

        let categories: Vec<PartCategory> = system
            .children(creature)
            .map(|p| system.part(p).unwrap().category)
            .collect();
        assert_eq!(categories, vec![PartCategory::Torso, PartCategory::Head]);
        assert_eq!(system.organs(creature).count(), 1);
        // torso, head, heart and the creature itself
        assert_eq!(system.entity_count(), 4);
    }

    #[test]
    fn test_unresolvable_root_fails() {
        let template = BodyTemplate::new("void", "core")
            .with_slot("core", SlotDefinition::new("NoSuchPart"));
        let registry = registry_with(template);
        let mut system = BodySystem::default();
        let creature = system.spawn_entity("Creature", "void");

        let result = system.build_body(&registry, creature, "void");
        assert!(matches!(result, Err(BodyError::SlotDefinitionInvalid { .. })));
        assert!(system.body(creature).is_none());
        assert_eq!(system.entity_count(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let registry = PrototypeRegistry::builtin();
        let config = BodyConfig { max_depth: Some(1), ..BodyConfig::default() };
        let mut system = BodySystem::new(config);
        let creature = system.spawn_creature(&registry, "bob", Some("humanoid")).unwrap();

        // torso plus its five direct children; hands and feet are depth 2
        assert_eq!(system.children(creature).count(), 6);
        assert!(!system.has_child_of_category(creature, PartCategory::Hand));
    }

    #[test]
    fn test_default_gib_sound_fallback() {
        let registry = registry_with(two_armed());
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("two-armed")).unwrap();
        assert_eq!(system.body(creature).unwrap().gib_sound.as_deref(), Some("gib"));
    }

    #[test]
    fn test_connection_declared_only_from_child_end() {
        let template = BodyTemplate::new("reverse", "torso")
            .with_slot("torso", SlotDefinition::new("TorsoHuman"))
            .with_slot("head", SlotDefinition::new("HeadHuman").connect(&["torso"]))
            .with_slot("left arm", SlotDefinition::new("ArmHumanLeft").connect(&["torso"]))
            .with_slot("left hand", SlotDefinition::new("HandHumanLeft").connect(&["left arm"]));
        assert!(template.validate().is_empty());
        let registry = registry_with(template);
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("reverse")).unwrap();

        assert_eq!(system.children(creature).count(), 4);
        let torso = system.root_part(creature).unwrap();
        let head = system.slot(&SlotRef::on_part(torso, "head")).unwrap().child.unwrap();
        let arm = system.slot(&SlotRef::on_part(torso, "left arm")).unwrap().child.unwrap();
        assert_eq!(system.part(head).unwrap().category, PartCategory::Head);
        assert_eq!(system.parent_part(head), Some(torso));
        let hand = system.slot(&SlotRef::on_part(arm, "left hand")).unwrap().child.unwrap();
        assert_eq!(system.body_of(hand), Some(creature));
        // Back-links are walked in slot id order.
        assert_eq!(system.children(torso).collect::<Vec<_>>(), vec![head, arm, hand]);
    }

    #[test]
    fn test_long_chain_builds_every_slot() {
        let mut template = BodyTemplate::new("chain", "s0")
            .with_slot("s0", SlotDefinition::new("TorsoHuman").connect(&["s1"]));
        for i in 1..40 {
            let next = format!("s{}", i + 1);
            let definition = if i + 1 < 40 {
                SlotDefinition::new("TailBeast").connect(&[next.as_str()])
            } else {
                SlotDefinition::new("TailBeast")
            };
            template = template.with_slot(&format!("s{}", i), definition);
        }
        assert_eq!(template.slots.len(), 40);
        let registry = registry_with(template);
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "wyrm", Some("chain")).unwrap();

        assert_eq!(system.children(creature).count(), 40);
        assert_eq!(system.children_of_category(creature, PartCategory::Tail).count(), 39);
    }

    #[test]
    fn test_diamond_builds_shared_slot_once() {
        let template = BodyTemplate::new("diamond", "a")
            .with_slot("a", SlotDefinition::new("TorsoHuman").connect(&["b", "c"]))
            .with_slot("b", SlotDefinition::new("ArmHumanLeft").connect(&["d"]))
            .with_slot("c", SlotDefinition::new("ArmHumanRight").connect(&["d"]))
            .with_slot("d", SlotDefinition::new("HandHumanLeft"));
        let registry = registry_with(template);
        let mut system = BodySystem::default();
        let creature = system.spawn_creature(&registry, "bob", Some("diamond")).unwrap();

        let parts: Vec<EntityId> = system.children(creature).collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(system.children_of_category(creature, PartCategory::Hand).count(), 1);

        let a = parts[0];
        let b = system.slot(&SlotRef::on_part(a, "b")).unwrap().child.unwrap();
        let d = system.slot(&SlotRef::on_part(b, "d")).unwrap().child.unwrap();
        assert_eq!(system.parent_part(d), Some(b));
        let c = system
            .children_of_category(creature, PartCategory::Arm)
            .find(|&arm| arm != b)
            .unwrap();
        assert!(system.slot(&SlotRef::on_part(c, "d")).is_none());
    }

    /// Container binding that refuses to hold child parts.
    #[derive(Default)]
    struct NoChildParts(ContainerManager);

    impl ContainerBinding for NoChildParts {
        fn insert(&mut self, container: ContainerId, entity: EntityId) -> std::result::Result<(), ContainerError> {
            if container.kind == ContainerKind::Parts {
                return Err(ContainerError::AlreadyContained { entity, container });
            }
            self.0.insert(container, entity)
        }

        fn remove(&mut self, container: ContainerId, entity: EntityId) -> std::result::Result<(), ContainerError> {
            self.0.remove(container, entity)
        }

        fn container_of(&self, entity: EntityId) -> Option<ContainerId> {
            self.0.container_of(entity)
        }

        fn contents(&self, container: ContainerId) -> &[EntityId] {
            self.0.contents(container)
        }

        fn forget(&mut self, entity: EntityId) {
            self.0.forget(entity)
        }

        fn all_contents(&self) -> Vec<(ContainerId, Vec<EntityId>)> {
            self.0.all_contents()
        }
    }

    #[test]
    fn test_rejected_child_is_discarded() {
        let registry = registry_with(two_armed());
        let mut system = BodySystem::with_containers(BodyConfig::default(), NoChildParts::default());
        let creature = system.spawn_creature(&registry, "bob", Some("two-armed")).unwrap();

        let torso = system.root_part(creature).unwrap();
        assert_eq!(system.children(creature).collect::<Vec<_>>(), vec![torso]);
        // Only the creature and its torso survive; rejected arms are deleted.
        assert_eq!(system.entity_count(), 2);
        assert!(system.part(torso).unwrap().slots.iter().all(|s| s.is_empty()));
    }
}
