//! Read-only queries over live body graphs
//!
//! Every traversal starts from either a creature (its whole body, root part
//! included) or a part (that part's subtree). Iterators are lazy and walk
//! depth first in slot declaration order.

use std::collections::HashMap;

use rand::Rng;

use super::parts::{BodyFunction, Part, PartCategory};
use super::slots::{OrganSlot, PartSlot, SlotParent};
use super::system::BodySystem;
use crate::containers::ContainerBinding;
use crate::types::EntityId;

/// Depth-first walk over parts, yielding each part before its children.
pub struct SubtreeParts<'a> {
    parts: &'a HashMap<EntityId, Part>,
    stack: Vec<EntityId>,
}

impl<'a> SubtreeParts<'a> {
    fn new(parts: &'a HashMap<EntityId, Part>, start: Option<EntityId>) -> Self {
        Self { parts, stack: start.into_iter().collect() }
    }
}

impl<'a> Iterator for SubtreeParts<'a> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        let id = self.stack.pop()?;
        if let Some(part) = self.parts.get(&id) {
            let first = self.stack.len();
            self.stack.extend(part.child_parts());
            self.stack[first..].reverse();
        }
        Some(id)
    }
}

/// Organs of every part in a subtree, part by part.
pub struct SubtreeOrgans<'a> {
    walk: SubtreeParts<'a>,
    current: std::slice::Iter<'a, OrganSlot>,
}

impl<'a> Iterator for SubtreeOrgans<'a> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        loop {
            if let Some(slot) = self.current.next() {
                match slot.organ {
                    Some(organ) => return Some(organ),
                    None => continue,
                }
            }
            let part = self.walk.next()?;
            let parts = self.walk.parts;
            self.current = match parts.get(&part) {
                Some(p) => p.organs.iter(),
                None => [].iter(),
            };
        }
    }
}

/// Every part slot in a subtree, filled or empty.
pub struct SubtreeSlots<'a> {
    root: Option<&'a PartSlot>,
    walk: SubtreeParts<'a>,
    current: std::slice::Iter<'a, PartSlot>,
}

impl<'a> Iterator for SubtreeSlots<'a> {
    type Item = &'a PartSlot;

    fn next(&mut self) -> Option<&'a PartSlot> {
        if let Some(root) = self.root.take() {
            return Some(root);
        }
        loop {
            if let Some(slot) = self.current.next() {
                return Some(slot);
            }
            let part = self.walk.next()?;
            let parts = self.walk.parts;
            self.current = match parts.get(&part) {
                Some(p) => p.slots.iter(),
                None => [].iter(),
            };
        }
    }
}

impl<C: ContainerBinding> BodySystem<C> {
    /// Walk starting at `root` itself: a creature's root part, or the part.
    pub(crate) fn subtree(&self, root: EntityId) -> SubtreeParts<'_> {
        let start = if self.parts.contains_key(&root) {
            Some(root)
        } else {
            self.root_part(root)
        };
        SubtreeParts::new(&self.parts, start)
    }

    /// All parts reachable below `root`.
    ///
    /// For a creature this is every part of its body, root part first. For a
    /// part it is every descendant, excluding the part itself. Unknown
    /// entities and empty bodies yield nothing.
    pub fn children(&self, root: EntityId) -> SubtreeParts<'_> {
        let mut walk = self.subtree(root);
        if self.parts.contains_key(&root) {
            walk.next();
        }
        walk
    }

    /// All organs held by `root` and every part below it.
    pub fn organs(&self, root: EntityId) -> SubtreeOrgans<'_> {
        SubtreeOrgans { walk: self.subtree(root), current: [].iter() }
    }

    /// Every part slot below `root`, filled or empty. A creature's root slot
    /// is yielded first even when it is empty.
    pub fn all_slots(&self, root: EntityId) -> SubtreeSlots<'_> {
        let root_slot = if self.parts.contains_key(&root) {
            None
        } else {
            self.bodies.get(&root).and_then(|b| b.root.as_ref())
        };
        SubtreeSlots { root: root_slot, walk: self.subtree(root), current: [].iter() }
    }

    /// Parts below `root` of one category.
    pub fn children_of_category(
        &self,
        root: EntityId,
        category: PartCategory,
    ) -> impl Iterator<Item = EntityId> + '_ {
        self.children(root)
            .filter(move |id| self.parts.get(id).map_or(false, |p| p.category == category))
    }

    pub fn has_child_of_category(&self, root: EntityId, category: PartCategory) -> bool {
        self.children_of_category(root, category).next().is_some()
    }

    /// Organs housed directly in `part`.
    pub fn part_organs(&self, part: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.parts.get(&part).into_iter().flat_map(|p| p.organ_ids())
    }

    /// Part in the root slot of a creature's body.
    pub fn root_part(&self, creature: EntityId) -> Option<EntityId> {
        self.bodies.get(&creature)?.root.as_ref()?.child
    }

    /// Part `part` is attached to, if it is not a body root.
    pub fn parent_part(&self, part: EntityId) -> Option<EntityId> {
        match self.parts.get(&part)?.parent_slot.as_ref()?.parent {
            SlotParent::Part(parent) => Some(parent),
            SlotParent::Body(_) => None,
        }
    }

    /// Creature whose body holds a part or organ.
    pub fn body_of(&self, entity: EntityId) -> Option<EntityId> {
        match self.parts.get(&entity) {
            Some(part) => part.body,
            None => self.organs.get(&entity)?.body,
        }
    }

    /// Parent part followed by direct children.
    pub fn adjacent_parts(&self, part: EntityId) -> Vec<EntityId> {
        let mut adjacent: Vec<EntityId> = self.parent_part(part).into_iter().collect();
        if let Some(p) = self.parts.get(&part) {
            adjacent.extend(p.child_parts());
        }
        adjacent
    }

    /// Whether any part or organ of a creature's body provides `function`.
    pub fn has_function(&self, creature: EntityId, function: BodyFunction) -> bool {
        let from_parts = self.children(creature).any(|id| {
            self.parts
                .get(&id)
                .map_or(false, |p| p.category.functions().contains(&function))
        });
        from_parts
            || self.organs(creature).any(|id| {
                self.organs
                    .get(&id)
                    .map_or(false, |o| o.kind.functions().contains(&function))
            })
    }

    /// Pick a part under `root` (root part included for creatures) weighted
    /// by size, the way an attack picks where it lands.
    pub fn pick_target_part(&self, root: EntityId, rng: &mut impl Rng) -> Option<EntityId> {
        let candidates: Vec<(EntityId, f32)> = self
            .children(root)
            .filter_map(|id| self.parts.get(&id).map(|p| (id, p.size.hit_weight())))
            .collect();
        let total: f32 = candidates.iter().map(|(_, w)| w).sum();
        if candidates.is_empty() || total <= 0.0 {
            return None;
        }

        let mut roll: f32 = rng.gen_range(0.0..total);
        for (id, weight) in &candidates {
            roll -= weight;
            if roll <= 0.0 {
                return Some(*id);
            }
        }
        candidates.last().map(|(id, _)| *id)
    }
}
