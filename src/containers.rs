//! Physical containment of entities inside other entities.
//!
//! A container is the source of truth for where an entity physically is.
//! An entity sits in at most one container at a time; an entity in no
//! container is loose in the world.

use std::collections::HashMap;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::types::EntityId;

/// Which of an owner's containers an entity sits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerKind {
    /// A creature's slot for its root part.
    BodyRoot,
    /// Child parts attached to a part.
    Parts,
    /// Organs housed inside a part.
    Organs,
}

/// A container is addressed by its owning entity and its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId {
    pub owner: EntityId,
    pub kind: ContainerKind,
}

impl ContainerId {
    pub fn new(owner: EntityId, kind: ContainerKind) -> Self {
        Self { owner, kind }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("{entity} is already inside {:?} of {}", .container.kind, .container.owner)]
    AlreadyContained {
        entity: EntityId,
        container: ContainerId,
    },

    #[error("{entity} is not inside {:?} of {}", .container.kind, .container.owner)]
    NotContained {
        entity: EntityId,
        container: ContainerId,
    },
}

/// Exclusive-ownership storage the body graph places entities into.
pub trait ContainerBinding {
    /// Put `entity` into `container`. Fails if it is already in any container.
    fn insert(&mut self, container: ContainerId, entity: EntityId) -> Result<(), ContainerError>;

    /// Take `entity` out of `container`, leaving it loose in the world.
    fn remove(&mut self, container: ContainerId, entity: EntityId) -> Result<(), ContainerError>;

    /// The container currently holding `entity`, if any.
    fn container_of(&self, entity: EntityId) -> Option<ContainerId>;

    /// Entities held by `container`, in insertion order.
    fn contents(&self, container: ContainerId) -> &[EntityId];

    /// Drop every trace of a deleted entity: its own placement and any
    /// containers it owns. Entities inside those containers become loose.
    fn forget(&mut self, entity: EntityId);

    /// All non-empty containers with their contents.
    fn all_contents(&self) -> Vec<(ContainerId, Vec<EntityId>)>;
}

/// Default in-memory container binding.
#[derive(Clone, Debug, Default)]
pub struct ContainerManager {
    containers: HashMap<ContainerId, Vec<EntityId>>,
    locations: HashMap<EntityId, ContainerId>,
}

impl ContainerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `entity` is loose in the world.
    pub fn is_loose(&self, entity: EntityId) -> bool {
        !self.locations.contains_key(&entity)
    }
}

impl ContainerBinding for ContainerManager {
    fn insert(&mut self, container: ContainerId, entity: EntityId) -> Result<(), ContainerError> {
        if let Some(&current) = self.locations.get(&entity) {
            return Err(ContainerError::AlreadyContained { entity, container: current });
        }
        self.containers.entry(container).or_default().push(entity);
        self.locations.insert(entity, container);
        Ok(())
    }

    fn remove(&mut self, container: ContainerId, entity: EntityId) -> Result<(), ContainerError> {
        if self.locations.get(&entity) != Some(&container) {
            return Err(ContainerError::NotContained { entity, container });
        }
        self.locations.remove(&entity);
        if let Some(contents) = self.containers.get_mut(&container) {
            contents.retain(|&e| e != entity);
            if contents.is_empty() {
                self.containers.remove(&container);
            }
        }
        Ok(())
    }

    fn container_of(&self, entity: EntityId) -> Option<ContainerId> {
        self.locations.get(&entity).copied()
    }

    fn contents(&self, container: ContainerId) -> &[EntityId] {
        self.containers
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn forget(&mut self, entity: EntityId) {
        if let Some(container) = self.locations.remove(&entity) {
            if let Some(contents) = self.containers.get_mut(&container) {
                contents.retain(|&e| e != entity);
                if contents.is_empty() {
                    self.containers.remove(&container);
                }
            }
        }

        let owned: Vec<ContainerId> = self
            .containers
            .keys()
            .filter(|c| c.owner == entity)
            .copied()
            .collect();
        for container in owned {
            if let Some(contents) = self.containers.remove(&container) {
                for held in contents {
                    self.locations.remove(&held);
                }
            }
        }
    }

    fn all_contents(&self) -> Vec<(ContainerId, Vec<EntityId>)> {
        let mut all: Vec<_> = self
            .containers
            .iter()
            .map(|(id, contents)| (*id, contents.clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}
