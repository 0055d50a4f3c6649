//! Body graph serialization.
//!
//! A save file holds every entity with its body, part and organ components
//! plus the contents of every container, so a load can restore both the
//! slot graph and the physical placement of each entity.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::body::{Body, BodySystem, EntityMeta, Organ, Part};
use crate::config::BodyConfig;
use crate::containers::{ContainerBinding, ContainerId, ContainerManager};
use crate::error::{BodyError, Result};
use crate::types::{EntityId, IdGenerator};

/// Metadata wrapper for the save file format.
#[derive(Serialize, Deserialize)]
struct BodySaveFile {
    /// Format version for forward compatibility
    version: u32,
    entities: Vec<(EntityId, EntityMeta)>,
    bodies: Vec<(EntityId, Body)>,
    parts: Vec<(EntityId, Part)>,
    organs: Vec<(EntityId, Organ)>,
    containers: Vec<(ContainerId, Vec<EntityId>)>,
}

const SAVE_VERSION: u32 = 1;

fn sorted<T: Clone>(map: &std::collections::HashMap<EntityId, T>) -> Vec<(EntityId, T)> {
    let mut entries: Vec<(EntityId, T)> = map.iter().map(|(id, v)| (*id, v.clone())).collect();
    entries.sort_by_key(|(id, _)| *id);
    entries
}

/// Save every entity and container of `system` to a JSON file.
pub fn save_bodies<C: ContainerBinding>(system: &BodySystem<C>, path: &Path) -> Result<()> {
    let save = BodySaveFile {
        version: SAVE_VERSION,
        entities: sorted(&system.entities),
        bodies: sorted(&system.bodies),
        parts: sorted(&system.parts),
        organs: sorted(&system.organs),
        containers: system.containers.all_contents(),
    };

    let json = serde_json::to_string_pretty(&save)?;
    fs::write(path, json)?;
    info!(path = %path.display(), entities = save.entities.len(), "saved bodies");
    Ok(())
}

/// Load a body graph from a JSON file.
///
/// Container contents are replayed through the container binding, and the
/// ID generator is rebuilt past the highest existing ID so new entities can
/// be created.
pub fn load_bodies(path: &Path, config: BodyConfig) -> Result<BodySystem> {
    let text = fs::read_to_string(path)?;
    let save: BodySaveFile = serde_json::from_str(&text)?;

    if save.version > SAVE_VERSION {
        return Err(BodyError::UnsupportedVersion { found: save.version, supported: SAVE_VERSION });
    }

    let mut system = BodySystem::new(config);
    system.entities = save.entities.into_iter().collect();
    system.bodies = save.bodies.into_iter().collect();
    system.parts = save.parts.into_iter().collect();
    system.organs = save.organs.into_iter().collect();

    let mut containers = ContainerManager::new();
    for (container, contents) in save.containers {
        for entity in contents {
            containers.insert(container, entity)?;
        }
    }
    system.containers = containers;

    system.ids = IdGenerator::starting_at(
        system.entities.keys().map(|id| id.0 + 1).max().unwrap_or(0)
    );

    let stray = check_placement(&system);
    if stray > 0 {
        warn!(path = %path.display(), stray, "loaded slots disagree with containers");
    }
    info!(path = %path.display(), entities = system.entity_count(), "loaded bodies");
    Ok(system)
}

/// Count attached parts and organs whose container does not match their slot.
fn check_placement(system: &BodySystem) -> usize {
    let parts = system.parts.iter().filter(|(id, part)| {
        part.parent_slot
            .as_ref()
            .map_or(false, |slot| system.containers.container_of(**id) != Some(slot.parent.container()))
    });
    let organs = system.organs.iter().filter(|(id, organ)| {
        organ.parent_slot
            .as_ref()
            .map_or(false, |slot| system.containers.container_of(**id) != Some(slot.container()))
    });
    parts.count() + organs.count()
}
