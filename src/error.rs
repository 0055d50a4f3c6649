//! Error types for body graph construction and mutation.

use thiserror::Error;

use crate::body::{OrganKind, PartCategory};
use crate::containers::ContainerError;
use crate::types::{EntityId, OrganSlotId, SlotId};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BodyError>;

/// Failures surfaced by the body graph.
///
/// Every variant describes a rejected operation; the graph is left exactly as
/// it was before the call.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("body template '{0}' not found")]
    TemplateNotFound(String),

    #[error("slot '{slot}' is invalid: {reason}")]
    SlotDefinitionInvalid { slot: SlotId, reason: String },

    #[error("slot '{slot}' accepts a {} but the part is a {}", .expected.display_name(), .found.display_name())]
    CategoryMismatch {
        slot: SlotId,
        expected: PartCategory,
        found: PartCategory,
    },

    #[error("organ slot '{slot}' accepts {} but the organ is {}", .expected.display_name(), .found.display_name())]
    OrganKindMismatch {
        slot: OrganSlotId,
        expected: OrganKind,
        found: OrganKind,
    },

    #[error("slot '{slot}' is already occupied by {occupant}")]
    SlotOccupied { slot: String, occupant: EntityId },

    #[error("slot '{slot}' is empty")]
    SlotEmpty { slot: String },

    #[error("slot '{slot}' does not exist on {owner}")]
    SlotNotFound { slot: String, owner: EntityId },

    #[error("slot '{slot}' already exists on {owner}")]
    SlotAlreadyExists { slot: String, owner: EntityId },

    #[error("{0} does not exist")]
    EntityNotFound(EntityId),

    #[error("{0} is not a body part")]
    NotAPart(EntityId),

    #[error("{0} is not an organ")]
    NotAnOrgan(EntityId),

    #[error("{0} has no body")]
    NoBody(EntityId),

    #[error("{part} is already attached to slot '{slot}'")]
    PartAlreadyAttached { part: EntityId, slot: SlotId },

    #[error("{organ} is already inserted into organ slot '{slot}'")]
    OrganAlreadyInserted { organ: EntityId, slot: OrganSlotId },

    #[error("attaching {part} there would make it its own descendant")]
    WouldCreateCycle { part: EntityId },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("save file version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}
