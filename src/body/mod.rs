//! Body graph module
//!
//! Creatures own a body whose root slot holds a part; parts hold child part
//! slots and organ slots. Templates describe how a body is assembled.

pub mod builder;
pub mod mutation;
pub mod parts;
pub mod slots;
pub mod system;
pub mod templates;
pub mod traversal;

// Re-export commonly used types
pub use mutation::GibResult;
pub use parts::{
    Body, BodyFunction, EntityMeta, Organ, OrganKind, Part, PartCategory, PartSize, PartSymmetry,
};
pub use slots::{OrganSlot, OrganSlotRef, PartSlot, SlotParent, SlotRef};
pub use system::{BodyEvent, BodySystem};
pub use templates::{
    BodyTemplate, OrganPrototype, PartPrototype, PrototypeDocument, PrototypeRegistry,
    SlotDefinition, TemplateIssue, TemplateResolver,
};
pub use traversal::{SubtreeOrgans, SubtreeParts, SubtreeSlots};
