//! Anatomical body graph library
//!
//! Re-exports modules for use by the CLI and embedding simulations.

pub mod body;
pub mod config;
pub mod containers;
pub mod error;
pub mod persistence;
pub mod types;

pub use body::{BodyEvent, BodySystem, GibResult, PrototypeRegistry, TemplateResolver};
pub use config::BodyConfig;
pub use containers::{ContainerBinding, ContainerManager};
pub use error::{BodyError, Result};
pub use types::{EntityId, OrganSlotId, SlotId};
