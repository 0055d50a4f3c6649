//! Body graph persistence
//!
//! Saves and loads the full body graph state to/from versioned JSON files.

pub mod serialize;

pub use serialize::{load_bodies, save_bodies};
