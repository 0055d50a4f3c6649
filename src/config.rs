//! Configuration for body construction.

use std::fs;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::Result;

/// Configuration parameters for the body system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Sound played on gib when the template does not name one.
    pub default_gib_sound: Option<String>,

    /// Deepest part nesting the builder will expand (root part is depth 0).
    /// `None` builds every slot reachable from the root.
    pub max_depth: Option<usize>,

    /// Report template issues (dangling connections, unreachable slots)
    /// when prototypes are loaded.
    pub validate_templates: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            default_gib_sound: Some("gib".to_string()),
            max_depth: None,
            validate_templates: true,
        }
    }
}

impl BodyConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
