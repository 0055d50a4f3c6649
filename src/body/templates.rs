//! Body templates and the prototypes they reference
//!
//! A template declares named slots, the part prototype each slot is built
//! from, the slots it connects to, and the organs housed in it. Built-in
//! templates cover humanoids, quadrupeds, dragons and birds; more can be
//! loaded from JSON.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::parts::{OrganKind, PartCategory, PartSize, PartSymmetry};
use crate::error::{BodyError, Result};
use crate::types::{OrganSlotId, SlotId};

/// Prototype a part entity is spawned from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartPrototype {
    pub id: String,
    pub name: String,
    pub category: PartCategory,
    #[serde(default)]
    pub size: PartSize,
    #[serde(default)]
    pub symmetry: PartSymmetry,
}

impl PartPrototype {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: PartCategory, size: PartSize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            size,
            symmetry: PartSymmetry::None,
        }
    }

    pub fn with_symmetry(mut self, symmetry: PartSymmetry) -> Self {
        self.symmetry = symmetry;
        self
    }
}

/// Prototype an organ entity is spawned from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganPrototype {
    pub id: String,
    pub name: String,
    pub kind: OrganKind,
}

impl OrganPrototype {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: OrganKind) -> Self {
        Self { id: id.into(), name: name.into(), kind }
    }
}

/// One named slot of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    /// Part prototype instantiated for this slot.
    pub part: String,
    /// Category the slot requires. Defaults to the prototype's category.
    #[serde(default)]
    pub category: Option<PartCategory>,
    /// Other slots reachable from this one. May repeat a link declared from
    /// the other end.
    #[serde(default)]
    pub connections: Vec<SlotId>,
    /// Organ slot name to organ prototype.
    #[serde(default)]
    pub organs: BTreeMap<OrganSlotId, String>,
}

impl SlotDefinition {
    pub fn new(part: impl Into<String>) -> Self {
        Self {
            part: part.into(),
            category: None,
            connections: Vec::new(),
            organs: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: PartCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn connect(mut self, slots: &[&str]) -> Self {
        self.connections.extend(slots.iter().map(|s| SlotId::from(*s)));
        self
    }

    pub fn organ(mut self, slot: &str, prototype: &str) -> Self {
        self.organs.insert(OrganSlotId::from(slot), prototype.to_string());
        self
    }
}

/// Declarative body graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyTemplate {
    pub id: String,
    pub root: SlotId,
    #[serde(default)]
    pub gib_sound: Option<String>,
    pub slots: HashMap<SlotId, SlotDefinition>,
}

/// Structural problem found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateIssue {
    MissingRoot(SlotId),
    DanglingConnection { from: SlotId, to: SlotId },
    Unreachable(SlotId),
}

impl fmt::Display for TemplateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot(root) => write!(f, "root slot '{}' is not declared", root),
            Self::DanglingConnection { from, to } => {
                write!(f, "slot '{}' connects to undeclared slot '{}'", from, to)
            }
            Self::Unreachable(slot) => write!(f, "slot '{}' is unreachable from the root", slot),
        }
    }
}

impl BodyTemplate {
    pub fn new(id: impl Into<String>, root: impl Into<SlotId>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            gib_sound: None,
            slots: HashMap::new(),
        }
    }

    pub fn with_slot(mut self, id: &str, definition: SlotDefinition) -> Self {
        self.slots.insert(SlotId::from(id), definition);
        self
    }

    pub fn with_gib_sound(mut self, sound: impl Into<String>) -> Self {
        self.gib_sound = Some(sound.into());
        self
    }

    /// Neighbours of every declared slot, reading connections both ways.
    ///
    /// Each list holds the slot's own connections in declaration order,
    /// followed by the slots that list it, sorted by id.
    pub fn adjacency(&self) -> HashMap<&SlotId, Vec<&SlotId>> {
        let mut declared: Vec<&SlotId> = self.slots.keys().collect();
        declared.sort();

        let mut adjacency: HashMap<&SlotId, Vec<&SlotId>> = declared
            .iter()
            .map(|id| (*id, self.slots[*id].connections.iter().collect()))
            .collect();
        for from in &declared {
            for to in &self.slots[*from].connections {
                if let Some(neighbours) = adjacency.get_mut(to) {
                    if !neighbours.contains(from) {
                        neighbours.push(*from);
                    }
                }
            }
        }
        adjacency
    }

    /// Check the connection graph, read as undirected, for problems.
    pub fn validate(&self) -> Vec<TemplateIssue> {
        let mut issues = Vec::new();
        if !self.slots.contains_key(&self.root) {
            issues.push(TemplateIssue::MissingRoot(self.root.clone()));
        }

        let mut declared: Vec<&SlotId> = self.slots.keys().collect();
        declared.sort();
        for from in &declared {
            for to in &self.slots[*from].connections {
                if !self.slots.contains_key(to) {
                    issues.push(TemplateIssue::DanglingConnection {
                        from: (*from).clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        if self.slots.contains_key(&self.root) {
            let adjacency = self.adjacency();
            let mut reached: HashSet<&SlotId> = HashSet::new();
            let mut queue = VecDeque::from([&self.root]);
            reached.insert(&self.root);
            while let Some(slot) = queue.pop_front() {
                for next in adjacency.get(slot).into_iter().flatten() {
                    if reached.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }
            for slot in declared {
                if !reached.contains(slot) {
                    issues.push(TemplateIssue::Unreachable(slot.clone()));
                }
            }
        }

        issues
    }
}

/// Source of templates and the prototypes they name.
pub trait TemplateResolver {
    fn template(&self, id: &str) -> Option<&BodyTemplate>;
    fn part(&self, prototype: &str) -> Option<&PartPrototype>;
    fn organ(&self, prototype: &str) -> Option<&OrganPrototype>;

    /// Look up a template, failing with `TemplateNotFound`.
    fn resolve(&self, id: &str) -> Result<&BodyTemplate> {
        self.template(id)
            .ok_or_else(|| BodyError::TemplateNotFound(id.to_string()))
    }
}

/// JSON document of prototypes and templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrototypeDocument {
    #[serde(default)]
    pub parts: Vec<PartPrototype>,
    #[serde(default)]
    pub organs: Vec<OrganPrototype>,
    #[serde(default)]
    pub templates: Vec<BodyTemplate>,
}

/// In-memory prototype store
#[derive(Debug, Clone, Default)]
pub struct PrototypeRegistry {
    parts: HashMap<String, PartPrototype>,
    organs: HashMap<String, OrganPrototype>,
    templates: HashMap<String, BodyTemplate>,
}

impl PrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(&mut self, prototype: PartPrototype) {
        self.parts.insert(prototype.id.clone(), prototype);
    }

    pub fn add_organ(&mut self, prototype: OrganPrototype) {
        self.organs.insert(prototype.id.clone(), prototype);
    }

    pub fn add_template(&mut self, template: BodyTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Add everything in a document, replacing entries with the same id.
    pub fn merge(&mut self, document: PrototypeDocument) {
        for part in document.parts {
            self.add_part(part);
        }
        for organ in document.organs {
            self.add_organ(organ);
        }
        for template in document.templates {
            self.add_template(template);
        }
    }

    pub fn load_json_str(&mut self, text: &str) -> Result<()> {
        let document: PrototypeDocument = serde_json::from_str(text)?;
        self.merge(document);
        Ok(())
    }

    pub fn load_json_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)?;
        self.load_json_str(&text)
    }

    /// Sorted ids of all known templates
    pub fn template_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Log every structural issue of every template. Returns the issue count.
    pub fn report_issues(&self) -> usize {
        let mut count = 0;
        for id in self.template_ids() {
            for issue in self.templates[id].validate() {
                warn!(template = id, "{}", issue);
                count += 1;
            }
        }
        count
    }

    /// Registry preloaded with the standard creature templates.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for part in builtin_parts() {
            registry.add_part(part);
        }
        for organ in builtin_organs() {
            registry.add_organ(organ);
        }
        registry.add_template(humanoid());
        registry.add_template(quadruped());
        registry.add_template(dragon());
        registry.add_template(avian());
        registry
    }
}

impl TemplateResolver for PrototypeRegistry {
    fn template(&self, id: &str) -> Option<&BodyTemplate> {
        self.templates.get(id)
    }

    fn part(&self, prototype: &str) -> Option<&PartPrototype> {
        self.parts.get(prototype)
    }

    fn organ(&self, prototype: &str) -> Option<&OrganPrototype> {
        self.organs.get(prototype)
    }
}

// === Built-in prototypes ===

fn sided(id: &str, name: &str, category: PartCategory, size: PartSize) -> [PartPrototype; 2] {
    [
        PartPrototype::new(format!("{}Left", id), format!("left {}", name), category, size)
            .with_symmetry(PartSymmetry::Left),
        PartPrototype::new(format!("{}Right", id), format!("right {}", name), category, size)
            .with_symmetry(PartSymmetry::Right),
    ]
}

fn builtin_parts() -> Vec<PartPrototype> {
    use PartCategory::*;

    let mut parts = vec![
        PartPrototype::new("TorsoHuman", "torso", Torso, PartSize::Large),
        PartPrototype::new("HeadHuman", "head", Head, PartSize::Medium),
        PartPrototype::new("TorsoBeast", "torso", Torso, PartSize::Large),
        PartPrototype::new("HeadBeast", "head", Head, PartSize::Medium),
        PartPrototype::new("TailBeast", "tail", Tail, PartSize::Small),
        PartPrototype::new("TorsoDragon", "torso", Torso, PartSize::Huge),
        PartPrototype::new("HeadDragon", "head", Head, PartSize::Large),
        PartPrototype::new("TailDragon", "tail", Tail, PartSize::Large),
        PartPrototype::new("TorsoBird", "body", Torso, PartSize::Medium),
        PartPrototype::new("HeadBird", "head", Head, PartSize::Small),
        PartPrototype::new("TailBird", "tail feathers", Tail, PartSize::Small),
    ];
    parts.extend(sided("ArmHuman", "arm", Arm, PartSize::Medium));
    parts.extend(sided("HandHuman", "hand", Hand, PartSize::Small));
    parts.extend(sided("LegHuman", "leg", Leg, PartSize::Medium));
    parts.extend(sided("FootHuman", "foot", Foot, PartSize::Small));
    parts.extend(sided("ForelegBeast", "foreleg", Leg, PartSize::Medium));
    parts.extend(sided("HindLegBeast", "hind leg", Leg, PartSize::Medium));
    parts.extend(sided("WingDragon", "wing", Wing, PartSize::Large));
    parts.extend(sided("LegDragon", "leg", Leg, PartSize::Large));
    parts.extend(sided("WingBird", "wing", Wing, PartSize::Medium));
    parts.extend(sided("LegBird", "leg", Leg, PartSize::Small));
    parts.extend(sided("TalonBird", "talon", Foot, PartSize::Tiny));
    parts
}

fn builtin_organs() -> Vec<OrganPrototype> {
    vec![
        OrganPrototype::new("OrganBrain", "brain", OrganKind::Brain),
        OrganPrototype::new("OrganEyes", "eyes", OrganKind::Eyes),
        OrganPrototype::new("OrganHeart", "heart", OrganKind::Heart),
        OrganPrototype::new("OrganLungs", "lungs", OrganKind::Lungs),
        OrganPrototype::new("OrganStomach", "stomach", OrganKind::Stomach),
        OrganPrototype::new("OrganLiver", "liver", OrganKind::Liver),
        OrganPrototype::new("OrganKidneys", "kidneys", OrganKind::Kidneys),
        OrganPrototype::new("OrganFireGland", "fire gland", OrganKind::FireGland),
    ]
}

fn vital_organs(torso: SlotDefinition) -> SlotDefinition {
    torso
        .organ("heart", "OrganHeart")
        .organ("lungs", "OrganLungs")
        .organ("stomach", "OrganStomach")
        .organ("liver", "OrganLiver")
        .organ("kidneys", "OrganKidneys")
}

fn humanoid() -> BodyTemplate {
    BodyTemplate::new("humanoid", "torso")
        .with_gib_sound("gib_flesh")
        .with_slot(
            "torso",
            vital_organs(SlotDefinition::new("TorsoHuman").connect(&[
                "head", "left arm", "right arm", "left leg", "right leg",
            ])),
        )
        .with_slot(
            "head",
            SlotDefinition::new("HeadHuman")
                .connect(&["torso"])
                .organ("brain", "OrganBrain")
                .organ("eyes", "OrganEyes"),
        )
        .with_slot("left arm", SlotDefinition::new("ArmHumanLeft").connect(&["torso", "left hand"]))
        .with_slot("right arm", SlotDefinition::new("ArmHumanRight").connect(&["torso", "right hand"]))
        .with_slot("left hand", SlotDefinition::new("HandHumanLeft").connect(&["left arm"]))
        .with_slot("right hand", SlotDefinition::new("HandHumanRight").connect(&["right arm"]))
        .with_slot("left leg", SlotDefinition::new("LegHumanLeft").connect(&["torso", "left foot"]))
        .with_slot("right leg", SlotDefinition::new("LegHumanRight").connect(&["torso", "right foot"]))
        .with_slot("left foot", SlotDefinition::new("FootHumanLeft").connect(&["left leg"]))
        .with_slot("right foot", SlotDefinition::new("FootHumanRight").connect(&["right leg"]))
}

fn quadruped() -> BodyTemplate {
    BodyTemplate::new("quadruped", "torso")
        .with_gib_sound("gib_flesh")
        .with_slot(
            "torso",
            vital_organs(SlotDefinition::new("TorsoBeast").connect(&[
                "head",
                "left foreleg",
                "right foreleg",
                "left hind leg",
                "right hind leg",
                "tail",
            ])),
        )
        .with_slot(
            "head",
            SlotDefinition::new("HeadBeast")
                .organ("brain", "OrganBrain")
                .organ("eyes", "OrganEyes"),
        )
        .with_slot("left foreleg", SlotDefinition::new("ForelegBeastLeft"))
        .with_slot("right foreleg", SlotDefinition::new("ForelegBeastRight"))
        .with_slot("left hind leg", SlotDefinition::new("HindLegBeastLeft"))
        .with_slot("right hind leg", SlotDefinition::new("HindLegBeastRight"))
        .with_slot("tail", SlotDefinition::new("TailBeast"))
}

fn dragon() -> BodyTemplate {
    BodyTemplate::new("dragon", "torso")
        .with_gib_sound("gib_scales")
        .with_slot(
            "torso",
            vital_organs(SlotDefinition::new("TorsoDragon").connect(&[
                "head",
                "left wing",
                "right wing",
                "left foreleg",
                "right foreleg",
                "left hind leg",
                "right hind leg",
                "tail",
            ])),
        )
        .with_slot(
            "head",
            SlotDefinition::new("HeadDragon")
                .connect(&["torso"])
                .organ("brain", "OrganBrain")
                .organ("eyes", "OrganEyes")
                .organ("fire gland", "OrganFireGland"),
        )
        .with_slot("left wing", SlotDefinition::new("WingDragonLeft").connect(&["torso"]))
        .with_slot("right wing", SlotDefinition::new("WingDragonRight").connect(&["torso"]))
        .with_slot("left foreleg", SlotDefinition::new("LegDragonLeft"))
        .with_slot("right foreleg", SlotDefinition::new("LegDragonRight"))
        .with_slot("left hind leg", SlotDefinition::new("LegDragonLeft"))
        .with_slot("right hind leg", SlotDefinition::new("LegDragonRight"))
        .with_slot("tail", SlotDefinition::new("TailDragon").connect(&["torso"]))
}

fn avian() -> BodyTemplate {
    BodyTemplate::new("avian", "body")
        .with_gib_sound("gib_feathers")
        .with_slot(
            "body",
            SlotDefinition::new("TorsoBird")
                .connect(&["head", "left wing", "right wing", "left leg", "right leg", "tail"])
                .organ("heart", "OrganHeart")
                .organ("lungs", "OrganLungs")
                .organ("stomach", "OrganStomach"),
        )
        .with_slot(
            "head",
            SlotDefinition::new("HeadBird")
                .organ("brain", "OrganBrain")
                .organ("eyes", "OrganEyes"),
        )
        .with_slot("left wing", SlotDefinition::new("WingBirdLeft"))
        .with_slot("right wing", SlotDefinition::new("WingBirdRight"))
        .with_slot("left leg", SlotDefinition::new("LegBirdLeft").connect(&["left talon"]))
        .with_slot("right leg", SlotDefinition::new("LegBirdRight").connect(&["right talon"]))
        .with_slot("left talon", SlotDefinition::new("TalonBirdLeft"))
        .with_slot("right talon", SlotDefinition::new("TalonBirdRight"))
        .with_slot("tail", SlotDefinition::new("TailBird"))
}
