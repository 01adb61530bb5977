use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// How a step hands control to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Advances when its phase clock runs out
    Timed,
    /// Open-ended; only an explicit `advance()` moves past it
    HoldUntilAction,
}

/// One named segment of a breathing cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StepWire", into = "StepWire")]
pub struct Step {
    pub name: String,
    pub duration_ms: u32,
    pub instruction: String,
    pub is_hold: bool,
    pub kind: StepKind,
}

/// Wire shape of a step: `{name, durationMs, instruction, isHold?, holdUntilUserAction?}`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepWire {
    name: String,
    #[serde(default)]
    duration_ms: u32,
    #[serde(default)]
    instruction: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_hold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    hold_until_user_action: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl From<StepWire> for Step {
    fn from(w: StepWire) -> Self {
        Self {
            name: w.name,
            duration_ms: w.duration_ms,
            instruction: w.instruction,
            is_hold: w.is_hold || w.hold_until_user_action,
            kind: if w.hold_until_user_action {
                StepKind::HoldUntilAction
            } else {
                StepKind::Timed
            },
        }
    }
}

impl From<Step> for StepWire {
    fn from(s: Step) -> Self {
        Self {
            hold_until_user_action: s.waits_for_action(),
            name: s.name,
            duration_ms: s.duration_ms,
            instruction: s.instruction,
            is_hold: s.is_hold,
        }
    }
}

impl Step {
    pub fn timed(name: &str, duration_ms: u32, instruction: &str) -> Self {
        Self {
            name: name.to_string(),
            duration_ms,
            instruction: instruction.to_string(),
            is_hold: false,
            kind: StepKind::Timed,
        }
    }

    /// A timed breath retention
    pub fn hold(name: &str, duration_ms: u32, instruction: &str) -> Self {
        Self {
            is_hold: true,
            ..Self::timed(name, duration_ms, instruction)
        }
    }

    /// A retention that lasts until the user says so
    pub fn until_action(name: &str, instruction: &str) -> Self {
        Self {
            name: name.to_string(),
            duration_ms: 0,
            instruction: instruction.to_string(),
            is_hold: true,
            kind: StepKind::HoldUntilAction,
        }
    }

    pub fn waits_for_action(&self) -> bool {
        self.kind == StepKind::HoldUntilAction
    }
}

/// The leading `steps` steps of a catalog are paced `times` times before
/// the rest of the catalog runs (e.g. 30 breaths, then a retention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatBlock {
    pub steps: usize,
    pub times: u32,
}

/// Bounded repetition: the session completes after `max_rounds` rounds of
/// `cycles_per_round` cycles, whatever the target duration says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundPolicy {
    pub max_rounds: u32,
    #[serde(default = "default_cycles_per_round")]
    pub cycles_per_round: u32,
}

fn default_cycles_per_round() -> u32 {
    1
}

/// Ordered step sequence driven by the sequencer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<RoundPolicy>,
}

impl Catalog {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            repeat: None,
            rounds: None,
        }
    }

    pub fn with_repeat(mut self, steps: usize, times: u32) -> Self {
        self.repeat = Some(RepeatBlock { steps, times });
        self
    }

    pub fn with_rounds(mut self, max_rounds: u32, cycles_per_round: u32) -> Self {
        self.rounds = Some(RoundPolicy {
            max_rounds,
            cycles_per_round,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Accepts either a bare step array or a full catalog object
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        match serde_json::from_str::<Vec<Step>>(json) {
            Ok(steps) => Ok(Self::new(steps)),
            Err(_) => Ok(serde_json::from_str::<Catalog>(json)?),
        }
    }

    /// Length of one full cycle, open-ended holds excluded
    pub fn cycle_duration_ms(&self) -> u64 {
        let total: u64 = self.steps.iter().map(|s| s.duration_ms as u64).sum();
        match self.repeat {
            Some(block) if block.times > 1 => {
                let block_ms: u64 = self
                    .steps
                    .iter()
                    .take(block.steps)
                    .map(|s| s.duration_ms as u64)
                    .sum();
                total + block_ms * (block.times as u64 - 1)
            }
            _ => total,
        }
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read technique file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid technique definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown technique '{0}'")]
    UnknownTechnique(String),
}

/// Read-only technique content keyed by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub catalog: Catalog,
}

impl Technique {
    pub fn new(id: &str, name: &str, description: &str, catalog: Catalog) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            catalog,
        }
    }
}

pub fn builtin_techniques() -> Vec<Technique> {
    vec![
        Technique::new(
            "478",
            "4-7-8 Relaxing Breath",
            "Slow exhale-weighted rhythm for winding down before sleep.",
            Catalog::new(vec![
                Step::timed("Inhale", 4000, "Breathe in quietly through your nose"),
                Step::hold("Hold", 7000, "Hold your breath"),
                Step::timed("Exhale", 8000, "Exhale completely through your mouth"),
            ]),
        ),
        Technique::new(
            "box",
            "Box Breathing",
            "Four equal sides: in, hold, out, hold.",
            Catalog::new(vec![
                Step::timed("Inhale", 4000, "Breathe in slowly"),
                Step::hold("Hold", 4000, "Hold with full lungs"),
                Step::timed("Exhale", 4000, "Breathe out slowly"),
                Step::hold("Hold", 4000, "Hold with empty lungs"),
            ]),
        ),
        Technique::new(
            "coherent",
            "Coherent Breathing",
            "Around five and a half breaths per minute.",
            Catalog::new(vec![
                Step::timed("Inhale", 5500, "Breathe in gently, belly first"),
                Step::timed("Exhale", 5500, "Breathe out gently"),
            ]),
        ),
        Technique::new(
            "triangle",
            "Triangle Breathing",
            "Three equal phases for quick focus.",
            Catalog::new(vec![
                Step::timed("Inhale", 4000, "Breathe in"),
                Step::hold("Hold", 4000, "Hold"),
                Step::timed("Exhale", 4000, "Breathe out"),
            ]),
        ),
        Technique::new(
            "power",
            "Power Breathing",
            "Thirty paced breaths, a retention on empty lungs, then a recovery breath. Three rounds.",
            Catalog::new(vec![
                Step::timed("Inhale", 1500, "Deep breath in through the belly"),
                Step::timed("Exhale", 1500, "Let it go, don't force it"),
                Step::until_action(
                    "Retention",
                    "Exhale and hold on empty lungs. Press space when you need to breathe",
                ),
                Step::hold("Recovery", 15000, "Inhale fully and hold"),
            ])
            .with_repeat(2, 30)
            .with_rounds(3, 1),
        ),
    ]
}

/// Built-in techniques plus any loaded from a user file
#[derive(Debug, Clone)]
pub struct TechniqueLibrary {
    techniques: Vec<Technique>,
}

impl Default for TechniqueLibrary {
    fn default() -> Self {
        Self {
            techniques: builtin_techniques(),
        }
    }
}

impl TechniqueLibrary {
    /// Load a JSON array of techniques; entries replace built-ins with the same id
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, CatalogError> {
        let bytes = fs::read(path)?;
        let custom: Vec<Technique> = serde_json::from_slice(&bytes)?;
        for technique in custom {
            match self.techniques.iter_mut().find(|t| t.id == technique.id) {
                Some(existing) => *existing = technique,
                None => self.techniques.push(technique),
            }
        }
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Result<&Technique, CatalogError> {
        self.techniques
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| CatalogError::UnknownTechnique(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Technique> {
        self.techniques.iter()
    }
}
