//! Static trial content
//!
//! Each trial folder of a dataset holds a `data.json` describing the scene:
//! barriers, occluders, the target's per-frame positions, the two sensors and
//! the ground-truth outcome. Content is loaded once at session start and
//! copied into the session's progress record.

use redgreen_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the scene description inside each trial folder
pub const TRIAL_DATA_FILE: &str = "data.json";

/// Ground-truth outcome of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Red,
    Green,
}

impl Outcome {
    fn parse(label: &str) -> Option<Self> {
        match label {
            "red" => Some(Outcome::Red),
            "green" => Some(Outcome::Green),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Everything the client needs to render one scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialContent {
    pub barriers: Vec<BTreeMap<String, f64>>,
    pub occluders: Vec<BTreeMap<String, f64>>,
    pub step_data: BTreeMap<u32, Position>,
    pub red_sensor: serde_json::Value,
    pub green_sensor: serde_json::Value,
    pub timestep: f64,
    pub radius: f64,
    pub rg_outcome: Option<Outcome>,
}

#[derive(Debug, Deserialize)]
struct TargetSpec {
    size: f64,
}

/// On-disk layout of `data.json`
#[derive(Debug, Deserialize)]
struct TrialFile {
    #[serde(default)]
    barriers: Vec<BTreeMap<String, f64>>,
    #[serde(default)]
    occluders: Vec<BTreeMap<String, f64>>,
    #[serde(default)]
    step_data: BTreeMap<u32, Position>,
    #[serde(default = "empty_object")]
    red_sensor: serde_json::Value,
    #[serde(default = "empty_object")]
    green_sensor: serde_json::Value,
    #[serde(default)]
    timestep: f64,
    target: TargetSpec,
    #[serde(default)]
    rg_outcome: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round_fields(items: Vec<BTreeMap<String, f64>>) -> Vec<BTreeMap<String, f64>> {
    items
        .into_iter()
        .map(|item| item.into_iter().map(|(k, v)| (k, round2(v))).collect())
        .collect()
}

impl TrialContent {
    /// Parse a scene description from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let file: TrialFile = serde_json::from_str(text)?;
        Ok(Self {
            barriers: round_fields(file.barriers),
            occluders: round_fields(file.occluders),
            step_data: file.step_data,
            red_sensor: file.red_sensor,
            green_sensor: file.green_sensor,
            timestep: round2(file.timestep),
            radius: file.target.size / 2.0,
            rg_outcome: file.rg_outcome.as_deref().and_then(Outcome::parse),
        })
    }

    /// Load `data.json` from a trial folder
    pub fn load(trial_dir: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(trial_dir.join(TRIAL_DATA_FILE))?;
        Self::from_json(&text)
    }
}
