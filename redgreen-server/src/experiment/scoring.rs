//! Response scoring
//!
//! F held alone counts as a red response, J held alone as green. With
//! counterbalance the keys swap meaning. Frames with neither or both keys
//! count toward neither tally.
//!
//! `score = 20 + 100 * (matching - opposing) / frames`, so any non-empty
//! response lands in `[-80, 120]`.

use super::content::Outcome;
use redgreen_common::db::KeyFrameSample;
use serde::{Deserialize, Deserializer};

const BASE_SCORE: f64 = 20.0;
const SCALE: f64 = 100.0;

/// Accept `true`/`false` as well as `1`/`0`
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KeyState {
    #[serde(deserialize_with = "flexible_bool")]
    pub f: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub j: bool,
}

/// One entry of `recordedKeyStates`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RecordedFrame {
    pub frame: i64,
    pub keys: KeyState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyTally {
    pub red: usize,
    pub green: usize,
    pub frames: usize,
}

impl KeyTally {
    /// Count responses and build the per-frame samples to persist
    pub fn from_frames(frames: &[RecordedFrame], counterbalance: bool) -> (Self, Vec<KeyFrameSample>) {
        let mut tally = KeyTally {
            frames: frames.len(),
            ..Default::default()
        };
        let mut samples = Vec::with_capacity(frames.len());

        for entry in frames {
            let (f_pressed, j_pressed) = if counterbalance {
                (entry.keys.j, entry.keys.f)
            } else {
                (entry.keys.f, entry.keys.j)
            };

            match (f_pressed, j_pressed) {
                (true, false) => tally.red += 1,
                (false, true) => tally.green += 1,
                _ => {}
            }

            samples.push(KeyFrameSample {
                frame: entry.frame,
                f_pressed,
                j_pressed,
            });
        }

        (tally, samples)
    }

    pub fn uncertain(&self) -> usize {
        self.frames - self.red - self.green
    }
}

/// Score a tally against the ground truth; 0 without ground truth or frames
pub fn score(tally: &KeyTally, outcome: Option<Outcome>) -> f64 {
    let Some(outcome) = outcome else {
        return 0.0;
    };
    if tally.frames == 0 {
        return 0.0;
    }

    let (matching, opposing) = match outcome {
        Outcome::Red => (tally.red, tally.green),
        Outcome::Green => (tally.green, tally.red),
    };
    let n = tally.frames as f64;
    BASE_SCORE + SCALE * (matching as f64 / n - opposing as f64 / n)
}
