//! Per-session progress record
//!
//! The live state of a session's trial sequence. It is stored as JSON in
//! `session_progress` and re-read on every request; worker processes share
//! nothing else.

use super::content::TrialContent;
use redgreen_common::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    /// Familiarization trials served so far
    pub ftrial_i: usize,
    /// Experimental trials served so far
    pub trial_i: usize,
    pub is_ftrial: bool,
    pub is_trial: bool,
    pub transition_to_exp_page: bool,
    pub fscores: Vec<f64>,
    pub tscores: Vec<f64>,
    pub ftrials: Vec<TrialContent>,
    pub trials: Vec<TrialContent>,
}

impl SessionProgress {
    pub fn new(ftrials: Vec<TrialContent>, trials: Vec<TrialContent>) -> Self {
        Self {
            ftrial_i: 0,
            trial_i: 0,
            is_ftrial: false,
            is_trial: false,
            transition_to_exp_page: false,
            fscores: Vec::new(),
            tscores: Vec::new(),
            ftrials,
            trials,
        }
    }

    pub fn num_ftrials(&self) -> usize {
        self.ftrials.len()
    }

    pub fn num_trials(&self) -> usize {
        self.trials.len()
    }

    /// Step a counter back when its trial was served but never scored, so
    /// the abandoned trial is served again. Returns true if anything moved.
    pub fn reconcile(&mut self) -> bool {
        let mut rolled_back = false;
        if self.fscores.len() < self.ftrial_i {
            self.ftrial_i -= 1;
            rolled_back = true;
        }
        if self.tscores.len() < self.trial_i {
            self.trial_i -= 1;
            rolled_back = true;
        }
        rolled_back
    }

    /// Mean experimental score, 0 before the first one
    pub fn average_score(&self) -> f64 {
        if self.tscores.is_empty() {
            0.0
        } else {
            self.tscores.iter().sum::<f64>() / self.tscores.len() as f64
        }
    }

    /// Content of the trial most recently served
    pub fn current_content(&self) -> Option<&TrialContent> {
        if self.is_ftrial {
            self.ftrials.get(self.ftrial_i.checked_sub(1)?)
        } else {
            self.trials.get(self.trial_i.checked_sub(1)?)
        }
    }

    /// Append a score to the list for the current phase
    pub fn record_score(&mut self, score: f64) {
        if self.is_ftrial {
            self.fscores.push(score);
        } else {
            self.tscores.push(score);
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
