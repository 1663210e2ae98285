//! Trial sequence state machine
//!
//! `Familiarization(i) -> TransitionScreen -> Experimental(j) -> Finished`
//!
//! Pure transition logic over `SessionProgress`; persistence lives in
//! `services::trial_sequencer`.

use super::content::TrialContent;
use super::progress::SessionProgress;
use redgreen_common::db::TrialKind;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("progress at ftrial {ftrial_i}/{num_ftrials}, trial {trial_i}/{num_trials} matches no transition")]
    NoTransition {
        ftrial_i: usize,
        num_ftrials: usize,
        trial_i: usize,
        num_trials: usize,
    },

    #[error("no experimental trial available as placeholder content")]
    NoPlaceholder,
}

/// Scene chosen by one call to [`advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Familiarization { index: usize },
    TransitionScreen,
    Experimental { index: usize },
    Finished,
}

impl Scene {
    /// Kind and index for scenes that create a trial row
    pub fn trial(&self) -> Option<(TrialKind, usize)> {
        match self {
            Scene::Familiarization { index } => Some((TrialKind::Ftrial, *index)),
            Scene::Experimental { index } => Some((TrialKind::Trial, *index)),
            Scene::TransitionScreen | Scene::Finished => None,
        }
    }

    /// Content to render; transition and finish screens carry a placeholder
    pub fn content<'a>(&self, progress: &'a SessionProgress) -> Result<&'a TrialContent, SequenceError> {
        let content = match self {
            Scene::Familiarization { index } => progress.ftrials.get(*index),
            Scene::Experimental { index } => progress.trials.get(*index),
            Scene::TransitionScreen => progress.trials.first(),
            Scene::Finished => progress.trials.last(),
        };
        content.ok_or(SequenceError::NoPlaceholder)
    }
}

/// Apply the transition rules to `progress` and return the scene to serve
pub fn advance(progress: &mut SessionProgress) -> Result<Scene, SequenceError> {
    let num_ftrials = progress.num_ftrials();
    let num_trials = progress.num_trials();

    if progress.ftrial_i < num_ftrials {
        let index = progress.ftrial_i;
        progress.ftrial_i += 1;
        progress.is_ftrial = true;
        Ok(Scene::Familiarization { index })
    } else if progress.ftrial_i == num_ftrials && progress.is_ftrial {
        // One-time screen between the phases; no counter moves
        progress.transition_to_exp_page = true;
        progress.is_ftrial = false;
        Ok(Scene::TransitionScreen)
    } else if progress.trial_i < num_trials {
        progress.transition_to_exp_page = false;
        let index = progress.trial_i;
        progress.trial_i += 1;
        progress.is_trial = true;
        Ok(Scene::Experimental { index })
    } else if progress.trial_i == num_trials {
        Ok(Scene::Finished)
    } else {
        Err(SequenceError::NoTransition {
            ftrial_i: progress.ftrial_i,
            num_ftrials,
            trial_i: progress.trial_i,
            num_trials,
        })
    }
}
