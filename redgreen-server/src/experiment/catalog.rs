//! Experiment datasets
//!
//! Maps experiment names onto dataset folders and loads the trial content
//! for a profile slot. Parsed trial content is cached per experiment; the
//! cache only holds read-only dataset files, never participant progress.

use super::content::TrialContent;
use super::ordering::{order_for_slot, partition_trial_names};
use redgreen_common::config::ServerConfig;
use redgreen_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Trial content and ordering resolved for one participant
#[derive(Debug, Clone)]
pub struct LoadedExperiment {
    pub ftrials: Vec<TrialContent>,
    pub trials: Vec<TrialContent>,
    /// Experimental trial names in presentation order
    pub trial_order: Vec<String>,
    pub order_constraint_met: bool,
}

/// Every trial of a dataset, keyed by folder name
#[derive(Debug)]
struct Dataset {
    familiarization: Vec<String>,
    experimental: Vec<String>,
    content: HashMap<String, TrialContent>,
}

impl Dataset {
    fn load(dir: &Path) -> Result<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        let (familiarization, experimental) = partition_trial_names(names);
        let mut content = HashMap::new();
        for name in familiarization.iter().chain(experimental.iter()) {
            let trial = TrialContent::load(&dir.join(name)).map_err(|e| {
                Error::Config(format!("Failed to load trial {} in {}: {}", name, dir.display(), e))
            })?;
            content.insert(name.clone(), trial);
        }

        info!(
            "Loaded dataset {}: {} familiarization, {} experimental trials",
            dir.display(),
            familiarization.len(),
            experimental.len()
        );

        Ok(Self {
            familiarization,
            experimental,
            content,
        })
    }

    fn resolve(&self, names: &[String]) -> Result<Vec<TrialContent>> {
        names
            .iter()
            .map(|name| {
                self.content
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::Internal(format!("Trial {} missing from dataset", name)))
            })
            .collect()
    }
}

/// Configured experiments and their cached datasets
pub struct ExperimentCatalog {
    root_folder: PathBuf,
    config: Arc<ServerConfig>,
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl ExperimentCatalog {
    pub fn new(root_folder: PathBuf, config: Arc<ServerConfig>) -> Self {
        Self {
            root_folder,
            config,
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `experiment_name` is configured
    pub fn contains(&self, experiment_name: &str) -> bool {
        self.config.experiments.contains_key(experiment_name)
    }

    fn dataset(&self, experiment_name: &str) -> Result<Option<Arc<Dataset>>> {
        if let Ok(cache) = self.datasets.read() {
            if let Some(dataset) = cache.get(experiment_name) {
                return Ok(Some(Arc::clone(dataset)));
            }
        }

        let Some(dir) = self.config.dataset_dir(&self.root_folder, experiment_name) else {
            return Ok(None);
        };

        debug!("Loading dataset for {} from {}", experiment_name, dir.display());
        let dataset = Arc::new(Dataset::load(&dir).map_err(|e| {
            warn!("Error accessing {}: {}", dir.display(), e);
            e
        })?);

        match self.datasets.write() {
            Ok(mut cache) => {
                cache.insert(experiment_name.to_string(), Arc::clone(&dataset));
            }
            Err(_) => warn!("Dataset cache lock poisoned; serving uncached content"),
        }

        Ok(Some(dataset))
    }

    /// Trial content in the order assigned to `slot`, or `None` for an
    /// unknown experiment
    pub fn load_for_slot(&self, experiment_name: &str, slot: u32) -> Result<Option<LoadedExperiment>> {
        let Some(dataset) = self.dataset(experiment_name)? else {
            return Ok(None);
        };

        let ordering = order_for_slot(
            &dataset.familiarization,
            &dataset.experimental,
            slot,
            self.config.shuffle_seed,
            self.config.max_shuffle_attempts,
        );

        if !ordering.constraint_met {
            warn!(
                slot,
                attempts = self.config.max_shuffle_attempts,
                "No shuffle separated paired trials; keeping last attempt"
            );
        }

        Ok(Some(LoadedExperiment {
            ftrials: dataset.resolve(&ordering.familiarization)?,
            trials: dataset.resolve(&ordering.experimental)?,
            trial_order: ordering.experimental,
            order_constraint_met: ordering.constraint_met,
        }))
    }
}
