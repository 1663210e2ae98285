//! Configuration loading and root folder resolution
//!
//! Settings live in an optional TOML file. Every field has a compiled
//! default, so a missing file (or a file that only sets a few keys) still
//! yields a usable configuration.

use crate::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "REDGREEN_ROOT_FOLDER";

/// Server configuration read from `config.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Root folder holding the database and the trial data folder
    pub root_folder: Option<PathBuf>,
    pub bind_addr: String,
    pub port: u16,
    /// Database file name (relative to the root folder). Derived from
    /// dataset name and run version when absent.
    pub database_file: Option<String>,
    /// Folder containing one sub-folder per dataset (relative to the root folder)
    pub data_folder: PathBuf,
    pub dataset_name: String,
    pub run_version: String,
    /// Experiment name -> dataset folder name
    pub experiments: BTreeMap<String, String>,
    /// Target number of participants (must be even)
    pub num_participants: u32,
    /// Extra profile slots for dropouts and excluded sessions
    pub participant_buffer: u32,
    pub timeout_period_secs: u64,
    pub check_timeout_interval_secs: u64,
    /// Seed shared by every profile slot's trial permutation
    pub shuffle_seed: u64,
    pub max_shuffle_attempts: u32,
    /// Participant ids that bypass the duplicate check
    pub placeholder_pids: Vec<String>,
    pub world_width: u32,
    pub world_height: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let dataset_name = "pilot_final".to_string();
        let mut experiments = BTreeMap::new();
        experiments.insert("redgreen".to_string(), dataset_name.clone());

        Self {
            root_folder: None,
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            database_file: None,
            data_folder: PathBuf::from("trial_data"),
            dataset_name,
            run_version: "v0".to_string(),
            experiments,
            num_participants: 60,
            participant_buffer: 15,
            timeout_period_secs: 45 * 60,
            check_timeout_interval_secs: 5 * 60,
            shuffle_seed: 314159,
            max_shuffle_attempts: 200,
            placeholder_pids: vec!["default_pid".to_string(), "debug_pid".to_string()],
            world_width: 20,
            world_height: 20,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// A missing file is not fatal: a warning is logged and defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check invariants that the session manager relies on
    pub fn validate(&self) -> Result<()> {
        if self.num_participants % 2 != 0 {
            return Err(Error::Config(format!(
                "num_participants must be even (got {})",
                self.num_participants
            )));
        }
        if self.max_slots() == 0 {
            return Err(Error::Config(
                "num_participants + participant_buffer must be at least 1".to_string(),
            ));
        }
        if self.max_shuffle_attempts == 0 {
            return Err(Error::Config(
                "max_shuffle_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of profile slots available for assignment
    pub fn max_slots(&self) -> u32 {
        self.num_participants + self.participant_buffer
    }

    pub fn timeout_period(&self) -> Duration {
        Duration::seconds(self.timeout_period_secs as i64)
    }

    pub fn check_timeout_interval(&self) -> Duration {
        Duration::seconds(self.check_timeout_interval_secs as i64)
    }

    /// Whether `pid` is a placeholder that may start any number of sessions
    pub fn is_placeholder_pid(&self, pid: &str) -> bool {
        self.placeholder_pids.iter().any(|p| p == pid)
    }

    /// Database path inside the resolved root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        let file = self.database_file.clone().unwrap_or_else(|| {
            format!("{}_{}_redgreen.db", self.dataset_name, self.run_version)
        });
        root_folder.join(file)
    }

    /// Dataset folder for a named experiment, or `None` if it is not configured
    pub fn dataset_dir(&self, root_folder: &Path, experiment_name: &str) -> Option<PathBuf> {
        self.experiments
            .get(experiment_name)
            .map(|dataset| root_folder.join(&self.data_folder).join(dataset))
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &ServerConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("redgreen"))
        .unwrap_or_else(|| PathBuf::from("./redgreen_data"))
}
