//! Run configuration: JSON file, environment variables and CLI flags feed one
//! [`GenerateConfig`] that is handed to the core explicitly.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::generate::GenerateOpts;
use crate::persist::pool::PersistOpts;

/// Environment variable holding the number of units to generate.
pub const ENV_COUNT: &str = "NFT_COUNT";
/// Environment variable holding the output directory.
pub const ENV_OUT_DIR: &str = "OUTPUT_DIR";
/// Every variable whose name starts with this prefix names one layer directory.
pub const ENV_LAYER_DIR_PREFIX: &str = "DIR";

/// What to do when a single unit fails to read, decode or persist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the batch at the first failure.
    #[default]
    Abort,
    /// Record the failed unit and keep going.
    Continue,
}

/// Full configuration of one generation batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    /// Layer directories, bottom layer first.
    pub layer_dirs: Vec<PathBuf>,
    /// Units to generate.
    pub count: u32,
    /// Destination directory; must not exist yet.
    pub out_dir: PathBuf,
    /// Persistence worker threads.
    pub workers: usize,
    /// Composites allowed to wait for a worker before the control thread blocks.
    pub queue_capacity: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        let persist = PersistOpts::default();
        Self {
            layer_dirs: Vec::new(),
            count: 0,
            out_dir: PathBuf::from("output"),
            workers: persist.workers,
            queue_capacity: persist.queue_capacity,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl GenerateConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_reader<R: std::io::Read>(r: R) -> LayerstackResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| LayerstackError::validation(format!("parse config JSON: {e}")))
    }

    /// Parse a configuration from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> LayerstackResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            LayerstackError::validation(format!("open config JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Overlay values found in environment variables.
    ///
    /// Layer directories come from every `DIR*` variable, ordered by variable name; when any is
    /// present they replace the configured list.
    pub fn apply_env<I>(&mut self, vars: I) -> LayerstackResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut dirs = Vec::<(String, String)>::new();
        for (key, value) in vars {
            if key == ENV_COUNT {
                self.count = value.trim().parse::<u32>().map_err(|e| {
                    LayerstackError::validation(format!("invalid {ENV_COUNT} value '{value}': {e}"))
                })?;
            } else if key == ENV_OUT_DIR {
                if !value.is_empty() {
                    self.out_dir = PathBuf::from(value);
                }
            } else if key.starts_with(ENV_LAYER_DIR_PREFIX) && !value.is_empty() {
                dirs.push((key, value));
            }
        }

        if !dirs.is_empty() {
            dirs.sort();
            self.layer_dirs = dirs.into_iter().map(|(_, v)| PathBuf::from(v)).collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> LayerstackResult<()> {
        if self.layer_dirs.is_empty() {
            return Err(LayerstackError::validation(
                "at least one layer directory is required",
            ));
        }
        if self.count == 0 {
            return Err(LayerstackError::validation("count must be >= 1"));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(LayerstackError::validation("output directory must be set"));
        }
        if self.workers == 0 {
            return Err(LayerstackError::validation("workers must be >= 1"));
        }
        if self.queue_capacity == 0 {
            return Err(LayerstackError::validation("queue_capacity must be >= 1"));
        }
        Ok(())
    }

    pub fn persist_opts(&self) -> PersistOpts {
        PersistOpts {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn generate_opts(&self) -> GenerateOpts {
        GenerateOpts {
            count: self.count,
            persist: self.persist_opts(),
            failure_policy: self.failure_policy,
        }
    }
}

/// Create a fresh output directory. An existing path is rejected rather than reused.
pub fn prepare_output_dir(path: &Path) -> LayerstackResult<()> {
    let exists = path.try_exists().map_err(|e| {
        LayerstackError::persistence(format!("inspect output directory '{}': {e}", path.display()))
    })?;
    if exists {
        return Err(LayerstackError::validation(format!(
            "output directory '{}' already exists",
            path.display()
        )));
    }
    std::fs::create_dir_all(path).map_err(|e| {
        LayerstackError::persistence(format!("create output directory '{}': {e}", path.display()))
    })
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
