/// Configuration for a single box cgroup
use crate::types::{CgroupError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_CG_ROOT: &str = "/sys/fs/cgroup";
pub const DEFAULT_NUM_BOXES: u32 = 1000;

/// Cgroup settings for one sandbox instance.
///
/// Values come from (in increasing priority) the defaults, an optional JSON
/// config file and the command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CgroupConfig {
    /// Enable cgroup support; when false every cgroup operation is a no-op
    pub enabled: bool,
    /// Mount point of the cgroup v2 filesystem
    pub root: PathBuf,
    /// Sandbox instance number
    pub box_id: u32,
    /// Number of boxes the host is configured for; `box_id` must be below it
    pub num_boxes: u32,
    /// Parent cgroup, relative to `root`
    pub parent: Option<String>,
    /// Memory limit in KiB
    pub memory_limit_kb: Option<u64>,
    /// Allowed CPUs, in cpuset list syntax (e.g. `0-3,6`)
    pub cpus: Option<String>,
    /// Allowed memory nodes, in cpuset list syntax
    pub mems: Option<String>,
    pub verbose: u8,
}

impl Default for CgroupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from(DEFAULT_CG_ROOT),
            box_id: 0,
            num_boxes: DEFAULT_NUM_BOXES,
            parent: None,
            memory_limit_kb: None,
            cpus: None,
            mems: None,
            verbose: 0,
        }
    }
}

impl CgroupConfig {
    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CgroupError::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CgroupError::Config(format!("Cannot parse config {}: {}", path.display(), e))
        })
    }

    /// Memory limit to enforce, treating zero as "no limit"
    pub fn memory_limit(&self) -> Option<u64> {
        self.memory_limit_kb.filter(|&kb| kb > 0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.box_id >= self.num_boxes {
            return Err(CgroupError::Config(format!(
                "Sandbox ID out of range (allowed: 0-{})",
                self.num_boxes.saturating_sub(1)
            )));
        }

        if !self.root.is_absolute() {
            return Err(CgroupError::Config(format!(
                "Cgroup root {} must be an absolute path",
                self.root.display()
            )));
        }

        if let Some(parent) = &self.parent {
            if parent.is_empty() {
                return Err(CgroupError::Config("Empty parent cgroup".to_string()));
            }
            if Path::new(parent)
                .components()
                .any(|c| matches!(c, Component::ParentDir))
            {
                return Err(CgroupError::Config(format!(
                    "Parent cgroup {} must not contain '..'",
                    parent
                )));
            }
        }

        for (key, value) in [("cpus", &self.cpus), ("mems", &self.mems)] {
            if let Some(v) = value {
                if v.trim().is_empty() {
                    return Err(CgroupError::Config(format!("Empty {} list", key)));
                }
            }
        }

        Ok(())
    }
}
