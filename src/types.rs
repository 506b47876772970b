/// Core types shared by the cgroup lifecycle code
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Lifecycle state of a box cgroup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CgroupState {
    /// Constructed, `init` not yet called
    Uninitialized,
    /// Name computed, nothing on disk yet
    Named,
    /// Box directory and runner leaf exist, controllers delegated
    Prepared,
    /// A process has been moved into the runner leaf
    Entered,
    /// Both directories deleted; terminal
    Removed,
}

impl fmt::Display for CgroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CgroupState::Uninitialized => "uninitialized",
            CgroupState::Named => "named",
            CgroupState::Prepared => "prepared",
            CgroupState::Entered => "entered",
            CgroupState::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Summary printed by the `run` command
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub box_id: u32,
    /// Cgroup name relative to the mount root, `None` when cgroups are disabled
    pub cgroup: Option<String>,
    pub exit_code: Option<i32>,
    /// Signal that terminated the process (if any)
    pub signal: Option<i32>,
    /// CPU time accounted to the cgroup, in milliseconds
    pub cpu_time_ms: u64,
}

/// Errors raised while managing a box cgroup.
///
/// Every variant except `InvalidState` and `Config` means the cgroup filesystem
/// did something we cannot work around; callers are expected to abort.
#[derive(Error, Debug)]
pub enum CgroupError {
    #[error("Control group filesystem at {} not mounted", root.display())]
    NotMounted { root: PathBuf },

    #[error("Cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Attribute {} too long", path.display())]
    AttributeTooLong { path: PathBuf },

    #[error("Value for attribute {attr} is too long")]
    ValueTooLong { attr: String },

    #[error("Cannot write {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Cannot set {} to {value}: {source}", path.display())]
    Write {
        path: PathBuf,
        value: String,
        source: io::Error,
    },

    #[error("Short write to {} ({written} out of {expected} bytes)", path.display())]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    #[error("Failed to reset control group {}: {source}", path.display())]
    Reset { path: PathBuf, source: io::Error },

    #[error("Failed to create control group {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("Cannot remove control group {}: {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },

    #[error("Cannot {op} control group in state {state}")]
    InvalidState { op: &'static str, state: CgroupState },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for cgroup operations
pub type Result<T> = std::result::Result<T, CgroupError>;
