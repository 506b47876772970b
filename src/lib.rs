//! rustbox-cgroup: cgroup v2 lifecycle for rustbox sandboxes
//! Inspired by IOI Isolate: one `box-<id>` cgroup per sandbox, with the process
//! placed in a `runner` leaf below it.

pub mod attr;
pub mod cgroup;
pub mod cli;
pub mod config;
pub mod fs;
pub mod launch;
pub mod limits;
pub mod naming;
pub mod testing;
pub mod types;
pub mod usage;

pub use cgroup::Cgroup;
pub use config::CgroupConfig;
pub use types::{CgroupError, CgroupState, Result};
