/// Cgroup v2 lifecycle for one sandbox box
///
/// A box owns two directories under the cgroup root:
/// - `<name>`: holds the enabled controllers and cpuset configuration, never a process
/// - `<name>/runner`: the leaf the sandboxed process is moved into
///
/// Operations must run in order: `init`, `prepare`, `enter` (from the process to be
/// confined) or `enter_process` (from its supervisor), then `remove` once that
/// process is gone. With cgroups disabled every
/// operation succeeds without touching the filesystem.
use crate::attr::AttributeIo;
use crate::config::CgroupConfig;
use crate::fs::{CgroupFs, HostFs};
use crate::limits;
use crate::naming::{CgroupName, RUNNER_LEAF};
use crate::types::{CgroupError, CgroupState, Result};
use crate::usage;
use std::io;
use std::path::Path;

#[derive(Clone)]
pub struct Cgroup<F: CgroupFs = HostFs> {
    fs: F,
    config: CgroupConfig,
    name: Option<CgroupName>,
    state: CgroupState,
}

impl Cgroup<HostFs> {
    pub fn new(config: CgroupConfig) -> Self {
        Self::with_fs(config, HostFs)
    }
}

impl<F: CgroupFs> Cgroup<F> {
    pub fn with_fs(config: CgroupConfig, fs: F) -> Self {
        Self {
            fs,
            config,
            name: None,
            state: CgroupState::Uninitialized,
        }
    }

    pub fn state(&self) -> CgroupState {
        self.state
    }

    /// Computed name, available once `init` has run
    pub fn name(&self) -> Option<&CgroupName> {
        self.name.as_ref()
    }

    pub fn config(&self) -> &CgroupConfig {
        &self.config
    }

    fn root(&self) -> &Path {
        &self.config.root
    }

    /// Name of the cgroup, provided the current state allows `op`
    fn checked(&self, op: &'static str, allowed: &[CgroupState]) -> Result<&CgroupName> {
        match &self.name {
            Some(name) if allowed.contains(&self.state) => Ok(name),
            _ => Err(CgroupError::InvalidState {
                op,
                state: self.state,
            }),
        }
    }

    fn attributes<'a>(&'a self, name: &'a CgroupName) -> AttributeIo<'a, F> {
        AttributeIo::new(&self.fs, self.root(), name, self.config.verbose)
    }

    /// Check the cgroup filesystem is mounted and compute the box cgroup name.
    pub fn init(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        if self.state != CgroupState::Uninitialized {
            return Err(CgroupError::InvalidState {
                op: "initialize",
                state: self.state,
            });
        }

        self.config.validate()?;

        if !self.fs.is_dir(self.root()) {
            return Err(CgroupError::NotMounted {
                root: self.root().to_path_buf(),
            });
        }

        let name = CgroupName::compute(self.config.box_id, self.config.parent.as_deref());
        log::info!(
            "Using control group {} under parent {}",
            name.name(),
            name.parent_name()
        );

        self.name = Some(name);
        self.state = CgroupState::Named;
        Ok(())
    }

    /// Remove `path` if a previous run left it behind.
    fn reset_stale(&self, path: &Path) -> Result<()> {
        match self.fs.stat(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            _ => {}
        }

        log::warn!(
            "Control group {} already exists, trying to empty it.",
            path.display()
        );
        self.fs.rmdir(path).map_err(|e| CgroupError::Reset {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Create the box cgroup and its runner leaf, clearing any stale copy first,
    /// then delegate controllers and apply the cpuset.
    pub fn prepare(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let name = self.checked("prepare", &[CgroupState::Named])?;

        let box_path = name.attribute_path(self.root(), "");
        let runner_path = name.runner_path(self.root());

        self.reset_stale(&runner_path)?;
        self.reset_stale(&box_path)?;

        for path in [&box_path, &runner_path] {
            self.fs.mkdir(path).map_err(|e| CgroupError::Create {
                path: path.clone(),
                source: e,
            })?;
        }

        let io = self.attributes(name);
        limits::delegate_controllers(&io)?;
        limits::apply_cpuset(&io, self.config.cpus.as_deref(), self.config.mems.as_deref())?;

        self.state = CgroupState::Prepared;
        Ok(())
    }

    /// Adopt a box cgroup prepared by an earlier invocation.
    pub fn open_existing(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let name = self.checked("open", &[CgroupState::Named])?;

        for path in [name.attribute_path(self.root(), ""), name.runner_path(self.root())] {
            self.fs
                .stat(&path)
                .map_err(|e| CgroupError::Read { path, source: e })?;
        }

        self.state = CgroupState::Prepared;
        Ok(())
    }

    /// Move the calling process into the runner leaf and apply the memory limit.
    pub fn enter(&mut self) -> Result<()> {
        self.attach(0)
    }

    /// Move process `pid` into the runner leaf and apply the memory limit. Used
    /// by a supervisor that holds the child back until it is confined.
    pub fn enter_process(&mut self, pid: u32) -> Result<()> {
        self.attach(pid)
    }

    /// `pid` 0 stands for the writing process itself.
    fn attach(&mut self, pid: u32) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let name = self.checked("enter", &[CgroupState::Prepared])?;

        log::info!("Entering control group {}", name.name());

        let io = self.attributes(name);
        io.write(
            &format!("{}/cgroup.procs", RUNNER_LEAF),
            format_args!("{}\n", pid),
        )?;
        if let Some(limit_kb) = self.config.memory_limit() {
            limits::apply_memory(&io, limit_kb)?;
        }

        self.state = CgroupState::Entered;
        Ok(())
    }

    /// CPU time used by the box so far, in milliseconds
    pub fn run_time_ms(&self) -> Result<u64> {
        if !self.config.enabled {
            return Ok(0);
        }
        let name = self.checked(
            "read usage of",
            &[CgroupState::Prepared, CgroupState::Entered],
        )?;

        let stat = self.attributes(name).read(usage::CPU_STAT)?;
        Ok(usage::run_time_ms(&stat))
    }

    /// Extended accounting hook; nothing is collected yet.
    pub fn stats(&self) -> Result<()> {
        Ok(())
    }

    /// Delete the runner leaf, then the box cgroup. Fails if a process is
    /// still resident.
    pub fn remove(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let name = self.checked("remove", &[CgroupState::Prepared, CgroupState::Entered])?;

        for path in [name.runner_path(self.root()), name.attribute_path(self.root(), "")] {
            self.fs
                .rmdir(&path)
                .map_err(|e| CgroupError::Remove { path, source: e })?;
        }

        self.state = CgroupState::Removed;
        Ok(())
    }
}
