//! In-memory cgroup v2 filesystem for tests.
//!
//! [`FakeCgroupFs`] models the parts of cgroupfs the lifecycle code depends on:
//! - `mkdir` populates the standard controller attribute files
//! - attribute files can be opened but never created by a write
//! - `rmdir` refuses a cgroup with child cgroups (`ENOTEMPTY`) or with
//!   processes in `cgroup.procs` (`EBUSY`), and drops its attribute files
//!
//! Clones share state, so a test can keep a handle while a `Cgroup` owns another.

use crate::fs::CgroupFs;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Attribute files present in every freshly created cgroup
pub const DEFAULT_ATTRIBUTES: &[(&str, &str)] = &[
    ("cgroup.controllers", "cpuset cpu io memory pids\n"),
    ("cgroup.procs", ""),
    ("cgroup.subtree_control", ""),
    ("cpu.stat", "usage_usec 0\nuser_usec 0\nsystem_usec 0\n"),
    ("cpuset.cpus", ""),
    ("cpuset.mems", ""),
    ("memory.max", "max\n"),
    ("memory.swap.max", "max\n"),
];

#[derive(Default)]
struct State {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, String>,
    stat_errors: HashMap<PathBuf, i32>,
    write_errors: HashMap<PathBuf, i32>,
    max_write: Option<usize>,
    writes: Vec<(PathBuf, String)>,
    ops: usize,
}

#[derive(Clone, Default)]
pub struct FakeCgroupFs {
    state: Arc<Mutex<State>>,
}

/// Collapse `//` and trailing slashes the way the kernel's path walk does
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

impl FakeCgroupFs {
    /// A filesystem with `root` (and its ancestors) present as directories
    pub fn mounted(root: impl AsRef<Path>) -> Self {
        let fs = Self::default();
        {
            let mut state = fs.lock();
            for dir in normalize(root.as_ref()).ancestors() {
                state.dirs.insert(dir.to_path_buf());
            }
        }
        fs
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn exists(&self, path: &Path) -> bool {
        let path = normalize(path);
        let state = self.lock();
        state.dirs.contains(&path) || state.files.contains_key(&path)
    }

    /// Current content of an attribute file
    pub fn attribute(&self, path: &Path) -> Option<String> {
        self.lock().files.get(&normalize(path)).cloned()
    }

    /// Overwrite or create a file directly, bypassing cgroup semantics
    pub fn set_attribute(&self, path: &Path, content: &str) {
        self.lock()
            .files
            .insert(normalize(path), content.to_string());
    }

    /// Make a plain directory that was not created through `mkdir`, e.g. a
    /// leftover from a crashed run
    pub fn add_dir(&self, path: &Path) {
        self.lock().dirs.insert(normalize(path));
    }

    /// Make later `stat` calls on `path` fail with `code`
    pub fn inject_stat_error(&self, path: &Path, code: i32) {
        self.lock().stat_errors.insert(normalize(path), code);
    }

    /// Make later `open_write` calls on `path` fail with `code`
    pub fn deny_write(&self, path: &Path, code: i32) {
        self.lock().write_errors.insert(normalize(path), code);
    }

    /// Accept at most `n` bytes per `write` call
    pub fn limit_write_size(&self, n: usize) {
        self.lock().max_write = Some(n);
    }

    /// Every successful write, in order, as (path, bytes written)
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Number of filesystem calls made through the `CgroupFs` interface
    pub fn op_count(&self) -> usize {
        self.lock().ops
    }
}

impl CgroupFs for FakeCgroupFs {
    fn stat(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops += 1;
        if let Some(&code) = state.stat_errors.get(&path) {
            return Err(errno(code));
        }
        if state.dirs.contains(&path) || state.files.contains_key(&path) {
            Ok(())
        } else {
            Err(errno(libc::ENOENT))
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        let mut state = self.lock();
        state.ops += 1;
        state.dirs.contains(&normalize(path))
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops += 1;
        if state.dirs.contains(&path) || state.files.contains_key(&path) {
            return Err(errno(libc::EEXIST));
        }
        match path.parent() {
            Some(parent) if state.dirs.contains(parent) => {}
            _ => return Err(errno(libc::ENOENT)),
        }
        for (attr, content) in DEFAULT_ATTRIBUTES {
            state.files.insert(path.join(attr), content.to_string());
        }
        state.dirs.insert(path);
        Ok(())
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops += 1;
        if state.files.contains_key(&path) {
            return Err(errno(libc::ENOTDIR));
        }
        if !state.dirs.contains(&path) {
            return Err(errno(libc::ENOENT));
        }
        if state
            .dirs
            .iter()
            .any(|d| d.parent() == Some(path.as_path()))
        {
            return Err(errno(libc::ENOTEMPTY));
        }
        let populated = state
            .files
            .get(&path.join("cgroup.procs"))
            .map_or(false, |procs| !procs.trim().is_empty());
        if populated {
            return Err(errno(libc::EBUSY));
        }
        state.files.retain(|f, _| f.parent() != Some(path.as_path()));
        state.dirs.remove(&path);
        Ok(())
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops += 1;
        if state.dirs.contains(&path) {
            return Err(errno(libc::EISDIR));
        }
        match state.files.get(&path) {
            Some(content) => Ok(Box::new(Cursor::new(content.clone().into_bytes()))),
            None => Err(errno(libc::ENOENT)),
        }
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let path = normalize(path);
        let mut state = self.lock();
        state.ops += 1;
        if state.dirs.contains(&path) {
            return Err(errno(libc::EISDIR));
        }
        if let Some(&code) = state.write_errors.get(&path) {
            return Err(errno(code));
        }
        match state.files.get_mut(&path) {
            Some(content) => {
                content.clear();
                Ok(Box::new(FakeWriter {
                    state: Arc::clone(&self.state),
                    path,
                }))
            }
            None => Err(errno(libc::ENOENT)),
        }
    }
}

struct FakeWriter {
    state: Arc<Mutex<State>>,
    path: PathBuf,
}

impl Write for FakeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let n = state.max_write.map_or(buf.len(), |max| buf.len().min(max));
        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
        match state.files.get_mut(&self.path) {
            Some(content) => content.push_str(&chunk),
            None => return Err(errno(libc::ENODEV)),
        }
        state.writes.push((self.path.clone(), chunk));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
