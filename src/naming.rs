/// Cgroup naming and attribute paths
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Subdirectory of the box cgroup that actually holds the sandboxed process
pub const RUNNER_LEAF: &str = "runner";

/// Name of a box cgroup relative to the cgroup filesystem root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CgroupName {
    name: String,
    parent_name: String,
}

impl CgroupName {
    /// `<parent>/box-<id>` when a parent is given, `box-<id>` otherwise
    pub fn compute(box_id: u32, parent: Option<&str>) -> Self {
        match parent {
            Some(parent) => Self {
                name: format!("{}/box-{}", parent, box_id),
                parent_name: parent.to_string(),
            },
            None => Self {
                name: format!("box-{}", box_id),
                parent_name: ".".to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent used for diagnostics; `.` stands for the filesystem root
    pub fn parent_name(&self) -> &str {
        &self.parent_name
    }

    /// `<root>/<name>/<attr>`. An empty `attr` yields the box directory itself.
    pub fn attribute_path(&self, root: &Path, attr: &str) -> PathBuf {
        attribute_path(root, &self.name, attr)
    }

    pub fn runner_path(&self, root: &Path) -> PathBuf {
        self.attribute_path(root, RUNNER_LEAF)
    }
}

/// Joins by plain concatenation so a parent written with a leading `/` stays
/// under `root` instead of replacing it.
pub fn attribute_path(root: &Path, name: &str, attr: &str) -> PathBuf {
    let mut path = OsString::from(root.as_os_str());
    path.push("/");
    path.push(name);
    path.push("/");
    path.push(attr);
    PathBuf::from(path)
}
