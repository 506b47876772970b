/// Filesystem access used by the cgroup code.
///
/// The cgroup filesystem is reached only through [`CgroupFs`], so the lifecycle
/// logic can run against [`HostFs`] in production and against an in-memory
/// model (see [`crate::testing`]) in tests.
use nix::sys::stat::Mode;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

pub trait CgroupFs {
    /// `stat` the path; only the error matters
    fn stat(&self, path: &Path) -> io::Result<()>;

    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory with mode 0777
    fn mkdir(&self, path: &Path) -> io::Result<()>;

    fn rmdir(&self, path: &Path) -> io::Result<()>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Open an existing file write-only with truncation. Never creates the file.
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write>>;
}

/// The real filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFs;

impl CgroupFs for HostFs {
    fn stat(&self, path: &Path) -> io::Result<()> {
        fs::metadata(path).map(|_| ())
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        nix::unistd::mkdir(path, Mode::from_bits_truncate(0o777)).map_err(io::Error::from)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(path)?))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let file = OpenOptions::new().write(true).truncate(true).open(path)?;
        Ok(Box::new(file))
    }
}
