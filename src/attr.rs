/// Reading and writing single cgroup attribute files
use crate::fs::CgroupFs;
use crate::naming::CgroupName;
use crate::types::{CgroupError, Result};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::Path;

/// Upper bound for an attribute value, in either direction
pub const ATTR_BUFSIZE: usize = 1024;

/// Render `value` for `attr`, refusing anything that would not fit the buffer
pub fn format_value(attr: &str, value: impl Display) -> Result<String> {
    let formatted = value.to_string();
    if formatted.len() >= ATTR_BUFSIZE {
        return Err(CgroupError::ValueTooLong {
            attr: attr.to_string(),
        });
    }
    Ok(formatted)
}

/// Attribute access for one named cgroup
pub struct AttributeIo<'a, F: CgroupFs> {
    fs: &'a F,
    root: &'a Path,
    name: &'a CgroupName,
    verbose: u8,
}

impl<'a, F: CgroupFs> AttributeIo<'a, F> {
    pub fn new(fs: &'a F, root: &'a Path, name: &'a CgroupName, verbose: u8) -> Self {
        Self {
            fs,
            root,
            name,
            verbose,
        }
    }

    /// Read a short attribute, minus one trailing newline
    pub fn read(&self, attr: &str) -> Result<String> {
        let path = self.name.attribute_path(self.root, attr);

        let mut file = self.fs.open_read(&path).map_err(|e| CgroupError::Read {
            path: path.clone(),
            source: e,
        })?;

        let mut buf = [0u8; ATTR_BUFSIZE];
        let n = file.read(&mut buf).map_err(|e| CgroupError::Read {
            path: path.clone(),
            source: e,
        })?;
        if n >= ATTR_BUFSIZE - 1 {
            return Err(CgroupError::AttributeTooLong { path });
        }

        let mut content = &buf[..n];
        if let Some(stripped) = content.strip_suffix(b"\n") {
            content = stripped;
        }
        let value = String::from_utf8_lossy(content).into_owned();

        if self.verbose > 1 {
            log::debug!("CG: Read {} = <{}>", attr, value);
        }

        Ok(value)
    }

    /// Format `value` and write it to `attr` in one `write` call
    pub fn write(&self, attr: &str, value: impl Display) -> Result<()> {
        let formatted = format_value(attr, value)?;

        if self.verbose > 1 {
            log::debug!("CG: Write {} = {}", attr, formatted.trim_end());
        }

        let path = self.name.attribute_path(self.root, attr);
        let mut file = self.fs.open_write(&path).map_err(|e| CgroupError::Open {
            path: path.clone(),
            source: e,
        })?;

        let bytes = formatted.as_bytes();
        let written = file.write(bytes).map_err(|e| CgroupError::Write {
            path: path.clone(),
            value: formatted.trim_end().to_string(),
            source: e,
        })?;
        if written != bytes.len() {
            return Err(CgroupError::ShortWrite {
                path,
                written,
                expected: bytes.len(),
            });
        }

        Ok(())
    }
}
