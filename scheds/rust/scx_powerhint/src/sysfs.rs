// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Control attribute I/O
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Small text attributes under sysfs/cgroupfs.
//!
//! Every access opens the attribute, performs exactly one read or write and
//! closes it again. Failures come back as `anyhow` errors carrying the path
//! and the OS error; nothing here retries.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub trait AttrIo: Send + Sync {
    /// Read at most `max_len` bytes from the start of the attribute.
    fn read(&self, path: &Path, max_len: usize) -> Result<Vec<u8>>;

    fn write(&self, path: &Path, value: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SysfsIo;

impl AttrIo for SysfsIo {
    fn read(&self, path: &Path, max_len: usize) -> Result<Vec<u8>> {
        let mut file =
            File::open(path).with_context(|| format!("Error opening {}", path.display()))?;
        let mut buf = vec![0u8; max_len];
        let len = file
            .read(&mut buf)
            .with_context(|| format!("Error reading from {}", path.display()))?;
        buf.truncate(len);
        Ok(buf)
    }

    fn write(&self, path: &Path, value: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Error opening {}", path.display()))?;
        file.write_all(value.as_bytes())
            .with_context(|| format!("Error writing to {}", path.display()))
    }
}

/// Destination for level changes of an attribute kept open across writes.
pub trait LevelSink: Send {
    fn write_level(&mut self, level: &str) -> Result<()>;
}

/// Write-only handle on an attribute, opened once and rewritten in place.
#[derive(Debug)]
pub struct AttrHandle {
    path: PathBuf,
    file: File,
}

impl AttrHandle {
    pub fn open_write(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .with_context(|| format!("Error opening {}", path.display()))?;
        Ok(Self { path, file })
    }
}

impl LevelSink for AttrHandle {
    fn write_level(&mut self, level: &str) -> Result<()> {
        self.file
            .write_all_at(level.as_bytes(), 0)
            .with_context(|| format!("Error writing to {}", self.path.display()))
    }
}

/// Trim the trailing newline/NUL padding sysfs puts after a value.
pub fn attr_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
pub use mock::{MockIo, RecordingSink};


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_honours_max_len() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("min_perf_pct");
        std::fs::write(&path, "35\n").unwrap();

        assert_eq!(SysfsIo.read(&path, 1).unwrap(), b"3");
        assert_eq!(attr_text(&SysfsIo.read(&path, 4).unwrap()), "35");
    }

    #[test]
    fn write_replaces_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("touchboostpulse");
        std::fs::write(&path, "0").unwrap();

        SysfsIo.write(&path, "1").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
    }

    #[test]
    fn missing_attr_reports_path_and_os_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent");

        let err = SysfsIo.write(&path, "1").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Error opening"));
        assert!(msg.contains("absent"));
        assert!(err.downcast_ref::<std::io::Error>().is_some());

        assert!(SysfsIo.read(&path, 1).is_err());
    }

    #[test]
    fn handle_rewrites_from_offset_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedtune.boost");
        std::fs::write(&path, "").unwrap();

        let mut handle = AttrHandle::open_write(&path).unwrap();
        handle.write_level("40").unwrap();
        handle.write_level("10").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10");
    }

    #[test]
    fn attr_text_strips_padding() {
        assert_eq!(attr_text(b"100\n"), "100");
        assert_eq!(attr_text(b"7\0\0"), "7");
        assert_eq!(attr_text(b""), "");
    }
}
