//! Filesystem and clock seams consumed by the engines.
//!
//! [`OsFs`] talks to the real filesystem; [`MemFs`] keeps everything in an
//! ordered in-memory map and is what the unit tests run against.

mod memory;
mod os;

pub use memory::MemFs;
pub use os::OsFs;

use chrono::{DateTime, Utc};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::types::FileEntry;

pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

pub trait WriteSeek: Write + Seek + Send {}
impl<T: Write + Seek + Send> WriteSeek for T {}

pub type WalkIter<'a> = Box<dyn Iterator<Item = io::Result<FileEntry>> + 'a>;

pub trait FileSystem: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>>;

    /// Creates `path`, truncating an existing file.
    fn create(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>>;

    fn stat(&self, path: &Path) -> io::Result<FileEntry>;

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Depth-first walk starting at (and including) `root`, children sorted
    /// by name. Only regular files and directories are yielded. Errors are
    /// yielded in place and the walk continues past them.
    fn walk<'a>(&'a self, root: &Path) -> WalkIter<'a>;

    /// Paths matching a shell-style pattern. Malformed patterns fail with
    /// `InvalidInput`.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
