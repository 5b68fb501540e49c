use chrono::{DateTime, Utc};
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;
use walkdir::WalkDir;

use super::{FileSystem, ReadSeek, WalkIter, WriteSeek};
use crate::types::FileEntry;

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl OsFs {
    pub fn new() -> Self {
        Self
    }
}

fn entry_from_metadata(path: &Path, metadata: &Metadata) -> FileEntry {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode()
    };
    #[cfg(not(unix))]
    let mode = if metadata.is_dir() { 0o755u32 } else { 0o644u32 };

    let mod_time = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH));

    FileEntry {
        path: path.to_path_buf(),
        size: metadata.len(),
        mode,
        mod_time,
        is_dir: metadata.is_dir(),
    }
}

impl FileSystem for OsFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>> {
        Ok(Box::new(File::open(path)?))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        Ok(Box::new(File::create(path)?))
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        let metadata = fs::metadata(path)?;
        Ok(entry_from_metadata(path, &metadata))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(if mode == 0 { 0o755 } else { mode & 0o7777 });
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(path)
    }

    fn walk<'a>(&'a self, root: &Path) -> WalkIter<'a> {
        let entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(io::Error::from(e))),
                };
                let file_type = entry.file_type();
                if !file_type.is_file() && !file_type.is_dir() {
                    return None;
                }
                Some(
                    entry
                        .metadata()
                        .map(|metadata| entry_from_metadata(entry.path(), &metadata))
                        .map_err(io::Error::from),
                )
            });
        Box::new(entries)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut matches = Vec::new();
        for path in paths {
            match path {
                Ok(path) => matches.push(path),
                Err(e) => warn!("Skipping unreadable glob match: {}", e),
            }
        }
        Ok(matches)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}
