use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Clock, FileSystem, ReadSeek, SystemClock, WalkIter, WriteSeek};
use crate::types::FileEntry;
use crate::utils::path::clean;

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        mode: u32,
        mod_time: DateTime<Utc>,
        unreadable: bool,
    },
    Dir {
        mode: u32,
        mod_time: DateTime<Utc>,
    },
}

type Nodes = Arc<Mutex<BTreeMap<PathBuf, Node>>>;

fn lock(nodes: &Nodes) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
    nodes.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

fn entry(path: &Path, node: &Node) -> FileEntry {
    match node {
        Node::File {
            data,
            mode,
            mod_time,
            ..
        } => FileEntry {
            path: path.to_path_buf(),
            size: data.len() as u64,
            mode: *mode,
            mod_time: *mod_time,
            is_dir: false,
        },
        Node::Dir { mode, mod_time } => FileEntry {
            path: path.to_path_buf(),
            size: 0,
            mode: *mode,
            mod_time: *mod_time,
            is_dir: true,
        },
    }
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new("/") || path == Path::new(".")
}

/// In-memory filesystem keyed by cleaned paths.
///
/// Written files are committed on `flush` and when the handle is dropped.
#[derive(Clone)]
pub struct MemFs {
    nodes: Nodes,
    clock: Arc<dyn Clock>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: Arc::new(Mutex::new(BTreeMap::new())),
            clock,
        }
    }

    /// Writes a file, creating missing parent directories.
    pub fn write_file(&self, path: impl AsRef<Path>, data: &[u8]) {
        let path = clean(path.as_ref());
        let now = self.clock.now();
        let mut nodes = lock(&self.nodes);
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if is_root(dir) {
                break;
            }
            nodes.entry(dir.to_path_buf()).or_insert(Node::Dir {
                mode: 0o755,
                mod_time: now,
            });
            parent = dir.parent();
        }
        nodes.insert(
            path,
            Node::File {
                data: data.to_vec(),
                mode: 0o644,
                mod_time: now,
                unreadable: false,
            },
        );
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match lock(&self.nodes).get(&clean(path.as_ref())) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Makes later reads of `path` fail after a successful open.
    pub fn mark_unreadable(&self, path: impl AsRef<Path>) {
        if let Some(Node::File { unreadable, .. }) =
            lock(&self.nodes).get_mut(&clean(path.as_ref()))
        {
            *unreadable = true;
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        let path = clean(path.as_ref());
        is_root(&path) || lock(&self.nodes).contains_key(&path)
    }

    fn require_parent_dir(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
        match path.parent() {
            None => Ok(()),
            Some(parent) if is_root(parent) => Ok(()),
            Some(parent) => match nodes.get(parent) {
                Some(Node::Dir { .. }) => Ok(()),
                Some(Node::File { .. }) => Err(io::Error::other(format!(
                    "{}: not a directory",
                    parent.display()
                ))),
                None => Err(not_found(parent)),
            },
        }
    }
}

struct MemReader {
    cursor: Cursor<Vec<u8>>,
    unreadable: bool,
}

impl Read for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.unreadable {
            return Err(io::Error::other("simulated read failure"));
        }
        self.cursor.read(buf)
    }
}

impl Seek for MemReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

struct MemWriter {
    path: PathBuf,
    cursor: Cursor<Vec<u8>>,
    nodes: Nodes,
    mod_time: DateTime<Utc>,
}

impl MemWriter {
    fn commit(&self) {
        let mut nodes = lock(&self.nodes);
        let mode = match nodes.get(&self.path) {
            Some(Node::File { mode, .. }) => *mode,
            _ => 0o644,
        };
        nodes.insert(
            self.path.clone(),
            Node::File {
                data: self.cursor.get_ref().clone(),
                mode,
                mod_time: self.mod_time,
                unreadable: false,
            },
        );
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Seek for MemWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>> {
        let path = clean(path);
        match lock(&self.nodes).get(&path) {
            Some(Node::File {
                data, unreadable, ..
            }) => Ok(Box::new(MemReader {
                cursor: Cursor::new(data.clone()),
                unreadable: *unreadable,
            })),
            Some(Node::Dir { .. }) => Err(io::Error::other(format!(
                "{}: is a directory",
                path.display()
            ))),
            None => Err(not_found(&path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        let path = clean(path);
        let now = self.clock.now();
        let mut nodes = lock(&self.nodes);

        Self::require_parent_dir(&nodes, &path)?;
        let mode = match nodes.get(&path) {
            Some(Node::Dir { .. }) => {
                return Err(io::Error::other(format!(
                    "{}: is a directory",
                    path.display()
                )))
            }
            Some(Node::File { mode, .. }) => *mode,
            None => 0o644,
        };
        nodes.insert(
            path.clone(),
            Node::File {
                data: Vec::new(),
                mode,
                mod_time: now,
                unreadable: false,
            },
        );

        Ok(Box::new(MemWriter {
            path,
            cursor: Cursor::new(Vec::new()),
            nodes: Arc::clone(&self.nodes),
            mod_time: now,
        }))
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        let path = clean(path);
        if is_root(&path) {
            return Ok(FileEntry {
                path,
                size: 0,
                mode: 0o755,
                mod_time: self.clock.now(),
                is_dir: true,
            });
        }
        lock(&self.nodes)
            .get(&path)
            .map(|node| entry(&path, node))
            .ok_or_else(|| not_found(&path))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let path = clean(path);
        let now = self.clock.now();
        let mut nodes = lock(&self.nodes);

        let mut chain: Vec<&Path> = path.ancestors().filter(|p| !is_root(p)).collect();
        chain.reverse();
        for dir in chain {
            match nodes.get(dir) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(io::Error::other(format!(
                        "{}: not a directory",
                        dir.display()
                    )))
                }
                None => {
                    nodes.insert(
                        dir.to_path_buf(),
                        Node::Dir {
                            mode: if mode == 0 { 0o755 } else { mode & 0o7777 },
                            mod_time: now,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn walk<'a>(&'a self, root: &Path) -> WalkIter<'a> {
        let root = clean(root);
        let nodes = lock(&self.nodes);

        if !is_root(&root) && !nodes.contains_key(&root) {
            return Box::new(std::iter::once(Err(not_found(&root))));
        }

        // Component-wise path ordering is a sorted depth-first pre-order.
        let entries: Vec<io::Result<FileEntry>> = nodes
            .iter()
            .filter(|(path, _)| is_root(&root) || path.starts_with(&root))
            .map(|(path, node)| Ok(entry(path, node)))
            .collect();
        Box::new(entries.into_iter())
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..glob::MatchOptions::default()
        };
        Ok(lock(&self.nodes)
            .keys()
            .filter(|path| matcher.matches_path_with(path, options))
            .cloned()
            .collect())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let path = clean(path);
        let mut nodes = lock(&self.nodes);
        if let Some(Node::Dir { .. }) = nodes.get(&path) {
            let has_children = nodes
                .keys()
                .any(|other| other != &path && other.starts_with(&path));
            if has_children {
                return Err(io::Error::other(format!(
                    "{}: directory not empty",
                    path.display()
                )));
            }
        }
        nodes.remove(&path).map(|_| ()).ok_or_else(|| not_found(&path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = clean(from);
        let to = clean(to);
        let mut nodes = lock(&self.nodes);

        if !nodes.contains_key(&from) {
            return Err(not_found(&from));
        }
        Self::require_parent_dir(&nodes, &to)?;

        let moved: Vec<PathBuf> = nodes
            .keys()
            .filter(|p| p.starts_with(&from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let suffix = old.strip_prefix(&from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                nodes.insert(new, node);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FixedClock;
    use chrono::TimeZone;

    #[test]
    fn test_create_commits_on_drop() {
        let fs = MemFs::new();
        fs.mkdir_all(Path::new("/out"), 0o755).unwrap();
        let mut file = fs.create(Path::new("/out/a.txt")).unwrap();
        file.write_all(b"hello").unwrap();
        assert_eq!(fs.read_file("/out/a.txt").unwrap(), b"");
        drop(file);
        assert_eq!(fs.read_file("/out/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_create_requires_parent() {
        let fs = MemFs::new();
        let err = fs.create(Path::new("/missing/a.txt")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_walk_order_and_scope() {
        let fs = MemFs::new();
        fs.write_file("/r/b/inner", b"1");
        fs.write_file("/r/a", b"2");
        fs.write_file("/r-sibling/x", b"3");
        fs.write_file("/r/c", b"4");

        let paths: Vec<PathBuf> = fs
            .walk(Path::new("/r"))
            .map(|e| e.unwrap().path)
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/r"),
                PathBuf::from("/r/a"),
                PathBuf::from("/r/b"),
                PathBuf::from("/r/b/inner"),
                PathBuf::from("/r/c"),
            ]
        );
    }

    #[test]
    fn test_stat_uses_clock() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let fs = MemFs::with_clock(Arc::new(FixedClock(at)));
        fs.write_file("/f", b"abc");
        let entry = fs.stat(Path::new("/f")).unwrap();
        assert_eq!(entry.size, 3);
        assert_eq!(entry.mod_time, at);
        assert!(fs.stat(Path::new("/")).unwrap().is_dir);
    }

    #[test]
    fn test_unreadable_open_succeeds_read_fails() {
        let fs = MemFs::new();
        fs.write_file("/f", b"abc");
        fs.mark_unreadable("/f");
        let mut file = fs.open(Path::new("/f")).unwrap();
        let mut buf = Vec::new();
        assert!(file.read_to_end(&mut buf).is_err());
    }

    #[test]
    fn test_rename_and_remove() {
        let fs = MemFs::new();
        fs.write_file("/d/sub/f", b"x");
        fs.rename(Path::new("/d/sub"), Path::new("/d/moved")).unwrap();
        assert!(fs.exists("/d/moved/f"));
        assert!(!fs.exists("/d/sub"));

        assert!(fs.remove(Path::new("/d/moved")).is_err());
        fs.remove(Path::new("/d/moved/f")).unwrap();
        fs.remove(Path::new("/d/moved")).unwrap();
        assert_eq!(
            fs.remove(Path::new("/d/moved")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
