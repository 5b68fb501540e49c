//! Lexical path handling and glob expansion.
//!
//! Nothing here touches the filesystem except [`expand_glob`], which goes
//! through the [`FileSystem`] it is handed.

use std::path::{is_separator, Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::vfs::FileSystem;

/// Lexically cleans `path`: drops `.` segments, folds `..` into the
/// preceding segment, collapses repeated separators and keeps a leading
/// root. Leading `..` segments of a relative path are preserved.
pub fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

pub fn resolve(input: &str) -> Result<PathBuf> {
    if input.is_empty() {
        return Err(Error::InvalidArgument("empty path".to_string()));
    }
    if input.contains('\0') {
        return Err(Error::InvalidArgument(format!(
            "path contains NUL byte: {:?}",
            input
        )));
    }
    Ok(clean(Path::new(input)))
}

/// Expands a shell-style glob, sorted byte-lexicographically.
/// A pattern that matches nothing yields an empty list.
pub fn expand_glob(fs: &dyn FileSystem, pattern: &str) -> Result<Vec<PathBuf>> {
    if pattern.is_empty() {
        return Err(Error::InvalidArgument("empty glob pattern".to_string()));
    }
    glob::Pattern::new(pattern).map_err(|e| {
        Error::InvalidArgument(format!("malformed glob pattern {:?}: {}", pattern, e))
    })?;

    let mut matches = fs.glob(pattern).map_err(|e| {
        Error::InvalidArgument(format!("glob pattern {:?}: {}", pattern, e))
    })?;
    matches.sort_by(|a, b| {
        a.as_os_str()
            .as_encoded_bytes()
            .cmp(b.as_os_str().as_encoded_bytes())
    });
    Ok(matches)
}

/// Last element of `path` with trailing separators removed.
pub fn base(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.is_empty() {
        return ".".to_string();
    }
    let trimmed = s.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return std::path::MAIN_SEPARATOR.to_string();
    }
    match trimmed.rfind(is_separator) {
        Some(i) => trimmed[i + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Everything but the last element, cleaned.
pub fn dir(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.rfind(is_separator) {
        Some(i) => clean(Path::new(&s[..=i])),
        None => PathBuf::from("."),
    }
}

/// Extension of the last element including the dot, or empty.
pub fn ext(path: &Path) -> String {
    let s = path.to_string_lossy();
    for (i, c) in s.char_indices().rev() {
        if is_separator(c) {
            break;
        }
        if c == '.' {
            return s[i..].to_string();
        }
    }
    String::new()
}

/// Joins an archive entry name under `root`, refusing names that are
/// absolute or climb out of `root`.
pub fn safe_join(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if relative.has_root()
        || relative
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return None;
    }

    let mut depth: usize = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    if depth == 0 {
        return None;
    }

    Some(clean(&root.join(relative)))
}
