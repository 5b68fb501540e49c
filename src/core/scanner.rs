use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hasher::{digest_of_file, Digest};
use super::OpContext;
use crate::error::{Error, Result};
use crate::types::{DuplicateFile, DuplicateGroup, FileEntry, ScanOptions, ScanReport};
use crate::utils::fs::format_bytes;
use crate::utils::path::{clean, ext};

/// Drops roots equal to or nested inside another root, keeping first-seen order.
pub fn non_overlapping_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for root in roots.iter().map(|r| clean(r)) {
        if result.iter().any(|kept| root.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&root));
        result.push(root);
    }

    result
}

fn is_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|relative| {
            relative.components().any(|c| match c {
                Component::Normal(name) => name.to_string_lossy().starts_with('.'),
                _ => false,
            })
        })
        .unwrap_or(false)
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

fn collect_candidates(
    ctx: &OpContext,
    roots: &[PathBuf],
    options: &ScanOptions,
) -> Result<Vec<FileEntry>> {
    let extensions: Vec<String> = options
        .file_extensions
        .iter()
        .map(|e| normalize_extension(e))
        .filter(|e| !e.is_empty())
        .collect();

    let mut candidates = Vec::new();

    for root in roots {
        debug!(root = %root.display(), "Walking scan root");
        for item in ctx.fs.walk(root) {
            ctx.cancel.check()?;
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            if entry.is_dir {
                continue;
            }
            if !options.include_hidden && is_hidden(root, &entry.path) {
                continue;
            }
            if !extensions.is_empty()
                && !extensions.contains(&normalize_extension(&ext(&entry.path)))
            {
                continue;
            }
            candidates.push(entry);
        }
    }

    Ok(candidates)
}

fn hash_candidates(
    ctx: &OpContext,
    candidates: &[FileEntry],
    options: &ScanOptions,
) -> Result<Vec<Option<Digest>>> {
    let total = candidates.len();
    let processed = AtomicUsize::new(0);

    let hash_one = |entry: &FileEntry| -> Result<Option<Digest>> {
        let result = digest_of_file(ctx.fs, &entry.path, options.algorithm, ctx.cancel);
        let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
        ctx.report_progress(count, total, &entry.path.to_string_lossy());

        match result {
            Ok(digest) => Ok(Some(digest)),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Dropping unreadable file from scan");
                Ok(None)
            }
        }
    };

    if !options.parallel {
        return candidates.iter().map(hash_one).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .build();
    match pool {
        // Indexed collect keeps walk order regardless of completion order.
        Ok(pool) => pool.install(|| candidates.par_iter().map(hash_one).collect()),
        Err(e) => {
            warn!(error = %e, "Falling back to sequential hashing");
            candidates.iter().map(hash_one).collect()
        }
    }
}

/// Walks every root, digests each regular file passing the filters and
/// groups files with identical digest and size.
pub fn detect_duplicates(
    ctx: &OpContext,
    roots: &[PathBuf],
    options: &ScanOptions,
) -> Result<ScanReport> {
    ctx.cancel.check()?;
    let roots = non_overlapping_roots(roots);
    info!(
        operation_id = ctx.id,
        roots = ?roots,
        algorithm = %options.algorithm,
        parallel = options.parallel,
        "Scanning for duplicates"
    );

    let candidates = collect_candidates(ctx, &roots, options)?;
    let digests = hash_candidates(ctx, &candidates, options)?;

    // Buckets in first-seen order.
    let mut index: HashMap<(String, u64), usize> = HashMap::new();
    let mut buckets: Vec<(Digest, Vec<FileEntry>)> = Vec::new();
    for (entry, digest) in candidates.into_iter().zip(digests) {
        let Some(digest) = digest.filter(|d| !d.is_empty()) else {
            continue;
        };
        let key = (digest.hex.clone(), entry.size);
        match index.get(&key) {
            Some(&slot) => buckets[slot].1.push(entry),
            None => {
                index.insert(key, buckets.len());
                buckets.push((digest, vec![entry]));
            }
        }
    }

    let groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(digest, members)| {
            let potential_savings = members[0].size * (members.len() as u64 - 1);
            DuplicateGroup {
                group_id: Uuid::new_v4().to_string(),
                similarity_score: 1.0,
                members: members
                    .iter()
                    .map(|m| DuplicateFile::new(m, &digest))
                    .collect(),
                digest,
                potential_savings,
            }
        })
        .collect();

    let total_duplicates: usize = groups.iter().map(|g| g.members.len() - 1).sum();
    let total_savings_bytes: u64 = groups.iter().map(|g| g.potential_savings).sum();

    info!(
        operation_id = ctx.id,
        groups = groups.len(),
        total_duplicates,
        savings = %format_bytes(total_savings_bytes),
        "Scan complete"
    );

    Ok(ScanReport {
        scan_id: ctx.id.to_string(),
        groups,
        total_duplicates,
        total_savings_bytes,
    })
}
