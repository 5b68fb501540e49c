use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::hasher::{Algorithm, Digest};
use crate::utils::compression::ArchiveFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub mode: u32,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
}

pub type ProgressFn = dyn Fn(usize, usize, &str) + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePlan {
    pub format: ArchiveFormat,
    pub destination: PathBuf,
    pub members: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub algorithm: Algorithm,
    pub include_hidden: bool,
    pub file_extensions: Vec<String>,
    pub parallel: bool,
    pub workers: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sha256,
            include_hidden: false,
            file_extensions: Vec::new(),
            parallel: false,
            workers: None,
        }
    }
}

// Request records

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressRequest {
    pub files: Vec<String>,
    pub archive_format: ArchiveFormat,
    pub output_path: String,
    /// Accepted for compatibility; the DEFLATE default level is always used.
    #[serde(default)]
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub archive_path: String,
    pub destination_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumRequest {
    pub files: Vec<String>,
    #[serde(default)]
    pub algorithm: Algorithm,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitRequest {
    pub file: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub parts: Option<u32>,
    #[serde(default)]
    pub output_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub pattern: String,
    pub output: String,
    #[serde(default)]
    pub remove_parts: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    pub scan_paths: Vec<String>,
    /// Informational only; detection is always exact digest matching.
    #[serde(default)]
    pub detection_method: String,
    #[serde(default)]
    pub options: ScanRequestOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequestOptions {
    pub similarity_threshold: Option<f64>,
    pub include_hidden: bool,
    pub file_extensions: Vec<String>,
    pub algorithm: Option<Algorithm>,
    pub parallel: bool,
    pub workers: Option<usize>,
}

// Response records

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveReport {
    pub operation_id: String,
    pub archive_path: PathBuf,
    #[serde(rename = "original_size_bytes")]
    pub original_bytes: u64,
    #[serde(rename = "compressed_size_bytes")]
    pub compressed_bytes: u64,
    #[serde(rename = "compression_ratio")]
    pub ratio: f64,
    pub files_included: usize,
    #[serde(rename = "checksum")]
    pub digest: Digest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractReport {
    pub operation_id: String,
    pub extracted_files: Vec<PathBuf>,
    pub total_files: usize,
    #[serde(rename = "total_size_bytes")]
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecksumResult {
    pub file: String,
    pub checksum: Digest,
    pub algorithm: Algorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecksumList {
    pub results: Vec<ChecksumResult>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    pub operation_id: String,
    pub parts: Vec<PathBuf>,
    pub total_parts: usize,
    #[serde(rename = "chunk_size")]
    pub chunk_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub operation_id: String,
    #[serde(rename = "output_file")]
    pub output_path: PathBuf,
    pub merged_parts: usize,
    #[serde(rename = "total_size")]
    pub total_bytes: u64,
    #[serde(rename = "checksum")]
    pub digest: Digest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub checksum: Digest,
    pub last_modified: DateTime<Utc>,
}

impl DuplicateFile {
    pub fn new(entry: &FileEntry, digest: &Digest) -> Self {
        Self {
            path: entry.path.clone(),
            size_bytes: entry.size,
            checksum: digest.clone(),
            last_modified: entry.mod_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub group_id: String,
    pub similarity_score: f64,
    #[serde(skip)]
    pub digest: Digest,
    #[serde(rename = "files")]
    pub members: Vec<DuplicateFile>,
    #[serde(rename = "potential_savings_bytes")]
    pub potential_savings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    #[serde(rename = "duplicate_groups")]
    pub groups: Vec<DuplicateGroup>,
    pub total_duplicates: usize,
    pub total_savings_bytes: u64,
}
