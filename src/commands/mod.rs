//! Operation façade: one method per request record.
//!
//! Each call gets a fresh operation id, resolves the request's paths and
//! hands off to the matching engine in [`crate::core`].

pub mod checksum;
pub mod compress;
pub mod extract;
pub mod merge;
pub mod scan;
pub mod split;

use std::sync::Arc;
use uuid::Uuid;

use crate::core::OpContext;
use crate::types::ProgressFn;
use crate::utils::stream::CancelToken;
use crate::vfs::{FileSystem, OsFs};

/// Entry point for every file operation, bound to one filesystem.
#[derive(Clone)]
pub struct FileTools {
    fs: Arc<dyn FileSystem>,
    scan_workers: Option<usize>,
    progress: Option<Arc<ProgressFn>>,
}

impl Default for FileTools {
    fn default() -> Self {
        Self::new(Arc::new(OsFs::new()))
    }
}

impl FileTools {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            scan_workers: None,
            progress: None,
        }
    }

    /// Pool size for parallel scans that don't name their own.
    pub fn with_scan_workers(mut self, workers: usize) -> Self {
        self.scan_workers = (workers > 0).then_some(workers);
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    fn context<'a>(&'a self, id: &'a str, cancel: &'a CancelToken) -> OpContext<'a> {
        OpContext::new(id, self.fs.as_ref(), cancel).with_progress(self.progress.as_deref())
    }
}

/// Lowercase canonical UUIDv4.
pub fn new_operation_id() -> String {
    Uuid::new_v4().to_string()
}
