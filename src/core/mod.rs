pub mod archiver;
pub mod extractor;
pub mod hasher;
pub mod scanner;
pub mod splitter;

use crate::types::ProgressFn;
use crate::utils::stream::CancelToken;
use crate::vfs::FileSystem;

/// Everything one engine invocation needs; nothing outlives the operation.
#[derive(Clone, Copy)]
pub struct OpContext<'a> {
    pub id: &'a str,
    pub fs: &'a dyn FileSystem,
    pub cancel: &'a CancelToken,
    pub progress: Option<&'a ProgressFn>,
}

impl<'a> OpContext<'a> {
    pub fn new(id: &'a str, fs: &'a dyn FileSystem, cancel: &'a CancelToken) -> Self {
        Self {
            id,
            fs,
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    pub fn report_progress(&self, current: usize, total: usize, msg: &str) {
        if let Some(progress) = self.progress {
            progress(current, total, msg);
        }
    }
}
