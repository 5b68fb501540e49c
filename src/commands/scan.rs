use std::path::PathBuf;
use tracing::debug;

use super::{new_operation_id, FileTools};
use crate::core::scanner;
use crate::error::Result;
use crate::types::{ScanOptions, ScanReport, ScanRequest};
use crate::utils::path::resolve;
use crate::utils::stream::CancelToken;

impl FileTools {
    pub fn scan(&self, req: &ScanRequest, cancel: &CancelToken) -> Result<ScanReport> {
        let roots = req
            .scan_paths
            .iter()
            .map(|p| resolve(p))
            .collect::<Result<Vec<PathBuf>>>()?;

        let opts = &req.options;
        let options = ScanOptions {
            algorithm: opts.algorithm.unwrap_or_default(),
            include_hidden: opts.include_hidden,
            file_extensions: opts.file_extensions.clone(),
            parallel: opts.parallel,
            workers: opts.workers.filter(|&n| n > 0).or(self.scan_workers),
        };
        debug!(
            method = %req.detection_method,
            threshold = ?opts.similarity_threshold,
            "Exact digest matching is always used"
        );

        let id = new_operation_id();
        scanner::detect_duplicates(&self.context(&id, cancel), &roots, &options)
    }
}
