use super::{new_operation_id, FileTools};
use crate::core::splitter::{self, SplitParams};
use crate::error::Result;
use crate::types::{SplitReport, SplitRequest};
use crate::utils::path::resolve;
use crate::utils::stream::CancelToken;

impl FileTools {
    pub fn split(&self, req: &SplitRequest, cancel: &CancelToken) -> Result<SplitReport> {
        let source = resolve(&req.file)?;
        let params = SplitParams {
            chunk_bytes: req.size.unwrap_or(0),
            parts: req.parts.unwrap_or(0),
        };
        let pattern = req.output_pattern.as_deref().filter(|p| !p.is_empty());

        let id = new_operation_id();
        splitter::split(&self.context(&id, cancel), &source, params, pattern)
    }
}
