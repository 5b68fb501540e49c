use super::{new_operation_id, FileTools};
use crate::core::extractor;
use crate::error::Result;
use crate::types::{ExtractReport, ExtractRequest};
use crate::utils::path::resolve;
use crate::utils::stream::CancelToken;

impl FileTools {
    pub fn extract(&self, req: &ExtractRequest, cancel: &CancelToken) -> Result<ExtractReport> {
        let archive = resolve(&req.archive_path)?;
        let destination = resolve(&req.destination_path)?;

        let id = new_operation_id();
        extractor::extract(&self.context(&id, cancel), &archive, &destination)
    }
}
