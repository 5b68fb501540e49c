use super::{new_operation_id, FileTools};
use crate::core::splitter;
use crate::error::Result;
use crate::types::{MergeReport, MergeRequest};
use crate::utils::path::resolve;
use crate::utils::stream::CancelToken;

impl FileTools {
    pub fn merge(&self, req: &MergeRequest, cancel: &CancelToken) -> Result<MergeReport> {
        let output = resolve(&req.output)?;

        let id = new_operation_id();
        splitter::merge(
            &self.context(&id, cancel),
            &req.pattern,
            &output,
            req.remove_parts,
        )
    }
}
