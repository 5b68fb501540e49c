use tracing::debug;

use super::{new_operation_id, FileTools};
use crate::core::archiver;
use crate::error::Result;
use crate::types::{ArchivePlan, ArchiveReport, CompressRequest};
use crate::utils::path::resolve;
use crate::utils::stream::CancelToken;

impl FileTools {
    pub fn compress(&self, req: &CompressRequest, cancel: &CancelToken) -> Result<ArchiveReport> {
        let plan = ArchivePlan {
            format: req.archive_format,
            destination: resolve(&req.output_path)?,
            members: req
                .files
                .iter()
                .map(|f| resolve(f))
                .collect::<Result<_>>()?,
        };
        if req.compression_level != 0 {
            debug!(
                level = req.compression_level,
                "Ignoring compression level; the default level is used"
            );
        }

        let id = new_operation_id();
        archiver::compress(&self.context(&id, cancel), &plan)
    }
}
