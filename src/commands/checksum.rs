use tracing::{info, warn};

use super::FileTools;
use crate::core::hasher::{digest_of_file, Digest};
use crate::error::{Error, Result};
use crate::types::{ChecksumList, ChecksumRequest, ChecksumResult};
use crate::utils::path::resolve;
use crate::utils::stream::CancelToken;

impl FileTools {
    /// Digests each listed file in request order. A file that cannot be
    /// read is reported with an empty checksum instead of failing the call.
    pub fn checksum(&self, req: &ChecksumRequest, cancel: &CancelToken) -> Result<ChecksumList> {
        let algorithm = req.algorithm;
        let total = req.files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file) in req.files.iter().enumerate() {
            cancel.check()?;
            if let Some(progress) = &self.progress {
                progress(index + 1, total, file);
            }

            let digest = match resolve(file)
                .and_then(|path| digest_of_file(self.fs(), &path, algorithm, cancel))
            {
                Ok(digest) => digest,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(file = %file, error = %e, "Reporting empty checksum");
                    Digest::unreadable(algorithm)
                }
            };

            results.push(ChecksumResult {
                file: file.clone(),
                checksum: digest,
                algorithm,
            });
        }

        info!(files = total, %algorithm, "Checksums computed");
        Ok(ChecksumList { results, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::Algorithm;
    use crate::vfs::MemFs;
    use std::sync::Arc;

    #[test]
    fn test_checksum_keeps_order_and_reports_unreadable() {
        let fs = MemFs::new();
        fs.write_file("/a", b"abc");
        fs.write_file("/locked", b"secret");
        fs.mark_unreadable("/locked");
        let tools = FileTools::new(Arc::new(fs));

        let req = ChecksumRequest {
            files: vec!["/a".into(), "/missing".into(), "/locked".into(), "".into()],
            algorithm: Algorithm::Md5,
        };
        let list = tools.checksum(&req, &CancelToken::new()).unwrap();

        assert_eq!(list.total, 4);
        assert_eq!(list.results[0].file, "/a");
        assert_eq!(list.results[0].checksum.hex, "900150983cd24fb0d6963f7d28e17f72");
        for result in &list.results[1..] {
            assert!(result.checksum.is_empty());
            assert_eq!(result.algorithm, Algorithm::Md5);
        }
    }

    #[test]
    fn test_checksum_default_algorithm_is_sha256() {
        let req: ChecksumRequest = serde_json::from_str(r#"{"files": ["/a"]}"#).unwrap();
        assert_eq!(req.algorithm, Algorithm::Sha256);
    }
}
