use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::path::ext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Zip,
    Tar,
    /// Tar stream inside gzip.
    #[serde(alias = "tgz", alias = "tar.gz")]
    Gzip,
}

impl ArchiveFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Gzip => "gzip",
        }
    }

    /// Picks the reader for an existing archive from its extension.
    pub fn from_archive_path(path: &Path) -> Result<Self> {
        match ext(path).to_ascii_lowercase().as_str() {
            ".zip" => Ok(ArchiveFormat::Zip),
            ".tar" => Ok(ArchiveFormat::Tar),
            ".gz" | ".tgz" => Ok(ArchiveFormat::Gzip),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "gzip" | "tgz" | "tar.gz" => Ok(ArchiveFormat::Gzip),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

pub fn gzip_writer<W: Write>(inner: W) -> GzEncoder<W> {
    GzEncoder::new(inner, Compression::default())
}

pub fn gzip_reader<R: Read>(inner: R) -> GzDecoder<R> {
    GzDecoder::new(inner)
}
