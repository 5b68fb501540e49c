//! Archive, checksum, split/merge and duplicate-scan operations over a
//! pluggable filesystem.
//!
//! [`FileTools`] is the entry point: build one over [`OsFs`] (or [`MemFs`]
//! in tests) and call one method per request record.

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod types;
pub mod utils;
pub mod vfs;

pub use commands::FileTools;
pub use crate::core::hasher::{Algorithm, Digest};
pub use error::{Error, Result};
pub use utils::compression::ArchiveFormat;
pub use utils::stream::CancelToken;
pub use vfs::{FileSystem, MemFs, OsFs};
