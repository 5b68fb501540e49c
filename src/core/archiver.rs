//! Archive creation for zip, tar and gzipped tar.
//!
//! Members are written in the order given, each under its basename. Members
//! that cannot be stat'd or opened are skipped; directories count toward
//! the original size but get no entry.

use flate2::write::GzEncoder;
use std::io::{self, Read, Write};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::hasher::{digest_of_file, Algorithm};
use super::OpContext;
use crate::error::{Error, Result};
use crate::types::{ArchivePlan, ArchiveReport, FileEntry};
use crate::utils::compression::{gzip_writer, ArchiveFormat};
use crate::utils::fs::{format_bytes, size_ratio};
use crate::utils::path::{base, clean};
use crate::utils::stream::{copy_all, CancelToken};
use crate::vfs::WriteSeek;

enum EntryOutcome {
    Written(u64),
    Skipped(String),
}

trait ArchiveWriter {
    fn write_entry(
        &mut self,
        name: &str,
        meta: &FileEntry,
        source: &mut dyn Read,
        cancel: &CancelToken,
    ) -> Result<EntryOutcome>;

    /// Finishes the container and closes every layer, innermost first.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A byte sink that can be finalized after the last write.
trait Sink: Write {
    fn close(self) -> io::Result<()>;
}

impl Sink for Box<dyn WriteSeek> {
    fn close(mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<W: Sink> Sink for GzEncoder<W> {
    fn close(self) -> io::Result<()> {
        self.finish()?.close()
    }
}

struct ZipEntries {
    zip: ZipWriter<Box<dyn WriteSeek>>,
}

impl ArchiveWriter for ZipEntries {
    fn write_entry(
        &mut self,
        name: &str,
        meta: &FileEntry,
        source: &mut dyn Read,
        cancel: &CancelToken,
    ) -> Result<EntryOutcome> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(meta.mode & 0o7777)
            .large_file(meta.size >= u32::MAX as u64);

        self.zip
            .start_file(name, options)
            .map_err(|e| Error::WriteFailed(format!("zip entry {}: {}", name, e)))?;

        match copy_all(source, &mut self.zip, cancel) {
            Ok(n) => Ok(EntryOutcome::Written(n)),
            Err(Error::NotReadable(msg)) => {
                self.zip
                    .abort_file()
                    .map_err(|e| Error::WriteFailed(format!("zip entry {}: {}", name, e)))?;
                Ok(EntryOutcome::Skipped(msg))
            }
            Err(e) => Err(e),
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        let file = self
            .zip
            .finish()
            .map_err(|e| Error::WriteFailed(format!("zip trailer: {}", e)))?;
        file.close()
            .map_err(|e| Error::WriteFailed(format!("archive close: {}", e)))
    }
}

/// Reader adapter that checks cancellation per read, counts bytes and
/// remembers whether a failure came from the source rather than the sink.
struct TrackedReader<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    cancel: &'a CancelToken,
    read: u64,
    failure: Option<String>,
}

impl<R: Read + ?Sized> Read for TrackedReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("cancelled"));
        }
        match self.inner.read(buf) {
            Ok(n) => {
                self.read += n as u64;
                Ok(n)
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::Interrupted {
                    self.failure = Some(e.to_string());
                }
                Err(e)
            }
        }
    }
}

struct TarEntries<W: Sink> {
    builder: tar::Builder<W>,
}

impl<W: Sink> ArchiveWriter for TarEntries<W> {
    fn write_entry(
        &mut self,
        name: &str,
        meta: &FileEntry,
        source: &mut dyn Read,
        cancel: &CancelToken,
    ) -> Result<EntryOutcome> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(meta.size);
        header.set_mode(meta.mode & 0o7777);
        header.set_mtime(meta.mod_time.timestamp().max(0) as u64);

        let mut reader = TrackedReader {
            inner: source,
            cancel,
            read: 0,
            failure: None,
        };
        let result = self
            .builder
            .append_data(&mut header, name, (&mut reader).take(meta.size));

        match result {
            // The header promised meta.size bytes; a short or growing source
            // leaves an entry that no longer matches the file.
            Ok(()) if reader.read != meta.size => Err(Error::NotReadable(format!(
                "{}: expected {} bytes, read {}",
                name, meta.size, reader.read
            ))),
            Ok(()) => {
                let mut extra = [0u8; 1];
                match reader.inner.read(&mut extra) {
                    Ok(0) => Ok(EntryOutcome::Written(reader.read)),
                    Ok(_) => Err(Error::NotReadable(format!(
                        "{}: grew past {} bytes while archiving",
                        name, meta.size
                    ))),
                    Err(e) => Err(Error::NotReadable(format!("{}: {}", name, e))),
                }
            }
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            // The tar stream cannot be rewound past a half-written entry.
            Err(e) => match reader.failure {
                Some(msg) => Err(Error::NotReadable(format!("{}: {}", name, msg))),
                None => Err(Error::WriteFailed(format!("tar entry {}: {}", name, e))),
            },
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        let sink = self
            .builder
            .into_inner()
            .map_err(|e| Error::WriteFailed(format!("tar trailer: {}", e)))?;
        sink.close()
            .map_err(|e| Error::WriteFailed(format!("archive close: {}", e)))
    }
}

fn open_writer(format: ArchiveFormat, file: Box<dyn WriteSeek>) -> Box<dyn ArchiveWriter> {
    match format {
        ArchiveFormat::Zip => Box::new(ZipEntries {
            zip: ZipWriter::new(file),
        }),
        ArchiveFormat::Tar => Box::new(TarEntries {
            builder: tar::Builder::new(file),
        }),
        ArchiveFormat::Gzip => Box::new(TarEntries {
            builder: tar::Builder::new(gzip_writer(file)),
        }),
    }
}

pub fn compress(ctx: &OpContext, plan: &ArchivePlan) -> Result<ArchiveReport> {
    ctx.cancel.check()?;
    info!(
        operation_id = ctx.id,
        format = %plan.format,
        destination = %plan.destination.display(),
        members = plan.members.len(),
        "Creating archive"
    );

    let destination = clean(&plan.destination);
    let file = ctx
        .fs
        .create(&destination)
        .map_err(|e| Error::write(&destination, e))?;
    let mut writer = open_writer(plan.format, file);

    let mut original_bytes: u64 = 0;
    let mut files_included: usize = 0;
    let total = plan.members.len();

    for (index, member) in plan.members.iter().enumerate() {
        ctx.cancel.check()?;
        ctx.report_progress(index + 1, total, &member.to_string_lossy());

        if clean(member) == destination {
            warn!(member = %member.display(), "Skipping archive destination listed as a member");
            continue;
        }

        let meta = match ctx.fs.stat(member) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(member = %member.display(), error = %e, "Skipping member that cannot be stat'd");
                continue;
            }
        };

        if meta.is_dir {
            original_bytes += meta.size;
            debug!(member = %member.display(), "Directory member counted for size only");
            continue;
        }

        let mut source = match ctx.fs.open(member) {
            Ok(source) => source,
            Err(e) => {
                warn!(member = %member.display(), error = %e, "Skipping member that cannot be opened");
                continue;
            }
        };

        let name = base(member);
        match writer.write_entry(&name, &meta, &mut source, ctx.cancel)? {
            EntryOutcome::Written(n) => {
                debug!(entry = %name, bytes = n, "Added archive entry");
                original_bytes += n;
                files_included += 1;
            }
            EntryOutcome::Skipped(reason) => {
                warn!(member = %member.display(), error = %reason, "Skipping member that failed mid-read");
            }
        }
    }

    writer.close()?;

    let compressed_bytes = ctx
        .fs
        .stat(&destination)
        .map_err(|e| Error::read(&destination, e))?
        .size;
    let digest = digest_of_file(ctx.fs, &destination, Algorithm::Sha256, ctx.cancel)?;
    let ratio = size_ratio(compressed_bytes, original_bytes);

    info!(
        operation_id = ctx.id,
        files_included,
        original = %format_bytes(original_bytes),
        compressed = %format_bytes(compressed_bytes),
        ratio,
        "Archive complete"
    );

    Ok(ArchiveReport {
        operation_id: ctx.id.to_string(),
        archive_path: destination,
        original_bytes,
        compressed_bytes,
        ratio,
        files_included,
        digest,
    })
}
