use std::io::{Read, Write};
use std::path::{Component, Path};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::OpContext;
use crate::error::{Error, Result};
use crate::types::ExtractReport;
use crate::utils::compression::{gzip_reader, ArchiveFormat};
use crate::utils::fs::format_bytes;
use crate::utils::path::safe_join;
use crate::utils::stream::copy_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

/// Unpacks `archive` into `destination`, picking the reader from the
/// archive's extension. Entries are processed in archive order; an entry
/// that cannot be written is skipped and the rest still extract.
pub fn extract(ctx: &OpContext, archive: &Path, destination: &Path) -> Result<ExtractReport> {
    let format = ArchiveFormat::from_archive_path(archive)?;
    ctx.cancel.check()?;

    info!(
        operation_id = ctx.id,
        archive = %archive.display(),
        destination = %destination.display(),
        %format,
        "Extracting archive"
    );

    let source = ctx.fs.open(archive).map_err(|e| Error::read(archive, e))?;
    let mut report = ExtractReport {
        operation_id: ctx.id.to_string(),
        extracted_files: Vec::new(),
        total_files: 0,
        total_bytes: 0,
    };

    match format {
        ArchiveFormat::Zip => {
            let mut zip = ZipArchive::new(source)
                .map_err(|e| Error::NotReadable(format!("{}: {}", archive.display(), e)))?;
            let total = zip.len();

            for index in 0..total {
                ctx.cancel.check()?;
                let mut file = match zip.by_index(index) {
                    Ok(file) => file,
                    Err(e) => {
                        warn!(index, error = %e, "Skipping unreadable zip entry");
                        continue;
                    }
                };
                let name = file.name().to_string();
                let kind = if file.is_dir() {
                    EntryKind::Dir
                } else if file.is_file() {
                    EntryKind::File
                } else {
                    EntryKind::Other
                };
                let mode = file.unix_mode();
                ctx.report_progress(index + 1, total, &name);
                unpack_entry(ctx, destination, &name, kind, mode, &mut file, &mut report)?;
            }
        }
        ArchiveFormat::Tar => unpack_tar(ctx, tar::Archive::new(source), destination, &mut report)?,
        ArchiveFormat::Gzip => unpack_tar(
            ctx,
            tar::Archive::new(gzip_reader(source)),
            destination,
            &mut report,
        )?,
    }

    report.total_files = report.extracted_files.len();
    info!(
        operation_id = ctx.id,
        files = report.total_files,
        size = %format_bytes(report.total_bytes),
        "Extraction complete"
    );
    Ok(report)
}

fn unpack_tar<R: Read>(
    ctx: &OpContext,
    mut archive: tar::Archive<R>,
    destination: &Path,
    report: &mut ExtractReport,
) -> Result<()> {
    let entries = archive
        .entries()
        .map_err(|e| Error::NotReadable(format!("tar stream: {}", e)))?;

    for (index, entry) in entries.enumerate() {
        ctx.cancel.check()?;
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Past a corrupt header the stream has no reliable framing.
                warn!(index, error = %e, "Stopping at unreadable tar entry");
                break;
            }
        };

        let name = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(index, error = %e, "Skipping tar entry with invalid name");
                continue;
            }
        };
        let header = entry.header();
        let entry_type = header.entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Dir
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let mode = header.mode().ok();

        ctx.report_progress(index + 1, index + 1, &name);
        unpack_entry(ctx, destination, &name, kind, mode, &mut entry, report)?;
    }

    Ok(())
}

/// Writes one entry below `destination`. Only cancellation is returned as
/// an error; every other failure skips the entry.
fn unpack_entry<R: Read + ?Sized>(
    ctx: &OpContext,
    destination: &Path,
    name: &str,
    kind: EntryKind,
    mode: Option<u32>,
    reader: &mut R,
    report: &mut ExtractReport,
) -> Result<()> {
    let Some(target) = safe_join(destination, name) else {
        if names_destination(name) {
            debug!(entry = name, "Skipping entry naming the destination itself");
        } else {
            warn!(entry = name, "Skipping entry that resolves outside the destination");
        }
        return Ok(());
    };

    match kind {
        EntryKind::Other => {
            debug!(entry = name, "Skipping entry that is neither file nor directory");
        }
        EntryKind::Dir => {
            if let Err(e) = ctx.fs.mkdir_all(&target, mode.unwrap_or(0o755)) {
                warn!(entry = name, error = %e, "Skipping directory entry");
            }
        }
        EntryKind::File => {
            if let Some(parent) = target.parent() {
                if let Err(e) = ctx.fs.mkdir_all(parent, 0o755) {
                    warn!(entry = name, error = %e, "Skipping entry whose parent cannot be created");
                    return Ok(());
                }
            }

            let mut out = match ctx.fs.create(&target) {
                Ok(out) => out,
                Err(e) => {
                    warn!(entry = name, error = %e, "Skipping entry that cannot be created");
                    return Ok(());
                }
            };

            let written = match copy_all(reader, &mut out, ctx.cancel) {
                Ok(n) => n,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(entry = name, error = %e, "Skipping entry that failed to copy");
                    return Ok(());
                }
            };
            if let Err(e) = out.flush() {
                warn!(entry = name, error = %e, "Skipping entry that failed to flush");
                return Ok(());
            }

            debug!(entry = name, bytes = written, "Extracted entry");
            report.extracted_files.push(target);
            report.total_bytes += written;
        }
    }

    Ok(())
}

/// True for names like `.`, `./` or `a/..` that stay inside the root but
/// point at the root itself.
fn names_destination(name: &str) -> bool {
    let mut depth: usize = 0;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::stream::CancelToken;
    use crate::vfs::{FileSystem, MemFs};
    use std::io::Cursor;
    use std::path::PathBuf;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            // append_data refuses `..`; write the raw name for traversal cases
            let raw = header.as_old_mut();
            raw.name[..name.len()].copy_from_slice(name.as_bytes());
            header.set_cksum();
            builder.append(&header, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_unsupported_extension_creates_nothing() {
        let fs = MemFs::new();
        fs.write_file("/x.7z", b"7z");
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);
        let err = extract(&ctx, Path::new("/x.7z"), Path::new("/dest")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(!fs.exists("/dest"));
    }

    #[test]
    fn test_missing_archive() {
        let fs = MemFs::new();
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);
        let err = extract(&ctx, Path::new("/none.zip"), Path::new("/dest")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_zip_extract_in_order_with_parents() {
        let fs = MemFs::new();
        fs.write_file(
            "/a.zip",
            &zip_bytes(&[("docs/", b""), ("docs/x.txt", b"xx"), ("nested/deep/y.txt", b"yyy")]),
        );
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);

        let report = extract(&ctx, Path::new("/a.zip"), Path::new("/dest")).unwrap();
        assert_eq!(
            report.extracted_files,
            vec![
                PathBuf::from("/dest/docs/x.txt"),
                PathBuf::from("/dest/nested/deep/y.txt"),
            ]
        );
        assert_eq!(report.total_files, 2);
        assert_eq!(report.total_bytes, 5);
        assert_eq!(fs.read_file("/dest/nested/deep/y.txt").unwrap(), b"yyy");
        assert!(fs.stat(Path::new("/dest/docs")).unwrap().is_dir);
    }

    #[test]
    fn test_tar_rejects_traversal_and_continues() {
        let fs = MemFs::new();
        fs.write_file(
            "/a.tar",
            &tar_bytes(&[("../evil.txt", b"bad"), ("good.txt", b"ok")]),
        );
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);

        let report = extract(&ctx, Path::new("/a.tar"), Path::new("/dest")).unwrap();
        assert_eq!(report.extracted_files, vec![PathBuf::from("/dest/good.txt")]);
        assert!(!fs.exists("/evil.txt"));
    }

    #[test]
    fn test_gzip_extract_uppercase_extension() {
        let fs = MemFs::new();
        let mut encoder = crate::utils::compression::gzip_writer(Vec::new());
        encoder.write_all(&tar_bytes(&[("a.txt", b"hello")])).unwrap();
        fs.write_file("/A.TGZ", &encoder.finish().unwrap());
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);

        let report = extract(&ctx, Path::new("/A.TGZ"), Path::new("/dest")).unwrap();
        assert_eq!(report.total_bytes, 5);
        assert_eq!(fs.read_file("/dest/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_entry_that_cannot_be_created_is_skipped() {
        let fs = MemFs::new();
        // a file sits where the entry's parent directory should be
        fs.write_file("/dest/blocked", b"file");
        fs.write_file(
            "/a.zip",
            &zip_bytes(&[("blocked/x.txt", b"x"), ("free.txt", b"f")]),
        );
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);

        let report = extract(&ctx, Path::new("/a.zip"), Path::new("/dest")).unwrap();
        assert_eq!(report.extracted_files, vec![PathBuf::from("/dest/free.txt")]);
    }

    #[test]
    fn test_names_destination() {
        for name in [".", "./", "a/..", "./a/../"] {
            assert!(names_destination(name), "{name}");
        }
        for name in ["../", "/", "../a", "a", "a/../../b"] {
            assert!(!names_destination(name), "{name}");
        }
    }

    #[test]
    fn test_current_dir_entry_is_skipped_quietly() {
        let fs = MemFs::new();
        fs.write_file("/a.zip", &zip_bytes(&[("./", b""), ("x.txt", b"x")]));
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);

        let report = extract(&ctx, Path::new("/a.zip"), Path::new("/dest")).unwrap();
        assert_eq!(report.extracted_files, vec![PathBuf::from("/dest/x.txt")]);
    }

    #[test]
    fn test_corrupt_zip_is_not_readable() {
        let fs = MemFs::new();
        fs.write_file("/bad.zip", b"definitely not a zip");
        let cancel = CancelToken::new();
        let ctx = OpContext::new("op", &fs, &cancel);
        let err = extract(&ctx, Path::new("/bad.zip"), Path::new("/dest")).unwrap_err();
        assert!(matches!(err, Error::NotReadable(_)));
    }
}
