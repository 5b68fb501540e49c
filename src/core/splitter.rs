use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::hasher::{Algorithm, DigestWriter};
use super::OpContext;
use crate::error::{Error, Result};
use crate::types::{MergeReport, SplitReport};
use crate::utils::fs::format_bytes;
use crate::utils::path::{clean, expand_glob};
use crate::utils::stream::{copy_all, copy_bounded, FanOut};

const DEFAULT_WIDTH: usize = 3;

/// Part name template holding exactly one index placeholder: `%d`
/// (three digits), `%0Nd` or a literal `%%`. Widened as needed so every
/// part of one split has the same number of digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    prefix: String,
    width: usize,
    suffix: String,
}

impl NamePattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |why: &str| Error::InvalidArgument(format!("name pattern {:?}: {}", pattern, why));

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut width = None;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if width.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }

            match chars.next() {
                Some('%') => out.push('%'),
                Some('d') => {
                    if width.is_some() {
                        return Err(invalid("more than one placeholder"));
                    }
                    width = Some(DEFAULT_WIDTH);
                }
                Some('0') => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        chars.next();
                    }
                    if chars.next() != Some('d') || digits.is_empty() {
                        return Err(invalid("expected %0Nd"));
                    }
                    if width.is_some() {
                        return Err(invalid("more than one placeholder"));
                    }
                    let n: usize = digits.parse().map_err(|_| invalid("width out of range"))?;
                    if n == 0 || n > 20 {
                        return Err(invalid("width out of range"));
                    }
                    width = Some(n);
                }
                _ => return Err(invalid("unsupported directive")),
            }
        }

        let width = width.ok_or_else(|| invalid("missing numeric placeholder"))?;
        Ok(Self {
            prefix,
            width,
            suffix,
        })
    }

    pub fn for_source(source: &Path) -> Self {
        Self {
            prefix: format!("{}.part.", source.display()),
            width: DEFAULT_WIDTH,
            suffix: String::new(),
        }
    }

    fn widen_for(&mut self, parts: u32) {
        self.width = self.width.max(parts.to_string().len());
    }

    pub fn render(&self, index: u32) -> PathBuf {
        PathBuf::from(format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.suffix,
            width = self.width
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitParams {
    pub chunk_bytes: u64,
    pub parts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub source: PathBuf,
    pub chunk_bytes: u64,
    pub parts: u32,
    pub pattern: NamePattern,
    last_takes_rest: bool,
}

pub fn plan_split(
    source: &Path,
    source_size: u64,
    params: SplitParams,
    mut pattern: NamePattern,
) -> Result<SplitPlan> {
    let (chunk_bytes, parts, last_takes_rest) = if params.chunk_bytes > 0 {
        let parts = source_size.div_ceil(params.chunk_bytes).max(1);
        let parts = u32::try_from(parts).map_err(|_| {
            Error::InvalidArgument(format!(
                "chunk size {} yields too many parts for {} bytes",
                params.chunk_bytes, source_size
            ))
        })?;
        (params.chunk_bytes, parts, false)
    } else if params.parts > 0 {
        let chunk = (source_size / u64::from(params.parts)).max(1);
        (chunk, params.parts, true)
    } else {
        return Err(Error::InvalidArgument(
            "either a positive size or a positive part count is required".to_string(),
        ));
    };

    // Equal-width indices keep byte order equal to part order for merge.
    pattern.widen_for(parts);

    Ok(SplitPlan {
        source: source.to_path_buf(),
        chunk_bytes,
        parts,
        pattern,
        last_takes_rest,
    })
}

pub fn split(
    ctx: &OpContext,
    source: &Path,
    params: SplitParams,
    name_pattern: Option<&str>,
) -> Result<SplitReport> {
    ctx.cancel.check()?;
    let pattern = match name_pattern {
        Some(p) => NamePattern::parse(p)?,
        None => NamePattern::for_source(source),
    };

    let meta = ctx.fs.stat(source).map_err(|e| Error::read(source, e))?;
    if meta.is_dir {
        return Err(Error::InvalidArgument(format!(
            "{}: is a directory",
            source.display()
        )));
    }
    let plan = plan_split(source, meta.size, params, pattern)?;
    let source_clean = clean(source);
    for index in 1..=plan.parts {
        if clean(&plan.pattern.render(index)) == source_clean {
            return Err(Error::InvalidArgument(format!(
                "part {} would overwrite the source {}",
                index,
                source.display()
            )));
        }
    }

    info!(
        operation_id = ctx.id,
        source = %source.display(),
        size = %format_bytes(meta.size),
        parts = plan.parts,
        chunk_bytes = plan.chunk_bytes,
        "Splitting file"
    );

    let mut input = ctx.fs.open(source).map_err(|e| Error::read(source, e))?;
    let mut parts = Vec::with_capacity(plan.parts.min(1024) as usize);

    for index in 1..=plan.parts {
        let part_path = clean(&plan.pattern.render(index));
        let mut out = ctx
            .fs
            .create(&part_path)
            .map_err(|e| Error::write(&part_path, e))?;

        let written = if index == plan.parts && plan.last_takes_rest {
            copy_all(&mut input, &mut out, ctx.cancel)?
        } else {
            copy_bounded(&mut input, &mut out, plan.chunk_bytes, ctx.cancel)?
        };
        out.flush().map_err(|e| Error::write(&part_path, e))?;

        ctx.report_progress(index as usize, plan.parts as usize, &part_path.to_string_lossy());
        if written == 0 {
            debug!(part = %part_path.display(), "Created empty part");
            continue;
        }
        debug!(part = %part_path.display(), bytes = written, "Wrote part");
        parts.push(part_path);
    }

    info!(operation_id = ctx.id, parts = parts.len(), "Split complete");
    Ok(SplitReport {
        operation_id: ctx.id.to_string(),
        total_parts: parts.len(),
        parts,
        chunk_bytes: plan.chunk_bytes,
    })
}

pub fn merge(
    ctx: &OpContext,
    pattern: &str,
    output: &Path,
    remove_parts: bool,
) -> Result<MergeReport> {
    ctx.cancel.check()?;
    let output = clean(output);

    let inputs: Vec<PathBuf> = expand_glob(ctx.fs, pattern)?
        .into_iter()
        .filter(|p| clean(p) != output)
        .filter(|p| !ctx.fs.stat(p).map(|m| m.is_dir).unwrap_or(false))
        .collect();
    if inputs.is_empty() {
        return Err(Error::NotFound(format!("no parts match {:?}", pattern)));
    }

    info!(
        operation_id = ctx.id,
        pattern,
        parts = inputs.len(),
        output = %output.display(),
        "Merging parts"
    );

    let file = ctx
        .fs
        .create(&output)
        .map_err(|e| Error::write(&output, e))?;
    let mut sink = FanOut::new(file, DigestWriter::new(Algorithm::Sha256));
    let mut total_bytes = 0u64;

    for (i, part) in inputs.iter().enumerate() {
        let mut reader = ctx.fs.open(part).map_err(|e| Error::read(part, e))?;
        total_bytes += copy_all(&mut reader, &mut sink, ctx.cancel)?;
        ctx.report_progress(i + 1, inputs.len(), &part.to_string_lossy());
    }
    sink.flush().map_err(|e| Error::write(&output, e))?;
    let (file, hasher) = sink.into_inner();
    drop(file);
    let digest = hasher.finish();

    if remove_parts {
        for part in &inputs {
            if let Err(e) = ctx.fs.remove(part) {
                warn!(part = %part.display(), error = %e, "Failed to remove merged part");
            }
        }
    }

    info!(
        operation_id = ctx.id,
        size = %format_bytes(total_bytes),
        %digest,
        "Merge complete"
    );
    Ok(MergeReport {
        operation_id: ctx.id.to_string(),
        output_path: output,
        merged_parts: inputs.len(),
        total_bytes,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::hash_buffer;
    use crate::utils::stream::CancelToken;
    use crate::vfs::MemFs;

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_f491;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    fn run_split(fs: &MemFs, source: &str, params: SplitParams, pattern: Option<&str>) -> Result<SplitReport> {
        let cancel = CancelToken::new();
        let ctx = OpContext::new("split", fs, &cancel);
        split(&ctx, Path::new(source), params, pattern)
    }

    fn run_merge(fs: &MemFs, pattern: &str, output: &str, remove: bool) -> Result<MergeReport> {
        let cancel = CancelToken::new();
        let ctx = OpContext::new("merge", fs, &cancel);
        merge(&ctx, pattern, Path::new(output), remove)
    }

    #[test]
    fn test_pattern_parse() {
        let p = NamePattern::parse("/out/chunk-%d.bin").unwrap();
        assert_eq!(p.render(7), PathBuf::from("/out/chunk-007.bin"));

        let p = NamePattern::parse("/out/%05d").unwrap();
        assert_eq!(p.render(42), PathBuf::from("/out/00042"));

        let p = NamePattern::parse("/out/100%%-%03d").unwrap();
        assert_eq!(p.render(1), PathBuf::from("/out/100%-001"));

        for bad in ["/out/none", "/out/%d-%d", "/out/%s", "/out/%0d", "/out/%3d", "/out/%"] {
            assert!(
                matches!(NamePattern::parse(bad), Err(Error::InvalidArgument(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_pattern_escapes_percent() {
        let p = NamePattern::for_source(Path::new("/d/50%.bin"));
        assert_eq!(p.render(2), PathBuf::from("/d/50%.bin.part.002"));
    }

    #[test]
    fn test_split_three_parts_then_merge() {
        let fs = MemFs::new();
        let data = pseudo_random(1_000_000);
        fs.write_file("/d/X", &data);

        let report = run_split(&fs, "/d/X", SplitParams { chunk_bytes: 0, parts: 3 }, None).unwrap();
        assert_eq!(
            report.parts,
            vec![
                PathBuf::from("/d/X.part.001"),
                PathBuf::from("/d/X.part.002"),
                PathBuf::from("/d/X.part.003"),
            ]
        );
        assert_eq!(report.total_parts, 3);
        assert_eq!(report.chunk_bytes, 333_333);
        assert_eq!(fs.read_file("/d/X.part.001").unwrap().len(), 333_333);
        assert_eq!(fs.read_file("/d/X.part.002").unwrap().len(), 333_333);
        assert_eq!(fs.read_file("/d/X.part.003").unwrap().len(), 333_334);

        let merged = run_merge(&fs, "/d/X.part.*", "/d/Y", false).unwrap();
        assert_eq!(merged.merged_parts, 3);
        assert_eq!(merged.total_bytes, 1_000_000);
        assert_eq!(merged.digest, hash_buffer(&data, Algorithm::Sha256));
        assert_eq!(fs.read_file("/d/Y").unwrap(), data);
    }

    #[test]
    fn test_single_part_and_oversized_chunk() {
        let fs = MemFs::new();
        fs.write_file("/f", b"abcdef");

        let report = run_split(&fs, "/f", SplitParams { chunk_bytes: 0, parts: 1 }, None).unwrap();
        assert_eq!(report.parts, vec![PathBuf::from("/f.part.001")]);
        assert_eq!(fs.read_file("/f.part.001").unwrap(), b"abcdef");

        let report =
            run_split(&fs, "/f", SplitParams { chunk_bytes: 100, parts: 9 }, Some("/c%d")).unwrap();
        assert_eq!(report.parts, vec![PathBuf::from("/c001")]);
        assert_eq!(report.chunk_bytes, 100);
        assert_eq!(fs.read_file("/c001").unwrap(), b"abcdef");
    }

    #[test]
    fn test_chunk_mode_sizes() {
        let fs = MemFs::new();
        fs.write_file("/f", &pseudo_random(10));

        let report = run_split(&fs, "/f", SplitParams { chunk_bytes: 4, parts: 0 }, None).unwrap();
        assert_eq!(report.total_parts, 3);
        let sizes: Vec<usize> = report
            .parts
            .iter()
            .map(|p| fs.read_file(p).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_zero_byte_parts_created_but_not_reported() {
        let fs = MemFs::new();
        fs.write_file("/f", b"ab");

        let report = run_split(&fs, "/f", SplitParams { chunk_bytes: 0, parts: 3 }, None).unwrap();
        assert_eq!(
            report.parts,
            vec![PathBuf::from("/f.part.001"), PathBuf::from("/f.part.002")]
        );
        assert_eq!(report.total_parts, 2);
        assert_eq!(fs.read_file("/f.part.003").unwrap(), b"");
    }

    #[test]
    fn test_split_argument_errors() {
        let fs = MemFs::new();
        fs.write_file("/f", b"abc");

        let err = run_split(&fs, "/f", SplitParams::default(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = run_split(&fs, "/f", SplitParams { chunk_bytes: 1, parts: 0 }, Some("/p")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!fs.exists("/p"));

        let err = run_split(&fs, "/missing", SplitParams { chunk_bytes: 1, parts: 0 }, None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_too_many_parts() {
        let err = plan_split(
            Path::new("/f"),
            u64::MAX,
            SplitParams { chunk_bytes: 1, parts: 0 },
            NamePattern::for_source(Path::new("/f")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_many_parts_merge_in_order() {
        let fs = MemFs::new();
        let data = pseudo_random(1001);
        fs.write_file("/f", &data);

        let report = run_split(&fs, "/f", SplitParams { chunk_bytes: 1, parts: 0 }, None).unwrap();
        assert_eq!(report.total_parts, 1001);
        assert_eq!(report.parts[0], PathBuf::from("/f.part.0001"));
        assert_eq!(report.parts[1000], PathBuf::from("/f.part.1001"));

        let merged = run_merge(&fs, "/f.part.*", "/g", false).unwrap();
        assert_eq!(merged.merged_parts, 1001);
        assert_eq!(fs.read_file("/g").unwrap(), data);
        assert_eq!(merged.digest, hash_buffer(&data, Algorithm::Sha256));
    }

    #[test]
    fn test_explicit_width_is_a_minimum() {
        let fs = MemFs::new();
        fs.write_file("/f", &pseudo_random(12));

        let report =
            run_split(&fs, "/f", SplitParams { chunk_bytes: 1, parts: 0 }, Some("/p-%01d")).unwrap();
        assert_eq!(report.parts[0], PathBuf::from("/p-01"));
        assert_eq!(report.parts[11], PathBuf::from("/p-12"));
    }

    #[test]
    fn test_part_name_matching_source_is_rejected() {
        let fs = MemFs::new();
        fs.write_file("/d/x.001", b"abcdef");

        let err = run_split(
            &fs,
            "/d/x.001",
            SplitParams { chunk_bytes: 2, parts: 0 },
            Some("/d/./x.%03d"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(fs.read_file("/d/x.001").unwrap(), b"abcdef");
        assert!(!fs.exists("/d/x.002"));
    }

    #[test]
    fn test_merge_without_matches() {
        let fs = MemFs::new();
        let err = run_merge(&fs, "/d/nothing.*", "/d/out", false).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!fs.exists("/d/out"));
    }

    #[test]
    fn test_merge_excludes_output_and_removes_parts() {
        let fs = MemFs::new();
        fs.write_file("/d/p.1", b"one-");
        fs.write_file("/d/p.2", b"two");
        fs.write_file("/d/p.all", b"stale");

        let report = run_merge(&fs, "/d/p.*", "/d/p.all", true).unwrap();
        assert_eq!(report.merged_parts, 2);
        assert_eq!(report.total_bytes, 7);
        assert_eq!(fs.read_file("/d/p.all").unwrap(), b"one-two");
        assert!(!fs.exists("/d/p.1"));
        assert!(!fs.exists("/d/p.2"));
    }

    #[test]
    fn test_cancelled_merge() {
        let fs = MemFs::new();
        fs.write_file("/d/p.1", b"x");
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = OpContext::new("merge", &fs, &cancel);
        let err = merge(&ctx, "/d/p.*", Path::new("/d/out"), false).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
