use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::sync::Arc;

use filetools::config::Settings;
use filetools::types::{
    ChecksumRequest, CompressRequest, ExtractRequest, MergeRequest, ScanRequest,
    ScanRequestOptions, SplitRequest,
};
use filetools::utils::progress::{create_progress_bar, progress_callback};
use filetools::{logging, Algorithm, ArchiveFormat, CancelToken, FileTools, OsFs};

#[derive(Parser)]
#[command(
    name = "filetools",
    version,
    about = "Archive, checksum, split/merge and find duplicate files"
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle files into a zip, tar or tar.gz archive
    Compress {
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(short = 'f', long, default_value = "zip")]
        format: ArchiveFormat,

        #[arg(short = 'o', long)]
        output: String,

        /// Accepted for compatibility; the default level is always used
        #[arg(short = 'l', long, default_value_t = 0)]
        level: i32,
    },

    /// Unpack an archive into a directory
    Extract {
        archive: String,

        #[arg(short = 'd', long)]
        destination: String,
    },

    /// Print the digest of each file
    Checksum {
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(short = 'a', long, default_value = "sha256")]
        algorithm: Algorithm,
    },

    /// Cut a file into numbered parts
    Split {
        file: String,

        /// Bytes per part; wins over --parts
        #[arg(short = 's', long)]
        size: Option<u64>,

        #[arg(short = 'n', long)]
        parts: Option<u32>,

        /// Part name template with one %d or %0Nd placeholder
        #[arg(short = 'p', long)]
        pattern: Option<String>,
    },

    /// Concatenate parts matching a glob back into one file
    Merge {
        pattern: String,

        #[arg(short = 'o', long)]
        output: String,

        #[arg(long)]
        remove_parts: bool,
    },

    /// Find files with identical content
    Scan {
        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(short = 'a', long)]
        algorithm: Option<Algorithm>,

        #[arg(long)]
        include_hidden: bool,

        /// Only consider these extensions (repeatable)
        #[arg(short = 'e', long = "ext")]
        extensions: Vec<String>,

        #[arg(long)]
        parallel: bool,

        #[arg(long, default_value = "content")]
        method: String,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Execute a JSON request record read from a file or `-` for stdin
    Run {
        request: String,

        #[arg(long, value_enum)]
        op: Op,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Op {
    Compress,
    Extract,
    Checksum,
    Split,
    Merge,
    Scan,
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn respond<T: Serialize>(result: filetools::Result<T>, pretty: bool) -> Result<()> {
    emit(&result?, pretty)
}

fn parse_request<T: DeserializeOwned>(body: &str) -> filetools::Result<T> {
    serde_json::from_str(body)
        .map_err(|e| filetools::Error::InvalidArgument(format!("request body: {}", e)))
}

fn read_request(source: &str) -> Result<String> {
    if source == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("reading request from stdin")?;
        return Ok(body);
    }
    fs::read_to_string(source).with_context(|| format!("reading request file {}", source))
}

fn run_request(tools: &FileTools, op: Op, body: &str, cancel: &CancelToken, pretty: bool) -> Result<()> {
    match op {
        Op::Compress => respond(tools.compress(&parse_request(body)?, cancel), pretty),
        Op::Extract => respond(tools.extract(&parse_request(body)?, cancel), pretty),
        Op::Checksum => respond(tools.checksum(&parse_request(body)?, cancel), pretty),
        Op::Split => respond(tools.split(&parse_request(body)?, cancel), pretty),
        Op::Merge => respond(tools.merge(&parse_request(body)?, cancel), pretty),
        Op::Scan => respond(tools.scan(&parse_request(body)?, cancel), pretty),
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings;
    let pretty = settings.pretty;
    let cancel = CancelToken::new();

    let mut tools =
        FileTools::new(Arc::new(OsFs::new())).with_scan_workers(settings.scan_workers);
    let progress_bar = settings.progress.then(|| create_progress_bar(0));
    if let Some(pb) = &progress_bar {
        tools = tools.with_progress(Arc::new(progress_callback(pb.clone())));
    }

    let result = match cli.command {
        Commands::Compress {
            files,
            format,
            output,
            level,
        } => respond(
            tools.compress(
                &CompressRequest {
                    files,
                    archive_format: format,
                    output_path: output,
                    compression_level: level,
                },
                &cancel,
            ),
            pretty,
        ),
        Commands::Extract {
            archive,
            destination,
        } => respond(
            tools.extract(
                &ExtractRequest {
                    archive_path: archive,
                    destination_path: destination,
                },
                &cancel,
            ),
            pretty,
        ),
        Commands::Checksum { files, algorithm } => respond(
            tools.checksum(&ChecksumRequest { files, algorithm }, &cancel),
            pretty,
        ),
        Commands::Split {
            file,
            size,
            parts,
            pattern,
        } => respond(
            tools.split(
                &SplitRequest {
                    file,
                    size,
                    parts,
                    output_pattern: pattern,
                },
                &cancel,
            ),
            pretty,
        ),
        Commands::Merge {
            pattern,
            output,
            remove_parts,
        } => respond(
            tools.merge(
                &MergeRequest {
                    pattern,
                    output,
                    remove_parts,
                },
                &cancel,
            ),
            pretty,
        ),
        Commands::Scan {
            paths,
            algorithm,
            include_hidden,
            extensions,
            parallel,
            method,
            threshold,
        } => respond(
            tools.scan(
                &ScanRequest {
                    scan_paths: paths,
                    detection_method: method,
                    options: ScanRequestOptions {
                        similarity_threshold: threshold,
                        include_hidden,
                        file_extensions: extensions,
                        algorithm,
                        parallel,
                        workers: None,
                    },
                },
                &cancel,
            ),
            pretty,
        ),
        Commands::Run { request, op } => read_request(&request)
            .and_then(|body| run_request(&tools, op, &body, &cancel, pretty)),
    };

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }
    result
}

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.settings);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<filetools::Error>()
            .map(filetools::Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
