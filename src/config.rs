use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Process-level settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Log filter directive, e.g. `info` or `filetools=debug`
    #[arg(long, global = true, env = "FILETOOLS_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(
        long,
        global = true,
        env = "FILETOOLS_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    /// Show a progress bar on stderr
    #[arg(long, global = true)]
    pub progress: bool,

    /// Worker threads for parallel scans (0 = one per CPU)
    #[arg(long, global = true, env = "FILETOOLS_SCAN_WORKERS", default_value_t = 0)]
    pub scan_workers: usize,

    /// Pretty-print JSON responses
    #[arg(long, global = true)]
    pub pretty: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            progress: false,
            scan_workers: 0,
            pretty: false,
        }
    }
}
