use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the mdconv binary.
#[derive(Debug, Parser)]
#[command(
    name = "mdconv",
    version,
    about = "Convert Markdown with front matter into DOCX and PDF jobs"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MDCONV_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Convert a Markdown file into one or more output formats.
    Convert(Box<ConvertArgs>),
    /// Print the stored artifact path for a job and format.
    Resolve(ResolveArgs),
    /// Report expiry and stored files for a job.
    Status(StatusArgs),
    /// Delete expired jobs once, or periodically with --watch.
    Sweep(SweepArgs),
    /// Securely delete a job and all of its files.
    Purge(PurgeArgs),
    /// Check that the external rendering tools are available.
    Doctor(DoctorArgs),
}

/// Overrides accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        global = true,
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the job storage directory.
    #[arg(
        long = "storage-dir",
        value_name = "PATH",
        global = true,
        value_hint = ValueHint::DirPath
    )]
    pub storage_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the pandoc executable used for DOCX output.
    #[arg(long = "pandoc-path", value_name = "PATH")]
    pub pandoc_path: Option<PathBuf>,

    /// Override the HTML-to-PDF executable.
    #[arg(long = "pdf-engine-path", value_name = "PATH")]
    pub pdf_engine_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct TtlOverride {
    /// Override the job time-to-live in hours.
    #[arg(long = "ttl-hours", value_name = "HOURS")]
    pub ttl_hours: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    /// Markdown file to convert.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Output format (docx|pdf); repeat for several. Defaults to all formats.
    #[arg(long = "format", value_name = "FORMAT")]
    pub formats: Vec<String>,

    /// Prepend a rendering of the front matter.
    #[arg(
        long = "front-matter",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub front_matter: Option<bool>,

    /// Stylesheet replacing the default PDF print stylesheet.
    #[arg(long = "css", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub css: Option<PathBuf>,

    /// Reference DOCX template; ignored when the file does not exist.
    #[arg(long = "template", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub template: Option<PathBuf>,

    /// Base name for the produced files.
    #[arg(long = "output-name", value_name = "NAME")]
    pub output_name: Option<String>,

    /// Print the job summary as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Override the maximum accepted input size in bytes.
    #[arg(long = "max-content-bytes", value_name = "BYTES")]
    pub max_content_bytes: Option<u64>,

    #[command(flatten)]
    pub render: RenderOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    /// Job identifier (UUID).
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    /// Output format (docx|pdf).
    #[arg(value_name = "FORMAT")]
    pub format: String,
}

#[derive(Debug, Args, Clone)]
pub struct StatusArgs {
    /// Job identifier (UUID).
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    #[command(flatten)]
    pub ttl: TtlOverride,
}

#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub ttl: TtlOverride,

    /// Keep sweeping on an interval until interrupted.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub watch: bool,

    /// Override the sweep interval used with --watch.
    #[arg(long = "interval-seconds", value_name = "SECONDS")]
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    /// Job identifier (UUID).
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Print the probe results as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}
