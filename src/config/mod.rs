//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    CliArgs, Command, CommonOverrides, ConvertArgs, DoctorArgs, PurgeArgs, RenderOverrides,
    ResolveArgs, StatusArgs, SweepArgs, TtlOverride,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "mdconv";
const ENV_PREFIX: &str = "MDCONV";
const DEFAULT_STORAGE_DIR: &str = "tmp/converted";
const DEFAULT_TTL_HOURS: u64 = 24;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_IN_FLIGHT_GRACE_SECS: u64 = 600;
const DEFAULT_MAX_CONTENT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];
pub(crate) const DEFAULT_PANDOC_PATH: &str = "pandoc";
pub(crate) const DEFAULT_PDF_ENGINE_PATH: &str = "weasyprint";
const DEFAULT_REFERENCE_TEMPLATE: &str = "templates/template.docx";
const DEFAULT_HIGHLIGHT_STYLE: &str = "pygments";
const DEFAULT_CODE_THEME: &str = "InspiredGitHub";
const SECONDS_PER_HOUR: u64 = 60 * 60;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub conversion: ConversionSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub base_dir: PathBuf,
    pub ttl: Duration,
    pub cleanup_interval: Duration,
    pub in_flight_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub max_content_bytes: usize,
    pub include_front_matter: bool,
    /// Lowercase, without the leading dot.
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub pandoc_path: PathBuf,
    /// Only used when the file exists.
    pub reference_template: PathBuf,
    pub highlight_style: String,
    pub pdf_engine_path: PathBuf,
    pub code_theme: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("conversion.allowed_extensions")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_common_overrides(&cli.common);
    raw.apply_command_overrides(&cli.command);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    conversion: RawConversionSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(dir) = overrides.storage_dir.as_ref() {
            self.storage.base_dir = Some(dir.clone());
        }
    }

    fn apply_command_overrides(&mut self, command: &Command) {
        match command {
            Command::Convert(args) => {
                if let Some(include) = args.front_matter {
                    self.conversion.include_front_matter = Some(include);
                }
                if let Some(limit) = args.max_content_bytes {
                    self.conversion.max_content_bytes = Some(limit);
                }
                self.apply_render_overrides(&args.render);
            }
            Command::Status(args) => self.apply_ttl_override(&args.ttl),
            Command::Sweep(args) => {
                self.apply_ttl_override(&args.ttl);
                if let Some(seconds) = args.interval_seconds {
                    self.storage.cleanup_interval_seconds = Some(seconds);
                }
            }
            Command::Doctor(args) => self.apply_render_overrides(&args.render),
            Command::Resolve(_) | Command::Purge(_) => {}
        }
    }

    fn apply_ttl_override(&mut self, overrides: &TtlOverride) {
        if let Some(hours) = overrides.ttl_hours {
            self.storage.ttl_hours = Some(hours);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(path) = overrides.pandoc_path.as_ref() {
            self.render.pandoc_path = Some(path.clone());
        }
        if let Some(path) = overrides.pdf_engine_path.as_ref() {
            self.render.pdf_engine_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            storage,
            conversion,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            conversion: build_conversion_settings(conversion)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let base_dir = storage
        .base_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if base_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.base_dir",
            "path must not be empty",
        ));
    }

    let ttl_hours = storage.ttl_hours.unwrap_or(DEFAULT_TTL_HOURS);
    if ttl_hours == 0 {
        return Err(LoadError::invalid(
            "storage.ttl_hours",
            "must be greater than zero",
        ));
    }
    let ttl_secs = ttl_hours
        .checked_mul(SECONDS_PER_HOUR)
        .ok_or_else(|| LoadError::invalid("storage.ttl_hours", "value is too large"))?;

    let cleanup_secs = storage
        .cleanup_interval_seconds
        .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS);
    if cleanup_secs == 0 {
        return Err(LoadError::invalid(
            "storage.cleanup_interval_seconds",
            "must be greater than zero",
        ));
    }

    let grace_secs = storage
        .in_flight_grace_seconds
        .unwrap_or(DEFAULT_IN_FLIGHT_GRACE_SECS);

    Ok(StorageSettings {
        base_dir,
        ttl: Duration::from_secs(ttl_secs),
        cleanup_interval: Duration::from_secs(cleanup_secs),
        in_flight_grace: Duration::from_secs(grace_secs),
    })
}

fn build_conversion_settings(
    conversion: RawConversionSettings,
) -> Result<ConversionSettings, LoadError> {
    let max_value = conversion
        .max_content_bytes
        .unwrap_or(DEFAULT_MAX_CONTENT_BYTES);
    if max_value == 0 {
        return Err(LoadError::invalid(
            "conversion.max_content_bytes",
            "must be greater than zero",
        ));
    }
    let max_content_bytes = usize::try_from(max_value).map_err(|_| {
        LoadError::invalid(
            "conversion.max_content_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    let allowed_extensions: Vec<String> = conversion
        .allowed_extensions
        .unwrap_or_else(|| {
            DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect()
        })
        .into_iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    if allowed_extensions.is_empty() {
        return Err(LoadError::invalid(
            "conversion.allowed_extensions",
            "at least one extension is required",
        ));
    }

    Ok(ConversionSettings {
        max_content_bytes,
        include_front_matter: conversion.include_front_matter.unwrap_or(true),
        allowed_extensions,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let pandoc_path = non_empty_path(
        render.pandoc_path,
        DEFAULT_PANDOC_PATH,
        "render.pandoc_path",
    )?;
    let pdf_engine_path = non_empty_path(
        render.pdf_engine_path,
        DEFAULT_PDF_ENGINE_PATH,
        "render.pdf_engine_path",
    )?;
    let reference_template = render
        .reference_template
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_TEMPLATE));

    let highlight_style = render
        .highlight_style
        .map(|style| style.trim().to_string())
        .unwrap_or_else(|| DEFAULT_HIGHLIGHT_STYLE.to_string());
    if highlight_style.is_empty() {
        return Err(LoadError::invalid(
            "render.highlight_style",
            "must not be empty",
        ));
    }

    let code_theme = render
        .code_theme
        .map(|theme| theme.trim().to_string())
        .filter(|theme| !theme.is_empty())
        .unwrap_or_else(|| DEFAULT_CODE_THEME.to_string());

    Ok(RenderSettings {
        pandoc_path,
        reference_template,
        highlight_style,
        pdf_engine_path,
        code_theme,
    })
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    base_dir: Option<PathBuf>,
    ttl_hours: Option<u64>,
    cleanup_interval_seconds: Option<u64>,
    in_flight_grace_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConversionSettings {
    max_content_bytes: Option<u64>,
    include_front_matter: Option<bool>,
    allowed_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    pandoc_path: Option<PathBuf>,
    reference_template: Option<PathBuf>,
    highlight_style: Option<String>,
    pdf_engine_path: Option<PathBuf>,
    code_theme: Option<String>,
}
