use std::{fs, process};

use mdconv::{
    application::{
        cleanup::run_sweeper,
        convert::{Converter, to_response},
        error::AppError,
        render::{ConversionOptions, ExternalTool, ToolProbe},
        sanitize::has_allowed_extension,
    },
    config::{self, Command, ConvertArgs, DoctorArgs, Settings, SweepArgs},
    domain::{
        error::ValidationError,
        job::{JobId, OutputFormat},
    },
    infra::{error::InfraError, storage::JobStore, telemetry},
    util::bytes::format_file_size,
};
use mdconv_api_types::{JobStatus, StoredFile};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if let AppError::Convert(err) = error {
        let report = err.report();
        let payload = err.to_payload();
        match serde_json::to_string_pretty(&payload) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{}: {}", payload.code, payload.error),
        }
        if dispatcher::has_been_set() {
            error!(code = err.code(), error = %report.chain(), "application error");
            return;
        }
    }

    if dispatcher::has_been_set() {
        error!(
            status = error.status_code(),
            message = %error.presentation_message(),
            error = %error,
            "application error"
        );
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(
            status = error.status_code(),
            message = %error.presentation_message(),
            error = %error,
            "application error"
        );
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        InfraError::configuration(format!("failed to load configuration: {err}"))
    })?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        Command::Convert(args) => run_convert(settings, *args).await,
        Command::Resolve(args) => {
            let store = open_store(&settings)?;
            match store.resolve_file(&args.job_id, &args.format)? {
                Some(path) => {
                    println!("{}", path.display());
                    Ok(())
                }
                None => Err(AppError::NotFound),
            }
        }
        Command::Status(args) => {
            let store = open_store(&settings)?;
            let id = JobId::parse(&args.job_id)?;
            let expired = store.is_expired(&args.job_id, settings.storage.ttl);
            let files = store
                .list_files(&args.job_id)?
                .into_iter()
                .map(|info| StoredFile {
                    size_display: format_file_size(info.size_bytes),
                    filename: info.filename,
                    size_bytes: info.size_bytes,
                    modified: info.modified,
                    mimetype: info.mime_type,
                })
                .collect();
            print_json(&JobStatus {
                job_id: id.as_uuid(),
                expired,
                files,
            })
        }
        Command::Sweep(args) => run_sweep(settings, args).await,
        Command::Purge(args) => {
            let store = open_store(&settings)?;
            let id = JobId::parse(&args.job_id)?;
            if store.purge(id) {
                println!("purged {id}");
                Ok(())
            } else {
                Err(AppError::NotFound)
            }
        }
        Command::Doctor(args) => run_doctor(&settings, &args),
    }
}

fn open_store(settings: &Settings) -> Result<JobStore, AppError> {
    Ok(JobStore::open(
        &settings.storage.base_dir,
        settings.storage.in_flight_grace,
    )?)
}

async fn run_convert(settings: Settings, args: ConvertArgs) -> Result<(), AppError> {
    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !has_allowed_extension(&file_name, &settings.conversion.allowed_extensions) {
        return Err(ValidationError::UnsupportedExtension { name: file_name }.into());
    }

    let formats = if args.formats.is_empty() {
        OutputFormat::ALL.to_vec()
    } else {
        args.formats
            .iter()
            .map(|value| value.parse::<OutputFormat>())
            .collect::<Result<Vec<_>, _>>()?
    };

    let raw = fs::read(&args.file).map_err(|err| {
        AppError::validation(format!("failed to read {}: {err}", args.file.display()))
    })?;

    let mut options = ConversionOptions::default()
        .with_front_matter(settings.conversion.include_front_matter)
        .with_template(
            args.template
                .clone()
                .unwrap_or_else(|| settings.render.reference_template.clone()),
        )
        .with_output_name(args.output_name.clone().unwrap_or(file_name));
    if let Some(css_path) = args.css.as_ref() {
        let css = fs::read_to_string(css_path).map_err(|err| {
            AppError::validation(format!("failed to read {}: {err}", css_path.display()))
        })?;
        options = options.with_css(css);
    }

    let converter = Converter::from_settings(&settings)?;
    let job = tokio::task::spawn_blocking(move || converter.convert_bytes(&raw, &formats, &options))
        .await
        .map_err(|err| AppError::unexpected(format!("conversion task failed: {err}")))??;

    let response = to_response(&job);
    if args.json {
        return print_json(&response);
    }

    println!("job {}", response.job_id);
    for file in &response.files {
        println!(
            "  {:<5} {}  {}  {}",
            file.format,
            file.filename,
            file.size_display,
            job.directory.join(&file.filename).display()
        );
    }
    Ok(())
}

async fn run_sweep(settings: Settings, args: SweepArgs) -> Result<(), AppError> {
    let store = open_store(&settings)?;
    let ttl = settings.storage.ttl;

    if args.watch {
        let removed = run_sweeper(
            store,
            ttl,
            settings.storage.cleanup_interval,
            shutdown_signal(),
        )
        .await;
        println!("removed {removed} expired job(s)");
        return Ok(());
    }

    let removed = tokio::task::spawn_blocking(move || store.sweep_expired(ttl))
        .await
        .map_err(|err| AppError::unexpected(format!("sweep task failed: {err}")))?;
    println!("removed {removed} expired job(s)");
    Ok(())
}

fn run_doctor(settings: &Settings, args: &DoctorArgs) -> Result<(), AppError> {
    let probes: Vec<ToolProbe> = [
        ExternalTool::new("pandoc", settings.render.pandoc_path.clone()),
        ExternalTool::new("weasyprint", settings.render.pdf_engine_path.clone()),
    ]
    .iter()
    .map(ExternalTool::probe_version)
    .collect();

    if args.json {
        print_json(&probes)?;
    } else {
        for probe in &probes {
            match (&probe.version, &probe.error) {
                (Some(version), _) => println!("ok       {:<10} {version}", probe.tool),
                (None, error) => println!(
                    "missing  {:<10} {} ({})",
                    probe.tool,
                    probe.path.display(),
                    error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
    }

    let missing: Vec<&str> = probes
        .iter()
        .filter(|probe| !probe.is_available())
        .map(|probe| probe.tool.as_str())
        .collect();
    if missing.is_empty() {
        info!(target = "mdconv::doctor", op = "probe", "all rendering tools available");
        Ok(())
    } else {
        Err(AppError::unexpected(format!(
            "rendering tools unavailable: {}",
            missing.join(", ")
        )))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{json}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "mdconv::sweep", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "mdconv::sweep", "shutdown requested");
}

