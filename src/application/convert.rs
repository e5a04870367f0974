//! Conversion orchestrator: validate, parse, sanitize, allocate a job, then
//! render every requested format into it. A job either holds every requested
//! artifact or is purged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use mdconv_api_types::{JobArtifact, JobResponse};
use tracing::{debug, info, warn};

use crate::{
    application::{
        error::ConvertError,
        front_matter,
        render::{
            ComrakHtmlEngine, ConversionError, ConversionOptions, DocxRenderer, EngineError,
            PandocEngine, PdfRenderer, RenderState, Renderer, WeasyPrintEngine,
        },
        sanitize::{sanitize_filename, sanitize_metadata, validate_bytes, validate_content},
    },
    config::Settings,
    domain::{
        error::ValidationError,
        job::{Job, OutputFormat},
        metadata::Metadata,
    },
    infra::storage::{JobStore, StoreError},
    util::bytes::format_file_size,
};

pub const DEFAULT_BASE_NAME: &str = "document";

pub struct Converter {
    store: JobStore,
    renderers: BTreeMap<OutputFormat, Arc<dyn Renderer>>,
    max_content_bytes: usize,
}

impl Converter {
    pub fn new(store: JobStore, max_content_bytes: usize) -> Self {
        Self {
            store,
            renderers: BTreeMap::new(),
            max_content_bytes,
        }
    }

    /// Wires the job store and both production renderers from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        let store = JobStore::open(&settings.storage.base_dir, settings.storage.in_flight_grace)?;
        let render = &settings.render;

        let docx = DocxRenderer::new(Arc::new(PandocEngine::new(
            render.pandoc_path.clone(),
            render.highlight_style.clone(),
        )));
        let pdf = PdfRenderer::new(
            Arc::new(ComrakHtmlEngine::new(render.code_theme.clone())),
            Arc::new(WeasyPrintEngine::new(render.pdf_engine_path.clone())),
        );

        Ok(Self::new(store, settings.conversion.max_content_bytes)
            .with_renderer(Arc::new(docx))
            .with_renderer(Arc::new(pdf)))
    }

    /// Registers the renderer for its format, replacing any previous one.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.insert(renderer.format(), renderer);
        self
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Converts raw upload bytes. Encoding and binary checks run before
    /// anything touches the job store.
    pub fn convert_bytes(
        &self,
        raw: &[u8],
        formats: &[OutputFormat],
        options: &ConversionOptions,
    ) -> Result<Job, ConvertError> {
        match validate_bytes(raw, self.max_content_bytes) {
            Ok(text) => self.convert(text, formats, options),
            Err(err) => {
                let err = ConvertError::from(err);
                record_failure(&err);
                Err(err)
            }
        }
    }

    pub fn convert(
        &self,
        content: &str,
        formats: &[OutputFormat],
        options: &ConversionOptions,
    ) -> Result<Job, ConvertError> {
        let started_at = Instant::now();
        let outcome = self.run(content, formats, options);
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        match &outcome {
            Ok(job) => info!(
                target = "application::convert",
                op = "convert",
                job_id = %job.id,
                formats = job.results.len(),
                elapsed_ms,
                "conversion finished"
            ),
            Err(err) => record_failure(err),
        }
        outcome
    }

    fn run(
        &self,
        content: &str,
        formats: &[OutputFormat],
        options: &ConversionOptions,
    ) -> Result<Job, ConvertError> {
        validate_content(content, self.max_content_bytes)?;

        let parsed = front_matter::parse(content);
        let had_front_matter = parsed.is_parsed();
        let (metadata, body) = parsed.into_parts();
        let metadata = sanitize_metadata(&metadata);
        debug!(
            target = "application::convert",
            op = "prepare",
            had_front_matter,
            metadata_fields = metadata.len(),
            body_bytes = body.len(),
        );

        let requested: BTreeSet<OutputFormat> = formats.iter().copied().collect();
        if requested.is_empty() {
            return Err(ValidationError::NoFormatsRequested.into());
        }
        let renderers = requested
            .iter()
            .map(|format| self.renderer(*format))
            .collect::<Result<Vec<_>, _>>()?;

        let base_name = base_name(options.output_name.as_deref());
        let mut job = self.store.create_job()?;

        match self.render_all(&mut job, &renderers, &body, &metadata, options, &base_name) {
            Ok(()) => {
                self.store.finish(&job)?;
                Ok(job)
            }
            Err(err) => {
                let purged = self.store.purge(job.id);
                warn!(
                    target = "application::convert",
                    op = "rollback",
                    job_id = %job.id,
                    purged,
                    "discarding partially rendered job"
                );
                job.results.clear();
                Err(err)
            }
        }
    }

    fn renderer(&self, format: OutputFormat) -> Result<Arc<dyn Renderer>, ConvertError> {
        self.renderers.get(&format).cloned().ok_or_else(|| {
            ConversionError::new(
                format,
                EngineError::NotFound {
                    tool: format!("{format} renderer"),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no renderer registered",
                    ),
                },
            )
            .into()
        })
    }

    fn render_all(
        &self,
        job: &mut Job,
        renderers: &[Arc<dyn Renderer>],
        body: &str,
        metadata: &Metadata,
        options: &ConversionOptions,
        base_name: &str,
    ) -> Result<(), ConvertError> {
        for renderer in renderers {
            let format = renderer.format();
            let started_at = Instant::now();
            let state = RenderState::Pending.drive(|| renderer.render(body, metadata, options));
            let elapsed_ms = started_at.elapsed().as_millis() as u64;

            metrics::histogram!("mdconv_render_ms", "format" => format.extension())
                .record(elapsed_ms as f64);
            debug!(
                target = "application::convert",
                op = "render",
                job_id = %job.id,
                format = %format,
                state = state.label(),
                elapsed_ms,
            );

            let bytes = state.into_result(format)?;
            let result = self.store.write_artifact(job, base_name, format, &bytes)?;
            metrics::counter!("mdconv_conversions_total", "format" => format.extension())
                .increment(1);
            job.results.push(result);
        }
        Ok(())
    }
}

fn record_failure(err: &ConvertError) {
    metrics::counter!("mdconv_conversion_failures_total", "code" => err.code()).increment(1);
    let report = err.report();
    warn!(
        target = "application::convert",
        op = "convert",
        code = err.code(),
        status = report.status,
        error = %report.chain(),
        "conversion rejected"
    );
}

/// Per-job artifact base name: the sanitized output name without its
/// extension, or [`DEFAULT_BASE_NAME`].
pub fn base_name(output_name: Option<&str>) -> String {
    let Some(name) = output_name.map(str::trim).filter(|name| !name.is_empty()) else {
        return DEFAULT_BASE_NAME.to_string();
    };
    let sanitized = sanitize_filename(name);
    let stem = match sanitized.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => sanitized.as_str(),
    };
    let stem = stem.trim_matches(|c| c == '.' || c == '_');
    if stem.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// Boundary summary of a finished job.
pub fn to_response(job: &Job) -> JobResponse {
    JobResponse {
        job_id: job.id.as_uuid(),
        created_at: job.created_at,
        files: job
            .results
            .iter()
            .map(|result| JobArtifact {
                format: result.format.to_string(),
                filename: result.filename(),
                download_url: job.download_path(result.format),
                mimetype: result.format.mime_type().to_string(),
                size_bytes: result.byte_size,
                size_display: format_file_size(result.byte_size),
                sha256: result.checksum.clone(),
            })
            .collect(),
    }
}
