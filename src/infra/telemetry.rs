use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "mdconv_conversions_total",
            Unit::Count,
            "Total number of artifacts rendered, labelled by output format."
        );
        describe_counter!(
            "mdconv_conversion_failures_total",
            Unit::Count,
            "Total number of rejected or failed conversion requests, labelled by error code."
        );
        describe_counter!(
            "mdconv_jobs_swept_total",
            Unit::Count,
            "Total number of expired job directories removed by the sweeper."
        );
        describe_histogram!(
            "mdconv_render_ms",
            Unit::Milliseconds,
            "Time spent rendering a single output format."
        );
    });
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn second_install_is_reported() {
        let settings = LoggingSettings {
            level: LevelFilter::WARN,
            format: LogFormat::Compact,
        };
        let _ = init(&settings);
        assert!(matches!(init(&settings), Err(InfraError::Telemetry(_))));
    }
}
