use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter,
    filter::Directive,
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

const SQLX_QUERY_DIRECTIVE: &str = "sqlx::query=warn";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and describe the cache counters.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    // per-statement sqlx logs drown the request logs at info
    let quiet_queries = SQLX_QUERY_DIRECTIVE
        .parse::<Directive>()
        .map_err(|err| InfraError::telemetry(format!("invalid log directive: {err}")))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy()
        .add_directive(quiet_queries);

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sas_blog_cache_detail_hit_total",
            Unit::Count,
            "Detail pages served from the response cache."
        );
        describe_counter!(
            "sas_blog_cache_detail_miss_total",
            Unit::Count,
            "Detail pages rendered because no cached response existed."
        );
        describe_counter!(
            "sas_blog_cache_detail_store_total",
            Unit::Count,
            "Rendered detail pages written to the response cache."
        );
        describe_counter!(
            "sas_blog_cache_invalidated_total",
            Unit::Count,
            "Cached responses dropped by tag invalidation."
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_directive_parses() {
        assert!(SQLX_QUERY_DIRECTIVE.parse::<Directive>().is_ok());
    }

    #[test]
    fn describing_metrics_twice_is_harmless() {
        describe_metrics();
        describe_metrics();
        assert!(METRIC_DESCRIPTIONS.is_completed());
    }
}
