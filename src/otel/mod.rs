//! Observability for ghly
//!
//! Structured logging through `tracing-subscriber`, plus optional OTLP export
//! of traces and metrics.

use crate::config::{LogFormat, LoggingConfig, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Owns the tracer and meter providers for the process
///
/// Created once in `main` before the cache and engine, so [`Metrics`] can be
/// built from [`OtelProvider::meter`]. When export is disabled the meter
/// provider has no reader: instruments are valid but record nothing, and no
/// tracer provider exists at all.
///
/// Dropping the provider flushes pending spans; `main` also calls
/// [`OtelProvider::shutdown`] explicitly after the server stops so that
/// errors can be logged.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    /// Builds providers from `otel` configuration
    ///
    /// With `enabled: true` an `endpoint` is mandatory; traces and metrics are
    /// both exported over OTLP/gRPC to it, tagged with `service_name`.
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;

            let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;
            let meter_provider = Self::init_meter_provider(endpoint, &resource)?;
            (Some(tracer_provider), meter_provider)
        } else {
            // No reader: counters accept updates and drop them.
            let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
            (None, meter_provider)
        };

        // Spans from libraries that use the global tracer end up in the same export.
        if let Some(ref tp) = tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            config: config.clone(),
        })
    }

    /// Batch span export over tonic, sampling every span
    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        let trace_config = Config::default()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone());

        let tracer_provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build();

        Ok(tracer_provider)
    }

    /// Periodic metric export over tonic with default temporality
    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio).build();

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader)
            .build();

        Ok(meter_provider)
    }

    /// Tracer for the `tracing-opentelemetry` layer
    ///
    /// Without export this is a tracer from an empty provider, so callers do
    /// not need to branch on [`OtelProvider::is_enabled`].
    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        if let Some(ref tp) = self.tracer_provider {
            tp.tracer(name)
        } else {
            TracerProvider::builder().build().tracer(name)
        }
    }

    /// Meter named after the service, used to build [`Metrics`]
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    /// True when OTLP export was configured
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flushes pending spans and stops metric export
    ///
    /// Metrics are shut down first; the first failure is returned.
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Err(e) = self.meter_provider.shutdown() {
            return Err(OtelError::Shutdown(format!(
                "Meter shutdown failed: {:?}",
                e
            )));
        }

        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                if let Err(e) = result {
                    return Err(OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Proxy metrics
pub struct Metrics {
    /// Requests by outcome (`hit`, `miss`, `denied`, `not_found`, `upstream_error`)
    pub requests_total: Counter<u64>,

    /// Requests rejected by the whitelist
    pub denied_total: Counter<u64>,

    pub cache_hits_total: Counter<u64>,

    pub cache_misses_total: Counter<u64>,

    /// Cache backend faults by operation; each one was recovered
    pub cache_faults_total: Counter<u64>,

    /// Failed origin fetches by error kind
    pub upstream_errors_total: Counter<u64>,

    /// End-to-end resolve duration in seconds
    pub request_duration: Histogram<f64>,

    /// Origin fetch duration in seconds
    pub upstream_duration: Histogram<f64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("ghly_requests_total")
                .with_description("Proxy requests by outcome")
                .init(),
            denied_total: meter
                .u64_counter("ghly_denied_total")
                .with_description("Requests rejected by the repository whitelist")
                .init(),
            cache_hits_total: meter
                .u64_counter("ghly_cache_hits_total")
                .with_description("Requests served from cache")
                .init(),
            cache_misses_total: meter
                .u64_counter("ghly_cache_misses_total")
                .with_description("Cache lookups that found nothing live")
                .init(),
            cache_faults_total: meter
                .u64_counter("ghly_cache_faults_total")
                .with_description("Recovered cache backend faults")
                .init(),
            upstream_errors_total: meter
                .u64_counter("ghly_upstream_errors_total")
                .with_description("Failed origin fetches")
                .init(),
            request_duration: meter
                .f64_histogram("ghly_request_duration_seconds")
                .with_description("Resolve duration in seconds")
                .init(),
            upstream_duration: meter
                .f64_histogram("ghly_upstream_duration_seconds")
                .with_description("Origin fetch duration in seconds")
                .init(),
        }
    }

    pub fn record_request(&self, outcome: &str) {
        self.requests_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_denied(&self, owner: &str) {
        self.denied_total
            .add(1, &[KeyValue::new("owner", owner.to_string())]);
    }

    pub fn record_cache_hit(&self, backend: &str) {
        self.cache_hits_total
            .add(1, &[KeyValue::new("backend", backend.to_string())]);
    }

    pub fn record_cache_miss(&self, backend: &str) {
        self.cache_misses_total
            .add(1, &[KeyValue::new("backend", backend.to_string())]);
    }

    /// Records a backend fault for `operation` (`get` or `set`)
    pub fn record_cache_fault(&self, backend: &str, operation: &str) {
        self.cache_faults_total.add(
            1,
            &[
                KeyValue::new("backend", backend.to_string()),
                KeyValue::new("operation", operation.to_string()),
            ],
        );
    }

    pub fn record_upstream_error(&self, kind: &str) {
        self.upstream_errors_total
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }

    pub fn record_request_duration(&self, outcome: &str, duration_secs: f64) {
        self.request_duration.record(
            duration_secs,
            &[KeyValue::new("outcome", outcome.to_string())],
        );
    }

    pub fn record_upstream_duration(&self, duration_secs: f64) {
        self.upstream_duration.record(duration_secs, &[]);
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs the global subscriber
///
/// The OpenTelemetry layer is only attached when export is enabled.
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(parse_level(&logging.level));

    let otel_layer = if otel.is_enabled() {
        Some(tracing_opentelemetry::layer().with_tracer(otel.tracer("ghly")))
    } else {
        None
    };

    let (json_layer, pretty_layer) = match logging.format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer().pretty())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}
