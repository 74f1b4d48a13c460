//! Tracing subscriber setup.
//!
//! When any `OTEL_EXPORTER_OTLP_*` variable is set, spans and metrics are
//! exported over OTLP (HTTP or gRPC per `OTEL_EXPORTER_OTLP_PROTOCOL`). Otherwise
//! only a local fmt layer is installed. Both honour `RUST_LOG`, defaulting to `info`.

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use std::env;
use std::time::Duration;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Can not build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
    #[error("Can not install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    Http,
    Grpc,
}

impl TelemetryProtocol {
    fn from_env() -> Option<Self> {
        let enabled = ["OTEL_EXPORTER_OTLP_ENDPOINT", "OTEL_EXPORTER_OTLP_HEADERS", "OTEL_EXPORTER_OTLP_PROTOCOL"]
            .iter()
            .any(|name| env::var(name).is_ok());
        if !enabled {
            return None;
        }
        match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => Some(TelemetryProtocol::Grpc),
            _ => Some(TelemetryProtocol::Http),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn resource() -> Resource {
    let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_schema_url(
            [
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_meter_provider(protocol: TelemetryProtocol) -> Result<SdkMeterProvider, TelemetryError> {
    let builder = opentelemetry_otlp::MetricExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::Http => builder.with_http().build()?,
        TelemetryProtocol::Grpc => builder.with_tonic().build()?,
    };
    let reader = PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();
    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource())
        .with_reader(reader)
        .build();
    global::set_meter_provider(meter_provider.clone());
    Ok(meter_provider)
}

fn init_tracer_provider(protocol: TelemetryProtocol) -> Result<SdkTracerProvider, TelemetryError> {
    let builder = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::Http => builder.with_http().build()?,
        TelemetryProtocol::Grpc => builder.with_tonic().build()?,
    };
    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(1.0))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Installed providers; flushed and shut down on drop.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// Installs the global subscriber. Call once, early in `main`.
    pub fn init() -> Result<Self, TelemetryError> {
        let Some(protocol) = TelemetryProtocol::from_env() else {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
            tracing::info!("OpenTelemetry export is disabled");
            return Ok(Self {
                tracer_provider: None,
                meter_provider: None,
            });
        };

        let tracer_provider = init_tracer_provider(protocol)?;
        let meter_provider = init_meter_provider(protocol)?;
        let tracer = tracer_provider.tracer("t402-facilitator");
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .with(MetricsLayer::new(meter_provider.clone()))
            .with(OpenTelemetryLayer::new(tracer))
            .try_init()?;
        tracing::info!(protocol = ?protocol, "OpenTelemetry export is enabled");
        Ok(Self {
            tracer_provider: Some(tracer_provider),
            meter_provider: Some(meter_provider),
        })
    }

    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.take()
            && let Err(err) = tracer_provider.shutdown()
        {
            eprintln!("tracer provider shutdown: {err:?}");
        }
        if let Some(meter_provider) = self.meter_provider.take()
            && let Err(err) = meter_provider.shutdown()
        {
            eprintln!("meter provider shutdown: {err:?}");
        }
    }
}

