//! # Telemetry session
//!
//! A scoped reporting session backed by an OpenTelemetry tracer provider that
//! exports over OTLP to the APM backend. The session hands out named
//! [`Transaction`]s and must be shut down explicitly so buffered spans are
//! flushed before the process exits.

use std::{
    env,
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider, Resource};
use tokio::net::TcpStream;
use tonic::{
    metadata::{Ascii, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{info, info_span, warn, Span, Subscriber};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, registry::LookupSpan, Layer};

use crate::errors::{Error, Result};

/// Target used by every diagnostic event the session emits.
pub const TELEMETRY_TARGET: &str = "telemetry";

pub const LICENSE_KEY_VAR: &str = "NEW_RELIC_LICENSE_KEY";
pub const APP_NAME_VAR: &str = "NEW_RELIC_APP_NAME";
pub const ENDPOINT_VAR: &str = "NEW_RELIC_OTLP_ENDPOINT";
pub const INFO_LOGGER_VAR: &str = "NEW_RELIC_INFO_LOGGER";
pub const DISTRIBUTED_TRACING_VAR: &str = "NEW_RELIC_DISTRIBUTED_TRACING_ENABLED";

const DEFAULT_APP_NAME: &str = "Dynamo Scan App";
const DEFAULT_ENDPOINT: &str = "https://otlp.nr-data.net:4317";
const INSTRUMENTATION_NAME: &str = env!("CARGO_PKG_NAME");

/// Where the session writes its own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoLogger {
    #[default]
    Stdout,
    Stderr,
    Off,
}

impl InfoLogger {
    pub fn make_writer(self) -> BoxMakeWriter {
        match self {
            InfoLogger::Stdout => BoxMakeWriter::new(std::io::stdout),
            InfoLogger::Stderr => BoxMakeWriter::new(std::io::stderr),
            InfoLogger::Off => BoxMakeWriter::new(std::io::sink),
        }
    }
}

impl FromStr for InfoLogger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdout" => Ok(InfoLogger::Stdout),
            "stderr" => Ok(InfoLogger::Stderr),
            "off" | "none" => Ok(InfoLogger::Off),
            other => Err(Error::Configuration(format!(
                "{INFO_LOGGER_VAR} must be one of stdout, stderr, off (got `{other}`)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub app_name: String,
    pub license_key: String,
    pub endpoint: String,
    pub info_logger: InfoLogger,
    pub distributed_tracing: bool,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let license_key = get(LICENSE_KEY_VAR).ok_or_else(|| {
            Error::SessionInit(format!("license key missing, set {LICENSE_KEY_VAR}"))
        })?;

        let info_logger = match get(INFO_LOGGER_VAR) {
            Some(value) => value.parse()?,
            None => InfoLogger::default(),
        };

        let distributed_tracing = match get(DISTRIBUTED_TRACING_VAR) {
            Some(value) => value.trim().parse::<bool>().map_err(|_| {
                Error::Configuration(format!(
                    "{DISTRIBUTED_TRACING_VAR} must be true or false (got `{value}`)"
                ))
            })?,
            None => true,
        };

        Ok(SessionConfig {
            app_name: get(APP_NAME_VAR).unwrap_or_else(|| DEFAULT_APP_NAME.to_owned()),
            license_key,
            endpoint: get(ENDPOINT_VAR).unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            info_logger,
            distributed_tracing,
        })
    }
}

pub struct Session {
    config: SessionConfig,
    provider: SdkTracerProvider,
    open_transactions: Arc<AtomicUsize>,
}

impl Session {
    /// Builds the OTLP exporter and tracer provider. Must run inside a tokio runtime.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut metadata = MetadataMap::new();
        let api_key: MetadataValue<Ascii> = config
            .license_key
            .parse()
            .map_err(|_| Error::SessionInit("license key is not a valid header value".into()))?;
        metadata.insert("api-key", api_key);

        let endpoint = config
            .endpoint
            .parse::<http::Uri>()
            .map_err(|e| Error::SessionInit(format!("invalid endpoint {}: {e}", config.endpoint)))?;

        let mut builder = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint.clone())
            .with_metadata(metadata);
        if endpoint.scheme_str() == Some("https") {
            builder = builder.with_tls_config(ClientTlsConfig::new().with_native_roots());
        }
        let exporter = builder
            .build()
            .map_err(|e| Error::SessionInit(e.to_string()))?;

        let provider = SdkTracerProvider::builder()
            .with_resource(
                Resource::builder()
                    .with_service_name(config.app_name.clone())
                    .with_attribute(KeyValue::new(
                        "distributed_tracing.enabled",
                        config.distributed_tracing,
                    ))
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();

        Ok(Session::with_provider(config, provider))
    }

    /// Wraps an already built provider, e.g. one without any exporter.
    pub fn with_provider(config: SessionConfig, provider: SdkTracerProvider) -> Self {
        if config.distributed_tracing {
            global::set_text_map_propagator(TraceContextPropagator::new());
        }

        Session {
            config,
            provider,
            open_transactions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Layer that turns `tracing` spans into exported OpenTelemetry spans.
    pub fn layer<S>(&self) -> impl Layer<S>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.provider.tracer(INSTRUMENTATION_NAME))
    }

    /// Best-effort wait for the backend endpoint to accept a connection.
    /// Returns whether it did; never fails.
    pub async fn wait_for_connection(&self, timeout: Duration) -> bool {
        let uri = match self.config.endpoint.parse::<http::Uri>() {
            Ok(uri) => uri,
            Err(err) => {
                warn!(target: TELEMETRY_TARGET, %err, "cannot parse telemetry endpoint");
                return false;
            }
        };
        let Some(host) = uri.host() else {
            warn!(target: TELEMETRY_TARGET, endpoint = %uri, "telemetry endpoint has no host");
            return false;
        };
        let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
            Some("https") => 443,
            _ => 4317,
        });

        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => {
                info!(target: TELEMETRY_TARGET, host, port, app = %self.config.app_name, "telemetry backend connected");
                true
            }
            Ok(Err(err)) => {
                warn!(target: TELEMETRY_TARGET, host, port, %err, "telemetry backend unreachable");
                false
            }
            Err(_) => {
                warn!(target: TELEMETRY_TARGET, host, port, ?timeout, "timed out waiting for telemetry backend");
                false
            }
        }
    }

    pub fn start_transaction(&self, name: &str) -> Transaction {
        let span = info_span!(parent: None, "transaction", otel.name = %name, otel.kind = "server");
        self.open_transactions.fetch_add(1, Ordering::SeqCst);

        Transaction {
            name: name.to_owned(),
            span,
            started_at: Utc::now(),
            open_transactions: self.open_transactions.clone(),
        }
    }

    /// Number of transactions started and not yet ended.
    pub fn open_transactions(&self) -> usize {
        self.open_transactions.load(Ordering::SeqCst)
    }

    /// Flushes buffered spans and shuts the exporter down, waiting at most `timeout`.
    pub async fn shutdown(self, timeout: Duration) {
        let open = self.open_transactions();
        if open > 0 {
            warn!(target: TELEMETRY_TARGET, open, "shutting down with open transactions");
        }

        let provider = self.provider.clone();
        let flush = tokio::task::spawn_blocking(move || {
            provider.force_flush()?;
            provider.shutdown()
        });

        match tokio::time::timeout(timeout, flush).await {
            Ok(Ok(Ok(()))) => info!(target: TELEMETRY_TARGET, "telemetry session shut down"),
            Ok(Ok(Err(err))) => warn!(target: TELEMETRY_TARGET, %err, "telemetry flush failed"),
            Ok(Err(err)) => warn!(target: TELEMETRY_TARGET, %err, "telemetry flush task failed"),
            Err(_) => warn!(target: TELEMETRY_TARGET, ?timeout, "telemetry flush timed out"),
        }
    }
}

/// A named unit of monitored work. Ended explicitly with [`Transaction::end`].
#[derive(Debug)]
pub struct Transaction {
    name: String,
    span: Span,
    started_at: DateTime<Utc>,
    open_transactions: Arc<AtomicUsize>,
}

impl Transaction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn add_attribute(&self, key: &'static str, value: impl Into<opentelemetry::Value>) {
        self.span.set_attribute(key, value);
    }

    pub fn end(self) {
        let elapsed = Utc::now() - self.started_at;
        self.open_transactions.fetch_sub(1, Ordering::SeqCst);
        info!(
            target: TELEMETRY_TARGET,
            transaction = %self.name,
            elapsed_ms = elapsed.num_milliseconds(),
            "transaction ended"
        );
    }
}
