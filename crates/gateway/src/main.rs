use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gw_gateway::state::AppStateBuilder;

/// Local-first AI assistant gateway.
#[derive(Debug, Parser)]
#[command(name = "gateway", version, about)]
struct Cli {
    /// Directory holding config.json, sessions/, schedules.json, and the
    /// audit log. Defaults to the user's data directory.
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let state_path = cli.state_dir.unwrap_or_else(default_state_dir);
    std::fs::create_dir_all(&state_path)?;

    let (state, _scheduler) = AppStateBuilder::build(state_path.clone())?;

    init_tracing(&state.config.observability);

    tracing::info!(
        state_dir = %state_path.display(),
        host = %state.config.gateway.host,
        port = state.config.gateway.port,
        "gateway starting"
    );

    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    let app = gw_gateway::transport::router(state, Instant::now());
    axum::serve(listener, app).await?;

    Ok(())
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gateway")
}

/// Local JSON logging always runs; an OTLP/gRPC exporter is layered on
/// top only when `observability.otlp_endpoint` (or `GATEWAY_OTEL_ENDPOINT`,
/// which takes precedence) names a collector.
fn init_tracing(observability: &gw_domain::config::ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gateway={},tower_http=info", observability.log_level)));

    let fmt_layer = tracing_subscriber::fmt::layer().json();

    let endpoint = std::env::var("GATEWAY_OTEL_ENDPOINT")
        .ok()
        .or_else(|| observability.otlp_endpoint.clone());

    match endpoint {
        Some(endpoint) => match build_otel_layer(&endpoint, observability) {
            Ok(otel_layer) => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .with(otel_layer)
                    .init();
            }
            Err(e) => {
                tracing_subscriber::registry().with(filter).with(fmt_layer).init();
                tracing::warn!(error = %e, "failed to initialize OTLP exporter, continuing without it");
            }
        },
        None => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }
}

fn build_otel_layer(
    endpoint: &str,
    observability: &gw_domain::config::ObservabilityConfig,
) -> anyhow::Result<tracing_opentelemetry::OpenTelemetryLayer<tracing_subscriber::Registry, opentelemetry_sdk::trace::Tracer>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
    use opentelemetry_sdk::Resource;

    let sampler = if observability.sample_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if observability.sample_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(observability.sample_rate)
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let resource = Resource::builder_empty()
        .with_attributes(vec![KeyValue::new(
            "service.name",
            observability.service_name.clone(),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler)
        .with_batch_exporter(exporter)
        .build();

    // `Tracer` holds its own clone of the provider's inner state, so the
    // batch exporter keeps running after `provider` itself goes out of
    // scope here.
    let tracer = provider.tracer("gateway");

    Ok(tracing_opentelemetry::layer().with_tracer(tracer))
}
