use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use o11y_rca::{
    agent::RcaAgent,
    config::Config,
    dispatch::{AnalysisWorker, Dispatcher},
    metrics::register_metrics,
    o11y::{GrafanaClient, O11yClients},
    server::Server,
    sinks, Error, Result,
};

/// Grafana alert webhook receiver that runs root cause analysis.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Listen address, overrides SERVER_ADDR
    #[arg(long)]
    addr: Option<String>,

    /// LLM provider (anthropic, openai, mock), overrides LLM_PROVIDER
    #[arg(long)]
    provider: Option<String>,

    /// Model name, overrides LLM_MODEL
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(provider) = args.provider {
        config.llm.provider = provider.to_lowercase();
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    config.validate()?;
    info!(
        addr = %config.server.addr,
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Loaded configuration"
    );

    register_metrics();

    let clients = O11yClients::new(&config.backends)?;
    let agent = RcaAgent::new(config.llm.clone(), clients.clone())
        .map_err(|e| Error::Agent(format!("{:#}", e)))?;
    let grafana = GrafanaClient::new(&config.grafana)?;
    let sinks = sinks::from_config(&config)?;

    // Analyses run one at a time on a background worker
    let (dispatcher, rx) = Dispatcher::channel(config.dispatch.queue_capacity);
    let worker = AnalysisWorker::new(agent, grafana, sinks);
    tokio::spawn(worker.run(rx));

    let server = Server::new(&config, dispatcher, clients);

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;

    Ok(())
}
