mod api;
mod cli;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use insight_core::Config;
use insight_llm::Analyst;

use crate::cli::{Cli, Command};
use crate::state::AppState;

fn load_config() -> Config {
    insight_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.log_summary();

    let analyst = Analyst::from_config(&config);
    info!(
        provider = %config.llm.provider,
        model = %config.llm.active_model(),
        "analyst ready"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router::build_router(Arc::new(AppState { analyst, config }));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command() {
        Command::Serve { host, port } => serve(config, host, port).await?,
        Command::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
            if !config.llm.is_configured() {
                anyhow::bail!("LLM provider '{}' is missing its API key", config.llm.provider);
            }
        }
    }

    Ok(())
}
