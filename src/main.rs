use clap::Parser;
use lmstudio_bridge::config::config_search_paths;
use lmstudio_bridge::translate::types::ReasoningEffort;
use lmstudio_bridge::{build_router, ApiMode, AppState, BridgeConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "lmstudio-bridge",
    about = "Chat-completions bridge for LM Studio's responses API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream base URL, e.g. http://localhost:1234/v1 (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Upstream protocol (overrides config)
    #[arg(long, value_enum)]
    api: Option<ApiMode>,

    /// Default reasoning effort for translated requests (overrides config)
    #[arg(long, value_enum)]
    reasoning_effort: Option<ReasoningEffort>,

    /// Log file path
    #[arg(long, default_value = "lmstudio-bridge.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lmstudio_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = BridgeConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(base_url) = cli.base_url {
        config.provider.base_url = Some(base_url);
    }
    if let Some(api) = cli.api {
        config.provider.api = api;
    }
    if let Some(effort) = cli.reasoning_effort {
        config.provider.reasoning_effort = Some(effort);
    }

    for warning in config.warnings() {
        warn!("{warning}");
    }

    let debug_enabled = config.debug_enabled();
    let logger = SharedLogger::new(&cli.log_file, debug_enabled)?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(600))
        .build()?;

    let port = config.port;
    let state = AppState::new(config, client, logger.clone())?;

    info!("lmstudio-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", state.base_url);
    info!("  API:       {}", state.fetch.api());
    if let Some(effort) = state.config.provider.reasoning_effort {
        info!("  Reasoning: {}", effort);
    }
    info!("  Port:      {}", port);
    info!("  Debug:     {}", debug_enabled);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting lmstudio-bridge upstream={} api={} port={}",
            state.base_url,
            state.fetch.api(),
            port
        ),
    );

    let app = build_router(Arc::new(state));
    let bind_addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OPENAI_BASE_URL=http://localhost:{}/v1", port);

    axum::serve(listener, app).await?;

    Ok(())
}
