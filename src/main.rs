use clap::Parser;
use deepseek_proxy::config::config_search_paths;
use deepseek_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "deepseek-proxy",
    about = "OpenAI-compatible chat completions proxy in front of DeepSeek",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream base URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Log file path
    #[arg(long, default_value = "deepseek-proxy.log")]
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
                .unwrap_or_else(|_| "deepseek_proxy=info,tower_http=info".into()),
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

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(base_url) = cli.base_url {
        config.upstream.base_url = base_url;
    }

    // Refuse to start without a credential.
    let upstream = config.resolve_upstream()?;
    let logger = SharedLogger::new(&cli.log_file)?;

    info!("deepseek-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", upstream.completions_url);
    info!("  Model:     {}", upstream.chat_model);
    info!("  Alias:     {}", config.models.alias);
    info!("  Port:      {}", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting deepseek-proxy upstream={} port={}",
            upstream.completions_url, config.port
        ),
    );

    // No overall request timeout: it would cut long event streams.
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .build()?;

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        upstream,
        client,
        logger,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
