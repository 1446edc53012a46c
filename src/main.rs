use clap::Parser;
use gemini_relay::config::config_search_paths;
use gemini_relay::server::CHAT_ROUTE;
use gemini_relay::{build_router, AppState, RelayConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gemini-relay",
    about = "Relay chat messages to the Gemini generateContent API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Default model when requests don't name one (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Upstream API base URL (overrides config)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Audit log file path
    #[arg(long, default_value = "gemini-relay.log")]
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
                .unwrap_or_else(|_| "gemini_relay=info,tower_http=info".into()),
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

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(model) = cli.model {
        config.upstream.default_model = model;
    }
    if let Some(url) = cli.upstream_url {
        config.upstream.base_url = url;
    }

    let api_key = config.resolve_api_key();
    if api_key.is_none() {
        warn!(
            "{} is not set; chat requests will fail until it is configured",
            config.upstream.api_key_env
        );
    }

    let logger = SharedLogger::new(&cli.log_file)?;

    let mut client = reqwest::Client::builder();
    if let Some(secs) = config.upstream.timeout_secs {
        client = client.timeout(std::time::Duration::from_secs(secs));
    }
    let client = client.build()?;

    info!("gemini-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", config.upstream.base_url);
    info!("  Model:     {}", config.upstream.default_model);
    info!("  Key env:   {}", config.upstream.api_key_env);
    info!("  Port:      {}", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        api_key,
        client,
        logger,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}{}", bind_addr, CHAT_ROUTE);

    axum::serve(listener, app).await?;

    Ok(())
}
