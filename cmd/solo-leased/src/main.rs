use clap::Parser;
use pkg_api::server::{ServerConfig, start_server};
use pkg_api::shutdown::shutdown_signal;
use pkg_api::telemetry::{self, LogFormat};
use pkg_constants::env;
use pkg_constants::network::DEFAULT_LEASED_PORT;
use pkg_constants::paths::{DEFAULT_LEASED_CONFIG, DEFAULT_LEASED_DATA_DIR};
use pkg_types::config::{LeasedConfigFile, load_config_file};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "solo-leased", about = "Lease server for solo leader election")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_LEASED_CONFIG)]
    config: String,

    /// Port to listen on
    #[arg(long, env = env::LEASED_PORT)]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long, env = env::LEASED_DATA_DIR)]
    data_dir: Option<String>,

    /// Bearer token required on the lease API
    #[arg(long, env = env::LEASED_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// `text` or `json`
    #[arg(long, env = env::LOG_FORMAT, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format.parse::<LogFormat>()?)?;

    // Load config file (returns defaults if file not found)
    let file_cfg: LeasedConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let port = cli.port.or(file_cfg.port).unwrap_or(DEFAULT_LEASED_PORT);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_LEASED_DATA_DIR.to_string());
    let token = cli.token.or(file_cfg.token).filter(|t| !t.is_empty());

    info!("Starting solo-leased");
    info!("  Port:      {}", port);
    info!("  Data dir:  {}", data_dir);
    match &token {
        Some(t) => info!("  Token:     {}***", t.chars().take(4).collect::<String>()),
        None => info!("  Token:     <none>"),
    }

    let config = ServerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], port)),
        data_dir,
        token,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_tx.send_replace(true);
    });

    start_server(config, shutdown_rx).await?;

    Ok(())
}
