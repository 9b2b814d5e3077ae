use std::path::PathBuf;

use {
    clap::Parser,
    tokio_util::sync::CancellationToken,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    chatloom_bridge::Comms,
    chatloom_gateway::{DEFAULT_BIND_ADDRESS, Gateway, Hub, ServerOptions, WEB_ACCOUNT, serve},
    chatloom_store::Store,
};

#[derive(Parser)]
#[command(name = "chatloom", about = "chatloom — multi-network chat bridge")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Address to bind the websocket server to (overrides config).
    #[arg(long)]
    bind: Option<String>,

    /// Config file path (overrides discovery).
    #[arg(long, env = "CHATLOOM_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the history store (overrides config).
    #[arg(long, env = "CHATLOOM_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chatloom starting");

    let config = match &cli.config {
        Some(path) => chatloom_config::load_config(path)?,
        None => chatloom_config::discover_and_load(),
    };

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| config.general.data_dir.clone())
        .unwrap_or_else(chatloom_config::data_dir);
    let store = Store::open(&data_dir.join("history.db")).await?;

    let cancel = CancellationToken::new();
    let (comms, receivers) = Comms::new();
    let (hub, hub_handle) = Hub::new(cancel.clone());
    tokio::spawn(hub.run());

    let web_account = config
        .web
        .keys()
        .min()
        .map(|name| format!("web.{name}"))
        .unwrap_or_else(|| WEB_ACCOUNT.to_string());

    // Network adapter crates plug in here through `Gateway::add_bridge`;
    // the web plane below is always on.
    let gateway = Gateway::new(store, comms.clone(), hub_handle.clone(), cancel.clone())
        .with_web_account(&web_account);
    gateway.connect_all(&config.joins()).await;

    let web = config.instance(&web_account).cloned().unwrap_or_default();
    let bind_address = cli
        .bind
        .clone()
        .or_else(|| (!web.bind_address.is_empty()).then(|| web.bind_address.clone()))
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let static_dir = config
        .general
        .static_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("web/dist"));

    let server = tokio::spawn(serve(
        ServerOptions {
            bind_address,
            static_dir,
            account: web_account,
        },
        comms.clone(),
        hub_handle,
        cancel.clone(),
    ));
    let event_loop = tokio::spawn(gateway.run(receivers));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    let _ = event_loop.await;
    server.await??;
    Ok(())
}
