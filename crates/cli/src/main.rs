mod admin;

use std::sync::Arc;

use {
    clap::Parser,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    parlor_config::ServerConfig, parlor_events::EventBus, parlor_server::Server,
    parlor_store::Store,
};

#[derive(Parser)]
#[command(name = "parlor", about = "parlor — a small multi-user chat server")]
struct Cli {
    /// IP address or hostname to bind (overrides config value).
    #[arg(short = 'a', long)]
    host: Option<String>,

    /// TCP port to bind (overrides config value).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Run the terminal admin console instead of headless.
    #[arg(short = 'g', long)]
    gui: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

/// Initialise tracing: an EnvFilter-driven fmt layer on stderr plus a
/// daily-rolling file layer in the configured log directory. The returned
/// guard must stay alive for the file writer to flush.
fn init_telemetry(
    cli: &Cli,
    config: &ServerConfig,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    std::fs::create_dir_all(&config.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "parlor.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Config file first, CLI flags on top.
    let mut config = parlor_config::discover_and_load();
    if let Some(host) = cli.host.clone() {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;

    let _log_guard = init_telemetry(&cli, &config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "parlor starting");

    let store = Arc::new(Store::open(&config.db_path).await?);
    let events = Arc::new(EventBus::new());
    if cli.gui {
        admin::install_console(&events);
    }

    let server = Arc::new(Server::new(config, store, events));

    let stopper = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            stopper.stop();
        }
    });

    // A failed bind is the one startup error worth a non-zero exit.
    server.run().await?;
    Ok(())
}
