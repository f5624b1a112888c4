use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fillproxy::infrastructure::{AppConfig, CliArgs, ConfigLoader};
use fillproxy::presentation::{AppState, build_router, serve, shutdown_signal};

const ENV_FILE: &str = "app.env";

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let env_loaded = dotenvy::from_filename(ENV_FILE).is_ok();
    let args = CliArgs::parse();

    let mut config = ConfigLoader::new()
        .load(args.config.as_deref())
        .wrap_err("failed to load configuration")?;
    config.merge_with_args(args);
    config.validate().wrap_err("invalid configuration")?;

    init_logging(&config)?;
    if env_loaded {
        info!(file = ENV_FILE, "Loaded environment file");
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = load_config()?;
    info!(
        version = fillproxy::VERSION,
        name = %config.name,
        "Starting fillproxy"
    );

    let state = AppState::build(&config)
        .await
        .wrap_err("failed to initialize image pipeline")?;

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("failed to bind {address}"))?;
    info!(address = %address, "Listening");

    serve(
        listener,
        build_router(state),
        shutdown_signal(),
        config.server.shutdown_grace(),
    )
    .await?;

    info!("Shutdown complete");
    Ok(())
}
