use clap::Parser;
use orchestrator::{config, routes, state};
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "agent-orchestrator",
    about = "Turns labeled tracker issues into autonomous coding-agent attempts",
    version,
    disable_help_subcommand = true
)]
struct Cli {
    /// Port to bind to. Overrides the PORT env var when provided.
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,orchestrator={level},processor={level},agent_runner={level},providers={level},workspace_manager={level},task_queue={level},state_store={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("failed to build tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let mut app_config = config::Config::from_env()?;
    if let Some(port) = cli.port {
        app_config.port = port;
    }
    let port = app_config.port;

    let app_state = state::bootstrap(app_config).await?;
    let router = routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "orchestrator listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http listener stopped; any in-flight task is left running, per the non-graceful-shutdown policy");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
