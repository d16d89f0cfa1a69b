use tokio::net::TcpListener;
use tracing::{info, warn};
use workerlinks::{
    api::{self, app_state_capsule},
    config::{self, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    if config.secret.is_none() {
        warn!("WORKERLINKS_SECRET is not set; all link creation requests will be rejected");
    }

    let container = config::init_container(config).await?;

    let app = api::router(container.read(app_state_capsule));

    let listener = TcpListener::bind(container.read(config::addr_capsule)).await?;
    info!(addr = %listener.local_addr()?, "Started listening on TCP");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
