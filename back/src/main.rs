use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use todo_back::{config::Args, store::TodoStore, AppState};
use tracing::info;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let store = TodoStore::open(&args.database)?;
    let state = Arc::new(AppState::new(store, args.request_timeout()));
    let app = todo_back::app(state).into_make_service_with_connect_info::<SocketAddr>();

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {:?}", err);
                return;
            }
            info!("shutting down");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    info!(addr = %args.listen, database = %args.database.display(), "listening");

    match args.tls() {
        Some((cert, key)) => {
            let config = RustlsConfig::from_pem_file(cert, key).await?;
            axum_server::bind_rustls(args.listen, config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            axum_server::bind(args.listen)
                .handle(handle)
                .serve(app)
                .await?;
        }
    }

    Ok(())
}
