//! FedPharm-X — federated drug-discovery training simulator.
//! Entry point for the `fedpharm` server binary.
//!
//! Run with: cargo run -p fedpharm-web --bin fedpharm

use std::net::SocketAddr;
use std::sync::Arc;

use fedpharm_sim::rng::StdRandom;
use fedpharm_sim::{Session, SessionHandle};
use fedpharm_web::config::AppConfig;
use fedpharm_web::router::build_router;
use fedpharm_web::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fedpharm=debug,info")),
        )
        .init();

    info!("FedPharm-X starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!(
        rounds = config.session.simulation.total_rounds,
        tick_ms = config.session.simulation.tick_interval_ms,
        activity = config.session.activity.enabled,
        "Session configured"
    );

    let intelligence = Arc::new(config.llm.build_service());
    let session = Session::new(config.session.clone(), Box::new(StdRandom::from_entropy()));
    let handle = SessionHandle::spawn(session, intelligence);

    let app = build_router(AppState::new(handle));

    let addr: SocketAddr = config.server.bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
