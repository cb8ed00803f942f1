use std::env;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mockserver::{build_router, MockState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mockserver=debug,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = env::var("MOCK_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

    let app = build_router(MockState::new());

    let listener = TcpListener::bind(&addr).await?;
    info!("mockserver escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
