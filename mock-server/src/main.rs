use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mut state = mock_server::MockState::sample();
    if let Ok(key) = std::env::var("LIGHTFEED_MOCK_API_KEY") {
        state = state.api_key(key);
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, database = mock_server::SAMPLE_DATABASE, "mock records API listening");
    mock_server::run_with(listener, state).await
}
