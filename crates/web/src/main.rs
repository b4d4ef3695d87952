use std::net::SocketAddr;

use tracing::info;

use todo_web::server::WebServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let web_addr: SocketAddr = std::env::var("TODO_WEB_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let cfg = WebServerConfig::from_env()?;

    info!(
        "Starting to-do reference page on http://{} (session ttl: {}s, max sessions: {})",
        web_addr,
        cfg.session_ttl.as_secs(),
        cfg.max_sessions
    );

    todo_web::server::serve(web_addr, cfg).await
}
