//! `todo-e2e serve` - run the reference page in the foreground

use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;
use tracing::info;

use todo_web::WebServerConfig;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1:8080", env = "TODO_WEB_ADDR")]
    pub addr: SocketAddr,

    /// Drop a browser session's list after this many idle seconds
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,

    /// Upper bound on live sessions
    #[arg(long)]
    pub max_sessions: Option<usize>,
}

pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let mut cfg = WebServerConfig::from_env()?;
    if let Some(ttl) = args.session_ttl_secs {
        cfg.session_ttl = Duration::from_secs(ttl);
    }
    if let Some(max) = args.max_sessions {
        cfg.max_sessions = max;
    }

    info!(
        "Serving reference page on http://{} (session ttl: {}s)",
        args.addr,
        cfg.session_ttl.as_secs()
    );
    todo_web::server::serve(args.addr, cfg).await
}
