use std::net::SocketAddr;

use api_server::http::{self, CorsPolicy};
use shared::config::{ApiConfig, load_dotenv};
use shared::llm::gateway_from_env;
use shared::{ReplyService, SessionStore};
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "api_server=info,shared=info,axum=info";
const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
    8080,
);

#[tokio::main]
async fn main() {
    let dotenv_result = load_dotenv();
    init_tracing();
    if let Err(err) = dotenv_result {
        error!("failed to load .env: {err}");
        std::process::exit(1);
    }

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let gateway = match gateway_from_env(config.llm_provider) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(
                provider = config.llm_provider.as_str(),
                "failed to configure llm provider: {err}"
            );
            std::process::exit(1);
        }
    };
    let provider = gateway.provider();

    let sessions = SessionStore::new(config.session_settings());
    let _purger = sessions.spawn_purger(config.session_purge_interval());

    let reply_service = ReplyService::new(gateway, sessions, config.reply_settings());
    let app = http::build_router(http::AppState {
        reply_service,
        provider,
        cors: CorsPolicy::from_origins(&config.cors_allowed_origins),
    });

    let addr: SocketAddr = config.bind_addr.parse().unwrap_or_else(|_| {
        error!(
            bind_addr = %config.bind_addr,
            "invalid API_BIND_ADDR; falling back to {DEFAULT_BIND_ADDR}"
        );
        DEFAULT_BIND_ADDR
    });

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        provider,
        history_max_turns = config.history_max_turns,
        session_idle_ttl_seconds = config.session_idle_ttl_seconds,
        "tutor chat api listening on {}",
        listener.local_addr().unwrap_or(addr)
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server stopped with error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let json_output = std::env::var("LOG_FORMAT")
        .map(|value| value.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_output {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
