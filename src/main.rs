use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use mcp_chat_backend::config::{mask_key, AppConfig};
use mcp_chat_backend::conversations::{ConversationStore, MemoryConversationStore, PgConversationStore};
use mcp_chat_backend::llm::OpenAiCompatModel;
use mcp_chat_backend::mcp::config::load_server_descriptors;
use mcp_chat_backend::state::AppState;
use mcp_chat_backend::tools::email::UnconfiguredMailbox;

async fn build_app(config: AppConfig) -> anyhow::Result<(axum::Router, AppState)> {
    let conversations: Arc<dyn ConversationStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(std::time::Duration::from_secs(3))
                .idle_timeout(std::time::Duration::from_secs(600))
                .max_lifetime(std::time::Duration::from_secs(1800))
                .connect(url)
                .await
                .context("Failed to connect to Postgres")?;

            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                tracing::warn!("Migration skipped (schema likely exists): {}", e);
            }
            Arc::new(PgConversationStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, conversations are kept in memory only");
            Arc::new(MemoryConversationStore::new())
        }
    };

    let servers = match load_server_descriptors(&config.mcp_servers_file) {
        Ok(servers) => servers,
        Err(e) => {
            tracing::warn!("startup: {} (continuing without MCP servers)", e);
            Vec::new()
        }
    };
    tracing::info!("startup: {} MCP server(s) configured", servers.len());

    if config.email.is_configured() {
        tracing::warn!("startup: email credentials set but no mailbox transport is wired; email tools will report it");
    }

    tracing::info!(
        "startup: model={} base_url={} api_key={}",
        config.model_name,
        config.model_base_url,
        mask_key(config.llm_api_key.as_deref().unwrap_or_default())
    );
    let http = reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let model = Arc::new(OpenAiCompatModel::new(
        http,
        &config.model_base_url,
        &config.model_name,
        config.llm_api_key.clone(),
    ));

    let state = AppState::new(config, model, conversations, Arc::new(UnconfiguredMailbox), servers);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(86_400));

    let nosniff: SetResponseHeaderLayer<HeaderValue> = SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let frame_deny: SetResponseHeaderLayer<HeaderValue> = SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );

    // Rate limiting: 30 req burst, replenish 1 per 2 seconds, per IP
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(30)
        .finish()
        .context("invalid rate limiter configuration")?;

    let app = mcp_chat_backend::create_router(state.clone())
        .layer(GovernorLayer::new(governor_conf))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(cors)
        .layer(nosniff)
        .layer(frame_deny)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CompressionLayer::new());

    Ok((app, state))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);
    let (app, state) = build_app(config).await?;

    // ── Non-blocking startup: remote tool discovery in background ──
    let startup_state = state.clone();
    tokio::spawn(async move {
        let report = startup_state.refresh_tools().await;
        if !report.servers_failed.is_empty() {
            tracing::warn!(
                "startup: MCP servers unavailable: {}",
                report.servers_failed.join(", ")
            );
        }
        startup_state.mark_ready();
    });

    tracing::info!("MCP chat backend listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
