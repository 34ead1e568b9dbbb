//! Atelier server - custom order brokering service.
//!
//! This binary serves the order and chat API on port 3000.
//!
//! # Architecture
//!
//! - Axum handlers over two engines (order lifecycle, chat rooms)
//! - `PostgreSQL` for orders, chat history, and the notification queue
//! - In-process moka cache for single-order reads
//! - Background worker delivering queued notifications over SMTP
//!
//! Identity is supplied by the authentication proxy in front of this
//! service; the binary itself never sees a credential.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_server::cache::OrderCache;
use atelier_server::config::ServerConfig;
use atelier_server::db;
use atelier_server::db::chat::PgChatGateway;
use atelier_server::db::orders::PgOrderGateway;
use atelier_server::notifications::{
    EmailSender, NotificationWorker, PgNotificationQueue, RetryPolicy,
};
use atelier_server::routes;
use atelier_server::services::{ChatService, OrderService};
use atelier_server::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p atelier-cli -- migrate

    // SMTP is optional; without it the worker logs deliveries instead
    let mailer = config.email.as_ref().map(|email_config| {
        EmailSender::new(email_config).expect("Failed to configure SMTP transport")
    });

    // Background notification delivery
    let worker = NotificationWorker::new(
        pool.clone(),
        mailer,
        config.notifications.poll_interval,
    );
    tokio::spawn(worker.run());

    // Assemble the engines with their injected collaborators
    let retry = RetryPolicy {
        attempts: config.notifications.attempts,
        base_delay: config.notifications.backoff,
    };
    let dispatcher = Arc::new(PgNotificationQueue::new(pool.clone()));
    let cache = OrderCache::new(config.cache.capacity, config.cache.ttl);

    let orders = OrderService::new(
        Arc::new(PgOrderGateway::new(pool.clone())),
        cache,
        dispatcher.clone(),
        retry,
    );
    let chat = ChatService::new(Arc::new(PgChatGateway::new(pool)), dispatcher, retry);

    let addr = config.socket_addr();
    let state = AppState::new(config, orders, chat);
    let app = routes::router(state);

    tracing::info!(%addr, "Atelier server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
