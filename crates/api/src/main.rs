//! Ecom24 API - storefront backend.
//!
//! This binary serves the REST API on port 4000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON envelopes under `/api/v1`
//! - `PostgreSQL` via sqlx (or an in-memory store for demos)
//! - moka response cache invalidated on writes
//! - Stripe payment intents and Cloudinary photo hosting over HTTPS

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecom24_api::cache::MokaCache;
use ecom24_api::config::{ApiConfig, StoreBackend};
use ecom24_api::db::{self, MemoryStore, PgStore, Store};
use ecom24_api::services::media::CloudinaryClient;
use ecom24_api::services::payments::StripeClient;
use ecom24_api::state::{AppSettings, AppState, Backends};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
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

async fn build_store(config: &ApiConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match (config.store_backend, &config.database_url) {
        (StoreBackend::Postgres, Some(url)) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");
            Ok(Arc::new(PgStore::new(pool)))
        }
        (StoreBackend::Postgres, None) => Err("DATABASE_URL is required for postgres".into()),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ecom24_api=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p ecom24-cli -- migrate

    let backends = Backends {
        store: build_store(&config).await?,
        cache: Arc::new(MokaCache::new(config.cache.max_capacity, config.cache.ttl)),
        payments: Arc::new(StripeClient::new(&config.stripe)),
        media: Arc::new(CloudinaryClient::new(&config.cloudinary)),
    };
    let settings = AppSettings {
        products_per_page: config.products_per_page,
        payment_currency: config.stripe.currency.clone(),
    };
    let state = AppState::new(backends, settings);

    let app = ecom24_api::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "API exited with error");
            #[allow(clippy::print_stderr)]
            {
                eprintln!("ecom24-api: {e}");
            }
            std::process::ExitCode::FAILURE
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
