//! API server entry point.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use api::config::{Config, LogFormat};
use api::DynProvider;
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{
    CheckoutSettings, HostedCheckoutProvider, InMemoryPaymentProvider, PreviewPolicy,
    WebhookVerifier,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn payment_provider(config: &Config) -> Result<DynProvider, BoxError> {
    match &config.payment_secret_key {
        Some(key) => {
            let timeout = Duration::from_secs(config.payment_timeout_secs);
            tracing::info!(
                base = %config.payment_api_base,
                timeout_secs = config.payment_timeout_secs,
                "using hosted checkout provider"
            );
            Ok(Arc::new(HostedCheckoutProvider::with_timeout(
                config.payment_api_base.clone(),
                key.clone(),
                timeout,
            )?))
        }
        None => {
            tracing::warn!("PAYMENT_SECRET_KEY not set, using in-memory checkout provider");
            Ok(Arc::new(InMemoryPaymentProvider::new()))
        }
    }
}

fn webhook_verifier(config: &Config) -> WebhookVerifier {
    let secret = match &config.webhook_secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::warn!("WEBHOOK_SECRET not set, payment notifications will be rejected");
            uuid::Uuid::new_v4().to_string()
        }
    };
    WebhookVerifier::new(secret).with_tolerance(config.webhook_tolerance_secs)
}

async fn serve<S: EventStore + Clone + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = api::create_state(
        store,
        payment_provider(config)?,
        webhook_verifier(config),
        CheckoutSettings::new(config.client_url.clone(), config.checkout_currency.clone()),
        PreviewPolicy::default(),
        config.operator_token.clone(),
    );

    let replayed = state.projection_processor.run_catch_up().await?;
    tracing::info!(events = replayed, "read models caught up");

    // Settled purchases left part-way by an earlier process.
    match state.reconciler.resume_outstanding().await {
        Ok(attempts) if attempts.iter().any(|a| !a.reconciled) => {
            tracing::warn!(?attempts, "some purchases are still not reconciled");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "could not re-drive outstanding purchases"),
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();
    init_tracing(&config);
    tracing::debug!(?config, "configuration loaded");

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresEventStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            serve(store, &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory");
            serve(InMemoryEventStore::new(), &config, metrics_handle).await
        }
    }
}
