//! HTTP surface of the learning platform.
//!
//! Wires the catalog, accounts, progress tracker and payment handling onto an
//! axum router, with request tracing and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{AccountService, CatalogService, ProgressService};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{CheckoutService, CheckoutSettings, PreviewPolicy, Reconciler, WebhookVerifier};
use projections::{CourseCatalogView, Projection, ProjectionProcessor, PurchaseLedgerView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, DynProvider};

/// Builds the router over shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/users", post(routes::users::register::<S>))
        .route(
            "/users/me",
            get(routes::users::profile::<S>).patch(routes::users::update_profile::<S>),
        )
        .route("/courses", post(routes::courses::create::<S>))
        .route("/courses/published", get(routes::courses::published::<S>))
        .route("/courses/search", get(routes::courses::search::<S>))
        .route("/courses/mine", get(routes::courses::mine::<S>))
        .route(
            "/courses/{id}",
            get(routes::courses::get::<S>).patch(routes::courses::edit::<S>),
        )
        .route("/courses/{id}/publish", post(routes::courses::publish::<S>))
        .route(
            "/courses/{id}/unpublish",
            post(routes::courses::unpublish::<S>),
        )
        .route(
            "/courses/{id}/lectures",
            get(routes::courses::lectures::<S>).post(routes::courses::create_lecture::<S>),
        )
        .route(
            "/courses/{id}/lectures/{lecture}",
            patch(routes::courses::edit_lecture::<S>)
                .delete(routes::courses::remove_lecture::<S>),
        )
        .route(
            "/courses/{id}/purchase-status",
            get(routes::checkout::status::<S>),
        )
        .route("/progress/{course}", get(routes::progress::get::<S>))
        .route(
            "/progress/{course}/lectures/{lecture}/view",
            post(routes::progress::lecture_viewed::<S>),
        )
        .route(
            "/progress/{course}/complete",
            post(routes::progress::complete::<S>),
        )
        .route(
            "/progress/{course}/incomplete",
            post(routes::progress::incomplete::<S>),
        )
        .route("/checkout", post(routes::checkout::initiate::<S>))
        .route("/purchases", get(routes::checkout::list::<S>))
        .route("/webhooks/payments", post(routes::webhooks::payments::<S>))
        .route(
            "/admin/reconciliation/failures",
            get(routes::reconciliation::failures::<S>),
        )
        .route(
            "/admin/reconciliation/resume",
            post(routes::reconciliation::resume_outstanding::<S>),
        )
        .route(
            "/admin/reconciliation/{purchase_id}/resume",
            post(routes::reconciliation::resume::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the services over one store and registers the read models on a
/// shared projection processor.
pub fn create_state<S: EventStore + Clone + 'static>(
    store: S,
    provider: DynProvider,
    verifier: WebhookVerifier,
    settings: CheckoutSettings,
    policy: PreviewPolicy,
    operator_token: Option<String>,
) -> Arc<AppState<S>> {
    let courses = CourseCatalogView::new();
    let purchases = PurchaseLedgerView::new();

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(courses.clone()) as Box<dyn Projection>);
    processor.register(Box::new(purchases.clone()) as Box<dyn Projection>);
    let processor = Arc::new(processor);

    let checkout = CheckoutService::new(
        store.clone(),
        provider,
        processor.clone(),
        purchases.clone(),
        settings,
    );
    let reconciler =
        Reconciler::new(store.clone(), processor.clone(), purchases).with_policy(policy);

    Arc::new(AppState {
        accounts: AccountService::new(store.clone()),
        catalog: CatalogService::new(store.clone()),
        progress: ProgressService::new(store),
        checkout,
        reconciler,
        verifier,
        courses,
        projection_processor: processor,
        operator_token,
    })
}
