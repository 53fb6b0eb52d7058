//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};

use super::handlers;
use crate::application::services::MaintenanceReport;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    admin_middleware, auth_middleware, optional_auth_middleware, track_metrics,
};
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        // Payment provider callbacks
        .route("/api/StoreStripeWebhook", post(handlers::webhooks::stripe_webhook))
        .route("/api/store/paypal-webhook", post(handlers::webhooks::paypal_webhook))
        .nest("/api", api_routes(state.clone()))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let size = state.db.size();
    let idle = state.db.num_idle() as u32;
    metrics::update_db_pool_stats(
        idle,
        size.saturating_sub(idle),
        state.settings.database.max_connections,
    );

    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Run one maintenance pass now
async fn run_maintenance(State(state): State<AppState>) -> Json<MaintenanceReport> {
    Json(state.maintenance_service().run_once().await)
}

/// Storefront API: public, session and account routes plus `/admin`
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(public_routes())
        .merge(session_routes(state.clone()))
        .merge(account_routes(state.clone()))
        .nest("/admin", admin_routes(state))
}

/// Routes open to everyone
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/account/register", post(handlers::auth::register))
        .route("/account/login", post(handlers::auth::login))
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/{slug}", get(handlers::catalog::get_product))
        .route("/checkout/paypal/return", get(handlers::checkout::paypal_return))
        .route("/downloads/{token}", get(handlers::downloads::redeem))
        .route("/gallery", get(handlers::gallery::list_albums))
        .route("/gallery/{album}", get(handlers::gallery::list_album))
        .route("/gallery/images/{image_id}/file", get(handlers::gallery::image_file))
        .route("/links", get(handlers::links::list_links))
}

/// Routes that serve guests and customers alike (token optional)
fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/cart",
            get(handlers::cart::view_cart).delete(handlers::cart::clear_cart),
        )
        .route("/cart/items", post(handlers::cart::add_item))
        .route(
            "/cart/items/{product_id}",
            put(handlers::cart::set_quantity).delete(handlers::cart::remove_item),
        )
        .route("/checkout", post(handlers::checkout::place_order))
        .route("/documents", get(handlers::documents::list_documents))
        .route(
            "/documents/{document_id}/download",
            get(handlers::documents::download_document),
        )
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}

/// Routes for signed-in customers
fn account_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/account/me", get(handlers::auth::me))
        .route("/cart/merge", post(handlers::cart::merge_cart))
        .route("/orders", get(handlers::orders::list_my_orders))
        .route("/orders/{order_id}", get(handlers::orders::get_my_order))
        .route(
            "/subscriptions",
            get(handlers::subscriptions::list_my_subscriptions),
        )
        .route(
            "/subscriptions/checkout",
            post(handlers::subscriptions::start_checkout),
        )
        .route(
            "/subscriptions/{subscription_id}/cancel",
            post(handlers::subscriptions::cancel_subscription),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Store administration (authenticated admins only)
fn admin_routes(state: AppState) -> Router<AppState> {
    let upload_limit = state.settings.storage.max_upload_bytes;

    Router::new()
        // Catalog and stock
        .route(
            "/products",
            get(handlers::catalog::admin_list_products).post(handlers::catalog::create_product),
        )
        .route(
            "/products/{product_id}",
            put(handlers::catalog::update_product).delete(handlers::catalog::deactivate_product),
        )
        .route("/products/{product_id}/stock", put(handlers::catalog::set_stock))
        .route(
            "/products/{product_id}/stock/adjust",
            post(handlers::catalog::adjust_stock),
        )
        // Orders and fulfilment
        .route("/orders", get(handlers::orders::admin_list_orders))
        .route("/orders/{order_id}", get(handlers::orders::admin_get_order))
        .route(
            "/orders/{order_id}/downloads",
            get(handlers::downloads::admin_list_for_order),
        )
        .route("/orders/{order_id}/ship", post(handlers::orders::ship_order))
        .route("/orders/{order_id}/deliver", post(handlers::orders::deliver_order))
        .route("/orders/{order_id}/refund", post(handlers::orders::refund_order))
        .route(
            "/downloads/{download_id}/reset",
            post(handlers::downloads::admin_reset),
        )
        // Subscriptions
        .route(
            "/subscriptions",
            get(handlers::subscriptions::admin_list_subscriptions),
        )
        .route(
            "/subscriptions/{subscription_id}",
            get(handlers::subscriptions::admin_get_subscription),
        )
        // Content
        .route("/documents", post(handlers::documents::upload_document))
        .route(
            "/documents/{document_id}",
            put(handlers::documents::update_document).delete(handlers::documents::delete_document),
        )
        .route("/gallery/images", post(handlers::gallery::upload_image))
        .route("/gallery/images/{image_id}", delete(handlers::gallery::delete_image))
        .route("/gallery/albums/{album}/order", put(handlers::gallery::reorder_album))
        .route(
            "/links",
            get(handlers::links::admin_list_links).post(handlers::links::create_link),
        )
        .route(
            "/links/{link_id}",
            put(handlers::links::update_link).delete(handlers::links::delete_link),
        )
        // Secure configuration
        .route(
            "/credentials",
            get(handlers::credentials::list_credentials).post(handlers::credentials::set_credential),
        )
        .route("/credentials/{key}", delete(handlers::credentials::delete_credential))
        .route("/credentials/cache/flush", post(handlers::credentials::flush_cache))
        .route("/maintenance/run", post(run_maintenance))
        .layer(DefaultBodyLimit::max(upload_limit))
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
