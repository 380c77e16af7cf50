use crate::models::response::ResponseEnvelope;
use crate::services::cache::{CacheKey, ResponseCache};
use crate::AppState;
use axum::{
    http::{Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod aggregates;
pub mod countries;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(api_banner))
        .route("/countries", get(countries::get_countries))
        .route("/countries/{id}", get(countries::get_country_by_id))
        .route("/regions", get(aggregates::get_regions))
        .route("/languages", get(aggregates::get_languages))
        .route("/statistics", get(aggregates::get_statistics))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Serve the envelope cached under this request's signature, computing and
/// caching it on a miss.
pub(crate) async fn cached_response<T, Fut>(
    cache: &ResponseCache,
    method: &Method,
    uri: &Uri,
    compute: Fut,
) -> ResponseEnvelope<serde_json::Value>
where
    T: Serialize,
    Fut: Future<Output = ResponseEnvelope<T>>,
{
    let key = CacheKey::new(method.as_str(), uri.path(), uri.query());
    cache
        .fetch(&key, || async move { compute.await.into_json() })
        .await
}

async fn api_banner() -> ResponseEnvelope<serde_json::Value> {
    ResponseEnvelope::ok(
        "Countries API is running",
        serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "healthy" })),
    )
}

async fn not_found(uri: Uri) -> ResponseEnvelope<()> {
    ResponseEnvelope::failure(
        StatusCode::NOT_FOUND,
        format!("Route {} not found", uri.path()),
    )
}
