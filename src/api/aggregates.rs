use crate::api::cached_response;
use crate::models::query::GroupField;
use crate::models::response::ResponseEnvelope;
use crate::AppState;
use axum::{
    extract::{OriginalUri, State},
    http::Method,
};
use tracing::info;

pub async fn get_regions(
    State(app_state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> ResponseEnvelope<serde_json::Value> {
    info!("CountryController[getRegions] processed a request");

    cached_response(
        &app_state.cache,
        &method,
        &uri,
        app_state.country_service.group_by(GroupField::Region),
    )
    .await
}

pub async fn get_languages(
    State(app_state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> ResponseEnvelope<serde_json::Value> {
    info!("CountryController[getLanguages] processed a request");

    cached_response(
        &app_state.cache,
        &method,
        &uri,
        app_state.country_service.group_by(GroupField::Language),
    )
    .await
}

pub async fn get_statistics(
    State(app_state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> ResponseEnvelope<serde_json::Value> {
    info!("CountryController[getStatistics] processed a request");

    cached_response(
        &app_state.cache,
        &method,
        &uri,
        app_state.country_service.statistics(),
    )
    .await
}
