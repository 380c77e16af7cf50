use crate::api::cached_response;
use crate::models::query::{CountryFilter, PageRequest, DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::models::response::ResponseEnvelope;
use crate::services::country::ServiceError;
use crate::AppState;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::Method,
};
use tracing::info;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryQueryParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub region: Option<String>,
    pub min_population: Option<u64>,
    pub max_population: Option<u64>,
}

pub async fn get_countries(
    State(app_state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<CountryQueryParams>, QueryRejection>,
) -> ResponseEnvelope<serde_json::Value> {
    info!("CountryController[getCountries] processed a request");

    let Query(params) = match params {
        Ok(params) => params,
        Err(e) => return ServiceError::BadRequest(e.body_text()).into_envelope(),
    };

    let page = match PageRequest::new(
        params.page.unwrap_or(DEFAULT_PAGE),
        params.limit.unwrap_or(DEFAULT_LIMIT),
    ) {
        Ok(page) => page,
        Err(message) => return ServiceError::BadRequest(message).into_envelope(),
    };
    let filter = CountryFilter::new(params.region, params.min_population, params.max_population);

    cached_response(
        &app_state.cache,
        &method,
        &uri,
        app_state.country_service.list_countries(page, filter),
    )
    .await
}

pub async fn get_country_by_id(
    State(app_state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    id: Result<Path<String>, PathRejection>,
) -> ResponseEnvelope<serde_json::Value> {
    info!("CountryController[getCountryById] processed a request");

    let Path(id) = match id {
        Ok(id) => id,
        Err(e) => return ServiceError::BadRequest(e.body_text()).into_envelope(),
    };

    cached_response(
        &app_state.cache,
        &method,
        &uri,
        app_state.country_service.get_country(&id),
    )
    .await
}
