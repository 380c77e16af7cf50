use crate::models::country::CountryRecord;
use crate::models::query::{ExtremalRecord, GroupTotal};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Uniform wrapper returned by every read operation and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T> {
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: true,
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: false,
            status_code: status_code.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> ResponseEnvelope<T> {
    /// Erase the payload type so that cached and freshly computed envelopes
    /// share one representation.
    pub fn into_json(self) -> ResponseEnvelope<serde_json::Value> {
        let data = match self.data {
            Some(data) => match serde_json::to_value(data) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return ResponseEnvelope::failure(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_SERVER_ERROR",
                    );
                }
            },
            None => None,
        };
        ResponseEnvelope {
            status: self.status,
            status_code: self.status_code,
            message: self.message,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ResponseEnvelope<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    pub current_page: u64,
    pub last_page: u64,
    pub page_size: u64,
    pub total_record: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryPage {
    pub pagination: PaginationMetadata,
    pub countries: Vec<CountryRecord>,
}

/// One entry of the statistics sequence, serialized as a single-key object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatisticsEntry {
    TotalCountries(u64),
    LargestCountry(Option<ExtremalRecord>),
    SmallestCountry(Option<ExtremalRecord>),
    MostSpokenLanguage(Option<GroupTotal>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub removed: u64,
    pub inserted: u64,
}
