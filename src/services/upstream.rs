use crate::models::country::UpstreamCountry;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Upstream request failed: {0}")]
    RequestFailed(String),
    #[error("Upstream returned HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

/// Provider of the full upstream country dataset, fetched as one batch.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<UpstreamCountry>, UpstreamError>;
}

pub struct RestCountriesClient {
    client: reqwest::Client,
    url: String,
}

impl RestCountriesClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpstreamError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl UpstreamSource for RestCountriesClient {
    async fn fetch_all(&self) -> Result<Vec<UpstreamCountry>, UpstreamError> {
        info!("Fetching countries from {}", self.url);

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(UpstreamError::HttpStatus(response.status()));
        }

        let countries: Vec<UpstreamCountry> = response.json().await?;
        info!("Fetched {} countries from upstream", countries.len());

        Ok(countries)
    }
}
