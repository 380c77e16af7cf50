use crate::models::country::CountryRecord;
use crate::models::query::{
    CountryFilter, ExtremalSpec, GroupBucket, GroupField, GroupSpec, GroupTotal, NumericField,
    PageRequest,
};
use crate::models::response::{CountryPage, PaginationMetadata, ResponseEnvelope, StatisticsEntry};
use crate::services::store::{CountryStore, StoreError};
use crate::services::upstream::UpstreamError;
use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(message) => ServiceError::NotFound(message),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Store(_) | ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing envelope. Internal detail stays in the logs.
    pub fn into_envelope<T>(self) -> ResponseEnvelope<T> {
        let status_code = self.status_code();
        match self {
            ServiceError::NotFound(message) | ServiceError::BadRequest(message) => {
                ResponseEnvelope::failure(status_code, message)
            }
            ServiceError::Store(_) | ServiceError::Upstream(_) => {
                ResponseEnvelope::failure(status_code, INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn respond<T>(operation: &str, message: &str, result: Result<T, ServiceError>) -> ResponseEnvelope<T> {
    match result {
        Ok(data) => ResponseEnvelope::ok(message, data),
        Err(e) => {
            match &e {
                ServiceError::NotFound(_) | ServiceError::BadRequest(_) => {
                    info!("CountryService[{}]: {}", operation, e)
                }
                _ => error!("CountryService[{}] processed a request with an error: {}", operation, e),
            }
            e.into_envelope()
        }
    }
}

/// Read operations over the countries store, each answered with a
/// [`ResponseEnvelope`].
#[derive(Clone)]
pub struct CountryService {
    store: Arc<dyn CountryStore>,
}

impl CountryService {
    pub fn new(store: Arc<dyn CountryStore>) -> Self {
        Self { store }
    }

    pub async fn list_countries(
        &self,
        page: PageRequest,
        filter: CountryFilter,
    ) -> ResponseEnvelope<CountryPage> {
        let result = self.try_list_countries(page, &filter).await;
        respond("list_countries", "Countries fetched successfully", result)
    }

    async fn try_list_countries(
        &self,
        page: PageRequest,
        filter: &CountryFilter,
    ) -> Result<CountryPage, ServiceError> {
        let (countries, total_record) = futures::try_join!(
            self.store.find(filter, page.window()),
            self.store.count(filter),
        )?;

        Ok(CountryPage {
            pagination: PaginationMetadata {
                current_page: page.page(),
                last_page: page.last_page(total_record),
                page_size: page.limit(),
                total_record,
            },
            countries,
        })
    }

    pub async fn get_country(&self, id: &str) -> ResponseEnvelope<CountryRecord> {
        let result = self.store.find_by_id(id).await.map_err(ServiceError::from);
        respond("get_country", "Country fetched successfully", result)
    }

    pub async fn group_by(&self, field: GroupField) -> ResponseEnvelope<Vec<GroupBucket>> {
        let message = match field {
            GroupField::Region => "Regions fetched successfully",
            GroupField::Language => "Languages fetched successfully",
        };
        let result = self
            .store
            .aggregate(&GroupSpec::all(field))
            .await
            .map_err(ServiceError::from);
        respond("group_by", message, result)
    }

    pub async fn statistics(&self) -> ResponseEnvelope<Vec<StatisticsEntry>> {
        let result = self.try_statistics().await;
        respond("statistics", "Statistics fetched successfully", result)
    }

    /// All four sub-queries must succeed; the first failure fails the lot.
    async fn try_statistics(&self) -> Result<Vec<StatisticsEntry>, ServiceError> {
        let everything = CountryFilter::default();
        let largest_area = ExtremalSpec::largest(NumericField::Area);
        let smallest_population = ExtremalSpec::smallest(NumericField::Population);
        let most_spoken = GroupSpec::top(GroupField::Language);

        let (total, largest, smallest, top_language) = futures::try_join!(
            self.store.count(&everything),
            self.store.find_extremal(&largest_area),
            self.store.find_extremal(&smallest_population),
            self.store.aggregate(&most_spoken),
        )?;

        Ok(vec![
            StatisticsEntry::TotalCountries(total),
            StatisticsEntry::LargestCountry(largest),
            StatisticsEntry::SmallestCountry(smallest),
            StatisticsEntry::MostSpokenLanguage(top_language.into_iter().next().map(GroupTotal)),
        ])
    }
}
