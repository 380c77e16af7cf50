use crate::models::country::{CountryRecord, NewCountry};
use crate::models::query::{CountryFilter, ExtremalRecord, ExtremalSpec, GroupBucket, GroupSpec, Page};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("SQLite error: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn country_not_found(id: &str) -> Self {
        StoreError::NotFound(format!("Country with id: {} not found", id))
    }
}

/// Typed access to the persistent countries collection.
#[async_trait]
pub trait CountryStore: Send + Sync {
    async fn find(&self, filter: &CountryFilter, page: Page)
        -> Result<Vec<CountryRecord>, StoreError>;

    async fn find_all(&self) -> Result<Vec<CountryRecord>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no record has this id.
    async fn find_by_id(&self, id: &str) -> Result<CountryRecord, StoreError>;

    async fn count(&self, filter: &CountryFilter) -> Result<u64, StoreError>;

    async fn aggregate(&self, spec: &GroupSpec) -> Result<Vec<GroupBucket>, StoreError>;

    async fn find_extremal(&self, spec: &ExtremalSpec)
        -> Result<Option<ExtremalRecord>, StoreError>;

    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn insert_many(&self, countries: &[NewCountry]) -> Result<u64, StoreError>;

    /// Swap the whole collection for `countries`, returning `(removed, inserted)`.
    ///
    /// Not atomic unless the implementation overrides it: a failed insert
    /// leaves the collection empty.
    async fn replace_all(&self, countries: &[NewCountry]) -> Result<(u64, u64), StoreError> {
        let removed = self.delete_all().await?;
        let inserted = self.insert_many(countries).await?;
        Ok((removed, inserted))
    }
}
