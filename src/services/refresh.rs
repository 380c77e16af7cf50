use crate::models::country::NewCountry;
use crate::models::response::{RefreshSummary, ResponseEnvelope};
use crate::services::cache::ResponseCache;
use crate::services::country::ServiceError;
use crate::services::store::{CountryStore, StoreError};
use crate::services::upstream::UpstreamSource;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Replaces the stored dataset with a fresh upstream batch.
///
/// Stores that implement [`CountryStore::replace_all`] transactionally keep
/// serving the previous generation when the write fails. Otherwise the
/// collection may be left empty or partial until the next successful
/// refresh, and readers may observe that state.
pub struct DatasetRefresher {
    source: Arc<dyn UpstreamSource>,
    store: Arc<dyn CountryStore>,
    cache: ResponseCache,
}

impl DatasetRefresher {
    pub fn new(
        source: Arc<dyn UpstreamSource>,
        store: Arc<dyn CountryStore>,
        cache: ResponseCache,
    ) -> Self {
        Self {
            source,
            store,
            cache,
        }
    }

    pub async fn refresh(&self) -> ResponseEnvelope<RefreshSummary> {
        match self.try_refresh().await {
            Ok(summary) => {
                info!(
                    "Countries successfully refreshed: {} removed, {} inserted",
                    summary.removed, summary.inserted
                );
                ResponseEnvelope::ok("Countries successfully refreshed", summary)
            }
            Err(e) => {
                match &e {
                    ServiceError::Upstream(_) => warn!(
                        "DatasetRefresher[refresh] aborted, keeping current data: {}",
                        e
                    ),
                    _ => error!("DatasetRefresher[refresh] failed to write countries: {}", e),
                }
                e.into_envelope()
            }
        }
    }

    async fn try_refresh(&self) -> Result<RefreshSummary, ServiceError> {
        // Nothing touches the store until the whole batch is in hand.
        let batch: Vec<NewCountry> = self
            .source
            .fetch_all()
            .await?
            .into_iter()
            .map(NewCountry::from)
            .collect();

        let (removed, inserted) = self.store.replace_all(&batch).await?;

        let stored = self.store.find_all().await?;
        if stored.len() != batch.len()
            || !batch.iter().zip(stored.iter()).all(|(new, record)| new.matches(record))
        {
            return Err(StoreError::Validation(format!(
                "refresh confirmation mismatch: expected {} countries, found {}",
                batch.len(),
                stored.len()
            ))
            .into());
        }

        self.cache.invalidate_all().await;

        Ok(RefreshSummary { removed, inserted })
    }
}
