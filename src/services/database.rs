use crate::models::country::{CountryRecord, NewCountry};
use crate::models::query::{
    CountryFilter, Direction, ExtremalRecord, ExtremalSpec, GroupBucket, GroupField, GroupOrder,
    GroupSpec, Measure, NumericField, Page,
};
use crate::services::store::{CountryStore, StoreError};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    population INTEGER NOT NULL CHECK (population >= 0),
    area REAL NOT NULL CHECK (area >= 0),
    region TEXT NOT NULL DEFAULT 'Unknown',
    subregion TEXT NOT NULL DEFAULT 'Unknown',
    languages TEXT NOT NULL DEFAULT '{}',
    borders TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- Index for region filters and region grouping
CREATE INDEX IF NOT EXISTS countries_region_idx ON countries (region);

-- Index for population ranges and smallest-by-population
CREATE INDEX IF NOT EXISTS countries_population_idx ON countries (population);

-- Index for largest-by-area
CREATE INDEX IF NOT EXISTS countries_area_idx ON countries (area);
"#;

/// SQLite-backed countries collection. One connection is opened for the
/// lifetime of the process and every call runs on the blocking pool.
pub struct SqliteCountryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCountryStore {
    pub async fn new(database_path: &str) -> Result<Self, StoreError> {
        let path = database_path.to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&path)
                .map_err(|e| StoreError::Connection(format!("{}: {}", path, e)))?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Connection(format!("Store task failed: {}", e)))??;

        info!("Country store opened at {}", database_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:").await
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Connection("Connection mutex poisoned".to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Connection(format!("Store task failed: {}", e)))?
    }
}

fn where_clause(filter: &CountryFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(region) = &filter.region {
        conditions.push("region = ?");
        values.push(Value::Text(region.clone()));
    }
    if let Some(min) = filter.min_population {
        conditions.push("population >= ?");
        values.push(Value::Integer(saturating_i64(min)));
    }
    if let Some(max) = filter.max_population {
        conditions.push("population <= ?");
        values.push(Value::Integer(saturating_i64(max)));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn delete_countries(tx: &Transaction<'_>) -> Result<u64, StoreError> {
    let removed = tx.execute("DELETE FROM countries", [])?;
    Ok(removed as u64)
}

fn insert_countries(tx: &Transaction<'_>, countries: &[NewCountry]) -> Result<u64, StoreError> {
    for country in countries {
        country.validate().map_err(StoreError::Validation)?;
    }

    let mut stmt = tx.prepare_cached(
        "INSERT INTO countries (name, population, area, region, subregion, languages, borders) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )?;

    let mut inserted = 0;
    for country in countries {
        let population = i64::try_from(country.population).map_err(|_| {
            StoreError::Validation(format!(
                "country {} has a population out of range: {}",
                country.name, country.population
            ))
        })?;
        stmt.execute(params![
            country.name,
            population,
            country.area,
            country.region,
            country.subregion,
            serde_json::to_string(&country.languages)?,
            serde_json::to_string(&country.borders)?,
        ])?;
        inserted += 1;
    }

    Ok(inserted)
}

#[async_trait]
impl CountryStore for SqliteCountryStore {
    async fn find(
        &self,
        filter: &CountryFilter,
        page: Page,
    ) -> Result<Vec<CountryRecord>, StoreError> {
        let (where_clause, mut values) = where_clause(filter);
        values.push(Value::Integer(saturating_i64(page.limit)));
        values.push(Value::Integer(saturating_i64(page.skip)));

        let query_str = format!(
            "SELECT {} FROM countries{} ORDER BY id ASC LIMIT ? OFFSET ?",
            CountryRecord::COLUMNS,
            where_clause
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&query_str)?;
            let countries = stmt
                .query_map(params_from_iter(values), CountryRecord::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(countries)
        })
        .await
    }

    async fn find_all(&self) -> Result<Vec<CountryRecord>, StoreError> {
        let query_str = format!(
            "SELECT {} FROM countries ORDER BY id ASC",
            CountryRecord::COLUMNS
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&query_str)?;
            let countries = stmt
                .query_map([], CountryRecord::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(countries)
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<CountryRecord, StoreError> {
        let row_id: i64 = match id.trim().parse() {
            Ok(row_id) => row_id,
            Err(_) => return Err(StoreError::country_not_found(id)),
        };
        let id = id.to_string();
        let query_str = format!(
            "SELECT {} FROM countries WHERE id = ?",
            CountryRecord::COLUMNS
        );

        self.run(move |conn| {
            conn.query_row(&query_str, [row_id], CountryRecord::from_row)
                .optional()?
                .ok_or_else(|| StoreError::country_not_found(&id))
        })
        .await
    }

    async fn count(&self, filter: &CountryFilter) -> Result<u64, StoreError> {
        let (where_clause, values) = where_clause(filter);
        let query_str = format!("SELECT COUNT(*) as count FROM countries{}", where_clause);

        self.run(move |conn| {
            let count: i64 =
                conn.query_row(&query_str, params_from_iter(values), |row| row.get(0))?;
            Ok(to_count(count))
        })
        .await
    }

    async fn aggregate(&self, spec: &GroupSpec) -> Result<Vec<GroupBucket>, StoreError> {
        let spec = *spec;
        let source = match spec.field {
            GroupField::Region => {
                "SELECT c.region AS group_key, c.name AS name, c.population AS population \
                 FROM countries c"
            }
            GroupField::Language => {
                "SELECT l.key AS group_key, c.name AS name, c.population AS population \
                 FROM countries c, json_each(c.languages) l"
            }
        };
        let order = match spec.order {
            GroupOrder::ByKey => "group_key ASC",
            GroupOrder::ByTotalDesc => "total DESC, group_key ASC",
        };
        let limit = spec
            .limit
            .map(|limit| format!(" LIMIT {}", saturating_i64(limit)))
            .unwrap_or_default();

        let query_str = format!(
            "SELECT group_key, json_group_array(name) AS countries, SUM(population) AS total \
             FROM ({} ORDER BY c.id) GROUP BY group_key ORDER BY {}{}",
            source, order, limit
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&query_str)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut buckets = Vec::with_capacity(rows.len());
            for (key, countries, total) in rows {
                buckets.push(GroupBucket {
                    field: spec.field,
                    key,
                    countries: serde_json::from_str(&countries)?,
                    total: to_count(total),
                });
            }
            Ok(buckets)
        })
        .await
    }

    async fn find_extremal(
        &self,
        spec: &ExtremalSpec,
    ) -> Result<Option<ExtremalRecord>, StoreError> {
        let field = spec.field;
        let direction = match spec.direction {
            Direction::Largest => "DESC",
            Direction::Smallest => "ASC",
        };
        let query_str = format!(
            "SELECT name, {column} FROM countries ORDER BY {column} {direction}, id ASC LIMIT 1",
            column = field.column(),
            direction = direction
        );

        self.run(move |conn| {
            let record = conn
                .query_row(&query_str, [], |row| {
                    let name: String = row.get(0)?;
                    let measure = match field {
                        NumericField::Area => Measure::Area(row.get(1)?),
                        NumericField::Population => {
                            Measure::Population(to_count(row.get::<_, i64>(1)?))
                        }
                    };
                    Ok(ExtremalRecord { name, measure })
                })
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        self.run(|conn| {
            let tx = conn.transaction()?;
            let removed = delete_countries(&tx)?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn insert_many(&self, countries: &[NewCountry]) -> Result<u64, StoreError> {
        let countries = countries.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let inserted = insert_countries(&tx, &countries)?;
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    /// Delete and insert inside one transaction, so readers observe either
    /// the previous generation or the new one.
    async fn replace_all(&self, countries: &[NewCountry]) -> Result<(u64, u64), StoreError> {
        let countries = countries.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let removed = delete_countries(&tx)?;
            let inserted = insert_countries(&tx, &countries)?;
            tx.commit()?;
            Ok((removed, inserted))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::country::UNKNOWN;
    use std::collections::BTreeMap;

    fn country(name: &str, population: u64, area: f64, region: &str, langs: &[&str]) -> NewCountry {
        NewCountry {
            name: name.to_string(),
            population,
            area,
            region: region.to_string(),
            subregion: UNKNOWN.to_string(),
            languages: langs
                .iter()
                .map(|code| (code.to_string(), code.to_uppercase()))
                .collect::<BTreeMap<_, _>>(),
            borders: vec!["XXX".to_string(), "AAA".to_string()],
        }
    }

    async fn seeded_store() -> SqliteCountryStore {
        let store = SqliteCountryStore::in_memory().await.unwrap();
        store
            .insert_many(&[
                country("Aland", 300, 1580.0, "Europe", &["swe"]),
                country("Brazil", 1_000, 8_515_767.0, "Americas", &["por"]),
                country("Canada", 800, 9_984_670.0, "Americas", &["eng", "fra"]),
                country("Denmark", 500, 43_094.0, "Europe", &["dan"]),
                country("Eire", 700, 70_273.0, "Europe", &["eng", "gle"]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_timestamps() {
        let store = seeded_store().await;
        let all = store.find_all().await.unwrap();

        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|c| !c.id.is_empty() && !c.created_at.is_empty()));
        assert_eq!(all[0].borders, vec!["XXX", "AAA"]);
        assert_eq!(all[2].languages.get("fra").map(String::as_str), Some("FRA"));
    }

    #[tokio::test]
    async fn population_bounds_apply_together() {
        let store = seeded_store().await;
        let filter = CountryFilter::new(None, Some(400), Some(800));
        let found = store
            .find(&filter, Page { skip: 0, limit: 10 })
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["Canada", "Denmark", "Eire"]);
        assert_eq!(store.count(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn region_filter_with_paging() {
        let store = seeded_store().await;
        let filter = CountryFilter::new(Some("Europe".to_string()), None, None);

        let second = store
            .find(&filter, Page { skip: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "Eire");
        assert_eq!(store.count(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn find_by_id_reports_not_found() {
        let store = seeded_store().await;
        let first = &store.find_all().await.unwrap()[0];

        assert_eq!(store.find_by_id(&first.id).await.unwrap().name, "Aland");
        for id in ["999999", "not-a-row-id"] {
            match store.find_by_id(id).await {
                Err(StoreError::NotFound(message)) => {
                    assert_eq!(message, format!("Country with id: {} not found", id))
                }
                other => panic!("expected NotFound, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn groups_by_region_and_language() {
        let store = seeded_store().await;

        let regions = store
            .aggregate(&GroupSpec::all(GroupField::Region))
            .await
            .unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].key, "Americas");
        assert_eq!(regions[0].countries, vec!["Brazil", "Canada"]);
        assert_eq!(regions[0].total, 1_800);
        assert_eq!(regions[1].total, 1_500);

        let languages = store
            .aggregate(&GroupSpec::all(GroupField::Language))
            .await
            .unwrap();
        let eng = languages.iter().find(|b| b.key == "eng").unwrap();
        assert_eq!(eng.countries, vec!["Canada", "Eire"]);
        assert_eq!(eng.total, 1_500);
        assert_eq!(languages.len(), 6);

        let top = store
            .aggregate(&GroupSpec::top(GroupField::Language))
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].key, "eng");
    }

    #[tokio::test]
    async fn extremal_projection() {
        let store = seeded_store().await;

        let largest = store
            .find_extremal(&ExtremalSpec::largest(NumericField::Area))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(largest.name, "Canada");
        assert_eq!(largest.measure, Measure::Area(9_984_670.0));

        let smallest = store
            .find_extremal(&ExtremalSpec::smallest(NumericField::Population))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(smallest.measure, Measure::Population(300));

        store.delete_all().await.unwrap();
        assert!(store
            .find_extremal(&ExtremalSpec::largest(NumericField::Area))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn replace_all_swaps_generations() {
        let store = seeded_store().await;
        let (removed, inserted) = store
            .replace_all(&[country("Fiji", 900, 18_272.0, "Oceania", &["eng"])])
            .await
            .unwrap();

        assert_eq!((removed, inserted), (5, 1));
        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Fiji");
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_generation() {
        let store = seeded_store().await;
        let result = store
            .replace_all(&[
                country("Fiji", 900, 18_272.0, "Oceania", &["eng"]),
                country("Broken", 1, -5.0, "Oceania", &[]),
            ])
            .await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.find_all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("countries.db");
        let path = path.to_string_lossy().to_string();

        {
            let store = SqliteCountryStore::new(&path).await.unwrap();
            store
                .insert_many(&[country("Aland", 300, 1580.0, "Europe", &["swe"])])
                .await
                .unwrap();
        }

        let reopened = SqliteCountryStore::new(&path).await.unwrap();
        assert_eq!(reopened.count(&CountryFilter::default()).await.unwrap(), 1);
    }
}
