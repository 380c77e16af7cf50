use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN: &str = "Unknown";

/// A country as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub id: String,
    pub name: String,
    pub population: u64,
    pub area: f64,
    pub region: String,
    pub subregion: String,
    pub languages: BTreeMap<String, String>,
    pub borders: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CountryRecord {
    pub const COLUMNS: &'static str =
        "id, name, population, area, region, subregion, languages, borders, created_at, updated_at";

    pub fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let population: i64 = row.get(2)?;
        let languages: String = row.get(6)?;
        let borders: String = row.get(7)?;

        Ok(Self {
            id: row.get::<_, i64>(0)?.to_string(),
            name: row.get(1)?,
            population: u64::try_from(population)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?,
            area: row.get(3)?,
            region: row.get(4)?,
            subregion: row.get(5)?,
            languages: serde_json::from_str(&languages)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
            borders: serde_json::from_str(&borders)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

/// A country ready to be inserted; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCountry {
    pub name: String,
    pub population: u64,
    pub area: f64,
    pub region: String,
    pub subregion: String,
    pub languages: BTreeMap<String, String>,
    pub borders: Vec<String>,
}

impl NewCountry {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("country name must not be empty".to_string());
        }
        if !self.area.is_finite() || self.area < 0.0 {
            return Err(format!(
                "country {} has an invalid area: {}",
                self.name, self.area
            ));
        }
        Ok(())
    }

    /// Whether this record carries the same content as a stored one.
    pub fn matches(&self, record: &CountryRecord) -> bool {
        self.name == record.name
            && self.population == record.population
            && self.area == record.area
            && self.region == record.region
            && self.subregion == record.subregion
            && self.languages == record.languages
            && self.borders == record.borders
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamName {
    pub common: String,
}

/// Raw country object as served by the REST Countries API.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamCountry {
    pub name: UpstreamName,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub languages: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub borders: Option<Vec<String>>,
}

fn or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}

impl From<UpstreamCountry> for NewCountry {
    fn from(country: UpstreamCountry) -> Self {
        Self {
            name: country.name.common,
            population: country.population,
            area: country.area,
            region: or_unknown(country.region),
            subregion: or_unknown(country.subregion),
            languages: country.languages.unwrap_or_default(),
            borders: country.borders.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_defaults_are_applied() {
        let raw = r#"{"name":{"common":"Antarctica"},"population":1000,"area":14000000.0,"region":""}"#;
        let upstream: UpstreamCountry = serde_json::from_str(raw).unwrap();
        let country = NewCountry::from(upstream);

        assert_eq!(country.name, "Antarctica");
        assert_eq!(country.region, UNKNOWN);
        assert_eq!(country.subregion, UNKNOWN);
        assert!(country.languages.is_empty());
        assert!(country.borders.is_empty());
    }

    #[test]
    fn upstream_fields_are_kept() {
        let raw = r#"{
            "name":{"common":"Belgium","official":"Kingdom of Belgium"},
            "population":11555997,"area":30528.0,
            "region":"Europe","subregion":"Western Europe",
            "languages":{"deu":"German","fra":"French","nld":"Dutch"},
            "borders":["FRA","DEU","LUX","NLD"]
        }"#;
        let country = NewCountry::from(serde_json::from_str::<UpstreamCountry>(raw).unwrap());

        assert_eq!(country.region, "Europe");
        assert_eq!(country.languages.len(), 3);
        assert_eq!(country.borders, vec!["FRA", "DEU", "LUX", "NLD"]);
    }

    #[test]
    fn negative_area_fails_validation() {
        let country = NewCountry {
            name: "Nowhere".to_string(),
            population: 0,
            area: -1.0,
            region: UNKNOWN.to_string(),
            subregion: UNKNOWN.to_string(),
            languages: BTreeMap::new(),
            borders: Vec::new(),
        };
        assert!(country.validate().is_err());
    }
}
