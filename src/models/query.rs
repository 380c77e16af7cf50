use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Conjunctive filter over the countries collection. Absent fields do not
/// constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryFilter {
    pub region: Option<String>,
    pub min_population: Option<u64>,
    pub max_population: Option<u64>,
}

impl CountryFilter {
    pub fn new(
        region: Option<String>,
        min_population: Option<u64>,
        max_population: Option<u64>,
    ) -> Self {
        Self {
            region: region.filter(|r| !r.trim().is_empty()),
            min_population,
            max_population,
        }
    }
}

/// Validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Result<Self, String> {
        if page < 1 {
            return Err("Page must be a positive integer".to_string());
        }
        if limit < 1 {
            return Err("Limit must be a positive integer".to_string());
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn window(&self) -> Page {
        Page {
            skip: self.skip(),
            limit: self.limit,
        }
    }

    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Offset window handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Region,
    Language,
}

impl GroupField {
    /// Name of the summed population measure in the output documents.
    pub fn total_key(&self) -> &'static str {
        match self {
            GroupField::Region => "totalPopulation",
            GroupField::Language => "totalSpeakers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    ByKey,
    ByTotalDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSpec {
    pub field: GroupField,
    pub order: GroupOrder,
    pub limit: Option<u64>,
}

impl GroupSpec {
    pub fn all(field: GroupField) -> Self {
        Self {
            field,
            order: GroupOrder::ByKey,
            limit: None,
        }
    }

    pub fn top(field: GroupField) -> Self {
        Self {
            field,
            order: GroupOrder::ByTotalDesc,
            limit: Some(1),
        }
    }
}

/// One group produced by an aggregation: the distinct value, the names of
/// its member countries and their summed population.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBucket {
    pub field: GroupField,
    pub key: String,
    pub countries: Vec<String>,
    pub total: u64,
}

impl Serialize for GroupBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("_id", &self.key)?;
        map.serialize_entry("countries", &self.countries)?;
        map.serialize_entry(self.field.total_key(), &self.total)?;
        map.end()
    }
}

/// Top group without its member list, as reported in statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTotal(pub GroupBucket);

impl Serialize for GroupTotal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("_id", &self.0.key)?;
        map.serialize_entry(self.0.field.total_key(), &self.0.total)?;
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Area,
    Population,
}

impl NumericField {
    pub fn column(&self) -> &'static str {
        match self {
            NumericField::Area => "area",
            NumericField::Population => "population",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Largest,
    Smallest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtremalSpec {
    pub field: NumericField,
    pub direction: Direction,
}

impl ExtremalSpec {
    pub fn largest(field: NumericField) -> Self {
        Self {
            field,
            direction: Direction::Largest,
        }
    }

    pub fn smallest(field: NumericField) -> Self {
        Self {
            field,
            direction: Direction::Smallest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Area(f64),
    Population(u64),
}

/// A record projected to its name and the field it was ranked on.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremalRecord {
    pub name: String,
    pub measure: Measure,
}

impl Serialize for ExtremalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("name", &self.name)?;
        match self.measure {
            Measure::Area(area) => map.serialize_entry("area", &area)?,
            Measure::Population(population) => map.serialize_entry("population", &population)?,
        }
        map.end()
    }
}
