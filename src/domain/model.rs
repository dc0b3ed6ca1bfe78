use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const COL_NAME: &str = "Name";
pub const COL_ADDRESS: &str = "Address";
pub const COL_SUBURB: &str = "Suburb";
pub const COL_POSTCODE: &str = "Postcode";
pub const COL_STATE: &str = "State";
pub const COL_GROUP: &str = "City_Sheet";

pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";
pub const COL_ACCURACY: &str = "geocode_accuracy";
pub const COL_SOURCE: &str = "geocode_source";
pub const COL_DISPLAY_NAME: &str = "geocode_display_name";

/// Provider name assumed for checkpoint rows that carry no `geocode_source`.
pub const DEFAULT_PROVIDER: &str = "Nominatim";

pub const REQUIRED_COLUMNS: [&str; 4] = [COL_NAME, COL_ADDRESS, COL_SUBURB, COL_POSTCODE];
pub const GEOCODE_COLUMNS: [&str; 5] = [
    COL_LATITUDE,
    COL_LONGITUDE,
    COL_ACCURACY,
    COL_SOURCE,
    COL_DISPLAY_NAME,
];

/// 一次地理編碼嘗試的結果分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    High,
    Failed,
    Error,
    ManualFix,
}

impl Accuracy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accuracy::High => "high",
            Accuracy::Failed => "failed",
            Accuracy::Error => "error",
            Accuracy::ManualFix => "manual_fix",
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accuracy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Accuracy::High),
            "failed" => Ok(Accuracy::Failed),
            "error" => Ok(Accuracy::Error),
            "manual_fix" => Ok(Accuracy::ManualFix),
            other => Err(format!("unknown geocode accuracy: {}", other)),
        }
    }
}

/// Provider 回傳的定位結果
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome of geocoding one record.
///
/// Latitude and longitude live together in `coordinates`, so they are either
/// both present or both absent.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub coordinates: Option<Coordinates>,
    pub accuracy: Accuracy,
    pub source: String,
    pub display_name: Option<String>,
}

impl GeocodeResult {
    pub fn located(location: Location, source: &str) -> Self {
        Self {
            coordinates: Some(Coordinates {
                latitude: location.latitude,
                longitude: location.longitude,
            }),
            accuracy: Accuracy::High,
            source: source.to_string(),
            display_name: Some(location.display_name),
        }
    }

    pub fn no_match(source: &str) -> Self {
        Self::unlocated(Accuracy::Failed, source)
    }

    pub fn error(source: &str) -> Self {
        Self::unlocated(Accuracy::Error, source)
    }

    fn unlocated(accuracy: Accuracy, source: &str) -> Self {
        Self {
            coordinates: None,
            accuracy,
            source: source.to_string(),
            display_name: None,
        }
    }

    pub fn is_located(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// 一列輸入資料
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceRecord {
    pub name: String,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub postcode: Option<String>,
    pub state: Option<String>,
    pub source_group: Option<String>,
    /// Columns other than the known ones, keyed by header.
    pub extra: BTreeMap<String, String>,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Postcode as a number.
    ///
    /// Accepts digit strings and spreadsheet floats such as `5006.0`;
    /// anything else is treated as absent.
    pub fn postcode_number(&self) -> Option<u32> {
        let raw = self.postcode.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.chars().all(|c| c.is_ascii_digit()) {
            return raw.parse().ok();
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 && value < u32::MAX as f64 => {
                Some(value.trunc() as u32)
            }
            _ => None,
        }
    }

    /// Value of an arbitrary column, known columns included.
    pub fn field(&self, column: &str) -> Option<Cow<'_, str>> {
        let value = match column {
            COL_NAME => Some(self.name.as_str()),
            COL_ADDRESS => self.address.as_deref(),
            COL_SUBURB => self.suburb.as_deref(),
            COL_POSTCODE => self.postcode.as_deref(),
            COL_STATE => self.state.as_deref(),
            COL_GROUP => self.source_group.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        };
        value.map(Cow::Borrowed)
    }

    pub fn set_field(&mut self, column: &str, value: String) {
        let value = Some(value).filter(|v| !v.trim().is_empty());
        match column {
            COL_NAME => self.name = value.unwrap_or_default(),
            COL_ADDRESS => self.address = value,
            COL_SUBURB => self.suburb = value,
            COL_POSTCODE => self.postcode = value,
            COL_STATE => self.state = value,
            COL_GROUP => self.source_group = value,
            other => {
                if let Some(value) = value {
                    self.extra.insert(other.to_string(), value);
                }
            }
        }
    }
}

/// ServiceRecord 加上地理編碼結果；`geocode` 為 None 表示尚未處理
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub service: ServiceRecord,
    pub geocode: Option<GeocodeResult>,
}

impl EnrichedRecord {
    pub fn unresolved(service: ServiceRecord) -> Self {
        Self {
            service,
            geocode: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.geocode.as_ref().is_some_and(GeocodeResult::is_located)
    }

    pub fn accuracy(&self) -> Option<Accuracy> {
        self.geocode.as_ref().map(|g| g.accuracy)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.geocode.as_ref().and_then(|g| g.coordinates)
    }
}

/// The in-memory table for one run: the original column order plus one
/// record per input row, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<EnrichedRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Original columns followed by the geocode columns.
    pub fn output_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain(GEOCODE_COLUMNS)
            .collect()
    }

    pub fn ensure_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    /// Source groups in order of first appearance.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for record in &self.records {
            if let Some(group) = record.service.source_group.as_deref() {
                if !groups.contains(&group) {
                    groups.push(group);
                }
            }
        }
        groups
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub total: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedRow {
    pub group: Option<String>,
    pub name: String,
    pub address: String,
    pub accuracy: Option<Accuracy>,
}

/// 執行結束時的統計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
    pub error: usize,
    pub skipped: usize,
    pub manually_fixed: usize,
    pub requests_issued: usize,
    pub by_group: Vec<(String, GroupStats)>,
    pub unresolved: Vec<UnresolvedRow>,
}

impl RunSummary {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.resolved as f64 / self.total as f64 * 100.0
    }

    pub fn success_rate_display(&self) -> String {
        format!("{:.1}%", self.success_rate())
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub dataset: Dataset,
    pub summary: RunSummary,
}
