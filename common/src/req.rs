use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Deserializer};

/// Measurement columns that can be averaged over time buckets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementField {
    Humidity,
    Temperature,
    Pressure,
    Gas,
    Color,
    Alpha,
}

impl MeasurementField {
    pub const ALL: [Self; 6] = [
        Self::Humidity,
        Self::Temperature,
        Self::Pressure,
        Self::Gas,
        Self::Color,
        Self::Alpha,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Humidity => "humidity",
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Gas => "gas",
            Self::Color => "color",
            Self::Alpha => "alpha",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Truncation granularity applied to reading timestamps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BucketWidth {
    Minute,
    Hour,
    Day,
}

impl BucketWidth {
    pub const ALL: [Self; 3] = [Self::Minute, Self::Hour, Self::Day];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.name() == name)
    }
}

/// Ingestion payload. Every key is optional and a value of the wrong shape is
/// treated the same as a missing one.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default, deserialize_with = "lenient")]
    pub sensor_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub gas: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub alpha: Option<i64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Last known state of one sensor.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LatestValue {
    pub timestamp: String, // RFC 3339, UTC
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub gas: Option<f64>,
    pub color: Option<i64>,
    pub alpha: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BucketAverage {
    pub bucket: String,
    pub average: f64,
}

/// Per-sensor bucket averages, buckets in ascending label order.
pub type SensorSeries = BTreeMap<i64, Vec<BucketAverage>>;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SeriesResponse {
    pub field: MeasurementField,
    pub width: BucketWidth,
    pub window_minutes: u64,
    pub series: SensorSeries,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SeriesOverview {
    pub window_minutes: u64,
    pub series: BTreeMap<MeasurementField, BTreeMap<BucketWidth, SensorSeries>>,
}
