use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use common::req::{BucketAverage, BucketWidth, MeasurementField, SensorSeries, SeriesOverview};
use diesel::{
    prelude::*,
    sql_types::{BigInt, Double, Text},
};
use log::warn;

use crate::{
    db::ReadingStore,
    error::{Error, Result},
};

#[derive(Debug, QueryableByName)]
struct BucketRow {
    #[diesel(sql_type = BigInt)]
    sensor_id: i64,
    #[diesel(sql_type = Text)]
    bucket: String,
    #[diesel(sql_type = Double)]
    average: f64,
}

/// `strftime` pattern truncating a timestamp to the bucket, in UTC.
fn label_format(width: BucketWidth) -> &'static str {
    match width {
        BucketWidth::Minute => "%Y-%m-%d %H:%M",
        BucketWidth::Hour => "%Y-%m-%d %H:00",
        BucketWidth::Day => "%Y-%m-%d",
    }
}

// Field names double as column names. AVG skips NULLs and COUNT(col) drops
// buckets where every value is unknown.
fn bucket_query(field: MeasurementField, width: BucketWidth) -> String {
    let column = field.name();
    format!(
        "SELECT sensor_id,
                strftime('{format}', timestamp / 1000, 'unixepoch') AS bucket,
                AVG({column}) AS average
         FROM readings
         WHERE timestamp >= ? AND sensor_id IS NOT NULL
         GROUP BY sensor_id, bucket
         HAVING COUNT({column}) > 0
         ORDER BY sensor_id, bucket",
        format = label_format(width),
    )
}

pub fn parse_field(name: &str) -> Result<MeasurementField> {
    MeasurementField::from_name(name).ok_or_else(|| Error::InvalidField(name.to_owned()))
}

pub fn parse_width(name: &str) -> Result<BucketWidth> {
    BucketWidth::from_name(name).ok_or_else(|| Error::InvalidBucketWidth(name.to_owned()))
}

fn window_start(now: DateTime<Utc>, window: Duration) -> i64 {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    now.timestamp_millis().saturating_sub(window_ms)
}

/// Averages `field` per sensor and `width` bucket over the trailing `window`,
/// anchored at the store clock's current time.
pub async fn aggregate(
    store: &ReadingStore,
    field: &str,
    width: &str,
    window: Duration,
) -> Result<SensorSeries> {
    let field = parse_field(field)?;
    let width = parse_width(width)?;
    let now = store.clock().now();
    aggregate_at(store, field, width, window, now).await
}

/// Same as [`aggregate`] with an explicit window anchor.
pub async fn aggregate_at(
    store: &ReadingStore,
    field: MeasurementField,
    width: BucketWidth,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<SensorSeries> {
    // The index only speeds the scan up; the query is correct without it.
    if let Err(err) = store.ensure_timestamp_index().await {
        warn!("Failed to build timestamp index: {err}");
    }

    let since = window_start(now, window);
    let query = bucket_query(field, width);
    let rows = store
        .read(move |conn| {
            Ok(diesel::sql_query(query)
                .bind::<BigInt, _>(since)
                .load::<BucketRow>(conn)?)
        })
        .await
        .map_err(Error::StorageRead)?;

    let mut series = SensorSeries::new();
    for row in rows {
        series.entry(row.sensor_id).or_default().push(BucketAverage {
            bucket: row.bucket,
            average: row.average,
        });
    }
    Ok(series)
}

/// Every `fields` x `widths` combination against one shared anchor.
pub async fn overview(
    store: &ReadingStore,
    fields: &[MeasurementField],
    widths: &[BucketWidth],
    window: Duration,
) -> Result<SeriesOverview> {
    let now = store.clock().now();
    let mut series = BTreeMap::new();

    for &field in fields {
        let mut by_width = BTreeMap::new();
        for &width in widths {
            by_width.insert(width, aggregate_at(store, field, width, window, now).await?);
        }
        series.insert(field, by_width);
    }

    Ok(SeriesOverview {
        window_minutes: window.as_secs() / 60,
        series,
    })
}
