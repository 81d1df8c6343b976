use std::collections::BTreeMap;

use diesel::prelude::*;

use crate::{
    db::{Reading, ReadingStore},
    error::{Error, Result},
};

const LATEST_PER_SENSOR: &str = "
    SELECT id, sensor_id, timestamp, humidity, temperature, pressure, gas, color, alpha
    FROM (
        SELECT *, ROW_NUMBER() OVER (
            PARTITION BY sensor_id ORDER BY timestamp DESC, id DESC
        ) AS rn
        FROM readings
        WHERE sensor_id IS NOT NULL
    )
    WHERE rn = 1
    ORDER BY sensor_id
";

/// Most recent reading of every sensor, newest by timestamp with the higher
/// id winning ties. Readings without a sensor id are not part of this view.
pub async fn latest_per_sensor(store: &ReadingStore) -> Result<BTreeMap<i64, Reading>> {
    let rows = store
        .read(|conn| Ok(diesel::sql_query(LATEST_PER_SENSOR).load::<Reading>(conn)?))
        .await
        .map_err(Error::StorageRead)?;

    Ok(rows
        .into_iter()
        .filter_map(|reading| reading.sensor_id.map(|id| (id, reading)))
        .collect())
}
