use common::req::RawReading;
use log::{debug, error};

use crate::{
    color,
    db::{ReadingFields, ReadingStore},
    error::{Error, Result},
};

/// Entry point for readings from any transport.
#[derive(Clone)]
pub struct Gateway {
    store: ReadingStore,
}

impl Gateway {
    pub fn new(store: ReadingStore) -> Self {
        Self { store }
    }

    /// Normalizes and stores `raw`. Bad or missing fields are stored as
    /// unknown; only a failed write is an error.
    pub async fn ingest(&self, raw: RawReading) -> Result<i64> {
        let fields = ReadingFields {
            sensor_id: raw.sensor_id,
            humidity: raw.humidity,
            temperature: raw.temperature,
            pressure: raw.pressure,
            gas: raw.gas,
            color: color::normalize(raw.color.as_deref()),
            alpha: raw.alpha,
        };

        match self.store.append(fields).await {
            Ok(id) => {
                debug!("Stored reading {id} from sensor {:?}", raw.sensor_id);
                Ok(id)
            }
            Err(err) => {
                error!("Error storing sensor data: {err}");
                Err(Error::Ingestion(Box::new(Error::StorageWrite(err))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::tests::{execute_raw, open_temp, REJECT_INSERTS},
        utils::ManualClock,
    };

    #[tokio::test]
    async fn invalid_color_degrades_to_unknown() {
        let (_dir, store) = open_temp(Arc::new(ManualClock::at("2024-05-01T12:00:00Z")));
        let gateway = Gateway::new(store.clone());

        let id = gateway
            .ingest(RawReading {
                sensor_id: Some(1),
                temperature: Some(21.5),
                color: Some("notacolor".to_owned()),
                alpha: Some(128),
                ..Default::default()
            })
            .await
            .unwrap();

        let rows = store.scan(None).await.unwrap();
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].color, None);
        assert_eq!(rows[0].temperature, Some(21.5));
        assert_eq!(rows[0].alpha, Some(128));
    }

    #[tokio::test]
    async fn valid_color_is_stored_as_integer() {
        let (_dir, store) = open_temp(Arc::new(ManualClock::at("2024-05-01T12:00:00Z")));
        let gateway = Gateway::new(store.clone());

        gateway
            .ingest(RawReading {
                sensor_id: Some(2),
                color: Some("#00ff00".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(store.scan(None).await.unwrap()[0].color, Some(0x00ff00));
    }

    #[tokio::test]
    async fn empty_reading_is_accepted() {
        let (_dir, store) = open_temp(Arc::new(ManualClock::at("2024-05-01T12:00:00Z")));
        let gateway = Gateway::new(store.clone());

        assert_eq!(gateway.ingest(RawReading::default()).await.unwrap(), 1);

        let row = &store.scan(None).await.unwrap()[0];
        assert_eq!(row.sensor_id, None);
        assert_eq!(row.humidity, None);
        assert_eq!(row.gas, None);
    }

    #[tokio::test]
    async fn failed_write_is_an_ingestion_error() {
        let (_dir, store) = open_temp(Arc::new(ManualClock::at("2024-05-01T12:00:00Z")));
        let gateway = Gateway::new(store.clone());
        execute_raw(&store, REJECT_INSERTS);

        let err = gateway
            .ingest(RawReading {
                sensor_id: Some(1),
                temperature: Some(20.0),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            Error::Ingestion(inner) => assert!(matches!(*inner, Error::StorageWrite(_))),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
