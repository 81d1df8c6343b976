use common::req::RawReading;

const MAGIC: &str = "SR01";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Header {
    magic: String,
    pub sensor_id: u32,
}

impl Header {
    pub fn with_sensor_id(sensor_id: u32) -> Self {
        Self {
            magic: MAGIC.to_string(),
            sensor_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Packet {
    pub header: Header,
    pub payload: Payload,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub enum Payload {
    Reading(Reading),
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize, Clone)]
pub struct Reading {
    pub humidity: Option<f32>,    // percent
    pub temperature: Option<f32>, // °C
    pub pressure: Option<f32>,    // hPa
    pub gas: Option<f32>,         // ohm
    pub color: Option<String>,    // "#rgb" or "#rrggbb"
    pub alpha: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("malformed packet: {0}")]
    Decode(#[from] postcard::Error),
    #[error("bad packet magic")]
    Magic,
}

impl Packet {
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let packet: Packet = postcard::from_bytes(bytes)?;
        if !packet.header.is_valid() {
            return Err(PacketError::Magic);
        }
        Ok(packet)
    }

    pub fn into_raw_reading(self) -> RawReading {
        match self.payload {
            Payload::Reading(mes) => RawReading {
                sensor_id: Some(self.header.sensor_id.into()),
                humidity: mes.humidity.map(f64::from),
                temperature: mes.temperature.map(f64::from),
                pressure: mes.pressure.map(f64::from),
                gas: mes.gas.map(f64::from),
                color: mes.color,
                alpha: mes.alpha.map(i64::from),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reading_packet() {
        let bytes = postcard::to_allocvec(&Packet {
            header: Header::with_sensor_id(12),
            payload: Payload::Reading(Reading {
                temperature: Some(19.5),
                color: Some("#abc".to_owned()),
                ..Default::default()
            }),
        })
        .unwrap();

        let raw = Packet::decode(&bytes).unwrap().into_raw_reading();
        assert_eq!(raw.sensor_id, Some(12));
        assert_eq!(raw.temperature, Some(19.5));
        assert_eq!(raw.color.as_deref(), Some("#abc"));
        assert_eq!(raw.humidity, None);
    }

    #[test]
    fn rejects_foreign_magic() {
        let bytes = postcard::to_allocvec(&Packet {
            header: Header {
                magic: "M1S1".to_owned(),
                sensor_id: 1,
            },
            payload: Payload::Reading(Reading::default()),
        })
        .unwrap();

        assert!(matches!(Packet::decode(&bytes), Err(PacketError::Magic)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Packet::decode(&[0xff, 0xff, 0xff]),
            Err(PacketError::Decode(_))
        ));
    }
}
