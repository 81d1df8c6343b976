use actix_web::rt::net::UdpSocket;
use log::{info, warn};
use tokio::signal;

use crate::{gateway::Gateway, packet::Packet};

/// Handles one datagram; returns the stored reading id if it was accepted.
pub async fn handle_datagram(gateway: &Gateway, data: &[u8]) -> Option<i64> {
    let packet = match Packet::decode(data) {
        Ok(packet) => packet,
        Err(err) => {
            warn!("Dropping datagram: {err}");
            return None;
        }
    };

    gateway.ingest(packet.into_raw_reading()).await.ok()
}

/// Receives reading packets on `bind` until ctrl-c.
pub async fn listen(bind: String, gateway: Gateway) -> std::io::Result<()> {
    let sock = UdpSocket::bind(bind.as_str()).await?;
    info!("Listening for reading packets on {bind}");

    let mut buf = [0; 1024];
    loop {
        tokio::select! {
            Ok((len, addr)) = sock.recv_from(&mut buf) => {
                if handle_datagram(&gateway, &buf[0..len]).await.is_none() {
                    warn!("Datagram from {addr} was not stored");
                }
            }
            Ok(()) = signal::ctrl_c() => { break; }
            else => { break; }
        }
    }

    info!("Datagram listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::tests::open_temp,
        packet::{Header, Payload, Reading},
        utils::ManualClock,
    };

    #[tokio::test]
    async fn valid_datagram_is_ingested() {
        let (_dir, store) = open_temp(Arc::new(ManualClock::at("2024-05-01T12:00:00Z")));
        let gateway = Gateway::new(store.clone());

        let bytes = postcard::to_allocvec(&Packet {
            header: Header::with_sensor_id(5),
            payload: Payload::Reading(Reading {
                gas: Some(1200.0),
                ..Default::default()
            }),
        })
        .unwrap();

        assert_eq!(handle_datagram(&gateway, &bytes).await, Some(1));
        assert_eq!(handle_datagram(&gateway, b"junk").await, None);

        let rows = store.scan(None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sensor_id, Some(5));
        assert_eq!(rows[0].gas, Some(1200.0));
    }
}
