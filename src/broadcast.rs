use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;
use warp::ws::Message;

use crate::error::RelayError;
use crate::messages::ServerEvent;
use crate::registry::{ConnectionRegistry, Outbound, RoomId};

/// Fans events out to the members of a room.
///
/// Delivery is best effort: a connection whose outbound queue is full loses
/// the event, a connection whose writer is gone is skipped.
#[derive(Clone)]
pub struct RoomBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the number of connections the event was queued for.
    pub async fn broadcast(
        &self,
        room: &RoomId,
        event: &ServerEvent,
        except: Option<&str>,
    ) -> Result<usize, RelayError> {
        let recipients = self.registry.recipients(room, except).await;
        if recipients.is_empty() {
            debug!("No recipients in {room}");
            return Ok(0);
        }

        let frame = encode(event)?;
        let mut delivered = 0;
        for (connection_id, outbound) in recipients {
            if deliver(&connection_id, &outbound, Message::text(frame.clone())) {
                delivered += 1;
            }
        }
        debug!("Queued event for {delivered} connection(s) in {room}");
        Ok(delivered)
    }

    pub async fn send_to(
        &self,
        connection_id: &str,
        event: &ServerEvent,
    ) -> Result<bool, RelayError> {
        let Some(outbound) = self.registry.outbound(connection_id).await else {
            return Ok(false);
        };
        let frame = encode(event)?;
        Ok(deliver(connection_id, &outbound, Message::text(frame)))
    }
}

fn encode(event: &ServerEvent) -> Result<String, RelayError> {
    serde_json::to_string(event).map_err(RelayError::Encode)
}

fn deliver(connection_id: &str, outbound: &Outbound, message: Message) -> bool {
    match outbound.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Outbound queue full for {connection_id}, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Connection {connection_id} is gone, skipping");
            false
        }
    }
}
