use log::debug;
use serde_json::Value;

use crate::broadcast::RoomBroadcaster;
use crate::error::RelayError;
use crate::messages::ServerEvent;
use crate::registry::RoomId;

/// Pushes out-of-band notifications into `user_<id>` rooms, whatever chat
/// the user's connections currently have open.
#[derive(Clone)]
pub struct UserNotifier {
    broadcaster: RoomBroadcaster,
}

impl UserNotifier {
    pub fn new(broadcaster: RoomBroadcaster) -> Self {
        Self { broadcaster }
    }

    pub async fn notify(&self, user_id: &str, payload: Value) -> Result<usize, RelayError> {
        let room = RoomId::User(user_id.to_string());
        let delivered = self
            .broadcaster
            .broadcast(&room, &ServerEvent::Notification(payload), None)
            .await?;
        debug!("Notification for {room} reached {delivered} connection(s)");
        Ok(delivered)
    }
}
