use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::broadcast::RoomBroadcaster;
use crate::config::Config;
use crate::error::RelayError;
use crate::messages::{ClientEvent, ServerEvent};
use crate::presence::UserNotifier;
use crate::registry::{ConnectionId, ConnectionRegistry, RoomId};
use crate::relay::Relay;

/// Owns the room membership table and handles every connection's events.
pub struct Server {
    registry: Arc<ConnectionRegistry>,
    broadcaster: RoomBroadcaster,
    relay: Relay,
    notifier: UserNotifier,
    outbound_buffer: usize,
}

impl Server {
    pub fn new(config: &Config) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = RoomBroadcaster::new(Arc::clone(&registry));
        Server {
            relay: Relay::new(broadcaster.clone(), config.echo_to_sender),
            notifier: UserNotifier::new(broadcaster.clone()),
            broadcaster,
            registry,
            outbound_buffer: config.outbound_buffer,
        }
    }

    pub async fn handle_connection(&self, ws: WebSocket) {
        let (connection_id, mut rx) = self.open_connection().await;
        let (mut ws_tx, mut ws_rx) = ws.split();

        let writer_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_tx.send(message).await {
                    error!("Failed to send WebSocket message to {writer_id}: {e}");
                    break;
                }
            }
            if let Err(e) = ws_tx.close().await {
                debug!("Failed to close WebSocket for {writer_id}: {e}");
            }
        });

        while let Some(result) = ws_rx.next().await {
            match result {
                Ok(msg) => {
                    if msg.is_close() {
                        debug!("Close frame from {connection_id}");
                        break;
                    }
                    if let Ok(text) = msg.to_str() {
                        self.handle_frame(&connection_id, text).await;
                    }
                }
                Err(e) => {
                    error!("WebSocket error on {connection_id}: {e}");
                    break;
                }
            }
        }

        self.close_connection(&connection_id).await;
    }

    /// Registers a new connection and queues its `connection` greeting.
    pub async fn open_connection(&self) -> (ConnectionId, mpsc::Receiver<Message>) {
        let connection_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        self.registry.register(connection_id.clone(), tx).await;
        info!("Connection {connection_id} opened");

        let greeting = ServerEvent::Connection {
            socket_id: connection_id.clone(),
        };
        if let Err(e) = self.broadcaster.send_to(&connection_id, &greeting).await {
            error!("Failed to greet {connection_id}: {e}");
        }
        (connection_id, rx)
    }

    pub async fn close_connection(&self, connection_id: &str) {
        if self.registry.unregister(connection_id).await {
            info!("Connection {connection_id} closed");
        }
    }

    /// Parses and dispatches one text frame. Failures are logged and the frame dropped.
    pub async fn handle_frame(&self, connection_id: &str, text: &str) {
        let result = match parse_frame(text) {
            Ok(event) => self.dispatch(connection_id, event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Dropping event from {connection_id}: {e}");
        }
    }

    pub async fn dispatch(
        &self,
        connection_id: &str,
        event: ClientEvent,
    ) -> Result<(), RelayError> {
        match event {
            ClientEvent::Join(user_id) => {
                if self.registry.join_user_room(connection_id, &user_id).await {
                    info!("{connection_id} joined {}", RoomId::User(user_id));
                }
            }
            ClientEvent::JoinChat(chat_id) => {
                if self.registry.join_chat_room(connection_id, &chat_id).await {
                    info!("{connection_id} joined {}", RoomId::Chat(chat_id));
                }
            }
            ClientEvent::SendMessage(request) => {
                self.relay.relay_message(connection_id, request).await?;
            }
            ClientEvent::Typing(event) => {
                self.relay.relay_typing(connection_id, event).await?;
            }
        }
        Ok(())
    }

    pub async fn notify_user(&self, user_id: &str, payload: Value) -> Result<usize, RelayError> {
        self.notifier.notify(user_id, payload).await
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }

    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

fn parse_frame(text: &str) -> Result<ClientEvent, RelayError> {
    serde_json::from_str(text).map_err(RelayError::MalformedEvent)
}
