use chrono::{DateTime, Utc};
use log::debug;

use crate::broadcast::RoomBroadcaster;
use crate::error::RelayError;
use crate::messages::{
    AttachmentKind, MessageBody, MessageType, RelayMessage, SendMessage, ServerEvent, TypingEvent,
    TypingNotice,
};
use crate::registry::RoomId;

/// Turns chat events from one connection into room broadcasts.
///
/// Nothing here persists anything: a `send-message` is only a hint that the
/// sender already stored the message over REST.
#[derive(Clone)]
pub struct Relay {
    broadcaster: RoomBroadcaster,
    echo_to_sender: bool,
}

impl Relay {
    pub fn new(broadcaster: RoomBroadcaster, echo_to_sender: bool) -> Self {
        Self {
            broadcaster,
            echo_to_sender,
        }
    }

    /// Broadcasts `new-message` to the chat room. The origin connection is
    /// left out unless echoing is enabled.
    pub async fn relay_message(
        &self,
        origin: &str,
        request: SendMessage,
    ) -> Result<usize, RelayError> {
        let room = RoomId::Chat(request.chat_id.clone());
        let message = build_relay_message(request, Utc::now())?;
        debug!("Relaying message {} from {} to {room}", message.id, message.sender);

        let except = if self.echo_to_sender { None } else { Some(origin) };
        self.broadcaster
            .broadcast(&room, &ServerEvent::NewMessage(message), except)
            .await
    }

    /// Broadcasts `user-typing` to everyone in the chat room but the origin.
    pub async fn relay_typing(
        &self,
        origin: &str,
        event: TypingEvent,
    ) -> Result<usize, RelayError> {
        let room = RoomId::Chat(event.chat_id);
        let notice = TypingNotice {
            user_id: event.user_id,
            is_typing: event.is_typing,
        };
        self.broadcaster
            .broadcast(&room, &ServerEvent::UserTyping(notice), Some(origin))
            .await
    }
}

/// Builds the broadcast payload for a persisted message.
///
/// `now` is used only when the request does not carry the timestamp the
/// persistence layer assigned.
pub fn build_relay_message(
    request: SendMessage,
    now: DateTime<Utc>,
) -> Result<RelayMessage, RelayError> {
    let SendMessage {
        chat_id,
        message,
        sender_id,
        message_id,
        message_type,
        timestamp,
    } = request;

    let body = match message_type {
        MessageType::Text => match message.text {
            Some(text) => MessageBody::Text { text },
            None => {
                return Err(RelayError::MissingContent {
                    message_id,
                    message_type,
                    field: "text",
                })
            }
        },
        MessageType::Image | MessageType::File => {
            let kind = if message_type == MessageType::Image {
                AttachmentKind::Image
            } else {
                AttachmentKind::File
            };
            match message.file {
                Some(file) => MessageBody::Attachment {
                    message_type: kind,
                    file,
                },
                None => {
                    return Err(RelayError::MissingContent {
                        message_id,
                        message_type,
                        field: "file",
                    })
                }
            }
        }
    };

    Ok(RelayMessage {
        id: message_id,
        sender: sender_id,
        timestamp: timestamp.unwrap_or(now),
        chat_id,
        body,
    })
}
