use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by clients, framed as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join(String),
    #[serde(rename = "join-chat")]
    JoinChat(String),
    #[serde(rename = "send-message")]
    SendMessage(SendMessage),
    #[serde(rename = "typing")]
    Typing(TypingEvent),
}

/// Frames pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connection")]
    Connection {
        #[serde(rename = "socketId")]
        socket_id: String,
    },
    #[serde(rename = "new-message")]
    NewMessage(RelayMessage),
    #[serde(rename = "user-typing")]
    UserTyping(TypingNotice),
    #[serde(rename = "notification")]
    Notification(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

/// A message the sender has already persisted over REST and now wants relayed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub chat_id: String,
    pub message: MessageContent,
    pub sender_id: String,
    pub message_id: String,
    pub message_type: MessageType,
    /// Canonical timestamp returned by the REST write, when the client has one.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub text: Option<String>,
    /// Opaque file reference, relayed untouched.
    #[serde(default)]
    pub file: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    pub id: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text {
        text: String,
    },
    Attachment {
        #[serde(rename = "messageType")]
        message_type: AttachmentKind,
        file: Value,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub chat_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub user_id: String,
    pub is_typing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_events() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"join-chat","data":"42"}"#).unwrap();
        assert!(matches!(event, ClientEvent::JoinChat(ref id) if id == "42"));

        let event: ClientEvent = serde_json::from_str(r#"{"event":"join","data":"u1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Join(ref id) if id == "u1"));
    }

    #[test]
    fn parses_send_message_without_timestamp() {
        let raw = json!({
            "event": "send-message",
            "data": {
                "chatId": "42",
                "message": { "file": { "url": "/uploads/cv.pdf", "name": "cv.pdf" } },
                "senderId": "u1",
                "messageId": "m7",
                "messageType": "file"
            }
        });
        let event = serde_json::from_value::<ClientEvent>(raw).unwrap();
        let ClientEvent::SendMessage(send) = event else {
            panic!("expected send-message");
        };
        assert_eq!(send.message_type, MessageType::File);
        assert!(send.message.text.is_none());
        assert!(send.timestamp.is_none());
        assert_eq!(send.message.file.unwrap()["name"], "cv.pdf");
    }

    #[test]
    fn rejects_unknown_event_and_bad_message_type() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"leave","data":"42"}"#).is_err());

        let raw = json!({
            "event": "send-message",
            "data": {
                "chatId": "42",
                "message": { "text": "hi" },
                "senderId": "u1",
                "messageId": "m1",
                "messageType": "video"
            }
        });
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn text_message_has_no_file_fields() {
        let message = RelayMessage {
            id: "m1".to_string(),
            sender: "u1".to_string(),
            timestamp: Utc::now(),
            chat_id: "42".to_string(),
            body: MessageBody::Text {
                text: "hi".to_string(),
            },
        };
        let value = serde_json::to_value(ServerEvent::NewMessage(message)).unwrap();
        assert_eq!(value["event"], "new-message");
        let data = value["data"].as_object().unwrap();
        assert_eq!(data["text"], "hi");
        assert_eq!(data["chatId"], "42");
        assert!(!data.contains_key("file"));
        assert!(!data.contains_key("messageType"));
    }

    #[test]
    fn attachment_message_has_no_text_field() {
        let message = RelayMessage {
            id: "m2".to_string(),
            sender: "u1".to_string(),
            timestamp: Utc::now(),
            chat_id: "42".to_string(),
            body: MessageBody::Attachment {
                message_type: AttachmentKind::Image,
                file: json!({ "url": "/uploads/a.png" }),
            },
        };
        let value = serde_json::to_value(ServerEvent::NewMessage(message)).unwrap();
        let data = value["data"].as_object().unwrap();
        assert_eq!(data["messageType"], "image");
        assert_eq!(data["file"]["url"], "/uploads/a.png");
        assert!(!data.contains_key("text"));
    }

    #[test]
    fn typing_notice_uses_camel_case() {
        let value = serde_json::to_value(ServerEvent::UserTyping(TypingNotice {
            user_id: "u1".to_string(),
            is_typing: true,
        }))
        .unwrap();
        assert_eq!(
            value,
            json!({ "event": "user-typing", "data": { "userId": "u1", "isTyping": true } })
        );
    }
}
