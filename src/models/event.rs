use super::message::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-initiated frame pushed over an open socket.
///
/// On the wire: `{"event": "<kind>", "payload": ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum PushEvent {
    NewMessage(Message),
    MessageUpdated(Message),
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        message_id: String,
    },
    OnlineUsers(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewMessage,
    MessageUpdated,
    MessageDeleted,
    OnlineUsers,
}

impl EventKind {
    /// The kinds a conversation view listens to.
    pub const CONVERSATION: [EventKind; 3] = [
        EventKind::NewMessage,
        EventKind::MessageDeleted,
        EventKind::MessageUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewMessage => "newMessage",
            EventKind::MessageUpdated => "messageUpdated",
            EventKind::MessageDeleted => "messageDeleted",
            EventKind::OnlineUsers => "onlineUsers",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::NewMessage(_) => EventKind::NewMessage,
            PushEvent::MessageUpdated(_) => EventKind::MessageUpdated,
            PushEvent::MessageDeleted { .. } => EventKind::MessageDeleted,
            PushEvent::OnlineUsers(_) => EventKind::OnlineUsers,
        }
    }

    pub fn deleted(message_id: &str) -> Self {
        PushEvent::MessageDeleted {
            message_id: message_id.to_string(),
        }
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_frame(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }
}
