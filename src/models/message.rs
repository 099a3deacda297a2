use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// URL of an already hosted image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// The participant that is not `user_id`.
    pub fn counterpart(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// Body of `POST /messages/send/:id`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SendMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl SendMessage {
    pub fn text(text: &str) -> Self {
        SendMessage {
            text: Some(text.to_string()),
            image: None,
        }
    }

    /// Blank text counts as absent.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().map_or(false, |t| !t.trim().is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image.as_deref().map_or(false, |i| !i.is_empty())
    }

    pub fn has_content(&self) -> bool {
        self.has_text() || self.has_image()
    }

    /// Drops blank fields so the stored record never carries them.
    pub fn normalized(self) -> Self {
        let has_text = self.has_text();
        let has_image = self.has_image();
        SendMessage {
            text: self.text.filter(|_| has_text),
            image: self.image.filter(|_| has_image),
        }
    }
}

/// Body of `PUT /messages/update/:id`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UpdateMessage {
    #[serde(default)]
    pub text: Option<String>,
}

impl UpdateMessage {
    /// Reads an edit body. A missing or unreadable body carries no text, so
    /// the edit is still checked for existence and ownership before the
    /// text is rejected.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            log::debug!("unreadable edit body: {}", e);
            Self::default()
        })
    }
}

/// Response of `DELETE /messages/delete/:id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub message: String,
    pub message_id: String,
}
