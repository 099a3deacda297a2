use crate::models::{Message, PushEvent, User};

/// A message as shown locally. Optimistic entries carry a temporary id
/// until the server confirms them.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMessage {
    pub message: Message,
    pub optimistic: bool,
}

impl LocalMessage {
    pub fn id(&self) -> &str {
        &self.message.id
    }
}

/// Transient feedback for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Everything a chat view renders. Pure state: no I/O happens here.
#[derive(Debug, Default)]
pub struct ChatState {
    pub contacts: Vec<User>,
    pub chats: Vec<User>,
    /// Counterpart of the open conversation.
    pub selected_user: Option<String>,
    pub messages: Vec<LocalMessage>,
    /// Message the composer currently edits instead of sending anew.
    pub editing: Option<Message>,
    pub online_users: Vec<String>,
    pub last_notice: Option<Notice>,
}

impl ChatState {
    /// Switches to `peer` (or to no conversation) and forgets the previous
    /// conversation's messages and editing selection.
    pub fn select(&mut self, peer: Option<String>) {
        self.selected_user = peer;
        self.messages.clear();
        self.editing = None;
    }

    pub fn is_selected(&self, peer: &str) -> bool {
        self.selected_user.as_deref() == Some(peer)
    }

    /// Installs fetched history for `peer`. Ignored when the user has moved
    /// on; pushes that landed while the fetch was in flight are kept.
    pub fn set_history(&mut self, peer: &str, history: Vec<Message>) -> bool {
        if !self.is_selected(peer) {
            return false;
        }

        let mut merged: Vec<LocalMessage> = history
            .into_iter()
            .map(|message| LocalMessage {
                message,
                optimistic: false,
            })
            .collect();
        let pending = std::mem::take(&mut self.messages);
        for local in pending {
            if !merged.iter().any(|m| m.id() == local.id()) {
                merged.push(local);
            }
        }
        self.messages = merged;
        true
    }

    pub fn insert_optimistic(&mut self, placeholder: Message) {
        self.messages.push(LocalMessage {
            message: placeholder,
            optimistic: true,
        });
    }

    /// Replaces the placeholder `temp_id` with the stored message.
    pub fn confirm(&mut self, temp_id: &str, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id() == temp_id) {
            Some(entry) => {
                *entry = LocalMessage {
                    message,
                    optimistic: false,
                };
                true
            }
            None => false,
        }
    }

    pub fn rollback(&mut self, temp_id: &str) -> bool {
        self.remove(temp_id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id() != id);
        self.messages.len() != before
    }

    pub fn patch_text(&mut self, id: &str, text: Option<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id() == id) {
            Some(entry) => {
                entry.message.text = text;
                entry.message.edited = true;
                true
            }
            None => false,
        }
    }

    /// Applies a push received while the conversation with `peer` is open.
    /// Returns whether anything changed.
    pub fn apply_push(&mut self, peer: &str, event: &PushEvent) -> bool {
        if let PushEvent::OnlineUsers(users) = event {
            self.online_users = users.clone();
            return true;
        }
        // a handler already snapshotted by a dispatch can outlive its conversation
        if !self.is_selected(peer) {
            return false;
        }

        match event {
            PushEvent::NewMessage(message) => {
                // other conversations are routed elsewhere
                if message.sender_id != peer {
                    return false;
                }
                self.messages.push(LocalMessage {
                    message: message.clone(),
                    optimistic: false,
                });
                true
            }
            PushEvent::MessageUpdated(message) => {
                self.patch_text(&message.id, message.text.clone())
            }
            PushEvent::MessageDeleted { message_id } => self.remove(message_id),
            PushEvent::OnlineUsers(_) => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_users.iter().any(|u| u == user_id)
    }

    pub fn message_ids(&self) -> Vec<&str> {
        self.messages.iter().map(LocalMessage::id).collect()
    }
}
