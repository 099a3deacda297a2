use crate::error::{Error, Result};
use crate::models::{Message, SendMessage, User};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

pub mod memory;
pub mod message;
pub mod user;

pub use memory::MemoryStore;

use message::MessageDocument;
use user::UserDocument;

/// Durable storage behind the message API.
///
/// Every mutation is a single-record operation; no caller relies on
/// multi-record atomicity.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Every user except `exclude`.
    async fn list_contacts(&self, exclude: &str) -> Result<Vec<User>>;

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>>;

    /// Messages exchanged between `a` and `b`, oldest first.
    async fn list_between(&self, a: &str, b: &str) -> Result<Vec<Message>>;

    /// Fails with `Validation` when the body carries no content or the
    /// sender writes to itself, and with `NotFound` when the receiver does
    /// not exist.
    async fn create(&self, sender_id: &str, receiver_id: &str, body: SendMessage)
        -> Result<Message>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>>;

    /// Replaces the text and marks the message as edited.
    async fn update_text(&self, id: &str, text: &str) -> Result<Message>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Users `user_id` has sent a message to or received one from.
    async fn list_chat_partner_ids(&self, user_id: &str) -> Result<Vec<String>>;
}

/// Checks shared by every store before a message is created.
pub fn validate_new(sender_id: &str, receiver_id: &str, body: &SendMessage) -> Result<()> {
    if !body.has_content() {
        return Err(Error::Validation("Text or image is required.".into()));
    }
    if sender_id == receiver_id {
        return Err(Error::Validation("Cannot send messages to yourself.".into()));
    }
    Ok(())
}

pub(crate) fn message_not_found() -> Error {
    Error::NotFound("Message not found".into())
}

pub(crate) fn receiver_not_found() -> Error {
    Error::NotFound("Receiver not found.".into())
}

/// Ids that are not ObjectIds cannot name any stored record.
fn parse_id(id: &str, missing: fn() -> Error) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| missing())
}

pub struct MongoStore {
    messages: Collection<MessageDocument>,
    users: Collection<UserDocument>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let store = Self::new(&client.database(database));
        store.ensure_indexes().await;
        Ok(store)
    }

    pub fn new(db: &Database) -> Self {
        MongoStore {
            messages: db.collection("messages"),
            users: db.collection("users"),
        }
    }

    async fn ensure_indexes(&self) {
        let index = IndexModel::builder()
            .keys(doc! { "senderId": 1, "receiverId": 1, "createdAt": 1 })
            .options(IndexOptions::builder().name("conversation".to_string()).build())
            .build();

        if let Err(e) = self.messages.create_index(index, None).await {
            log::warn!("could not create conversation index: {}", e);
        }
    }
}

#[async_trait]
impl ChatStore for MongoStore {
    async fn list_contacts(&self, exclude: &str) -> Result<Vec<User>> {
        let exclude = parse_id(exclude, || Error::NotFound("User not found".into()))?;
        let users = user::find_contacts(&exclude, &self.users).await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>> {
        let ids: Vec<ObjectId> = ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();
        let users = user::find_users_by_ids(&ids, &self.users).await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    async fn list_between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        let (a, b) = match (ObjectId::parse_str(a), ObjectId::parse_str(b)) {
            (Ok(a), Ok(b)) => (a, b),
            _ => return Ok(Vec::new()),
        };
        let docs = message::find_between(&a, &b, &self.messages).await?;
        Ok(docs.into_iter().filter_map(MessageDocument::into_message).collect())
    }

    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        body: SendMessage,
    ) -> Result<Message> {
        validate_new(sender_id, receiver_id, &body)?;

        let receiver = parse_id(receiver_id, receiver_not_found)?;
        if !user::user_exists(&receiver, &self.users).await? {
            return Err(receiver_not_found());
        }
        let sender = ObjectId::parse_str(sender_id)
            .map_err(|_| Error::Validation("Invalid sender id".into()))?;

        let document = MessageDocument::new(sender, receiver, body.normalized());
        message::insert_message(&document, &self.messages).await?;

        document
            .into_message()
            .ok_or_else(|| Error::Internal("inserted message has no id".into()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>> {
        let id = match ObjectId::parse_str(id) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        let document = message::find_message(&id, &self.messages).await?;
        Ok(document.and_then(MessageDocument::into_message))
    }

    async fn update_text(&self, id: &str, text: &str) -> Result<Message> {
        let id = parse_id(id, message_not_found)?;
        message::set_text(&id, text, &self.messages)
            .await?
            .and_then(MessageDocument::into_message)
            .ok_or_else(message_not_found)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = parse_id(id, message_not_found)?;
        if message::delete_message(&id, &self.messages).await? {
            Ok(())
        } else {
            Err(message_not_found())
        }
    }

    async fn list_chat_partner_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let user_id = match ObjectId::parse_str(user_id) {
            Ok(id) => id,
            Err(_) => return Ok(Vec::new()),
        };
        let ids = message::partner_ids(&user_id, &self.messages).await?;
        Ok(to_hex_ids(&ids))
    }
}

fn to_hex_ids(ids: &[ObjectId]) -> Vec<String> {
    ids.iter().map(|id| id.to_hex()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_ids_come_back_as_hex() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_eq!(to_hex_ids(&[a, b]), vec![a.to_hex(), b.to_hex()]);
        assert!(to_hex_ids(&[]).is_empty());
    }

    #[test]
    fn content_is_checked_before_self_messaging() {
        let err = validate_new("a", "a", &SendMessage::default()).unwrap_err();
        assert_eq!(err.to_string(), "Text or image is required.");

        let err = validate_new("a", "a", &SendMessage::text("hi")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot send messages to yourself.");

        assert!(validate_new("a", "b", &SendMessage::text("hi")).is_ok());
    }
}
