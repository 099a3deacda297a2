use super::{message_not_found, receiver_not_found, validate_new, ChatStore};
use crate::error::Result;
use crate::models::{Message, SendMessage, User};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use std::collections::BTreeSet;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    messages: Vec<Message>,
}

/// Process-local store. Ids are generated in the same format as the
/// database's so clients cannot tell the two apart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_user_id() -> String {
        ObjectId::new().to_hex()
    }

    pub async fn insert_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.users.retain(|u| u.id != user.id);
        inner.users.push(user);
    }

    /// Creates a user with a fresh id and returns it.
    pub async fn add_user(&self, username: &str) -> User {
        let user = User::new(&Self::new_user_id(), username);
        self.insert_user(user.clone()).await;
        user
    }

    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn list_contacts(&self, exclude: &str) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| u.id != exclude)
            .cloned()
            .collect())
    }

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn list_between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        messages.sort_by(|x, y| x.created_at.cmp(&y.created_at));
        Ok(messages)
    }

    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        body: SendMessage,
    ) -> Result<Message> {
        validate_new(sender_id, receiver_id, &body)?;

        let mut inner = self.inner.write().await;
        if !inner.users.iter().any(|u| u.id == receiver_id) {
            return Err(receiver_not_found());
        }

        let body = body.normalized();
        let now = Utc::now();
        let message = Message {
            id: ObjectId::new().to_hex(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: body.text,
            image: body.image,
            edited: false,
            created_at: now,
            updated_at: now,
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>> {
        let inner = self.inner.read().await;
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn update_text(&self, id: &str, text: &str) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(message_not_found)?;

        message.text = Some(text.to_string());
        message.edited = true;
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let before = inner.messages.len();
        inner.messages.retain(|m| m.id != id);
        if inner.messages.len() == before {
            return Err(message_not_found());
        }
        Ok(())
    }

    async fn list_chat_partner_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let partners: BTreeSet<&str> = inner
            .messages
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .map(|m| m.counterpart(user_id))
            .collect();
        Ok(partners.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn create_checks_content_self_and_receiver() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;

        let err = store
            .create(&alice.id, &bob.id, SendMessage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = store
            .create(&alice.id, &alice.id, SendMessage::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = store
            .create(&alice.id, &MemoryStore::new_user_id(), SendMessage::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let message = store
            .create(&alice.id, &bob.id, SendMessage::text("hi"))
            .await
            .unwrap();
        assert!(!message.edited);
        assert_eq!(store.message_count().await, 1);
    }

    #[tokio::test]
    async fn lists_conversation_in_order() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let carol = store.add_user("carol").await;

        let first = store
            .create(&alice.id, &bob.id, SendMessage::text("1"))
            .await
            .unwrap();
        store
            .create(&alice.id, &carol.id, SendMessage::text("elsewhere"))
            .await
            .unwrap();
        let second = store
            .create(&bob.id, &alice.id, SendMessage::text("2"))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_between(&bob.id, &alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);

        let mut partners = store.list_chat_partner_ids(&alice.id).await.unwrap();
        partners.sort();
        let mut expected = vec![bob.id.clone(), carol.id.clone()];
        expected.sort();
        assert_eq!(partners, expected);

        assert_eq!(
            store.list_chat_partner_ids(&bob.id).await.unwrap(),
            vec![alice.id.clone()]
        );
    }

    #[tokio::test]
    async fn update_and_delete_missing_messages() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let message = store
            .create(&alice.id, &bob.id, SendMessage::text("hi"))
            .await
            .unwrap();

        let updated = store.update_text(&message.id, "hi there").await.unwrap();
        assert_eq!(updated.text.as_deref(), Some("hi there"));
        assert!(updated.edited);

        store.delete(&message.id).await.unwrap();
        assert!(store.find_by_id(&message.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&message.id).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            store.update_text(&message.id, "x").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
