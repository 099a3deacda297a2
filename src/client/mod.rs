//! Client-side sync layer.
//!
//! [`ChatClient`] keeps a local copy of the open conversation consistent
//! with both mutation paths: its own REST calls (applied optimistically and
//! reconciled with the response) and push events from the server.

pub mod api;
pub mod push;
pub mod state;

pub use api::{ChatApi, ClientError, HttpChatApi};
pub use push::PushRouter;
pub use state::{ChatState, LocalMessage, Notice};

use crate::models::{EventKind, Message, PushEvent, SendMessage};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SharedState = Arc<Mutex<ChatState>>;

fn lock(state: &Mutex<ChatState>) -> MutexGuard<'_, ChatState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Push subscription for one open conversation. Released on [`close`] or
/// when dropped, whichever comes first.
///
/// [`close`]: ActiveConversation::close
pub struct ActiveConversation {
    peer_id: String,
    router: Arc<PushRouter>,
    state: SharedState,
    released: bool,
}

impl ActiveConversation {
    fn open(peer_id: &str, router: Arc<PushRouter>, state: SharedState) -> Self {
        for kind in EventKind::CONVERSATION {
            let peer = peer_id.to_string();
            let state = state.clone();
            router.on(kind, move |event: &PushEvent| {
                lock(&state).apply_push(&peer, event);
            });
        }

        ActiveConversation {
            peer_id: peer_id.to_string(),
            router,
            state,
            released: false,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        for kind in EventKind::CONVERSATION {
            self.router.off(kind);
        }
        lock(&self.state).editing = None;
        self.released = true;
    }
}

impl Drop for ActiveConversation {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct ChatClient<A> {
    api: A,
    user_id: String,
    state: SharedState,
    router: Arc<PushRouter>,
    active: Mutex<Option<ActiveConversation>>,
    next_temp: AtomicU64,
}

impl<A: ChatApi> ChatClient<A> {
    /// `router` must be the one fed by this user's push socket.
    pub fn new(api: A, user_id: &str, router: Arc<PushRouter>) -> Self {
        let state: SharedState = Arc::default();

        let presence = state.clone();
        router.on(EventKind::OnlineUsers, move |event: &PushEvent| {
            if let PushEvent::OnlineUsers(users) = event {
                lock(&presence).online_users = users.clone();
            }
        });

        ChatClient {
            api,
            user_id: user_id.to_string(),
            state,
            router,
            active: Mutex::new(None),
            next_temp: AtomicU64::new(0),
        }
    }

    pub fn router(&self) -> &Arc<PushRouter> {
        &self.router
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn messages(&self) -> Vec<LocalMessage> {
        self.with_state(|s| s.messages.clone())
    }

    pub fn set_editing(&self, message: Option<Message>) {
        lock(&self.state).editing = message;
    }

    fn fail(&self, action: &str, err: ClientError) -> ClientError {
        log::warn!("{} failed: {}", action, err);
        lock(&self.state).last_notice = Some(Notice::Error(err.to_string()));
        err
    }

    pub async fn load_contacts(&self) -> Result<(), ClientError> {
        match self.api.contacts().await {
            Ok(users) => {
                lock(&self.state).contacts = users;
                Ok(())
            }
            Err(e) => Err(self.fail("loading contacts", e)),
        }
    }

    pub async fn load_chats(&self) -> Result<(), ClientError> {
        match self.api.chats().await {
            Ok(users) => {
                lock(&self.state).chats = users;
                Ok(())
            }
            Err(e) => Err(self.fail("loading chats", e)),
        }
    }

    /// Opens the conversation with `peer_id`. The previous conversation's
    /// subscription is torn down before the new one is set up, so handlers
    /// never pile up across switches.
    pub async fn select_user(&self, peer_id: &str) -> Result<(), ClientError> {
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = active.take() {
                previous.close();
            }
            lock(&self.state).select(Some(peer_id.to_string()));
            *active = Some(ActiveConversation::open(
                peer_id,
                self.router.clone(),
                self.state.clone(),
            ));
        }

        match self.api.messages(peer_id).await {
            Ok(history) => {
                lock(&self.state).set_history(peer_id, history);
                Ok(())
            }
            Err(e) => Err(self.fail("loading messages", e)),
        }
    }

    pub fn leave_conversation(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.close();
        }
        lock(&self.state).select(None);
    }

    pub fn active_peer(&self) -> Option<String> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.as_ref().map(|c| c.peer_id().to_string())
    }

    fn temp_id(&self) -> String {
        let seq = self.next_temp.fetch_add(1, Ordering::Relaxed);
        format!("temp-{}-{}", Utc::now().timestamp_millis(), seq)
    }

    /// Sends `draft` to the open conversation, or applies it as an edit
    /// when a message is selected for editing.
    ///
    /// Returns `Ok(None)` without touching anything when no conversation is
    /// open or the draft is empty.
    pub async fn send_message(&self, draft: SendMessage) -> Result<Option<Message>, ClientError> {
        let (peer, editing) = self.with_state(|s| (s.selected_user.clone(), s.editing.clone()));
        let Some(peer) = peer else {
            return Ok(None);
        };
        if !draft.has_content() {
            return Ok(None);
        }

        if let Some(editing) = editing {
            lock(&self.state).editing = None;
            let text = draft.text.unwrap_or_default();
            return self.edit_message(&editing.id, &text).await.map(Some);
        }

        let temp_id = self.temp_id();
        let now = Utc::now();
        let placeholder = Message {
            id: temp_id.clone(),
            sender_id: self.user_id.clone(),
            receiver_id: peer.clone(),
            text: draft.text.clone(),
            image: draft.image.clone(),
            edited: false,
            created_at: now,
            updated_at: now,
        };
        lock(&self.state).insert_optimistic(placeholder);

        match self.api.send(&peer, &draft).await {
            Ok(message) => {
                lock(&self.state).confirm(&temp_id, message.clone());
                Ok(Some(message))
            }
            Err(e) => {
                lock(&self.state).rollback(&temp_id);
                Err(self.fail("sending message", e))
            }
        }
    }

    pub async fn edit_message(&self, message_id: &str, text: &str) -> Result<Message, ClientError> {
        match self.api.update(message_id, text).await {
            Ok(message) => {
                let mut state = lock(&self.state);
                state.patch_text(message_id, message.text.clone());
                state.editing = None;
                state.last_notice = Some(Notice::Success("Message updated successfully!".into()));
                Ok(message)
            }
            Err(e) => Err(self.fail("editing message", e)),
        }
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<(), ClientError> {
        match self.api.delete(message_id).await {
            Ok(_) => {
                let mut state = lock(&self.state);
                state.remove(message_id);
                state.last_notice = Some(Notice::Success("Message deleted successfully".into()));
                Ok(())
            }
            Err(e) => Err(self.fail("deleting message", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Deleted, User};
    use async_trait::async_trait;

    fn message(id: &str, from: &str, to: &str, text: &str) -> Message {
        let now = Utc::now();
        Message {
            id: id.into(),
            sender_id: from.into(),
            receiver_id: to.into(),
            text: Some(text.into()),
            image: None,
            edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Answers from canned data; `fail` turns every mutation into a 500.
    #[derive(Default)]
    struct FakeApi {
        history: Vec<Message>,
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    fn server_error() -> ClientError {
        ClientError::Api {
            status: 500,
            message: "Internal server error".into(),
        }
    }

    #[async_trait]
    impl ChatApi for FakeApi {
        async fn contacts(&self) -> Result<Vec<User>, ClientError> {
            Ok(vec![User::new("bob", "bob")])
        }

        async fn chats(&self) -> Result<Vec<User>, ClientError> {
            Ok(Vec::new())
        }

        async fn messages(&self, peer_id: &str) -> Result<Vec<Message>, ClientError> {
            Ok(self
                .history
                .iter()
                .filter(|m| m.is_between("me", peer_id))
                .cloned()
                .collect())
        }

        async fn send(&self, receiver_id: &str, body: &SendMessage) -> Result<Message, ClientError> {
            if self.fail {
                return Err(server_error());
            }
            let mut sent = self.sent.lock().unwrap();
            let id = format!("m{}", sent.len() + 100);
            sent.push(id.clone());
            Ok(message(&id, "me", receiver_id, body.text.as_deref().unwrap_or("")))
        }

        async fn update(&self, message_id: &str, text: &str) -> Result<Message, ClientError> {
            if self.fail {
                return Err(server_error());
            }
            let mut updated = message(message_id, "me", "bob", text);
            updated.edited = true;
            Ok(updated)
        }

        async fn delete(&self, message_id: &str) -> Result<Deleted, ClientError> {
            if self.fail {
                return Err(server_error());
            }
            Ok(Deleted {
                message: "Message deleted successfully".into(),
                message_id: message_id.into(),
            })
        }
    }

    fn new_client(api: FakeApi) -> ChatClient<FakeApi> {
        ChatClient::new(api, "me", Arc::new(PushRouter::new()))
    }

    #[tokio::test]
    async fn successful_send_replaces_the_placeholder() {
        let client = new_client(FakeApi::default());
        client.select_user("bob").await.unwrap();

        let sent = client
            .send_message(SendMessage::text("hi"))
            .await
            .unwrap()
            .unwrap();

        let messages = client.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id(), sent.id);
        assert!(!messages[0].optimistic);
    }

    #[tokio::test]
    async fn failed_send_leaves_the_list_untouched() {
        let api = FakeApi {
            history: vec![message("m1", "bob", "me", "yo")],
            fail: true,
            ..FakeApi::default()
        };
        let client = new_client(api);
        client.select_user("bob").await.unwrap();
        let before = client.messages();

        let err = client.send_message(SendMessage::text("hi")).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
        assert_eq!(client.messages(), before);
        assert_eq!(
            client.with_state(|s| s.last_notice.clone()),
            Some(Notice::Error("Internal server error".into()))
        );
    }

    #[tokio::test]
    async fn empty_drafts_and_no_conversation_are_no_ops() {
        let client = new_client(FakeApi::default());
        assert!(client.send_message(SendMessage::text("hi")).await.unwrap().is_none());

        client.select_user("bob").await.unwrap();
        assert!(client.send_message(SendMessage::text("  ")).await.unwrap().is_none());
        assert!(client.messages().is_empty());
    }

    #[tokio::test]
    async fn sending_while_editing_edits_instead() {
        let api = FakeApi {
            history: vec![message("m1", "me", "bob", "helo")],
            ..FakeApi::default()
        };
        let client = new_client(api);
        client.select_user("bob").await.unwrap();
        client.set_editing(Some(message("m1", "me", "bob", "helo")));

        let edited = client
            .send_message(SendMessage::text("hello"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.id, "m1");

        let messages = client.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message.text.as_deref(), Some("hello"));
        assert!(messages[0].message.edited);
        assert!(client.with_state(|s| s.editing.is_none()));
    }

    #[tokio::test]
    async fn switching_twice_keeps_one_set_of_handlers() {
        let client = new_client(FakeApi::default());
        let router = client.router().clone();

        client.select_user("bob").await.unwrap();
        client.select_user("carol").await.unwrap();
        client.select_user("bob").await.unwrap();

        for kind in EventKind::CONVERSATION {
            assert_eq!(router.handler_count(kind), 1);
        }
        assert_eq!(router.handler_count(EventKind::OnlineUsers), 1);

        router.dispatch(&PushEvent::NewMessage(message("m1", "bob", "me", "hi")));
        assert_eq!(client.messages().len(), 1);

        client.leave_conversation();
        for kind in EventKind::CONVERSATION {
            assert_eq!(router.handler_count(kind), 0);
        }
        assert!(client.active_peer().is_none());
    }

    #[tokio::test]
    async fn leaving_mid_dispatch_stops_the_old_handlers() {
        let client = Arc::new(new_client(FakeApi::default()));
        let router = client.router().clone();

        // runs ahead of the conversation handler in the same dispatch
        let weak = Arc::downgrade(&client);
        router.on(EventKind::NewMessage, move |_: &PushEvent| {
            if let Some(client) = weak.upgrade() {
                client.leave_conversation();
            }
        });
        client.select_user("bob").await.unwrap();

        assert_eq!(
            router.dispatch(&PushEvent::NewMessage(message("m1", "bob", "me", "hi"))),
            2
        );
        assert!(client.active_peer().is_none());
        assert!(client.messages().is_empty());
    }

    #[tokio::test]
    async fn leaving_clears_the_editing_selection() {
        let client = new_client(FakeApi::default());
        client.select_user("bob").await.unwrap();
        client.set_editing(Some(message("m1", "me", "bob", "x")));

        client.select_user("carol").await.unwrap();
        assert!(client.with_state(|s| s.editing.is_none()));
    }

    #[tokio::test]
    async fn delete_removes_locally_and_failures_keep_the_entry() {
        let api = FakeApi {
            history: vec![message("m1", "me", "bob", "x")],
            ..FakeApi::default()
        };
        let client = new_client(api);
        client.select_user("bob").await.unwrap();
        client.delete_message("m1").await.unwrap();
        assert!(client.messages().is_empty());

        let api = FakeApi {
            history: vec![message("m1", "me", "bob", "x")],
            fail: true,
            ..FakeApi::default()
        };
        let client = new_client(api);
        client.select_user("bob").await.unwrap();
        assert!(client.delete_message("m1").await.is_err());
        assert_eq!(client.messages().len(), 1);
    }

    #[tokio::test]
    async fn presence_updates_outlive_conversations() {
        let client = new_client(FakeApi::default());
        client
            .router()
            .dispatch(&PushEvent::OnlineUsers(vec!["bob".into()]));
        assert!(client.with_state(|s| s.is_online("bob")));
    }
}
