#![allow(dead_code)]

use chat_sync::auth::JwtKeys;
use chat_sync::db::MemoryStore;
use chat_sync::dispatch::Dispatcher;
use chat_sync::models::User;
use chat_sync::registry::SocketRegistry;
use chat_sync::routes::AppState;
use chat_sync::service::ChatService;
use std::sync::Arc;

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub alice: User,
    pub bob: User,
    pub carol: User,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let carol = store.add_user("carol").await;

        let registry = Arc::new(SocketRegistry::new(false));
        let service = ChatService::new(store.clone(), Dispatcher::new(registry));
        let state = AppState::new(service, JwtKeys::new("test-secret"));

        TestApp {
            store,
            state,
            alice,
            bob,
            carol,
        }
    }

    pub fn token(&self, user: &User) -> String {
        self.state.keys.issue_token(&user.id).unwrap()
    }

    pub fn bearer(&self, user: &User) -> String {
        format!("Bearer {}", self.token(user))
    }

    pub fn registry(&self) -> &Arc<SocketRegistry> {
        self.state.service.dispatcher().registry()
    }
}
