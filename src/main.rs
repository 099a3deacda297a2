use chat_sync::auth::JwtKeys;
use chat_sync::config::{Config, StoreBackend};
use chat_sync::db::{ChatStore, MemoryStore, MongoStore};
use chat_sync::dispatch::Dispatcher;
use chat_sync::error::Error;
use chat_sync::registry::SocketRegistry;
use chat_sync::routes::{routes, AppState};
use chat_sync::service::ChatService;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = Config::from_env()?;

    let keys = JwtKeys::new(&config.jwt_secret);

    let store: Arc<dyn ChatStore> = match config.store {
        StoreBackend::Mongo => {
            let uri = config.mongodb_uri.as_deref().unwrap_or_default();
            let store = MongoStore::connect(uri, &config.mongodb_database).await?;
            log::info!("connected to database {}", config.mongodb_database);
            Arc::new(store)
        }
        StoreBackend::Memory => {
            log::warn!("using the in-memory store; nothing will be persisted");
            let store = MemoryStore::new();
            for name in &config.seed_users {
                let user = store.add_user(name).await;
                log::info!(
                    "seeded user {} ({}), token {}",
                    user.username,
                    user.id,
                    keys.issue_token(&user.id)?
                );
            }
            Arc::new(store)
        }
    };

    let registry = Arc::new(SocketRegistry::new(config.multi_device));
    let service = ChatService::new(store, Dispatcher::new(registry));
    let state = AppState::new(service, keys);

    let addr = config.addr();
    log::info!("listening on {}", addr);
    warp::serve(routes(state, config.client_url.as_deref()))
        .run(addr)
        .await;
    Ok(())
}
