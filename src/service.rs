use crate::db::ChatStore;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::models::{Deleted, Message, PushEvent, SendMessage, UpdateMessage, User};
use std::sync::Arc;

/// Message mutations and queries on behalf of an authenticated caller.
///
/// Each mutation is applied to the store first and only then pushed to the
/// other participant, so a push never announces a change that failed.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    dispatcher: Dispatcher,
}

fn logged<T>(op: &str, caller: &str, target: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.status().is_server_error() {
            log::error!("{} by {} on {} failed: {}", op, caller, target, e);
        } else {
            log::warn!("{} by {} on {} rejected: {}", op, caller, target, e);
        }
    }
    result
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, dispatcher: Dispatcher) -> Self {
        ChatService { store, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn contacts(&self, caller: &str) -> Result<Vec<User>> {
        logged("contacts", caller, "-", self.store.list_contacts(caller).await)
    }

    pub async fn chat_partners(&self, caller: &str) -> Result<Vec<User>> {
        let result: Result<Vec<User>> = async {
            let ids = self.store.list_chat_partner_ids(caller).await?;
            self.store.find_users(&ids).await
        }
        .await;
        logged("chats", caller, "-", result)
    }

    pub async fn conversation(&self, caller: &str, peer: &str) -> Result<Vec<Message>> {
        logged("history", caller, peer, self.store.list_between(caller, peer).await)
    }

    pub async fn send(&self, caller: &str, receiver_id: &str, body: SendMessage) -> Result<Message> {
        let message = logged(
            "send",
            caller,
            receiver_id,
            self.store.create(caller, receiver_id, body).await,
        )?;

        log::info!("message {} sent from {} to {}", message.id, caller, receiver_id);
        self.dispatcher
            .notify(&message.receiver_id, &PushEvent::NewMessage(message.clone()))
            .await;
        Ok(message)
    }

    pub async fn edit(&self, caller: &str, message_id: &str, body: UpdateMessage) -> Result<Message> {
        let result: Result<Message> = async {
            let message = self
                .store
                .find_by_id(message_id)
                .await?
                .ok_or_else(|| Error::NotFound("Message not found".into()))?;

            if message.sender_id != caller {
                return Err(Error::Forbidden("You can only edit your own messages".into()));
            }

            let text = body
                .text
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| Error::Validation("Text is required".into()))?;

            self.store.update_text(message_id, &text).await
        }
        .await;
        let message = logged("edit", caller, message_id, result)?;

        log::info!("message {} edited by {}", message.id, caller);
        self.dispatcher
            .notify(&message.receiver_id, &PushEvent::MessageUpdated(message.clone()))
            .await;
        Ok(message)
    }

    pub async fn delete(&self, caller: &str, message_id: &str) -> Result<Deleted> {
        let result: Result<Message> = async {
            let message = self
                .store
                .find_by_id(message_id)
                .await?
                .ok_or_else(|| Error::NotFound("Message not found".into()))?;

            if message.sender_id != caller {
                return Err(Error::Forbidden(
                    "You can only delete your own messages".into(),
                ));
            }

            self.store.delete(message_id).await?;
            Ok(message)
        }
        .await;
        let message = logged("delete", caller, message_id, result)?;

        log::info!("message {} deleted by {}", message.id, caller);
        self.dispatcher
            .notify(&message.receiver_id, &PushEvent::deleted(&message.id))
            .await;
        Ok(Deleted {
            message: "Message deleted successfully".into(),
            message_id: message.id,
        })
    }
}
