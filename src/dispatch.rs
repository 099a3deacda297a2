use crate::models::PushEvent;
use crate::registry::{SocketRegistry, Tx};
use std::sync::Arc;
use warp::ws::Message;

/// Pushes events to whoever is connected. Delivery is best effort: an
/// offline recipient is not an error and nothing is queued for later.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<SocketRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SocketRegistry>) -> Self {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &Arc<SocketRegistry> {
        &self.registry
    }

    /// Returns the number of sockets the event was handed to.
    pub async fn notify(&self, recipient_id: &str, event: &PushEvent) -> usize {
        let senders = self.registry.senders(recipient_id).await;
        if senders.is_empty() {
            log::debug!("{} for {} dropped: recipient offline", event.kind(), recipient_id);
            return 0;
        }

        let delivered = push(&senders, event);
        log::debug!(
            "{} pushed to {} ({} of {} sockets)",
            event.kind(),
            recipient_id,
            delivered,
            senders.len()
        );
        delivered
    }

    /// Tells every connected socket who is online.
    pub async fn broadcast_presence(&self) -> usize {
        let event = PushEvent::OnlineUsers(self.registry.online_users().await);
        let senders = self.registry.all_senders().await;
        push(&senders, &event)
    }
}

fn push(senders: &[Tx], event: &PushEvent) -> usize {
    let frame = match event.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("failed to serialize {} event: {}", event.kind(), e);
            return 0;
        }
    };

    // a send only fails when the socket's writer is already gone
    senders
        .iter()
        .filter(|tx| tx.send(Message::text(frame.clone())).is_ok())
        .count()
}
