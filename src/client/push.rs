use crate::models::{EventKind, PushEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Client end of the push socket: fans incoming frames out to the
/// handlers registered for their kind.
#[derive(Default)]
pub struct PushRouter {
    handlers: Mutex<HashMap<EventKind, Vec<Handler>>>,
}

impl PushRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Removes every handler for `kind`; returns how many there were.
    pub fn off(&self, kind: EventKind) -> usize {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.remove(&kind).map_or(0, |h| h.len())
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Calls every handler registered for the event's kind and returns how
    /// many ran.
    pub fn dispatch(&self, event: &PushEvent) -> usize {
        // handlers may subscribe or unsubscribe, so run them unlocked
        let targets: Vec<Handler> = {
            let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            handlers.get(&event.kind()).cloned().unwrap_or_default()
        };

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }

    /// Parses one text frame from the socket and dispatches it.
    pub fn dispatch_frame(&self, frame: &str) -> serde_json::Result<usize> {
        let event = PushEvent::from_frame(frame)?;
        Ok(self.dispatch(&event))
    }
}
