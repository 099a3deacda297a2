pub mod event;
pub mod message;
pub mod user;

pub use event::{EventKind, PushEvent};
pub use message::{Deleted, Message, SendMessage, UpdateMessage};
pub use user::User;
