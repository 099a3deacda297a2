//! Direct-message chat service: REST mutations over a document store with
//! best-effort push of every change to the other participant's socket, and
//! the client-side state that keeps a conversation view in sync with both.

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod routes;
pub mod service;

pub use error::{Error, Result};
