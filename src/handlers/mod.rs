use crate::error::{Error, Result};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

pub mod messages;
pub mod socket;

/// JSON error body `{"message": ...}` with the error's status.
pub fn error_reply(err: &Error) -> Response {
    reply::with_status(
        reply::json(&serde_json::json!({ "message": err.public_message() })),
        err.status(),
    )
    .into_response()
}

/// Domain failures are answered here rather than rejected, so warp never
/// falls through to a sibling route after a handler has run.
fn respond<T: Serialize>(result: Result<T>, status: StatusCode) -> Response {
    match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(e) => error_reply(&e),
    }
}
