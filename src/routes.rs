use crate::auth::{self, JwtKeys};
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::handlers::messages::{
    chats_handler, contacts_handler, delete_handler, history_handler, send_handler,
    update_handler,
};
use crate::handlers::{error_reply, socket::socket_handler};
use crate::models::SendMessage;
use crate::service::ChatService;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::{Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted JSON body. Inline images can be big.
const BODY_LIMIT: u64 = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    pub keys: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(service: ChatService, keys: JwtKeys) -> Self {
        AppState {
            service,
            keys: Arc::new(keys),
        }
    }
}

fn with_service(
    service: ChatService,
) -> impl Filter<Extract = (ChatService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn with_dispatcher(
    dispatcher: Dispatcher,
) -> impl Filter<Extract = (Dispatcher,), Error = Infallible> + Clone {
    warp::any().map(move || dispatcher.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

/// Raw body that is left to the handler to interpret. A request without a
/// `Content-Length` yields an empty body instead of a rejection.
fn raw_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_LIMIT)
        .and(warp::body::bytes())
        .or_else(|err: Rejection| async move {
            if err.find::<warp::reject::LengthRequired>().is_some() {
                Ok((Bytes::new(),))
            } else {
                Err(err)
            }
        })
}

/// `/api/messages/...` and the `/api/socket` upgrade.
pub fn api(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let caller = auth::with_caller(state.keys.clone());
    let service = with_service(state.service.clone());

    let contacts = warp::path!("api" / "messages" / "contacts")
        .and(warp::get())
        .and(caller.clone())
        .and(service.clone())
        .and_then(contacts_handler);

    let chats = warp::path!("api" / "messages" / "chats")
        .and(warp::get())
        .and(caller.clone())
        .and(service.clone())
        .and_then(chats_handler);

    let history = warp::path!("api" / "messages" / String)
        .and(warp::get())
        .and(caller.clone())
        .and(service.clone())
        .and_then(history_handler);

    let send = warp::path!("api" / "messages" / "send" / String)
        .and(warp::post())
        .and(caller.clone())
        .and(json_body::<SendMessage>())
        .and(service.clone())
        .and_then(send_handler);

    let update = warp::path!("api" / "messages" / "update" / String)
        .and(warp::put())
        .and(caller.clone())
        .and(raw_body())
        .and(service.clone())
        .and_then(update_handler);

    let delete = warp::path!("api" / "messages" / "delete" / String)
        .and(warp::delete())
        .and(caller)
        .and(service)
        .and_then(delete_handler);

    let socket = warp::path!("api" / "socket")
        .and(warp::ws())
        .and(auth::with_socket_caller(state.keys.clone()))
        .and(with_dispatcher(state.service.dispatcher().clone()))
        .map(|ws: warp::ws::Ws, caller: String, dispatcher: Dispatcher| {
            ws.on_upgrade(move |socket| socket_handler(socket, caller, dispatcher))
        });

    contacts
        .or(chats)
        .or(history)
        .or(send)
        .or(update)
        .or(delete)
        .or(socket)
}

/// [`api`] with error recovery and CORS, ready to serve. The only
/// rejections left are CORS refusals.
pub fn routes(
    state: AppState,
    client_url: Option<&str>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(vec!["Content-Type", "Authorization"])
        .allow_credentials(true);
    let cors = match client_url {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_any_origin(),
    };

    api(state)
        .recover(handle_rejection)
        .with(cors.build())
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<Error>() {
        return Ok(error_reply(e));
    }

    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    let json = warp::reply::json(&serde_json::json!({ "message": message }));
    Ok(warp::reply::with_status(json, status).into_response())
}
