use super::respond;
use crate::models::{SendMessage, UpdateMessage};
use crate::service::ChatService;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::Rejection;

pub async fn contacts_handler(
    caller: String,
    service: ChatService,
) -> Result<Response, Rejection> {
    Ok(respond(service.contacts(&caller).await, StatusCode::OK))
}

pub async fn chats_handler(caller: String, service: ChatService) -> Result<Response, Rejection> {
    Ok(respond(service.chat_partners(&caller).await, StatusCode::OK))
}

pub async fn history_handler(
    peer_id: String,
    caller: String,
    service: ChatService,
) -> Result<Response, Rejection> {
    Ok(respond(
        service.conversation(&caller, &peer_id).await,
        StatusCode::OK,
    ))
}

pub async fn send_handler(
    receiver_id: String,
    caller: String,
    body: SendMessage,
    service: ChatService,
) -> Result<Response, Rejection> {
    Ok(respond(
        service.send(&caller, &receiver_id, body).await,
        StatusCode::CREATED,
    ))
}

pub async fn update_handler(
    message_id: String,
    caller: String,
    body: Bytes,
    service: ChatService,
) -> Result<Response, Rejection> {
    let body = UpdateMessage::from_body(&body);
    Ok(respond(
        service.edit(&caller, &message_id, body).await,
        StatusCode::OK,
    ))
}

pub async fn delete_handler(
    message_id: String,
    caller: String,
    service: ChatService,
) -> Result<Response, Rejection> {
    Ok(respond(
        service.delete(&caller, &message_id).await,
        StatusCode::OK,
    ))
}
