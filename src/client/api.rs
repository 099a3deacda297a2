use crate::models::{Deleted, Message, SendMessage, UpdateMessage, User};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The message endpoints as the client sees them.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn contacts(&self) -> Result<Vec<User>, ClientError>;

    async fn chats(&self) -> Result<Vec<User>, ClientError>;

    async fn messages(&self, peer_id: &str) -> Result<Vec<Message>, ClientError>;

    async fn send(&self, receiver_id: &str, body: &SendMessage) -> Result<Message, ClientError>;

    async fn update(&self, message_id: &str, text: &str) -> Result<Message, ClientError>;

    async fn delete(&self, message_id: &str) -> Result<Deleted, ClientError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct HttpChatApi {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpChatApi {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str, token: &str) -> Self {
        HttpChatApi {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/messages/{}", self.base_url, path)
    }

    /// Where to open the push socket.
    pub fn socket_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/api/socket?token={}", base, self.token)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|body| body.message)
                .unwrap_or_else(|_| "Something went wrong".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn contacts(&self) -> Result<Vec<User>, ClientError> {
        self.execute(self.http.get(self.url("contacts"))).await
    }

    async fn chats(&self) -> Result<Vec<User>, ClientError> {
        self.execute(self.http.get(self.url("chats"))).await
    }

    async fn messages(&self, peer_id: &str) -> Result<Vec<Message>, ClientError> {
        self.execute(self.http.get(self.url(peer_id))).await
    }

    async fn send(&self, receiver_id: &str, body: &SendMessage) -> Result<Message, ClientError> {
        let url = self.url(&format!("send/{}", receiver_id));
        self.execute(self.http.post(url).json(body)).await
    }

    async fn update(&self, message_id: &str, text: &str) -> Result<Message, ClientError> {
        let url = self.url(&format!("update/{}", message_id));
        let body = UpdateMessage {
            text: Some(text.to_string()),
        };
        self.execute(self.http.put(url).json(&body)).await
    }

    async fn delete(&self, message_id: &str) -> Result<Deleted, ClientError> {
        let url = self.url(&format!("delete/{}", message_id));
        self.execute(self.http.delete(url)).await
    }
}
