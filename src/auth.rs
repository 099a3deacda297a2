use crate::error::Error;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use warp::{Filter, Rejection};

pub const COOKIE_NAME: &str = "jwt";

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    /// Id of the authenticated user.
    pub sub: String,
    pub exp: usize,
}

/// HS256 keys shared with the auth service that issues the tokens.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, user_id: &str) -> Result<String, Error> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, Error> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("token rejected: {}", e);
                Error::Unauthorized("Unauthorized - Invalid token".into())
            })
    }

    fn caller(&self, header: Option<String>, cookie: Option<String>) -> Result<String, Error> {
        let token = header
            .or(cookie)
            .ok_or_else(|| Error::Unauthorized("Unauthorized - No token provided".into()))?;
        Ok(self.validate(&token)?.sub)
    }
}

/// Extracts the caller's user id from the `Authorization` header or the
/// `jwt` cookie.
pub fn with_caller(
    keys: Arc<JwtKeys>,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional(COOKIE_NAME))
        .and_then(move |header: Option<String>, cookie: Option<String>| {
            let keys = keys.clone();
            async move { keys.caller(header, cookie).map_err(Rejection::from) }
        })
}

/// Same as [`with_caller`] for the socket upgrade, where browsers cannot set
/// headers and pass the token in the query string instead.
pub fn with_socket_caller(
    keys: Arc<JwtKeys>,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::query::<HashMap<String, String>>()
        .and(warp::cookie::optional(COOKIE_NAME))
        .and_then(
            move |query: HashMap<String, String>, cookie: Option<String>| {
                let keys = keys.clone();
                async move {
                    keys.caller(query.get("token").cloned(), cookie)
                        .map_err(Rejection::from)
                }
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let keys = JwtKeys::new("secret");
        let token = keys.issue_token("user-1").unwrap();

        assert_eq!(keys.validate(&token).unwrap().sub, "user-1");
        assert_eq!(
            keys.validate(&format!("Bearer {}", token)).unwrap().sub,
            "user-1"
        );
    }

    #[test]
    fn foreign_tokens_are_unauthorized() {
        let token = JwtKeys::new("other").issue_token("user-1").unwrap();
        let err = JwtKeys::new("secret").validate(&token).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn filter_reads_header_then_cookie() {
        let keys = Arc::new(JwtKeys::new("secret"));
        let token = keys.issue_token("user-1").unwrap();
        let filter = with_caller(keys.clone());

        let caller = warp::test::request()
            .header("authorization", format!("Bearer {}", token))
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(caller, "user-1");

        let caller = warp::test::request()
            .header("cookie", format!("jwt={}", token))
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(caller, "user-1");

        assert!(warp::test::request().filter(&filter).await.is_err());
    }
}
