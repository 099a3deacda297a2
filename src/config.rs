use crate::error::{Error, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    pub jwt_secret: String,
    /// Allowed CORS origin. Any origin when unset.
    pub client_url: Option<String>,
    pub store: StoreBackend,
    /// Keep every socket a user opens instead of only the latest one.
    pub multi_device: bool,
    /// Usernames created at start-up by the in-memory store.
    pub seed_users: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so it can be fed
    /// something other than the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = match lookup("HOST") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Internal(format!("HOST is not an IP address: {}", raw)))?,
            None => IpAddr::from([127, 0, 0, 1]),
        };

        let port: u16 = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Internal(format!("PORT is not a valid port: {}", raw)))?,
            None => 3000,
        };

        let store = match lookup("CHAT_STORE").as_deref() {
            None | Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(Error::Internal(format!(
                    "CHAT_STORE must be `mongo` or `memory`, got `{}`",
                    other
                )))
            }
        };

        let mongodb_uri = lookup("MONGODB_URI");
        if store == StoreBackend::Mongo && mongodb_uri.is_none() {
            return Err(Error::Internal("MONGODB_URI must be set".into()));
        }

        let jwt_secret =
            lookup("JWT_SECRET").ok_or_else(|| Error::Internal("JWT_SECRET must be set".into()))?;

        let multi_device = match lookup("MULTI_DEVICE").as_deref() {
            None => false,
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => {
                return Err(Error::Internal(format!(
                    "MULTI_DEVICE must be true or false, got `{}`",
                    other
                )))
            }
        };

        Ok(Config {
            host,
            port,
            mongodb_uri,
            mongodb_database: lookup("MONGODB_DATABASE").unwrap_or_else(|| "chat_app".into()),
            jwt_secret,
            client_url: lookup("CLIENT_URL"),
            store,
            multi_device,
            seed_users: lookup("SEED_USERS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
