use serde::{Deserialize, Serialize};

/// Public profile of a user. Accounts are owned by the auth service; this
/// service only reads them and never exposes credentials.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl User {
    pub fn new(id: &str, username: &str) -> Self {
        User {
            id: id.to_string(),
            username: username.to_string(),
            full_name: None,
            profile_pic: None,
        }
    }
}
