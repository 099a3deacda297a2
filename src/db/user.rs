use crate::models::User;
use futures_util::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::{CountOptions, FindOptions};
use mongodb::{error::Error, Collection};
use serde::{Deserialize, Serialize};

/// Stored user as written by the auth service. Credentials live in the same
/// document but are never projected into this type.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id.to_hex(),
            username: doc.username,
            full_name: doc.full_name,
            profile_pic: doc.profile_pic,
        }
    }
}

fn public_fields() -> FindOptions {
    FindOptions::builder()
        .projection(doc! { "password": 0 })
        .build()
}

pub async fn find_contacts(
    exclude: &ObjectId,
    collection: &Collection<UserDocument>,
) -> Result<Vec<UserDocument>, Error> {
    let cursor = collection
        .find(doc! { "_id": { "$ne": *exclude } }, public_fields())
        .await?;
    cursor.try_collect().await
}

pub async fn find_users_by_ids(
    ids: &[ObjectId],
    collection: &Collection<UserDocument>,
) -> Result<Vec<UserDocument>, Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let cursor = collection
        .find(doc! { "_id": { "$in": ids.to_vec() } }, public_fields())
        .await?;
    cursor.try_collect().await
}

pub async fn user_exists(
    id: &ObjectId,
    collection: &Collection<UserDocument>,
) -> Result<bool, Error> {
    let options = CountOptions::builder().limit(1).build();
    let count = collection.count_documents(doc! { "_id": *id }, options).await?;
    Ok(count > 0)
}
