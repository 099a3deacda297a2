use crate::models::{Message, SendMessage};
use chrono::{DateTime, Utc};
use futures_util::stream::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{error::Error, Collection};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MessageDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender_id: ObjectId,
    pub receiver_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub edited: bool,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl MessageDocument {
    pub fn new(sender_id: ObjectId, receiver_id: ObjectId, body: SendMessage) -> Self {
        let now = bson::DateTime::now();
        MessageDocument {
            id: Some(ObjectId::new()),
            sender_id,
            receiver_id,
            text: body.text,
            image: body.image,
            edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// `None` for a document stored without an id.
    pub fn into_message(self) -> Option<Message> {
        Some(Message {
            id: self.id?.to_hex(),
            sender_id: self.sender_id.to_hex(),
            receiver_id: self.receiver_id.to_hex(),
            text: self.text,
            image: self.image,
            edited: self.edited,
            created_at: to_chrono(self.created_at),
            updated_at: to_chrono(self.updated_at),
        })
    }
}

fn to_chrono(at: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or_default()
}

pub async fn insert_message(
    message: &MessageDocument,
    collection: &Collection<MessageDocument>,
) -> Result<(), Error> {
    collection.insert_one(message, None).await?;
    Ok(())
}

pub async fn find_between(
    a: &ObjectId,
    b: &ObjectId,
    collection: &Collection<MessageDocument>,
) -> Result<Vec<MessageDocument>, Error> {
    let filter = doc! {
        "$or": [
            { "senderId": *a, "receiverId": *b },
            { "senderId": *b, "receiverId": *a }
        ]
    };
    let options = FindOptions::builder()
        .sort(doc! { "createdAt": 1, "_id": 1 })
        .build();

    let cursor = collection.find(filter, options).await?;
    cursor.try_collect().await
}

pub async fn find_message(
    id: &ObjectId,
    collection: &Collection<MessageDocument>,
) -> Result<Option<MessageDocument>, Error> {
    collection.find_one(doc! { "_id": *id }, None).await
}

/// Returns the updated document, or `None` when nothing matched.
pub async fn set_text(
    id: &ObjectId,
    text: &str,
    collection: &Collection<MessageDocument>,
) -> Result<Option<MessageDocument>, Error> {
    let update = doc! {
        "$set": {
            "text": text,
            "edited": true,
            "updatedAt": bson::DateTime::now()
        }
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    collection
        .find_one_and_update(doc! { "_id": *id }, update, options)
        .await
}

pub async fn delete_message(
    id: &ObjectId,
    collection: &Collection<MessageDocument>,
) -> Result<bool, Error> {
    let result = collection.delete_one(doc! { "_id": *id }, None).await?;
    Ok(result.deleted_count > 0)
}

/// Distinct ids of everyone `user_id` exchanged messages with.
pub async fn partner_ids(
    user_id: &ObjectId,
    collection: &Collection<MessageDocument>,
) -> Result<Vec<ObjectId>, Error> {
    let pipeline = vec![
        doc! {
            "$match": {
                "$or": [
                    { "senderId": *user_id },
                    { "receiverId": *user_id }
                ]
            }
        },
        doc! {
            "$group": {
                "_id": {
                    "$cond": [
                        { "$eq": ["$senderId", *user_id] },
                        "$receiverId",
                        "$senderId"
                    ]
                }
            }
        },
    ];

    let cursor = collection.aggregate(pipeline, None).await?;
    let groups: Vec<Document> = cursor.try_collect().await?;

    Ok(groups
        .iter()
        .filter_map(|group| group.get_object_id("_id").ok())
        .collect())
}
