use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use healio_shared::errors::{AppError, AppResult, ErrorCode};
use healio_shared::types::{NewNotification, Notification};

use crate::models::NotificationDocument;
use crate::services::store::NotificationStore;

pub struct MongoNotificationStore {
    collection: Collection<NotificationDocument>,
}

impl MongoNotificationStore {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(NotificationDocument::COLLECTION),
        }
    }
}

fn parse_object_id(id: &str) -> AppResult<ObjectId> {
    // A malformed id can never address a record, so it reads as not-found
    // rather than a validation failure.
    ObjectId::parse_str(id)
        .map_err(|_| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn create(&self, data: NewNotification) -> AppResult<Notification> {
        if data.recipient_id.trim().is_empty() {
            return Err(AppError::validation("recipientId is required"));
        }

        let mut document = NotificationDocument::from_new(data, BsonDateTime::now());
        let result = self.collection.insert_one(&document).await?;
        document.id = result.inserted_id.as_object_id();

        tracing::debug!(
            notification_id = ?document.id,
            recipient_id = %document.recipient_id,
            notification_type = %document.notification_type,
            "notification created"
        );

        Ok(document.into_notification())
    }

    async fn list_by_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let mut filter = doc! { "recipientId": recipient_id };
        if unread_only {
            filter.insert("read", false);
        }

        // Ascending _id as tiebreaker keeps equal timestamps in insertion
        // order, matching the in-memory store's stable sort.
        let documents: Vec<NotificationDocument> = self
            .collection
            .find(filter)
            .sort(doc! { "createdAt": -1, "_id": 1 })
            .await?
            .try_collect()
            .await?;

        Ok(documents
            .into_iter()
            .map(NotificationDocument::into_notification)
            .collect())
    }

    async fn mark_read(&self, id: &str) -> AppResult<Notification> {
        let oid = parse_object_id(id)?;

        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": oid, "read": false },
                doc! { "$set": { "read": true, "updatedAt": BsonDateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(document) => Ok(document.into_notification()),
            // No unread match: either already read (no-op success) or gone.
            None => self
                .collection
                .find_one(doc! { "_id": oid })
                .await?
                .map(NotificationDocument::into_notification)
                .ok_or_else(|| {
                    AppError::new(ErrorCode::NotificationNotFound, "notification not found")
                }),
        }
    }

    async fn mark_all_read(&self, recipient_id: &str) -> AppResult<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "recipientId": recipient_id, "read": false },
                doc! { "$set": { "read": true, "updatedAt": BsonDateTime::now() } },
            )
            .await?;

        tracing::debug!(
            recipient_id = %recipient_id,
            updated = result.modified_count,
            "marked all notifications read"
        );

        Ok(result.modified_count)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let oid = parse_object_id(id)?;

        let result = self.collection.delete_one(doc! { "_id": oid }).await?;
        if result.deleted_count == 0 {
            return Err(AppError::new(
                ErrorCode::NotificationNotFound,
                "notification not found",
            ));
        }

        Ok(())
    }

    async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        let count = self
            .collection
            .count_documents(doc! { "recipientId": recipient_id, "read": false })
            .await?;

        Ok(count)
    }
}
