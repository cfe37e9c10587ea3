use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use healio_shared::errors::{AppError, AppResult, ErrorCode};
use healio_shared::types::{NewNotification, Notification};

use crate::models::materialize_notification;
use crate::services::store::NotificationStore;

/// In-memory store backing tests and backend-free development runs.
///
/// A single write lock around each mutation gives the same atomicity the
/// Mongo store gets from `update_many`: a concurrent count never observes a
/// half-applied `mark_all_read`.
pub struct MemoryNotificationStore {
    records: RwLock<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, data: NewNotification) -> AppResult<Notification> {
        if data.recipient_id.trim().is_empty() {
            return Err(AppError::validation("recipientId is required"));
        }

        let notification = materialize_notification(data);
        self.records.write().await.push(notification.clone());

        tracing::debug!(
            notification_id = %notification.id,
            recipient_id = %notification.recipient_id,
            notification_type = %notification.notification_type,
            "notification created"
        );

        Ok(notification)
    }

    async fn list_by_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let records = self.records.read().await;
        let mut matched: Vec<Notification> = records
            .iter()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        drop(records);

        // Stable sort: equal timestamps keep insertion order.
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn mark_read(&self, id: &str) -> AppResult<Notification> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))?;

        if !record.read {
            record.read = true;
            record.updated_at = Utc::now();
        }

        Ok(record.clone())
    }

    async fn mark_all_read(&self, recipient_id: &str) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let mut updated = 0;

        for record in records
            .iter_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
        {
            record.read = true;
            record.updated_at = now;
            updated += 1;
        }

        Ok(updated)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut records = self.records.write().await;
        let position = records
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))?;

        records.remove(position);
        Ok(())
    }

    async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use healio_shared::types::{Priority, Role, DEFAULT_ICON};

    fn new_for(recipient: &str) -> NewNotification {
        NewNotification::new(
            recipient,
            Role::Doctor,
            "appointment_request",
            "New Appointment Request",
            "Alice has requested an appointment",
        )
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, hour, minute, 0).unwrap()
    }

    /// Fully-controlled record for ordering tests.
    fn seeded(id: &str, recipient: &str, read: bool, created_at: DateTime<Utc>) -> Notification {
        let mut n = materialize_notification(new_for(recipient));
        n.id = id.to_string();
        n.read = read;
        n.created_at = created_at;
        n.updated_at = created_at;
        n
    }

    async fn seed(store: &MemoryNotificationStore, records: Vec<Notification>) {
        store.records.write().await.extend(records);
    }

    // ----------------------------------------------------------------------
    // create
    // ----------------------------------------------------------------------

    #[tokio::test]
    async fn create_then_list_includes_exactly_the_record() {
        let store = MemoryNotificationStore::new();

        let created = store.create(new_for("doc-1")).await.unwrap();
        assert!(!created.read);
        assert_eq!(created.icon, DEFAULT_ICON);
        assert_eq!(created.priority, Priority::Normal);
        assert_eq!(created.created_at, created.updated_at);

        let listed = store.list_by_recipient("doc-1", false).await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn create_rejects_blank_recipient() {
        let store = MemoryNotificationStore::new();

        for recipient in ["", "   "] {
            let err = store.create(new_for(recipient)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    // ----------------------------------------------------------------------
    // listing and counting
    // ----------------------------------------------------------------------

    #[tokio::test]
    async fn listing_is_newest_first_and_filters_unread() {
        let store = MemoryNotificationStore::new();
        seed(
            &store,
            vec![
                seeded("n1", "doc-1", true, at(9, 0)),
                seeded("n2", "doc-1", false, at(10, 0)),
                seeded("n3", "doc-1", false, at(11, 0)),
                seeded("other", "doc-2", false, at(12, 0)),
            ],
        )
        .await;

        let all = store.list_by_recipient("doc-1", false).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n3", "n2", "n1"]);

        let unread = store.list_by_recipient("doc-1", true).await.unwrap();
        let ids: Vec<&str> = unread.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n3", "n2"]);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let store = MemoryNotificationStore::new();
        seed(
            &store,
            vec![
                seeded("first", "doc-1", false, at(10, 0)),
                seeded("second", "doc-1", false, at(10, 0)),
            ],
        )
        .await;

        let listed = store.list_by_recipient("doc-1", false).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
    }

    #[tokio::test]
    async fn listing_unknown_recipient_is_empty_not_an_error() {
        let store = MemoryNotificationStore::new();
        assert!(store.list_by_recipient("nobody", false).await.unwrap().is_empty());
        assert_eq!(store.count_unread("nobody").await.unwrap(), 0);
    }

    // ----------------------------------------------------------------------
    // read transitions
    // ----------------------------------------------------------------------

    #[tokio::test]
    async fn mark_read_is_an_idempotent_no_op_when_already_read() {
        let store = MemoryNotificationStore::new();
        let created = store.create(new_for("doc-1")).await.unwrap();

        let first = store.mark_read(&created.id).await.unwrap();
        assert!(first.read);

        let second = store.mark_read(&created.id).await.unwrap();
        assert_eq!(second, first); // unchanged, updatedAt not bumped again

        assert_eq!(store.count_unread("doc-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_unknown_id_is_not_found() {
        let store = MemoryNotificationStore::new();
        let err = store.mark_read("missing").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Known { code: ErrorCode::NotificationNotFound, .. }
        ));
    }

    #[tokio::test]
    async fn mark_all_read_clears_the_unread_set_and_reports_count() {
        let store = MemoryNotificationStore::new();
        seed(
            &store,
            vec![
                seeded("n1", "doc-1", true, at(9, 0)),
                seeded("n2", "doc-1", false, at(10, 0)),
                seeded("n3", "doc-1", false, at(11, 0)),
                seeded("other", "doc-2", false, at(12, 0)),
            ],
        )
        .await;

        assert_eq!(store.mark_all_read("doc-1").await.unwrap(), 2);
        assert_eq!(store.count_unread("doc-1").await.unwrap(), 0);

        // Other recipients are untouched.
        assert_eq!(store.count_unread("doc-2").await.unwrap(), 1);

        // Re-running affects nothing further.
        assert_eq!(store.mark_all_read("doc-1").await.unwrap(), 0);
    }

    // ----------------------------------------------------------------------
    // delete
    // ----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_is_permanent() {
        let store = MemoryNotificationStore::new();
        let created = store.create(new_for("doc-1")).await.unwrap();

        store.delete(&created.id).await.unwrap();
        assert!(store.list_by_recipient("doc-1", false).await.unwrap().is_empty());

        let err = store.delete(&created.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Known { code: ErrorCode::NotificationNotFound, .. }
        ));
    }
}
