use async_trait::async_trait;

use healio_shared::errors::AppResult;
use healio_shared::types::{NewNotification, Notification};

/// Persistence operations over the notification collection.
///
/// Listing and counting treat a backing collection that does not exist yet
/// as an empty result, never an error: the collection is created lazily on
/// first write and a fresh deployment must serve reads cleanly.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a notification with server-assigned id and timestamps.
    /// Fails with a validation error when the recipient id is blank.
    async fn create(&self, data: NewNotification) -> AppResult<Notification>;

    /// A recipient's notifications, `createdAt` descending; ties keep
    /// insertion order. `unread_only` restricts to `read == false`.
    async fn list_by_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>>;

    /// Set `read = true` and bump `updatedAt`. Already-read ids are a no-op
    /// success returning the unchanged record; unknown ids are not found.
    async fn mark_read(&self, id: &str) -> AppResult<Notification>;

    /// Mark every unread notification of a recipient read in one atomic
    /// batch. Returns the number of records affected.
    async fn mark_all_read(&self, recipient_id: &str) -> AppResult<u64>;

    /// Permanently remove a notification. There is no soft delete.
    async fn delete(&self, id: &str) -> AppResult<()>;

    /// Number of unread notifications for a recipient.
    async fn count_unread(&self, recipient_id: &str) -> AppResult<u64>;
}
