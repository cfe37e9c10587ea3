//! Local notification state: the list the UI renders and its unread badge.
//!
//! Backend failures are swallowed here and converted into empty/zero state.
//! The app stays usable without connectivity; it never blocks or surfaces a
//! transport error from this layer.

use std::sync::Arc;

use tokio::sync::RwLock;

use healio_shared::types::Notification;

use crate::api::NotificationApi;

#[derive(Debug, Default)]
struct FeedState {
    notifications: Vec<Notification>,
    unread_count: u64,
}

impl FeedState {
    fn recompute_unread(&mut self) {
        self.unread_count = self.notifications.iter().filter(|n| !n.read).count() as u64;
    }
}

/// The signed-in user's notification list, kept newest first.
///
/// Fed from two sides: REST loads (login, pull-to-refresh) and realtime
/// pushes via [`NotificationFeed::apply_push`].
pub struct NotificationFeed {
    api: Arc<NotificationApi>,
    state: RwLock<FeedState>,
}

impl NotificationFeed {
    pub fn new(api: Arc<NotificationApi>) -> Self {
        Self {
            api,
            state: RwLock::new(FeedState::default()),
        }
    }

    /// Fetch the full list for `user_id`. On failure the feed is emptied
    /// rather than left stale or erroring.
    pub async fn load(&self, user_id: &str) {
        let mut state = self.state.write().await;
        match self.api.list(user_id, false).await {
            Ok(notifications) => {
                state.notifications = notifications;
                state.recompute_unread();
            }
            Err(error) => {
                tracing::debug!(user_id, error = %error, "notification load failed, showing empty list");
                *state = FeedState::default();
            }
        }
    }

    /// Re-sync the unread badge from the server. A failed fetch keeps the
    /// previous count; the badge is not critical enough to zero out.
    pub async fn refresh_unread_count(&self, user_id: &str) {
        match self.api.unread_count(user_id).await {
            Ok(count) => self.state.write().await.unread_count = count,
            Err(error) => {
                tracing::debug!(user_id, error = %error, "unread count fetch failed, keeping previous");
            }
        }
    }

    /// Insert a realtime push at the top of the list.
    pub async fn apply_push(&self, notification: Notification) {
        let mut state = self.state.write().await;
        state.notifications.insert(0, notification);
        state.recompute_unread();
    }

    /// Mark one notification read, server first. Local state only changes
    /// once the server confirms.
    pub async fn mark_as_read(&self, id: &str) {
        match self.api.mark_read(id).await {
            Ok(updated) => {
                let mut state = self.state.write().await;
                if let Some(entry) = state.notifications.iter_mut().find(|n| n.id == updated.id) {
                    *entry = updated;
                }
                state.recompute_unread();
            }
            Err(error) => tracing::debug!(id, error = %error, "mark read failed, keeping local state"),
        }
    }

    /// Mark everything read for `user_id`, server first.
    pub async fn mark_all_as_read(&self, user_id: &str) {
        match self.api.mark_all_read(user_id).await {
            Ok(_) => {
                let mut state = self.state.write().await;
                for notification in &mut state.notifications {
                    notification.read = true;
                }
                state.unread_count = 0;
            }
            Err(error) => {
                tracing::debug!(user_id, error = %error, "mark all read failed, keeping local state");
            }
        }
    }

    /// Delete one notification, server first.
    pub async fn delete(&self, id: &str) {
        match self.api.delete(id).await {
            Ok(_) => {
                let mut state = self.state.write().await;
                state.notifications.retain(|n| n.id != id);
                state.recompute_unread();
            }
            Err(error) => tracing::debug!(id, error = %error, "delete failed, keeping local state"),
        }
    }

    /// Drop all local state; called on logout.
    pub async fn clear(&self) {
        *self.state.write().await = FeedState::default();
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn unread_count(&self) -> u64 {
        self.state.read().await.unread_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use healio_shared::types::{Priority, Role};

    // Nothing listens on port 9; every call fails fast with a transport error.
    fn dead_feed() -> NotificationFeed {
        let api = NotificationApi::new("http://127.0.0.1:9").unwrap();
        NotificationFeed::new(Arc::new(api))
    }

    fn pushed(id: &str, read: bool) -> Notification {
        let now = Utc::now();
        Notification {
            id: id.to_string(),
            recipient_id: "doc-1".to_string(),
            recipient_role: Role::Doctor,
            sender_id: None,
            sender_role: None,
            notification_type: "appointment_request".to_string(),
            title: "New Appointment Request".to_string(),
            message: "Bob has requested an appointment".to_string(),
            icon: "📅".to_string(),
            read,
            action_screen: None,
            action_data: None,
            priority: Priority::High,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn pushes_land_on_top_and_bump_the_badge() {
        let feed = dead_feed();

        feed.apply_push(pushed("n1", false)).await;
        feed.apply_push(pushed("n2", false)).await;
        feed.apply_push(pushed("n3", true)).await;

        let ids: Vec<String> = feed.notifications().await.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, ["n3", "n2", "n1"]);
        assert_eq!(feed.unread_count().await, 2);
    }

    #[tokio::test]
    async fn load_against_a_dead_backend_yields_an_empty_feed() {
        let feed = dead_feed();
        feed.apply_push(pushed("stale", false)).await;

        feed.load("doc-1").await;

        assert!(feed.notifications().await.is_empty());
        assert_eq!(feed.unread_count().await, 0);
    }

    #[tokio::test]
    async fn unread_refresh_against_a_dead_backend_keeps_the_count() {
        let feed = dead_feed();
        feed.apply_push(pushed("n1", false)).await;
        assert_eq!(feed.unread_count().await, 1);

        feed.refresh_unread_count("doc-1").await;
        assert_eq!(feed.unread_count().await, 1);
    }

    #[tokio::test]
    async fn failed_mutations_leave_local_state_untouched() {
        let feed = dead_feed();
        feed.apply_push(pushed("n1", false)).await;

        feed.mark_as_read("n1").await;
        feed.mark_all_as_read("doc-1").await;
        feed.delete("n1").await;

        let notifications = feed.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert!(!notifications[0].read);
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let feed = dead_feed();
        feed.apply_push(pushed("n1", false)).await;

        feed.clear().await;

        assert!(feed.notifications().await.is_empty());
        assert_eq!(feed.unread_count().await, 0);
    }
}
