//! Local mirror of who is online, fed by `user_status` broadcasts.
//!
//! Presence is display state only: best effort, reset whenever the server
//! restarts, never an input to authorization decisions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use healio_shared::types::Role;

/// A directory entry for the admin user list, with presence merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

/// Tracks the online set and merges it into a locally cached user list.
///
/// The online set works without the user list: fetching the full directory
/// is an admin-only call, so non-admin sessions record presence standalone
/// and the directory cache simply stays empty.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    /// User ID → when the last online broadcast arrived.
    online: DashMap<String, DateTime<Utc>>,
    /// User ID → cached directory entry.
    users: DashMap<String, UserSummary>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user as online. Idempotent; refreshes the seen timestamp.
    pub fn mark_online(&self, user_id: &str) {
        let now = Utc::now();
        self.online.insert(user_id.to_string(), now);
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.online = true;
            entry.last_active = Some(now);
        }
    }

    /// Record a user as offline. Idempotent.
    pub fn mark_offline(&self, user_id: &str) {
        self.online.remove(user_id);
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.online = false;
            entry.last_active = Some(Utc::now());
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains_key(user_id)
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// The current online set, unordered.
    pub fn online_users(&self) -> Vec<String> {
        self.online.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Replace the cached directory and stamp each entry with the current
    /// online set. Called after an admin fetches the user list.
    pub fn set_users(&self, users: Vec<UserSummary>) {
        self.users.clear();
        for mut user in users {
            user.online = self.online.contains_key(&user.id);
            self.users.insert(user.id.clone(), user);
        }
    }

    /// The cached directory with presence merged in, sorted by name.
    pub fn users(&self) -> Vec<UserSummary> {
        let mut users: Vec<UserSummary> =
            self.users.iter().map(|entry| entry.value().clone()).collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    /// Drop everything; called on logout.
    pub fn clear(&self) {
        self.online.clear();
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, name: &str, role: Role) -> UserSummary {
        UserSummary {
            id: id.to_string(),
            name: name.to_string(),
            role,
            online: false,
            last_active: None,
        }
    }

    #[test]
    fn online_then_offline_leaves_the_user_absent() {
        let tracker = PresenceTracker::new();

        tracker.mark_online("doc-1");
        assert!(tracker.is_online("doc-1"));
        assert_eq!(tracker.online_count(), 1);

        tracker.mark_offline("doc-1");
        assert!(!tracker.is_online("doc-1"));
        assert!(tracker.online_users().is_empty());
    }

    #[test]
    fn mark_online_is_idempotent() {
        let tracker = PresenceTracker::new();

        tracker.mark_online("doc-1");
        tracker.mark_online("doc-1");
        assert_eq!(tracker.online_count(), 1);

        tracker.mark_offline("doc-1");
        tracker.mark_offline("doc-1");
        assert_eq!(tracker.online_count(), 0);
    }

    #[test]
    fn presence_works_without_a_user_list() {
        let tracker = PresenceTracker::new();

        // Non-admin sessions never load the directory.
        tracker.mark_online("pat-7");
        assert!(tracker.is_online("pat-7"));
        assert!(tracker.users().is_empty());
    }

    #[test]
    fn set_users_applies_the_current_online_set() {
        let tracker = PresenceTracker::new();
        tracker.mark_online("doc-1");

        tracker.set_users(vec![
            summary("doc-1", "Greg House", Role::Doctor),
            summary("pat-2", "Alice Park", Role::Patient),
        ]);

        let users = tracker.users();
        assert_eq!(users.len(), 2);
        // Sorted by name: Alice first.
        assert_eq!(users[0].id, "pat-2");
        assert!(!users[0].online);
        assert_eq!(users[1].id, "doc-1");
        assert!(users[1].online);
    }

    #[test]
    fn status_changes_flip_the_cached_entry() {
        let tracker = PresenceTracker::new();
        tracker.set_users(vec![summary("lab-3", "City Lab", Role::Lab)]);

        tracker.mark_online("lab-3");
        assert!(tracker.users()[0].online);
        assert!(tracker.users()[0].last_active.is_some());

        tracker.mark_offline("lab-3");
        assert!(!tracker.users()[0].online);
    }

    #[test]
    fn clear_drops_both_maps() {
        let tracker = PresenceTracker::new();
        tracker.mark_online("doc-1");
        tracker.set_users(vec![summary("doc-1", "Greg House", Role::Doctor)]);

        tracker.clear();
        assert_eq!(tracker.online_count(), 0);
        assert!(tracker.users().is_empty());
    }
}
