use healio_shared::errors::AppResult;
use healio_shared::types::{NewNotification, Notification, Priority, Role, SenderRole};

use crate::services::store::NotificationStore;
use crate::socket::RealtimeHub;

/// Persists and delivers the doctor-facing notification for an appointment
/// event raised by a patient.
pub async fn appointment_notification(
    store: &dyn NotificationStore,
    hub: &RealtimeHub,
    doctor_id: &str,
    patient_id: &str,
    patient_name: &str,
    notification_type: &str,
) -> AppResult<Notification> {
    let (title, verb) = if notification_type == "appointment_request" {
        ("New Appointment Request", "requested")
    } else {
        ("Appointment Update", "updated")
    };

    let data = NewNotification::new(
        doctor_id,
        Role::Doctor,
        notification_type,
        title,
        format!("{patient_name} has {verb} an appointment"),
    )
    .with_sender(patient_id, SenderRole::Patient)
    .with_icon("📅")
    .with_action("PatientRequests", None)
    .with_priority(Priority::High);

    let notification = store.create(data).await?;
    hub.emit_to_user(doctor_id, notification.clone());
    Ok(notification)
}

/// Persists and delivers the lab-facing notification for a test booked by a
/// patient.
pub async fn lab_test_notification(
    store: &dyn NotificationStore,
    hub: &RealtimeHub,
    lab_id: &str,
    patient_id: &str,
    patient_name: &str,
    test_name: &str,
) -> AppResult<Notification> {
    let data = NewNotification::new(
        lab_id,
        Role::Lab,
        "test_booking",
        "New Test Booking",
        format!("{patient_name} has booked {test_name}"),
    )
    .with_sender(patient_id, SenderRole::Patient)
    .with_icon("🧪")
    .with_action("BookedTests", None)
    .with_priority(Priority::High);

    let notification = store.create(data).await?;
    hub.emit_to_user(lab_id, notification.clone());
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use healio_shared::types::ServerEvent;

    use crate::services::memory::MemoryNotificationStore;
    use crate::socket::user_room;

    #[tokio::test]
    async fn appointment_request_is_persisted_and_delivered() {
        let store = MemoryNotificationStore::new();
        let hub = RealtimeHub::new();
        let (socket, mut rx) = hub.register();
        hub.join(socket, user_room("doc-1"));

        let created = appointment_notification(
            &store,
            &hub,
            "doc-1",
            "pat-3",
            "Alice",
            "appointment_request",
        )
        .await
        .unwrap();

        assert_eq!(created.title, "New Appointment Request");
        assert_eq!(created.message, "Alice has requested an appointment");
        assert_eq!(created.icon, "📅");
        assert_eq!(created.priority, Priority::High);
        assert_eq!(created.sender_id.as_deref(), Some("pat-3"));
        assert_eq!(created.sender_role, Some(SenderRole::Patient));
        assert_eq!(created.action_screen.as_deref(), Some("PatientRequests"));

        let listed = store.list_by_recipient("doc-1", true).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        match rx.try_recv() {
            Ok(ServerEvent::Notification(delivered)) => assert_eq!(delivered, created),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn appointment_update_changes_title_and_verb() {
        let store = MemoryNotificationStore::new();
        let hub = RealtimeHub::new();

        let created = appointment_notification(
            &store,
            &hub,
            "doc-1",
            "pat-3",
            "Alice",
            "appointment_confirmed",
        )
        .await
        .unwrap();

        assert_eq!(created.notification_type, "appointment_confirmed");
        assert_eq!(created.title, "Appointment Update");
        assert_eq!(created.message, "Alice has updated an appointment");
    }

    #[tokio::test]
    async fn lab_test_booking_targets_the_lab() {
        let store = MemoryNotificationStore::new();
        let hub = RealtimeHub::new();

        let created = lab_test_notification(&store, &hub, "lab-7", "pat-3", "Bob", "Blood Panel")
            .await
            .unwrap();

        assert_eq!(created.recipient_id, "lab-7");
        assert_eq!(created.recipient_role, Role::Lab);
        assert_eq!(created.notification_type, "test_booking");
        assert_eq!(created.title, "New Test Booking");
        assert_eq!(created.message, "Bob has booked Blood Panel");
        assert_eq!(created.icon, "🧪");
        assert_eq!(created.action_screen.as_deref(), Some("BookedTests"));
    }
}
