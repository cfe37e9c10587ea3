use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use healio_shared::errors::{AppError, AppResult, ErrorCode};
use healio_shared::types::{
    ActionData, ApiCountResponse, ApiListResponse, ApiMessageResponse, ApiResponse,
    NewNotification, Notification, Priority, Role, SenderRole,
};

use crate::models::materialize_notification;
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub recipient_id: Option<String>,
    pub recipient_role: Role,
    pub sender_id: Option<String>,
    pub sender_role: Option<SenderRole>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub notification_type: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    pub icon: Option<String>,
    pub action_screen: Option<String>,
    pub action_data: Option<ActionData>,
    #[serde(default)]
    pub priority: Priority,
}

impl CreateNotificationRequest {
    fn into_new(self) -> AppResult<NewNotification> {
        let recipient_id = match self.recipient_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(AppError::new(
                    ErrorCode::ValidationError,
                    "recipientId is required",
                ))
            }
        };

        Ok(NewNotification {
            recipient_id,
            recipient_role: self.recipient_role,
            sender_id: self.sender_id,
            sender_role: self.sender_role,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            icon: self.icon,
            action_screen: self.action_screen,
            action_data: self.action_data,
            priority: self.priority,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoleNotificationRequest {
    pub role: Role,
    pub sender_id: Option<String>,
    pub sender_role: Option<SenderRole>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub notification_type: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    pub icon: Option<String>,
    pub action_screen: Option<String>,
    pub action_data: Option<ActionData>,
    #[serde(default)]
    pub priority: Priority,
}

impl RoleNotificationRequest {
    fn into_new(self) -> NewNotification {
        NewNotification {
            // A role broadcast addresses a room, not an account.
            recipient_id: String::new(),
            recipient_role: self.role,
            sender_id: self.sender_id,
            sender_role: self.sender_role,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            icon: self.icon,
            action_screen: self.action_screen,
            action_data: self.action_data,
            priority: self.priority,
        }
    }
}

// --- Handlers ---

/// GET /api/notifications/user/:user_id - newest first; ?unreadOnly=true filters to unread
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiListResponse<Notification>>> {
    let notifications = state
        .store
        .list_by_recipient(&user_id, query.unread_only)
        .await?;
    Ok(Json(ApiListResponse::ok(notifications)))
}

/// POST /api/notifications - persist and push to the recipient's room
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNotificationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Notification>>)> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let notification = state.store.create(req.into_new()?).await?;

    let delivered = state
        .hub
        .emit_to_user(&notification.recipient_id, notification.clone());
    tracing::info!(
        notification_id = %notification.id,
        recipient_id = %notification.recipient_id,
        delivered,
        "notification created"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(notification))))
}

/// POST /api/notifications/role - broadcast to everyone joined as a role
///
/// Nothing is persisted: the emitted record carries a fresh id and timestamps
/// but exists only on the wire.
pub async fn send_role_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RoleNotificationRequest>,
) -> AppResult<(StatusCode, Json<ApiMessageResponse>)> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let role = req.role;
    let notification = materialize_notification(req.into_new());
    let delivered = state.hub.emit_to_role(role, notification);
    tracing::info!(role = %role, delivered, "role notification broadcast");

    Ok((
        StatusCode::CREATED,
        Json(ApiMessageResponse::ok(format!(
            "Notification sent to all {role}s"
        ))),
    ))
}

/// PATCH /api/notifications/:id/read - idempotent read transition
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = state.store.mark_read(&id).await?;
    Ok(Json(ApiResponse::ok(notification)))
}

/// PATCH /api/notifications/user/:user_id/read-all
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiMessageResponse>> {
    let updated = state.store.mark_all_read(&user_id).await?;
    tracing::info!(user_id = %user_id, updated, "marked all notifications read");
    Ok(Json(ApiMessageResponse::ok(
        "All notifications marked as read",
    )))
}

/// DELETE /api/notifications/:id - permanent, no tombstone
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiMessageResponse>> {
    state.store.delete(&id).await?;
    Ok(Json(ApiMessageResponse::ok("Notification deleted")))
}

/// GET /api/notifications/user/:user_id/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiCountResponse>> {
    let count = state.store.count_unread(&user_id).await?;
    Ok(Json(ApiCountResponse::ok(count)))
}
