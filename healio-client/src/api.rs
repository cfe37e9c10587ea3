use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use healio_shared::types::{
    ApiCountResponse, ApiListResponse, ApiMessageResponse, ApiResponse, NewNotification,
    Notification, Role,
};

use crate::error::{ClientError, ClientResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin REST wrapper over the notification service.
///
/// Every call returns `ClientError::BackendUnavailable` on transport failure
/// and `ClientError::Api` when the server answers `success: false`; callers
/// decide what degrades and what surfaces.
pub struct NotificationApi {
    base_url: String,
    client: reqwest::Client,
}

impl NotificationApi {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /api/notifications/user/:user_id
    pub async fn list(&self, user_id: &str, unread_only: bool) -> ClientResult<Vec<Notification>> {
        let mut url = format!("{}/api/notifications/user/{user_id}", self.base_url);
        if unread_only {
            url.push_str("?unreadOnly=true");
        }
        let envelope: ApiListResponse<Notification> = self.execute(self.client.get(url)).await?;
        Ok(envelope.data)
    }

    /// POST /api/notifications
    pub async fn create(&self, data: &NewNotification) -> ClientResult<Notification> {
        let url = format!("{}/api/notifications", self.base_url);
        let envelope: ApiResponse<Notification> =
            self.execute(self.client.post(url).json(data)).await?;
        Ok(envelope.data)
    }

    /// POST /api/notifications/role - announcement to every connection of a role
    pub async fn send_to_role(
        &self,
        role: Role,
        notification_type: &str,
        title: &str,
        message: &str,
    ) -> ClientResult<String> {
        let url = format!("{}/api/notifications/role", self.base_url);
        let payload = serde_json::json!({
            "role": role,
            "type": notification_type,
            "title": title,
            "message": message,
        });
        let envelope: ApiMessageResponse = self.execute(self.client.post(url).json(&payload)).await?;
        Ok(envelope.message)
    }

    /// PATCH /api/notifications/:id/read
    pub async fn mark_read(&self, id: &str) -> ClientResult<Notification> {
        let url = format!("{}/api/notifications/{id}/read", self.base_url);
        let envelope: ApiResponse<Notification> = self.execute(self.client.patch(url)).await?;
        Ok(envelope.data)
    }

    /// PATCH /api/notifications/user/:user_id/read-all
    pub async fn mark_all_read(&self, user_id: &str) -> ClientResult<String> {
        let url = format!("{}/api/notifications/user/{user_id}/read-all", self.base_url);
        let envelope: ApiMessageResponse = self.execute(self.client.patch(url)).await?;
        Ok(envelope.message)
    }

    /// DELETE /api/notifications/:id
    pub async fn delete(&self, id: &str) -> ClientResult<String> {
        let url = format!("{}/api/notifications/{id}", self.base_url);
        let envelope: ApiMessageResponse = self.execute(self.client.delete(url)).await?;
        Ok(envelope.message)
    }

    /// GET /api/notifications/user/:user_id/unread-count
    pub async fn unread_count(&self, user_id: &str) -> ClientResult<u64> {
        let url = format!(
            "{}/api/notifications/user/{user_id}/unread-count",
            self.base_url
        );
        let envelope: ApiCountResponse = self.execute(self.client.get(url)).await?;
        Ok(envelope.count)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|error| ClientError::Api {
            status: status.as_u16(),
            message: format!("unexpected response body: {error}"),
        })
    }
}

/// Pulls the message out of `{success: false, error: {code, message}}`,
/// tolerating other shapes.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "request failed".to_string())
}
