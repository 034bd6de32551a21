//! Fire-and-forget operator notifications (SPEC_FULL.md §4.6). A failure to
//! deliver a notification is logged and never fails the task it concerns.

use serde::Serialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct Notification<'a> {
    pub task_id: i64,
    pub event: &'a str,
    pub detail: &'a str,
}

pub async fn send(client: &reqwest::Client, url: &str, token: &str, notification: &Notification<'_>) {
    if url.is_empty() {
        return;
    }

    let mut request = client.post(url).timeout(Duration::from_secs(10)).json(notification);
    if !token.is_empty() {
        request = request.bearer_auth(token);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => {
            warn!(task_id = notification.task_id, status = %response.status(), "notification endpoint rejected request");
        }
        Err(e) => {
            warn!(task_id = notification.task_id, error = %e, "failed to deliver notification");
        }
    }
}
