use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::store::{NotificationStore, Priority};
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

/// The `list` tool returns at most this many records, newest last.
const LIST_LIMIT: u64 = 10;

struct SendTool {
    store: Arc<NotificationStore>,
}

#[async_trait]
impl ToolHandler for SendTool {
    async fn call(&self, args: &Value) -> Outcome {
        let title = args["title"].as_str().unwrap_or("Concierge update");
        let message = args["message"]
            .as_str()
            .or_else(|| args["request"].as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let Some(message) = message else {
            return Outcome::failure(
                FailureKind::Validation,
                "nothing to notify: provide `message` or a request payload",
            );
        };

        let raw_priority = args["priority"].as_str().unwrap_or("normal").to_lowercase();
        let Some(priority) = Priority::parse(&raw_priority) else {
            return Outcome::failure(
                FailureKind::Validation,
                format!("unknown priority `{raw_priority}` (low, normal, high, urgent)"),
            );
        };

        match self.store.push(title, message, priority).await {
            Ok(notification) => {
                info!(%title, ?priority, "notification sent");
                Outcome::success(json!({
                    "sent": true,
                    "id": notification.id,
                    "title": notification.title,
                }))
            }
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("notification store error: {e}"),
            ),
        }
    }
}

struct ListTool {
    store: Arc<NotificationStore>,
}

#[async_trait]
impl ToolHandler for ListTool {
    async fn call(&self, args: &Value) -> Outcome {
        let unread_only = args["unread_only"].as_bool().unwrap_or(false);
        let limit = args["limit"].as_u64().unwrap_or(LIST_LIMIT) as usize;

        match self.store.list(unread_only, limit).await {
            Ok(notifications) => Outcome::success(json!({
                "count": notifications.len(),
                "notifications": notifications,
            })),
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("notification store error: {e}"),
            ),
        }
    }
}

struct MarkReadTool {
    store: Arc<NotificationStore>,
}

#[async_trait]
impl ToolHandler for MarkReadTool {
    async fn call(&self, args: &Value) -> Outcome {
        let id = args["id"].as_str().unwrap_or_default();
        match self.store.mark_read(id).await {
            Ok(true) => Outcome::success(json!({ "marked_read": id })),
            Ok(false) => Outcome::failure(
                FailureKind::NotFound,
                format!("notification `{id}` not found"),
            ),
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("notification store error: {e}"),
            ),
        }
    }
}

struct ClearTool {
    store: Arc<NotificationStore>,
}

#[async_trait]
impl ToolHandler for ClearTool {
    async fn call(&self, args: &Value) -> Outcome {
        let keep_unread = args["keep_unread"].as_bool().unwrap_or(true);
        match self.store.clear(keep_unread).await {
            Ok(remaining) => Outcome::success(json!({
                "cleared": true,
                "kept_unread": keep_unread,
                "remaining": remaining,
            })),
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("notification store error: {e}"),
            ),
        }
    }
}

struct RemindTool {
    store: Arc<NotificationStore>,
}

#[async_trait]
impl ToolHandler for RemindTool {
    async fn call(&self, args: &Value) -> Outcome {
        let title = args["title"].as_str().unwrap_or_default();
        let message = args["message"].as_str().unwrap_or_default();
        let delay_seconds = args["delay_seconds"].as_u64().unwrap_or(60);

        // The delay is served inline: the invocation suspends until the
        // reminder fires and runs to completion. Callers wanting a deadline
        // wrap the call and treat expiry as a timeout failure.
        tokio::time::sleep(Duration::from_secs(delay_seconds)).await;

        let reminder_title = format!("Reminder: {title}");
        match self.store.push(&reminder_title, message, Priority::High).await {
            Ok(notification) => {
                info!(title = %reminder_title, delay_seconds, "reminder delivered");
                Outcome::success(json!({
                    "delivered": true,
                    "id": notification.id,
                    "delay_seconds": delay_seconds,
                }))
            }
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("notification store error: {e}"),
            ),
        }
    }
}

pub fn provider(store: Arc<NotificationStore>) -> Provider {
    Provider::new(
        "notification",
        "Sends alerts, reminders, and status updates to stakeholders.",
        "Orchestrate timely notifications, manage notification history, and send updates with appropriate priority levels.",
    )
    .with_tool(Tool::new(
        "send",
        "Record and announce a notification",
        vec![
            ParamSpec::with_default("title", ParamKind::String, "Concierge update"),
            ParamSpec::optional("message", ParamKind::String),
            ParamSpec::with_default("priority", ParamKind::String, "normal"),
            ParamSpec::optional("request", ParamKind::String),
        ],
        SendTool {
            store: store.clone(),
        },
    ))
    .with_tool(Tool::new(
        "list",
        "Most recent notifications, optionally unread only",
        vec![
            ParamSpec::with_default("unread_only", ParamKind::Boolean, false),
            ParamSpec::with_default("limit", ParamKind::Integer, LIST_LIMIT),
        ],
        ListTool {
            store: store.clone(),
        },
    ))
    .with_tool(Tool::new(
        "mark_read",
        "Mark a notification as read by id",
        vec![ParamSpec::required("id", ParamKind::String)],
        MarkReadTool {
            store: store.clone(),
        },
    ))
    .with_tool(Tool::new(
        "clear",
        "Clear notifications, keeping unread ones by default",
        vec![ParamSpec::with_default("keep_unread", ParamKind::Boolean, true)],
        ClearTool {
            store: store.clone(),
        },
    ))
    .with_tool(
        // Each invocation fires exactly one reminder; retrying a reported
        // failure can deliver it twice.
        Tool::new(
            "remind",
            "Schedule a high-priority reminder after a delay",
            vec![
                ParamSpec::required("title", ParamKind::String),
                ParamSpec::required("message", ParamKind::String),
                ParamSpec::with_default("delay_seconds", ParamKind::Integer, 60),
            ],
            RemindTool { store },
        )
        .not_retry_safe(),
    )
}

pub fn spec(store: Arc<NotificationStore>) -> ProviderSpec {
    ProviderSpec::new("notification", move || Ok(provider(store)))
}
