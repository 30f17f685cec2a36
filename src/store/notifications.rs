use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::StoreError;

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A stored alert. Ids are timestamp-derived and supplied at creation;
/// the store never reuses one for a different logical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Flat JSON list of notifications, rewritten in full on every change, with
/// a per-store mutex serializing readers and writers.
pub struct NotificationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NotificationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Append a new unread notification and return it.
    pub async fn push(
        &self,
        title: &str,
        message: &str,
        priority: Priority,
    ) -> Result<Notification, StoreError> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        let notification = Notification {
            id: generate_id(),
            title: title.to_string(),
            message: message.to_string(),
            priority,
            timestamp: Utc::now(),
            read: false,
        };
        all.push(notification.clone());
        self.save(&all).await?;
        Ok(notification)
    }

    /// The most recent `limit` notifications, oldest first. With
    /// `unread_only` the filter applies before the limit.
    pub async fn list(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        if unread_only {
            all.retain(|n| !n.read);
        }
        if all.len() > limit {
            all.drain(..all.len() - limit);
        }
        Ok(all)
    }

    /// Returns `false` when no notification carries `id`.
    pub async fn mark_read(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        let Some(notification) = all.iter_mut().find(|n| n.id == id) else {
            return Ok(false);
        };
        notification.read = true;
        self.save(&all).await?;
        Ok(true)
    }

    /// Remove notifications. With `keep_unread` only read records go; the
    /// unread ones are filtered and rewritten, never truncated wholesale.
    /// Returns how many records remain.
    pub async fn clear(&self, keep_unread: bool) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let remaining = if keep_unread {
            let mut all = self.load().await?;
            all.retain(|n| !n.read);
            self.save(&all).await?;
            all.len()
        } else {
            self.save(&Vec::new()).await?;
            0
        };
        Ok(remaining)
    }

    async fn load(&self) -> Result<Vec<Notification>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, notifications: &[Notification]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(notifications)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

fn generate_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("ntf_{ts:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> NotificationStore {
        NotificationStore::new(dir.path().join("notifications.json"))
    }

    #[tokio::test]
    async fn push_assigns_unique_unread_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let a = store.push("A", "first", Priority::Normal).await.unwrap();
        let b = store.push("B", "second", Priority::High).await.unwrap();

        assert_ne!(a.id, b.id);
        assert!(!a.read && !b.read);

        let all = store.list(false, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "A");
        assert_eq!(all[1].priority, Priority::High);
    }

    #[tokio::test]
    async fn mark_read_reports_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let n = store.push("A", "msg", Priority::Normal).await.unwrap();
        assert!(store.mark_read(&n.id).await.unwrap());
        assert!(!store.mark_read("ntf_nope").await.unwrap());

        let unread = store.list(true, 10).await.unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn clear_keep_unread_filters_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let a = store.push("A", "", Priority::Normal).await.unwrap();
        let b = store.push("B", "", Priority::Normal).await.unwrap();
        let c = store.push("C", "", Priority::Normal).await.unwrap();
        store.mark_read(&b.id).await.unwrap();

        let remaining = store.clear(true).await.unwrap();
        assert_eq!(remaining, 2);

        let left = store.list(false, 10).await.unwrap();
        let ids: Vec<&str> = left.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), c.id.as_str()]);
    }

    #[tokio::test]
    async fn clear_all_empties_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.push("A", "", Priority::Normal).await.unwrap();
        assert_eq!(store.clear(false).await.unwrap(), 0);
        assert!(store.list(false, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_limits_to_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        for i in 0..5 {
            store
                .push(&format!("N{i}"), "", Priority::Normal)
                .await
                .unwrap();
        }

        let last_three = store.list(false, 3).await.unwrap();
        let titles: Vec<&str> = last_three.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["N2", "N3", "N4"]);
    }
}
