use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::Mutex;

use super::StoreError;

type PrefMap = BTreeMap<String, BTreeMap<String, String>>;

/// Flat JSON store of user preferences, keyed by `(user_id, key)`. The whole
/// collection is read into memory, mutated, and rewritten on each change;
/// the per-store mutex serializes concurrent tool invocations so a parallel
/// stage cannot lose an update.
pub struct PreferenceStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut prefs = self.load().await?;
        prefs
            .entry(user_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.save(&prefs).await
    }

    /// `None` when the key was never set for this user; callers surface
    /// that as a "no value" sentinel, not an error.
    pub async fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let prefs = self.load().await?;
        Ok(prefs.get(user_id).and_then(|m| m.get(key)).cloned())
    }

    async fn load(&self) -> Result<PrefMap, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PrefMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, prefs: &PrefMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
