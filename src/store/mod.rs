pub mod notifications;
pub mod preferences;

pub use notifications::{Notification, NotificationStore, Priority};
pub use preferences::PreferenceStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
