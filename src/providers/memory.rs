use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::store::PreferenceStore;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

struct StoreTool {
    store: Arc<PreferenceStore>,
}

#[async_trait]
impl ToolHandler for StoreTool {
    async fn call(&self, args: &Value) -> Outcome {
        let user_id = args["user_id"].as_str().unwrap_or_default();
        let key = args["key"].as_str().unwrap_or_default();
        let value = args["value"].as_str().unwrap_or_default();

        match self.store.set(user_id, key, value).await {
            Ok(()) => Outcome::success(json!({
                "stored": true,
                "user_id": user_id,
                "key": key,
            })),
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("preference store error: {e}"),
            ),
        }
    }
}

struct RecallTool {
    store: Arc<PreferenceStore>,
}

#[async_trait]
impl ToolHandler for RecallTool {
    async fn call(&self, args: &Value) -> Outcome {
        let user_id = args["user_id"].as_str().unwrap_or_default();
        let key = args["key"].as_str().unwrap_or_default();

        match self.store.get(user_id, key).await {
            // An unset key is a successful "no value" answer, not an error.
            Ok(value) => Outcome::success(json!({
                "found": value.is_some(),
                "value": value,
            })),
            Err(e) => Outcome::failure(
                FailureKind::Dependency,
                format!("preference store error: {e}"),
            ),
        }
    }
}

pub fn provider(store: Arc<PreferenceStore>) -> Provider {
    Provider::new(
        "memory",
        "Stores user preferences, history, and orchestrator context.",
        "Capture relevant facts, surface context on demand, and keep data consistent.",
    )
    .with_tool(Tool::new(
        "store",
        "Persist a user preference or piece of context",
        vec![
            ParamSpec::required("user_id", ParamKind::String),
            ParamSpec::required("key", ParamKind::String),
            ParamSpec::required("value", ParamKind::String),
        ],
        StoreTool {
            store: store.clone(),
        },
    ))
    .with_tool(Tool::new(
        "recall",
        "Retrieve a stored user preference or piece of context",
        vec![
            ParamSpec::required("user_id", ParamKind::String),
            ParamSpec::required("key", ParamKind::String),
        ],
        RecallTool { store },
    ))
}

pub fn spec(store: Arc<PreferenceStore>) -> ProviderSpec {
    ProviderSpec::new("memory", move || Ok(provider(store)))
}
