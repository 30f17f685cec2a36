use async_trait::async_trait;
use serde_json::{json, Value};

use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

struct SuggestTool;

fn suggestion_for(activity_type: &str) -> (&'static str, &'static str) {
    match activity_type {
        "break" => (
            "break",
            "Step away from your screen, do some light stretching, and take deep breaths.",
        ),
        "exercise" => ("exercise", "Consider a 10-minute walk or quick workout session."),
        "mindfulness" => (
            "mindfulness",
            "Try a 2-minute breathing exercise or brief meditation.",
        ),
        // Unknown activity types fall back to the general advice.
        _ => ("general", "Take a 5-minute break, stretch, and hydrate."),
    }
}

#[async_trait]
impl ToolHandler for SuggestTool {
    async fn call(&self, args: &Value) -> Outcome {
        let requested = args["activity_type"].as_str().unwrap_or("general");
        let (activity_type, suggestion) = suggestion_for(requested);
        Outcome::success(json!({
            "activity_type": activity_type,
            "suggestion": suggestion,
        }))
    }
}

pub fn provider() -> Provider {
    Provider::new(
        "wellness",
        "Suggests breaks and self-care activities to maintain balance.",
        "Monitor workload, recommend restorative breaks, and encourage healthy habits.",
    )
    .with_tool(Tool::new(
        "suggest",
        "A self-care recommendation for the given activity type",
        vec![ParamSpec::with_default(
            "activity_type",
            ParamKind::String,
            "general",
        )],
        SuggestTool,
    ))
}

pub fn spec() -> ProviderSpec {
    ProviderSpec::new("wellness", || Ok(provider()))
}
