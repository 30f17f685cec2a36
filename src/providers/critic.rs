use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

/// How much of the reviewed plan is echoed back in the verdict.
const EXCERPT_LEN: usize = 50;

struct ReviewTool;

#[async_trait]
impl ToolHandler for ReviewTool {
    async fn call(&self, args: &Value) -> Outcome {
        // Review an explicit plan when given one, otherwise whatever the
        // workflow accumulated so far.
        let plan = args["plan"]
            .as_str()
            .map(str::to_string)
            .or_else(|| {
                args["context"]
                    .as_object()
                    .filter(|ctx| !ctx.is_empty())
                    .map(|ctx| Value::Object(ctx.clone()).to_string())
            })
            .or_else(|| args["request"].as_str().map(str::to_string))
            .filter(|p| !p.trim().is_empty());

        let Some(plan) = plan else {
            return Outcome::failure(FailureKind::Validation, "nothing to review");
        };

        // TODO: cross-check itinerary times for overlaps once a calendar
        // provider exists to supply the schedule.
        let excerpt: String = plan.chars().take(EXCERPT_LEN).collect();
        Outcome::success(json!({
            "verdict": "no critical issues detected",
            "reviewed": excerpt,
        }))
    }
}

pub fn provider() -> Provider {
    Provider::new(
        "critic",
        "Validates plans and searches for conflicts or missing dependencies.",
        "Stress test itineraries, highlight risks, and recommend fixes before execution.",
    )
    .with_tool(Tool::new(
        "review",
        "Validate a plan for conflicts or issues",
        vec![
            ParamSpec::optional("plan", ParamKind::String),
            ParamSpec::optional("context", ParamKind::Object),
            ParamSpec::optional("request", ParamKind::String),
        ],
        ReviewTool,
    ))
}

pub fn spec() -> ProviderSpec {
    ProviderSpec::new("critic", || Ok(provider()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reviews_an_explicit_plan() {
        let provider = provider();
        let outcome = provider
            .invoke("review", &json!({"plan": "Fly MCO to DXB, then drive to the hotel"}))
            .await;
        let value = outcome.value().unwrap();
        assert_eq!(value["verdict"], "no critical issues detected");
        assert!(value["reviewed"].as_str().unwrap().starts_with("Fly MCO"));
    }

    #[tokio::test]
    async fn falls_back_to_accumulated_context() {
        let provider = provider();
        let outcome = provider
            .invoke(
                "review",
                &json!({"context": {"flight": {"status": "success"}}}),
            )
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn nothing_to_review_is_validation_failure() {
        let provider = provider();
        let outcome = provider.invoke("review", &json!({"context": {}})).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    }
}
