use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FailureKind;
use crate::provider::ProviderManifest;
use crate::registry::Registry;
use crate::tool::Outcome;

/// One instruction from the planner: which provider, which tool, which args.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub provider: String,
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner could not route request: {0}")]
    Routing(String),
}

/// The reasoning component that decides which tools to call for a request.
/// It lives outside the core; the core only hands it the provider manifests
/// and executes whatever ordered call list comes back.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn choose(
        &self,
        request: &str,
        manifests: &[ProviderManifest],
    ) -> Result<Vec<ToolCall>, PlannerError>;
}

/// Execute an ordered call list against the registry. Fail-soft: a call
/// naming an unknown provider or tool becomes a `NotFound` entry in the
/// results, and one call's failure never stops the ones after it.
pub async fn dispatch(registry: &Registry, calls: &[ToolCall]) -> Vec<(ToolCall, Outcome)> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        debug!(provider = %call.provider, tool = %call.tool, "dispatching planned call");
        let outcome = match registry.get(&call.provider) {
            Some(provider) => provider.invoke(&call.tool, &call.args).await,
            None => Outcome::failure(
                FailureKind::NotFound,
                format!("no provider named `{}` is available", call.provider),
            ),
        };
        results.push((call.clone(), outcome));
    }
    results
}

/// Deterministic term-matching planner used by the demo binary and tests.
/// Scores each provider by how many request words appear in its name,
/// description, and tool descriptions, then emits the best match's entry
/// tool with the request as its argument. Real deployments substitute an
/// LLM-backed implementation behind the same trait.
pub struct KeywordPlanner;

#[async_trait]
impl Planner for KeywordPlanner {
    async fn choose(
        &self,
        request: &str,
        manifests: &[ProviderManifest],
    ) -> Result<Vec<ToolCall>, PlannerError> {
        let request_lower = request.to_lowercase();
        let terms: Vec<&str> = request_lower.split_whitespace().collect();

        let mut best: Option<(usize, &ProviderManifest)> = None;
        for manifest in manifests {
            let mut haystack = format!("{} {}", manifest.name, manifest.description);
            for tool in &manifest.tools {
                if let Some(desc) = tool["description"].as_str() {
                    haystack.push(' ');
                    haystack.push_str(desc);
                }
            }
            let haystack = haystack.to_lowercase();
            let score = terms.iter().filter(|t| haystack.contains(**t)).count();
            if score > 0 && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, manifest));
            }
        }

        let Some((_, manifest)) = best else {
            return Err(PlannerError::Routing(format!(
                "no provider matched request `{request}`"
            )));
        };

        let tool = manifest.tools.first().and_then(|t| t["name"].as_str()).ok_or_else(|| {
            PlannerError::Routing(format!("provider `{}` exposes no tools", manifest.name))
        })?;

        Ok(vec![ToolCall {
            provider: manifest.name.clone(),
            tool: tool.to_string(),
            args: serde_json::json!({ "request": request }),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::registry::{ProviderSpec, Registry};
    use crate::tool::{Outcome, Tool, ToolHandler};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, args: &Value) -> Outcome {
            Outcome::success(args.clone())
        }
    }

    fn registry() -> Registry {
        let (registry, errors) = Registry::load(vec![
            ProviderSpec::new("weather", || {
                Ok(Provider::new("weather", "Forecasts rain and sunshine", "")
                    .with_tool(Tool::new("forecast", "Predict tomorrow's weather", vec![], Echo)))
            }),
            ProviderSpec::new("music", || {
                Ok(Provider::new("music", "Queues songs and playlists", "")
                    .with_tool(Tool::new("play", "Play a song", vec![], Echo)))
            }),
        ]);
        assert!(errors.is_empty());
        registry
    }

    #[tokio::test]
    async fn keyword_planner_routes_to_best_match() {
        let registry = registry();
        let calls = KeywordPlanner
            .choose("will it rain tomorrow", &registry.manifests())
            .await
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].provider, "weather");
        assert_eq!(calls[0].tool, "forecast");
    }

    #[tokio::test]
    async fn keyword_planner_rejects_unroutable_requests() {
        let registry = registry();
        let err = KeywordPlanner
            .choose("zzzz qqqq", &registry.manifests())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Routing(_)));
    }

    #[tokio::test]
    async fn dispatch_is_fail_soft_and_ordered() {
        let registry = registry();
        let calls = vec![
            ToolCall {
                provider: "music".into(),
                tool: "play".into(),
                args: json!({}),
            },
            ToolCall {
                provider: "ghost".into(),
                tool: "anything".into(),
                args: json!({}),
            },
            ToolCall {
                provider: "weather".into(),
                tool: "wrong_tool".into(),
                args: json!({}),
            },
        ];

        let results = dispatch(&registry, &calls).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_success());
        assert_eq!(
            results[1].1.failure_kind(),
            Some(crate::error::FailureKind::NotFound)
        );
        assert_eq!(
            results[2].1.failure_kind(),
            Some(crate::error::FailureKind::NotFound)
        );
    }
}
