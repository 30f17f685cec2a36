use async_trait::async_trait;
use serde_json::{json, Value};

use crate::breaker::{Breaker, BreakerState};
use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

/// Encyclopedia summary client over the Wikipedia REST API.
pub struct WikipediaClient {
    client: reqwest::Client,
    base_url: String,
}

pub struct PageSummary {
    pub title: String,
    pub extract: String,
    pub disambiguation: bool,
}

pub enum LookupError {
    /// No page exists under the queried title.
    Missing,
    /// The API answered with an unexpected status or shape.
    Api(String),
    /// The request never completed.
    Transport(String),
}

impl WikipediaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://en.wikipedia.org".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn summary(&self, query: &str) -> Result<PageSummary, LookupError> {
        let title = query.trim().replace(' ', "_");
        let url = format!("{}/api/rest_v1/page/summary/{title}?redirect=true", self.base_url);

        let resp = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 404 {
            return Err(LookupError::Missing);
        }
        if status != 200 {
            return Err(LookupError::Api(format!("summary endpoint returned {status}")));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| LookupError::Api(e.to_string()))?;

        Ok(PageSummary {
            title: parsed["title"].as_str().unwrap_or(query).to_string(),
            extract: parsed["extract"].as_str().unwrap_or("").to_string(),
            disambiguation: parsed["type"].as_str() == Some("disambiguation"),
        })
    }
}

impl Default for WikipediaClient {
    fn default() -> Self {
        Self::new()
    }
}

struct LookupTool {
    client: WikipediaClient,
    breaker: Breaker,
}

#[async_trait]
impl ToolHandler for LookupTool {
    async fn call(&self, args: &Value) -> Outcome {
        let query = args["query"]
            .as_str()
            .or_else(|| args["request"].as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty());
        let Some(query) = query else {
            return Outcome::failure(FailureKind::Validation, "a non-empty query is required");
        };

        match self.breaker.state() {
            BreakerState::Unconfigured { missing } => {
                return Outcome::failure(FailureKind::Configuration, format!("{missing} not set"));
            }
            BreakerState::Disabled { reason } => {
                return Outcome::failure(
                    FailureKind::Dependency,
                    format!("knowledge lookup disabled: {reason}"),
                );
            }
            BreakerState::Available => {}
        }

        match self.client.summary(query).await {
            Ok(page) if page.disambiguation => Outcome::failure(
                FailureKind::Validation,
                format!("query `{query}` is ambiguous, try a more specific title"),
            ),
            Ok(page) => Outcome::success(json!({
                "title": page.title,
                "summary": page.extract,
            })),
            Err(LookupError::Missing) => Outcome::failure(
                FailureKind::NotFound,
                format!("no page found for `{query}`"),
            ),
            Err(LookupError::Api(reason)) | Err(LookupError::Transport(reason)) => {
                self.breaker.trip(&reason);
                Outcome::failure(
                    FailureKind::Dependency,
                    format!("knowledge lookup failed: {reason}"),
                )
            }
        }
    }
}

pub fn provider() -> Provider {
    provider_with(WikipediaClient::new())
}

/// Build against a specific client, so tests can point at a stub server.
pub fn provider_with(client: WikipediaClient) -> Provider {
    Provider::new(
        "knowledge",
        "Provides research, reference, and knowledge support on demand.",
        "Answer questions with sourced insights and help users learn quickly.",
    )
    .with_tool(Tool::new(
        "lookup",
        "Fetch a short encyclopedia summary for a query",
        vec![
            ParamSpec::optional("query", ParamKind::String),
            ParamSpec::optional("request", ParamKind::String),
        ],
        LookupTool {
            client,
            breaker: Breaker::available("wikipedia"),
        },
    ))
}

pub fn spec() -> ProviderSpec {
    ProviderSpec::new("knowledge", || Ok(provider()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_query_is_validation_failure() {
        let provider = provider();
        let outcome = provider.invoke("lookup", &json!({"query": "  "})).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn tripped_breaker_short_circuits_without_calling_out() {
        // Point at a closed port so any real attempt would error loudly.
        let client = WikipediaClient::new().with_base_url("http://127.0.0.1:9");
        let tool = LookupTool {
            client,
            breaker: Breaker::available("wikipedia"),
        };
        tool.breaker.trip("induced");

        let outcome = tool.call(&json!({"query": "Orlando"})).await;
        match outcome {
            Outcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Dependency);
                assert!(message.contains("disabled"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_trips_the_breaker_once() {
        let client = WikipediaClient::new().with_base_url("http://127.0.0.1:9");
        let tool = LookupTool {
            client,
            breaker: Breaker::available("wikipedia"),
        };

        let first = tool.call(&json!({"query": "Orlando"})).await;
        assert_eq!(first.failure_kind(), Some(FailureKind::Dependency));
        assert!(!tool.breaker.is_available());
    }
}
