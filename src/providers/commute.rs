use async_trait::async_trait;
use serde_json::{json, Value};

use crate::breaker::{Breaker, BreakerState};
use crate::config::MapsConfig;
use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

use super::parse_route;

/// Driving distance/duration client over the Distance Matrix API.
pub struct DistanceMatrixClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

pub struct RouteEstimate {
    pub distance: String,
    pub duration: String,
}

pub enum CommuteError {
    /// The API rejected the whole request.
    Api(String),
    /// The route itself could not be resolved (unknown place, no roads).
    Route(String),
    /// The request never completed.
    Transport(String),
}

impl DistanceMatrixClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://maps.googleapis.com".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn distance(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteEstimate, CommuteError> {
        let url = format!("{}/maps/api/distancematrix/json", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("key", self.api_key.as_str()),
                ("units", "imperial"),
            ])
            .send()
            .await
            .map_err(|e| CommuteError::Transport(e.to_string()))?;

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| CommuteError::Api(e.to_string()))?;

        let status = parsed["status"].as_str().unwrap_or("UNKNOWN");
        if status != "OK" {
            return Err(CommuteError::Api(format!("distance matrix returned {status}")));
        }

        let element = &parsed["rows"][0]["elements"][0];
        let element_status = element["status"].as_str().unwrap_or("UNKNOWN");
        if element_status != "OK" {
            return Err(CommuteError::Route(element_status.to_string()));
        }

        match (element["distance"]["text"].as_str(), element["duration"]["text"].as_str()) {
            (Some(distance), Some(duration)) => Ok(RouteEstimate {
                distance: distance.to_string(),
                duration: duration.to_string(),
            }),
            _ => Err(CommuteError::Api("malformed distance matrix element".into())),
        }
    }
}

struct EstimateTool {
    client: Option<DistanceMatrixClient>,
    breaker: Breaker,
}

#[async_trait]
impl ToolHandler for EstimateTool {
    async fn call(&self, args: &Value) -> Outcome {
        let parsed = args["request"].as_str().map(parse_route);
        let origin = args["origin"]
            .as_str()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().and_then(|(o, _)| o.clone()));
        let destination = args["destination"]
            .as_str()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().and_then(|(_, d)| d.clone()));

        let (Some(origin), Some(destination)) = (origin, destination) else {
            return Outcome::failure(
                FailureKind::Validation,
                "origin and destination are required (or a request like `from A to B`)",
            );
        };

        match self.breaker.state() {
            BreakerState::Unconfigured { missing } => {
                return Outcome::failure(FailureKind::Configuration, format!("{missing} not set"));
            }
            BreakerState::Disabled { reason } => {
                return Outcome::failure(
                    FailureKind::Dependency,
                    format!("distance lookup disabled: {reason}"),
                );
            }
            BreakerState::Available => {}
        }
        let Some(client) = &self.client else {
            return Outcome::failure(FailureKind::Configuration, "maps client not constructed");
        };

        match client.distance(&origin, &destination).await {
            Ok(estimate) => Outcome::success(json!({
                "origin": origin,
                "destination": destination,
                "distance": estimate.distance,
                "duration": estimate.duration,
                "summary": format!(
                    "The distance from {origin} to {destination} is {}, about {} by car.",
                    estimate.distance, estimate.duration
                ),
            })),
            Err(CommuteError::Route(status)) => Outcome::failure(
                FailureKind::NotFound,
                format!("cannot calculate distance: {status}"),
            ),
            Err(CommuteError::Api(reason)) | Err(CommuteError::Transport(reason)) => {
                self.breaker.trip(&reason);
                Outcome::failure(
                    FailureKind::Dependency,
                    format!("distance lookup failed: {reason}"),
                )
            }
        }
    }
}

pub fn provider(config: Option<MapsConfig>) -> Provider {
    let (client, breaker) = match config {
        Some(config) => (
            Some(DistanceMatrixClient::new(config.api_key)),
            Breaker::available("distance-matrix"),
        ),
        None => (
            None,
            Breaker::unconfigured("distance-matrix", "MAPS_PLACE_API_KEY"),
        ),
    };

    Provider::new(
        "commute",
        "Calculates door-to-door travel durations and best routes.",
        "Estimate travel times, highlight delays, and suggest optimal departure windows.",
    )
    .with_tool(Tool::new(
        "estimate",
        "Driving distance and duration between two places",
        vec![
            ParamSpec::optional("origin", ParamKind::String),
            ParamSpec::optional("destination", ParamKind::String),
            ParamSpec::optional("request", ParamKind::String),
        ],
        EstimateTool { client, breaker },
    ))
}

pub fn spec(config: Option<MapsConfig>) -> ProviderSpec {
    ProviderSpec::new("commute", move || Ok(provider(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_route_is_validation_failure() {
        let provider = provider(None);
        let outcome = provider.invoke("estimate", &json!({"origin": "Orlando"})).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn unconfigured_key_is_a_structured_configuration_failure() {
        let provider = provider(None);
        let outcome = provider
            .invoke("estimate", &json!({"origin": "Orlando", "destination": "Miami"}))
            .await;
        match outcome {
            Outcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Configuration);
                assert!(message.contains("MAPS_PLACE_API_KEY"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn route_is_parsed_from_request_text() {
        let provider = provider(None);
        // Still unconfigured, but validation passes: the failure names the
        // missing key, proving the route was extracted.
        let outcome = provider
            .invoke("estimate", &json!({"request": "commute from Orlando to Miami"}))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Configuration));
    }

    #[tokio::test]
    async fn transport_error_trips_the_breaker() {
        let client = DistanceMatrixClient::new("key").with_base_url("http://127.0.0.1:9");
        let tool = EstimateTool {
            client: Some(client),
            breaker: Breaker::available("distance-matrix"),
        };

        let first = tool
            .call(&json!({"origin": "Orlando", "destination": "Miami"}))
            .await;
        assert_eq!(first.failure_kind(), Some(FailureKind::Dependency));
        assert!(!tool.breaker.is_available());

        // Second call short-circuits on the tripped breaker.
        let second = tool
            .call(&json!({"origin": "Orlando", "destination": "Miami"}))
            .await;
        match second {
            Outcome::Failure { message, .. } => assert!(message.contains("disabled"), "{message}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
