use chrono::{Duration, Utc};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::breaker::{Breaker, BreakerState};
use crate::config::FlightConfig;
use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

use super::{parse_date, parse_route};

const DEFAULT_ORIGIN: &str = "MCO";
const DEFAULT_DESTINATION: &str = "DXB";

/// Flight-offers search client (Amadeus Self-Service API, client-credentials
/// flow: every search fetches a token, then queries the offers endpoint).
pub struct AmadeusClient {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

/// The first segment of the cheapest returned itinerary.
#[derive(Debug, Clone, Serialize)]
pub struct FlightOffer {
    pub carrier: String,
    pub number: String,
    pub origin: String,
    pub destination: String,
    pub departs: String,
    pub arrives: String,
}

impl AmadeusClient {
    pub fn new(config: FlightConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key,
            api_secret: config.api_secret,
            base_url: "https://test.api.amadeus.com".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn access_token(&self) -> Result<String, String> {
        let resp = self
            .client
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.api_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("token request failed: {e}"))?;

        let status = resp.status().as_u16();
        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| format!("token response unreadable: {e}"))?;
        if status != 200 {
            return Err(format!("token endpoint returned {status}"));
        }
        parsed["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "token response missing access_token".into())
    }

    /// `Ok(None)` means the API answered but had no offers for the route.
    pub async fn search_offers(
        &self,
        origin: &str,
        destination: &str,
        departure_date: &str,
        adults: u32,
    ) -> Result<Option<FlightOffer>, String> {
        let token = self.access_token().await?;
        let adults = adults.to_string();

        let resp = self
            .client
            .get(format!("{}/v2/shopping/flight-offers", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("originLocationCode", origin),
                ("destinationLocationCode", destination),
                ("departureDate", departure_date),
                ("adults", adults.as_str()),
                ("max", "1"),
            ])
            .send()
            .await
            .map_err(|e| format!("offer search failed: {e}"))?;

        let status = resp.status().as_u16();
        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| format!("offer response unreadable: {e}"))?;
        if status != 200 {
            return Err(format!("offer endpoint returned {status}"));
        }

        let Some(segment) = parsed["data"]
            .get(0)
            .and_then(|offer| offer["itineraries"].get(0))
            .and_then(|itinerary| itinerary["segments"].get(0))
        else {
            return Ok(None);
        };

        Ok(Some(FlightOffer {
            carrier: segment["carrierCode"].as_str().unwrap_or("").to_string(),
            number: segment["number"].as_str().unwrap_or("").to_string(),
            origin: segment["departure"]["iataCode"].as_str().unwrap_or(origin).to_string(),
            destination: segment["arrival"]["iataCode"]
                .as_str()
                .unwrap_or(destination)
                .to_string(),
            departs: segment["departure"]["at"].as_str().unwrap_or("").to_string(),
            arrives: segment["arrival"]["at"].as_str().unwrap_or("").to_string(),
        }))
    }
}

struct SearchTool {
    client: Option<AmadeusClient>,
    breaker: Breaker,
}

impl SearchTool {
    /// Degraded result when the shopping backend is unusable: a clearly
    /// marked synthetic offer rather than a failed stage.
    fn synthetic(origin: &str, destination: &str, note: &str) -> Outcome {
        let departs = Utc::now() + Duration::hours(2);
        let arrives = departs + Duration::hours(14);
        Outcome::success(json!({
            "synthetic": true,
            "note": note,
            "offer": FlightOffer {
                carrier: "CG".into(),
                number: "123".into(),
                origin: origin.to_string(),
                destination: destination.to_string(),
                departs: departs.to_rfc3339(),
                arrives: arrives.to_rfc3339(),
            },
        }))
    }
}

#[async_trait]
impl ToolHandler for SearchTool {
    async fn call(&self, args: &Value) -> Outcome {
        let request = args["request"].as_str().unwrap_or("");
        let (parsed_origin, parsed_destination) = parse_route(request);

        let origin = args["origin"]
            .as_str()
            .map(str::to_string)
            .or(parsed_origin)
            .unwrap_or_else(|| DEFAULT_ORIGIN.into())
            .to_uppercase();
        let destination = args["destination"]
            .as_str()
            .map(str::to_string)
            .or(parsed_destination)
            .unwrap_or_else(|| DEFAULT_DESTINATION.into())
            .to_uppercase();
        let date = args["date"]
            .as_str()
            .map(str::to_string)
            .or_else(|| parse_date(request))
            .unwrap_or_else(|| Utc::now().date_naive().to_string());

        match self.breaker.state() {
            BreakerState::Unconfigured { missing } => {
                return Self::synthetic(&origin, &destination, &format!("{missing} not set"));
            }
            BreakerState::Disabled { reason } => {
                return Self::synthetic(&origin, &destination, &reason);
            }
            BreakerState::Available => {}
        }
        let Some(client) = &self.client else {
            return Self::synthetic(&origin, &destination, "flight client not constructed");
        };

        match client.search_offers(&origin, &destination, &date, 1).await {
            Ok(Some(offer)) => Outcome::success(json!({
                "synthetic": false,
                "offer": offer,
            })),
            Ok(None) => Self::synthetic(&origin, &destination, "no offers returned for route"),
            Err(reason) => {
                self.breaker.trip(&reason);
                Self::synthetic(&origin, &destination, &reason)
            }
        }
    }
}

pub fn provider(config: Option<FlightConfig>) -> Provider {
    let (client, breaker) = match config {
        Some(config) => (
            Some(AmadeusClient::new(config)),
            Breaker::available("amadeus"),
        ),
        None => (
            None,
            Breaker::unconfigured("amadeus", "AMADEUS_API_KEY or AMADEUS_API_SECRET"),
        ),
    };

    Provider::new(
        "flight",
        "Finds, optimizes, and books flights for upcoming travel.",
        "Search for flight options, evaluate trade-offs, and confirm itineraries.",
    )
    .with_tool(Tool::new(
        "search",
        "Find a flight offer for a route and date, degrading to a synthetic offer when the backend is unavailable",
        vec![
            ParamSpec::optional("origin", ParamKind::String),
            ParamSpec::optional("destination", ParamKind::String),
            ParamSpec::optional("date", ParamKind::String),
            ParamSpec::optional("request", ParamKind::String),
        ],
        SearchTool { client, breaker },
    ))
}

pub fn spec(config: Option<FlightConfig>) -> ProviderSpec {
    ProviderSpec::new("flight", move || Ok(provider(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_search_degrades_to_synthetic_offer() {
        let provider = provider(None);
        let outcome = provider
            .invoke("search", &json!({"request": "flight from MCO to DXB on 2025-10-25"}))
            .await;

        let value = outcome.value().expect("fallback is a success");
        assert_eq!(value["synthetic"], true);
        assert_eq!(value["offer"]["origin"], "MCO");
        assert_eq!(value["offer"]["destination"], "DXB");
        assert!(value["note"].as_str().unwrap().contains("AMADEUS"));
    }

    #[tokio::test]
    async fn defaults_apply_when_request_has_no_route() {
        let provider = provider(None);
        let outcome = provider.invoke("search", &json!({})).await;
        let value = outcome.value().unwrap();
        assert_eq!(value["offer"]["origin"], DEFAULT_ORIGIN);
        assert_eq!(value["offer"]["destination"], DEFAULT_DESTINATION);
    }

    #[tokio::test]
    async fn backend_error_trips_breaker_and_still_degrades() {
        let config = FlightConfig {
            api_key: "k".into(),
            api_secret: "s".into(),
        };
        let client = AmadeusClient::new(config).with_base_url("http://127.0.0.1:9");
        let tool = SearchTool {
            client: Some(client),
            breaker: Breaker::available("amadeus"),
        };

        let first = tool.call(&json!({"origin": "mco", "destination": "dxb"})).await;
        assert_eq!(first.value().unwrap()["synthetic"], true);
        assert!(!tool.breaker.is_available());

        // Subsequent calls short-circuit: still synthetic, no re-probe.
        let second = tool.call(&json!({})).await;
        assert_eq!(second.value().unwrap()["synthetic"], true);
    }

    #[tokio::test]
    async fn explicit_args_override_request_parsing() {
        let provider = provider(None);
        let outcome = provider
            .invoke(
                "search",
                &json!({"origin": "jfk", "request": "flight from MCO to DXB"}),
            )
            .await;
        let value = outcome.value().unwrap();
        assert_eq!(value["offer"]["origin"], "JFK");
        assert_eq!(value["offer"]["destination"], "DXB");
    }
}
