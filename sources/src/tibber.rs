//! Tibber GraphQL
//!
//! Query documents are constants. Home, device and inverter identifiers and
//! the requested temperature always travel as GraphQL variables, never as
//! part of the document text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::http::{self, check_status};

pub const DEFAULT_ENDPOINT: &str = "https://api.tibber.com/v1-beta/gql";

/// Lowest and highest comfort temperature accepted, in °C
pub const MIN_TEMPERATURE: f64 = 5.0;
pub const MAX_TEMPERATURE: f64 = 30.0;

pub const PRICE_QUERY: &str = "query Price { viewer { homes { currentSubscription { id validFrom validTo status priceInfo { current { total energy tax startsAt currency level } } } } } }";

pub const HOME_QUERY: &str = "query Home($homeId: String!, $inverterId: String!, $productionId: String!) { me { home(id: $homeId) { thermostats { state { comfortTemperature } temperatureSensor { measurement { value } } } inverter(id: $inverterId) { bubble { value percent } } inverterProduction(id: $productionId) { keyFigures { valueText unitText description } } } } }";

pub const VEHICLE_QUERY: &str = "query Vehicles($homeId: String!) { me { home(id: $homeId) { electricVehicles { battery { percent } isAlive imgUrl batteryText } } } }";

pub const SET_THERMOSTAT_MUTATION: &str = "mutation SetThermostat($homeId: String!, $thermostatId: String!, $temperature: Float!) { me { home(id: $homeId) { thermostat(id: $thermostatId) { setState(comfortTemperature: $temperature) } } } }";

/// A GraphQL endpoint returning the `data` member of the response
#[async_trait]
pub trait EnergySource: Send + Sync {
    async fn query(&self, document: &str, variables: Value) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

pub struct TibberClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl TibberClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: http::client(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl EnergySource for TibberClient {
    async fn query(&self, document: &str, variables: Value) -> Result<Value> {
        debug!(endpoint = %self.endpoint, "tibber query");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": document, "variables": variables }))
            .send()
            .await?;
        let body: GraphQlResponse = check_status("tibber", response)?.json().await?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SourceError::Api {
                source_name: "tibber",
                message,
            });
        }
        body.data
            .ok_or_else(|| SourceError::Parse("GraphQL response without data".to_string()))
    }
}

/// Accept a client-supplied comfort temperature.
///
/// Numbers and numeric strings are accepted; the value must be finite and
/// within [`MIN_TEMPERATURE`]..=[`MAX_TEMPERATURE`].
pub fn validate_temperature(value: &Value) -> Result<f64> {
    let temperature = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| SourceError::InvalidInput(format!("temperature is not a number: {value}")))?;

    if !temperature.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(SourceError::InvalidInput(format!(
            "temperature {temperature} outside {MIN_TEMPERATURE}..={MAX_TEMPERATURE}"
        )));
    }
    Ok(temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use proptest::prelude::*;
    use rstest::rstest;

    #[tokio::test]
    async fn test_query_sends_variables_and_returns_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/gql")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(json!({
                "query": VEHICLE_QUERY,
                "variables": { "homeId": "home-1" }
            })))
            .with_status(200)
            .with_body(r#"{"data":{"me":{"home":{"electricVehicles":[{"batteryText":"80%"}]}}}}"#)
            .create_async()
            .await;

        let client = TibberClient::new(format!("{}/gql", server.url()), "tok");
        let data = client
            .query(VEHICLE_QUERY, json!({ "homeId": "home-1" }))
            .await
            .unwrap();
        assert_eq!(data["me"]["home"]["electricVehicles"][0]["batteryText"], "80%");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_graphql_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/gql")
            .with_status(200)
            .with_body(r#"{"data":null,"errors":[{"message":"home not found"}]}"#)
            .create_async()
            .await;

        let client = TibberClient::new(format!("{}/gql", server.url()), "tok");
        match client.query(PRICE_QUERY, json!({})).await {
            Err(SourceError::Api { message, .. }) => assert_eq!(message, "home not found"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_documents_carry_no_identifiers() {
        for document in [HOME_QUERY, VEHICLE_QUERY, SET_THERMOSTAT_MUTATION] {
            assert!(!document.contains('"'), "{document}");
            assert!(document.contains("$homeId"));
        }
    }

    #[rstest]
    #[case(json!(21.5), Some(21.5))]
    #[case(json!(5), Some(5.0))]
    #[case(json!(30.0), Some(30.0))]
    #[case(json!("22"), Some(22.0))]
    #[case(json!(4.9), None)]
    #[case(json!(30.1), None)]
    #[case(json!("NaN"), None)]
    #[case(json!("inf"), None)]
    #[case(json!("21) { hacked }"), None)]
    #[case(json!(null), None)]
    #[case(json!([21]), None)]
    fn test_validate_temperature(#[case] input: Value, #[case] expected: Option<f64>) {
        assert_eq!(validate_temperature(&input).ok(), expected);
    }

    proptest! {
        #[test]
        fn test_accepted_temperatures_are_in_range(t in proptest::num::f64::ANY) {
            if let Ok(accepted) = validate_temperature(&json!(t.to_string())) {
                prop_assert!(accepted.is_finite());
                prop_assert!((MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&accepted));
            }
        }
    }
}
