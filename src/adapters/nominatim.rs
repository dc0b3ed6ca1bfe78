use crate::domain::model::Location;
use crate::domain::ports::{Geocoder, LookupError};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const PROVIDER_NAME: &str = "Nominatim";
pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

/// Nominatim search API response item
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// OpenStreetMap Nominatim free-text search.
pub struct NominatimGeocoder {
    client: Client,
    search_url: String,
}

impl NominatimGeocoder {
    /// The usage policy requires an identifying user agent on every request.
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            search_url: format!("{}/search", endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, address: &str) -> std::result::Result<Option<Location>, LookupError> {
        tracing::debug!("Geocoding request to {}: {}", self.search_url, address);

        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout
                } else {
                    LookupError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!("Geocoding response status: {}", status);
        if !status.is_success() {
            return Err(LookupError::Service {
                status: status.as_u16(),
            });
        }

        let places: Vec<NominatimPlace> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Timeout
            } else {
                LookupError::InvalidResponse(e.to_string())
            }
        })?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let latitude: f64 = place
            .lat
            .parse()
            .map_err(|e| LookupError::InvalidResponse(format!("invalid latitude: {}", e)))?;
        let longitude: f64 = place
            .lon
            .parse()
            .map_err(|e| LookupError::InvalidResponse(format!("invalid longitude: {}", e)))?;

        Ok(Some(Location {
            latitude,
            longitude,
            display_name: place.display_name,
        }))
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const UA: &str = "integrative-oncology-services-research-v1.0";

    fn geocoder(server: &MockServer) -> NominatimGeocoder {
        NominatimGeocoder::new(&server.base_url(), UA, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_returns_first_place() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search")
                .query_param("q", "202 Greenhill Road, Eastwood, SA, 5063, Australia")
                .query_param("format", "json")
                .query_param("limit", "1")
                .header("user-agent", UA);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([
                    {"lat": "-34.9447391", "lon": "138.6273529", "display_name": "202, Greenhill Road, Eastwood"}
                ]));
        });

        let location = geocoder(&server)
            .lookup("202 Greenhill Road, Eastwood, SA, 5063, Australia")
            .await
            .unwrap()
            .unwrap();

        api_mock.assert();
        assert_eq!(location.latitude, -34.9447391);
        assert_eq!(location.longitude, 138.6273529);
        assert_eq!(location.display_name, "202, Greenhill Road, Eastwood");
    }

    #[tokio::test]
    async fn test_empty_result_is_no_match() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([]));
        });

        let result = geocoder(&server).lookup("Nowhere, Australia").await.unwrap();

        api_mock.assert();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_server_error_is_service_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(503);
        });

        let err = geocoder(&server).lookup("Anywhere").await.unwrap_err();
        assert_eq!(err, LookupError::Service { status: 503 });
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([{"lat": "north", "lon": "1.0", "display_name": "x"}]));
        });

        let err = geocoder(&server).lookup("Anywhere").await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(serde_json::json!([]));
        });

        let geocoder =
            NominatimGeocoder::new(&server.base_url(), UA, Duration::from_millis(50)).unwrap();
        let err = geocoder.lookup("Anywhere").await.unwrap_err();
        assert_eq!(err, LookupError::Timeout);
    }
}
