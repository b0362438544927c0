use reqwest::header::{ACCEPT, USER_AGENT};

use super::error::GeocodeError;
use super::types::GeocodeResult;
use crate::config::GeocodingConfig;

/// Queries shorter than this (after trimming) are not sent anywhere.
pub const MIN_QUERY_CHARS: usize = 3;

/// Searches through the backend proxy and falls back to the public
/// Nominatim-compatible provider when the proxy is unreachable or fails.
pub struct GeocodeClient {
    proxy_url: String,
    fallback_url: String,
    limit: u32,
    user_agent: String,
    email: Option<String>,
    http: reqwest::Client,
}

impl GeocodeClient {
    pub fn new(config: &GeocodingConfig) -> Self {
        Self {
            proxy_url: config.proxy_url.trim_end_matches('/').to_string(),
            fallback_url: config.fallback_url.trim_end_matches('/').to_string(),
            limit: config.limit,
            user_agent: config.user_agent.clone(),
            email: config.email.clone(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, GeocodeError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        match self.search_proxy(query).await {
            Ok(results) => Ok(results),
            Err(e) => {
                log::warn!("Geocoding proxy failed ({}), using public provider", e);
                self.search_fallback(query).await
            }
        }
    }

    async fn search_proxy(&self, query: &str) -> Result<Vec<GeocodeResult>, reqwest::Error> {
        let limit = self.limit.to_string();
        self.http
            .get(format!("{}/geocode", self.proxy_url))
            .query(&[("q", query), ("limit", limit.as_str())])
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn search_fallback(&self, query: &str) -> Result<Vec<GeocodeResult>, GeocodeError> {
        let limit = self.limit.to_string();
        let mut params = vec![
            ("q", query),
            ("format", "json"),
            ("addressdetails", "1"),
            ("limit", limit.as_str()),
        ];
        if let Some(email) = &self.email {
            params.push(("email", email.as_str()));
        }

        let response = self
            .http
            .get(format!("{}/search", self.fallback_url))
            .query(&params)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!("Geocoding provider answered {}", response.status());
            return Ok(Vec::new());
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(proxy_url: String, fallback_url: String) -> GeocodeClient {
        GeocodeClient::new(&GeocodingConfig {
            proxy_url,
            fallback_url,
            ..GeocodingConfig::default()
        })
    }

    fn hit(name: &str) -> Value {
        json!({"display_name": name, "lat": "40.7127", "lon": "-74.0059"})
    }

    #[tokio::test]
    async fn short_query_makes_no_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/geocode",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!([]))
                }
            }),
        );
        let base = spawn_stub(router).await;
        let client = client_for(base.clone(), base);

        assert!(client.search("  ab  ").await.unwrap().is_empty());
        assert!(client.search("").await.unwrap().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn proxy_answers_first() {
        let router = Router::new().route(
            "/geocode",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["q"], "City Hall");
                assert_eq!(params["limit"], "5");
                Json(json!([hit("proxy")]))
            }),
        );
        let base = spawn_stub(router).await;
        let client = client_for(base.clone(), base);

        let results = client.search(" City Hall ").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].display_name, "proxy");
    }

    #[tokio::test]
    async fn falls_back_when_proxy_fails() {
        let router = Router::new()
            .route("/geocode", get(|| async { StatusCode::BAD_GATEWAY }))
            .route(
                "/search",
                get(
                    |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                        assert_eq!(params["format"], "json");
                        assert_eq!(params["addressdetails"], "1");
                        assert!(headers.contains_key("user-agent"));
                        Json(json!([hit("public"), hit("public 2")]))
                    },
                ),
            );
        let base = spawn_stub(router).await;
        let client = client_for(base.clone(), base);

        let results = client.search("City Hall").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].display_name, "public");
    }

    #[tokio::test]
    async fn falls_back_when_proxy_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let router = Router::new().route("/search", get(|| async { Json(json!([hit("public")])) }));
        let client = client_for(dead, spawn_stub(router).await);

        assert_eq!(client.search("City Hall").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_provider_yields_nothing() {
        let router = Router::new()
            .route("/geocode", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/search", get(|| async { StatusCode::TOO_MANY_REQUESTS }));
        let base = spawn_stub(router).await;
        let client = client_for(base.clone(), base);

        assert!(client.search("City Hall").await.unwrap().is_empty());
    }
}
