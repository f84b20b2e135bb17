use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Thin GET-and-decode wrapper around the Sportmonks REST API.
///
/// One instance per pipeline run. The token is attached to every request as
/// the `api_token` query parameter and is kept out of logs and errors: only
/// the URL path is ever reported as the endpoint.
#[derive(Debug, Clone)]
pub struct SportmonksClient {
    http: reqwest::Client,
    api_token: String,
    football_base: Url,
    odds_base: Url,
}

impl SportmonksClient {
    /// Fails with a configuration error before any request is made if the
    /// token is blank or a base URL does not parse.
    pub fn new(cfg: &Config) -> Result<Self> {
        if cfg.api_token.trim().is_empty() {
            return Err(AppError::Config("API token is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_token: cfg.api_token.trim().to_string(),
            football_base: parse_base(&cfg.football_api_url)?,
            odds_base: parse_base(&cfg.odds_api_url)?,
        })
    }

    /// GET `{football_base}/{segments...}`.
    pub async fn get_football(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Value> {
        self.get_json(&self.football_base, segments, params).await
    }

    /// GET `{odds_base}/{segments...}`.
    pub async fn get_odds(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Value> {
        self.get_json(&self.odds_base, segments, params).await
    }

    async fn get_json(&self, base: &Url, segments: &[&str], params: &[(&str, &str)]) -> Result<Value> {
        let url = join_segments(base, segments)?;
        let endpoint = url.path().to_string();

        let resp = self
            .http
            .get(url)
            .query(&[("api_token", self.api_token.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::transient(&endpoint, None, &e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::transient(&endpoint, Some(status.as_u16()), &e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(AppError::transient(&endpoint, Some(status.as_u16()), &body));
        }

        debug!(endpoint = %endpoint, status = status.as_u16(), bytes = body.len(), "GET ok");

        serde_json::from_str::<Value>(&body)
            .map_err(|_| AppError::transient(&endpoint, Some(status.as_u16()), &body))
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Config(format!("invalid API base URL {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(AppError::Config(format!("API base URL {raw:?} cannot have a path")));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one.
fn join_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("API base URL {base} cannot have a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> Config {
        let mut cfg = Config::new("secret-token");
        cfg.football_api_url = format!("{}/v3/football", server.uri());
        cfg.odds_api_url = format!("{}/v3/odds/", server.uri());
        cfg.http_timeout_secs = 5;
        cfg
    }

    #[test]
    fn empty_token_is_config_error() {
        let err = SportmonksClient::new(&Config::new("   ")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{err}");
    }

    #[test]
    fn bad_base_url_is_config_error() {
        let mut cfg = Config::new("tok");
        cfg.football_api_url = "not a url".to_string();
        assert!(matches!(SportmonksClient::new(&cfg), Err(AppError::Config(_))));
    }

    #[test]
    fn segments_are_encoded_and_trailing_slash_dropped() {
        let base = Url::parse("https://example.test/v3/odds/").unwrap();
        let url = join_segments(&base, &["markets", "search", "corner kicks"]).unwrap();
        assert_eq!(url.path(), "/v3/odds/markets/search/corner%20kicks");
    }

    #[tokio::test]
    async fn sends_token_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/football/fixtures/date/2024-05-01"))
            .and(query_param("api_token", "secret-token"))
            .and(query_param("filters", "havingOdds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = SportmonksClient::new(&test_config(&server)).unwrap();
        let body = client
            .get_football(&["fixtures", "date", "2024-05-01"], &[("filters", "havingOdds")])
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"data": []}));
    }

    #[tokio::test]
    async fn non_success_status_is_transient_error_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/odds/markets/search/corner"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthenticated."))
            .mount(&server)
            .await;

        let client = SportmonksClient::new(&test_config(&server)).unwrap();
        let err = client.get_odds(&["markets", "search", "corner"], &[]).await.unwrap_err();
        match &err {
            AppError::TransientApi { endpoint, status, body } => {
                assert_eq!(endpoint, "/v3/odds/markets/search/corner");
                assert_eq!(*status, Some(401));
                assert_eq!(body, "Unauthenticated.");
            }
            other => panic!("expected TransientApi, got {other:?}"),
        }
        assert!(!err.to_string().contains("secret-token"));
    }

    #[tokio::test]
    async fn unparseable_body_is_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/football/rounds/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = SportmonksClient::new(&test_config(&server)).unwrap();
        let err = client.get_football(&["rounds", "5"], &[]).await.unwrap_err();
        assert!(
            matches!(&err, AppError::TransientApi { status: Some(200), body, .. } if body.contains("maintenance")),
            "{err:?}"
        );
    }
}
