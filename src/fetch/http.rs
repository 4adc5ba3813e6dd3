//! reqwest-backed [`ApiGateway`].
//!
//! Each API id maps to a base URL, default headers and query parameters, and
//! a table of endpoint ids to paths (see [`ApiConfig`]).

use super::{ApiGateway, Args};
use crate::config::{ApiConfig, GatewayConfig};
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::utils::truncate_for_log;

pub struct HttpGateway {
    client: Client,
    apis: BTreeMap<String, ApiConfig>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("content_booster/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            apis: config.apis.clone(),
        })
    }

    fn endpoint_url(&self, api_id: &str, endpoint_id: &str, args: &Args) -> Result<(Url, &ApiConfig), FetchError> {
        let missing = || FetchError::GatewayMissing {
            api_id: api_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        };
        let api = self.apis.get(api_id).ok_or_else(missing)?;
        let path = api.endpoints.get(endpoint_id).ok_or_else(missing)?;

        let raw = format!("{}{}", api.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw)
            .map_err(|e| FetchError::Transport(format!("invalid endpoint url `{raw}`: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in api.query.iter().chain(args.iter()) {
                pairs.append_pair(k, v);
            }
        }
        Ok((url, api))
    }
}

#[async_trait]
impl ApiGateway for HttpGateway {
    #[instrument(level = "debug", skip_all, fields(%api_id, %endpoint_id))]
    async fn call(&self, api_id: &str, endpoint_id: &str, args: &Args) -> Result<Value, FetchError> {
        let (url, api) = self.endpoint_url(api_id, endpoint_id, args)?;
        let t0 = Instant::now();

        let mut request = self.client.get(url.clone());
        for (name, value) in &api.headers {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let dt = t0.elapsed();

        if !status.is_success() {
            warn!(
                %status,
                elapsed_ms = dt.as_millis() as u64,
                body_preview = %truncate_for_log(&body, 300),
                "Gateway call returned error status"
            );
            return Err(FetchError::Transport(format!("HTTP {status} from {api_id}/{endpoint_id}")));
        }

        debug!(elapsed_ms = dt.as_millis() as u64, bytes = body.len(), "Gateway call succeeded");
        serde_json::from_str(&body)
            .map_err(|e| FetchError::InvalidShape(format!("response is not JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> HttpGateway {
        let mut apis = BTreeMap::new();
        apis.insert(
            "newsapi".to_string(),
            ApiConfig {
                base_url: "https://newsapi.org/v2/".to_string(),
                headers: BTreeMap::new(),
                query: BTreeMap::from([("country".to_string(), "us".to_string())]),
                endpoints: BTreeMap::from([("top".to_string(), "/top-headlines".to_string())]),
            },
        );
        HttpGateway::new(&GatewayConfig {
            timeout_secs: 5,
            max_pages: 2,
            apis,
        })
        .unwrap()
    }

    #[test]
    fn test_builds_url_with_default_and_call_args() {
        let gw = gateway();
        let args = Args::from([("page".to_string(), "2".to_string())]);
        let (url, _) = gw.endpoint_url("newsapi", "top", &args).unwrap();
        assert_eq!(url.as_str(), "https://newsapi.org/v2/top-headlines?country=us&page=2");
    }

    #[test]
    fn test_unknown_api_or_endpoint_is_gateway_missing() {
        let gw = gateway();
        assert!(matches!(
            gw.endpoint_url("other", "top", &Args::new()),
            Err(FetchError::GatewayMissing { .. })
        ));
        assert!(matches!(
            gw.endpoint_url("newsapi", "everything", &Args::new()),
            Err(FetchError::GatewayMissing { .. })
        ));
    }
}
