//! HTTP plumbing shared by every provider.

use crate::error::{ConfigError, ProviderError};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::form_urlencoded::byte_serialize;
use url::Url;

const USER_AGENT: &str = concat!("chartfeed/", env!("CARGO_PKG_VERSION"));

/// Route a request takes to reach its provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relay {
    Direct,
    /// Mirror that fetches the percent-encoded target URL appended to it.
    Prefix(String),
}

impl Relay {
    pub fn route(&self, target: &Url) -> String {
        match self {
            Relay::Direct => target.to_string(),
            Relay::Prefix(prefix) => {
                let encoded: String = byte_serialize(target.as_str().as_bytes()).collect();
                format!("{prefix}{encoded}")
            }
        }
    }

    /// Parses a comma separated relay list, e.g. `direct,https://proxy/?u=`.
    pub fn parse_list(raw: &str) -> Result<Vec<Relay>, ConfigError> {
        let relays = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Relay::from_str)
            .collect::<Result<Vec<Relay>, _>>()?;

        if relays.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "relays".to_string(),
                value: raw.to_string(),
            });
        }
        Ok(relays)
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relay::Direct => f.write_str("direct"),
            Relay::Prefix(prefix) => f.write_str(prefix),
        }
    }
}

impl FromStr for Relay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("direct") {
            return Ok(Relay::Direct);
        }

        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Relay::Prefix(s.to_string())),
            _ => Err(ConfigError::InvalidValue {
                key: "relay".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(HttpTransport { client })
    }

    /// Single GET through `relay`, bounded by `timeout`, decoded as JSON.
    pub async fn get_json(
        &self,
        relay: &Relay,
        target: &Url,
        timeout: Duration,
    ) -> Result<Value, ProviderError> {
        let url = relay.route(target);
        tracing::debug!(%relay, path = target.path(), "upstream request");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await?;

        check_status(response.status(), target)?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn check_status(status: StatusCode, target: &Url) -> Result<(), ProviderError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited(format!(
            "HTTP 429 from {}",
            target.host_str().unwrap_or_default()
        ))),
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound(target.path().to_string())),
        status if !status.is_success() => Err(ProviderError::Network(format!("HTTP {status}"))),
        _ => Ok(()),
    }
}
