use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::validate_rate;
use crate::error::{ConfigError, Provider, ProviderError};

const USER_AGENT: &str = concat!("route_atlas/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The one thing the geocoders need from the network. Tests plug in canned
/// responses here.
pub trait HttpClient: Send + Sync {
    /// GET `url` with `query` appended, returning the response body. Non 2xx
    /// responses are errors.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String>;
}

pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<ReqwestClient, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(ReqwestClient { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self.client.get(url).query(query).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            bail!("HTTP {} from {}: {}", status, url, body);
        }
        Ok(body)
    }
}

/// Enforces a minimum interval between outbound requests. The lock is held
/// while sleeping, so concurrent callers queue up behind each other instead of
/// all waking at the same instant.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `field` names the config value the rate came from, for the error.
    pub fn per_second(
        field: &'static str,
        requests_per_second: f64,
    ) -> Result<RateLimiter, ConfigError> {
        validate_rate(field, requests_per_second)?;
        Ok(RateLimiter {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last_call: Mutex::new(None),
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn wait(&self) {
        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// HTTP access for one provider: every request goes through the provider's
/// rate limiter and failures come back as `ProviderError`.
pub struct ProviderSession {
    provider: Provider,
    client: Arc<dyn HttpClient>,
    limiter: RateLimiter,
}

impl ProviderSession {
    pub fn new(
        provider: Provider,
        client: Arc<dyn HttpClient>,
        rate_field: &'static str,
        requests_per_second: f64,
    ) -> Result<ProviderSession, ConfigError> {
        Ok(ProviderSession {
            provider,
            client,
            limiter: RateLimiter::per_second(rate_field, requests_per_second)?,
        })
    }

    /// Returns the parsed response together with the raw body, which callers
    /// attach to status errors.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<(T, String), ProviderError> {
        self.limiter.wait();
        debug!("[{}] GET {} {:?}", self.provider, url, query);
        let body = self
            .client
            .get(url, query)
            .map_err(|e| ProviderError::transport(self.provider, format!("{e:#}")))?;
        match serde_json::from_str(&body) {
            Ok(parsed) => Ok((parsed, body)),
            Err(e) => Err(ProviderError::parse(self.provider, e.to_string(), body)),
        }
    }
}

/// Names of all roads sharing the smallest distance, joined. Several roads
/// at the same distance usually means the point sits on a junction, and
/// picking one of them would be arbitrary.
pub fn nearest_road_names<'a>(roads: impl IntoIterator<Item = (&'a str, f64)>) -> String {
    let roads: Vec<(&str, f64)> = roads.into_iter().filter(|(_, d)| !d.is_nan()).collect();
    let min_distance = match roads.iter().map(|(_, d)| *d).reduce(f64::min) {
        Some(d) => d,
        None => return String::new(),
    };
    roads
        .iter()
        .filter(|(name, d)| *d == min_distance && !name.is_empty())
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

// Providers are loose about types: empty fields come back as `[]`, numbers as
// strings, and some fields are either a string or a list of strings.
fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(flatten_value(&Value::deserialize(deserializer)?))
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "lenient_string")]
        text: String,
        #[serde(default = "nan", deserialize_with = "lenient_f64")]
        distance: f64,
    }

    fn nan() -> f64 {
        f64::NAN
    }

    #[test]
    fn lenient_fields() {
        let parse = |s: &str| serde_json::from_str::<Loose>(s).unwrap();
        assert_eq!(parse(r#"{"text": []}"#).text, "");
        assert_eq!(parse(r#"{"text": ["a", "b"]}"#).text, "a,b");
        assert_eq!(parse(r#"{"text": 12}"#).text, "12");
        assert_eq!(parse(r#"{"distance": "24.5"}"#).distance, 24.5);
        assert!(parse(r#"{}"#).distance.is_nan());
    }

    #[test]
    fn nearest_roads_keep_ties() {
        assert_eq!(nearest_road_names(Vec::<(&str, f64)>::new()), "");
        assert_eq!(
            nearest_road_names(vec![("A路", 10.0), ("B路", 3.5), ("C路", 3.5)]),
            "B路, C路"
        );
        assert_eq!(
            nearest_road_names(vec![("A路", 10.0), ("", 1.0), ("B路", 1.0)]),
            "B路"
        );
    }
}
