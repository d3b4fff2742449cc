use std::env;

pub const DEFAULT_TABLE_NAME: &str = "skillshare";
pub const DEFAULT_INSIGHTS_TOPIC_PREFIX: &str = "/topic/insights/";

/// Which store implementation backs the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Dynamo,
    /// Process-local maps, for local runs and tests.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    /// API Gateway Management endpoint for the WebSocket API. Broadcasts are
    /// dropped when unset.
    pub ws_api_endpoint: Option<String>,
    pub store_backend: StoreBackend,
    pub insights_topic_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` is the production entry point.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            Some(value) if value.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
            Some(value) if !value.eq_ignore_ascii_case("dynamo") => {
                tracing::warn!("Unknown STORE_BACKEND '{}', using dynamo", value);
                StoreBackend::Dynamo
            }
            _ => StoreBackend::Dynamo,
        };

        Self {
            table_name: lookup("TABLE_NAME")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            ws_api_endpoint: lookup("WS_API_ENDPOINT").filter(|s| !s.is_empty()),
            store_backend,
            insights_topic_prefix: lookup("INSIGHTS_TOPIC_PREFIX")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_INSIGHTS_TOPIC_PREFIX.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(lookup_from(&[]));

        assert_eq!(config.table_name, "skillshare");
        assert_eq!(config.ws_api_endpoint, None);
        assert_eq!(config.store_backend, StoreBackend::Dynamo);
        assert_eq!(config.insights_topic_prefix, "/topic/insights/");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TABLE_NAME", "skillshare-dev"),
            ("WS_API_ENDPOINT", "https://abc.execute-api.eu-west-1.amazonaws.com/dev"),
            ("STORE_BACKEND", "Memory"),
            ("INSIGHTS_TOPIC_PREFIX", "insights:"),
        ]));

        assert_eq!(config.table_name, "skillshare-dev");
        assert_eq!(
            config.ws_api_endpoint.as_deref(),
            Some("https://abc.execute-api.eu-west-1.amazonaws.com/dev")
        );
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.insights_topic_prefix, "insights:");
    }

    #[test]
    fn test_empty_endpoint_is_treated_as_unset() {
        let config = Config::from_lookup(lookup_from(&[("WS_API_ENDPOINT", "")]));
        assert_eq!(config.ws_api_endpoint, None);
    }
}
