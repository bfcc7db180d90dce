use serde::{Deserialize, Serialize};

/// Process configuration, read once at startup. Credentials are optional:
/// a source whose credential is absent stays registered but short-circuits
/// to an empty result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub ticketmaster_api_key: Option<String>,
    pub seatgeek_client_id: Option<String>,
    pub serpapi_key: Option<String>,
    pub predicthq_api_key: Option<String>,
    pub bandsintown_app_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ticketmaster_api_key: None,
            seatgeek_client_id: None,
            serpapi_key: None,
            predicthq_api_key: None,
            // Bandsintown's public API only wants an app identifier
            bandsintown_app_id: "event-scout".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("HOST").unwrap_or(defaults.host),
            port: env_string("PORT")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.port),
            ticketmaster_api_key: env_string("TICKETMASTER_API_KEY"),
            seatgeek_client_id: env_string("SEATGEEK_CLIENT_ID"),
            serpapi_key: env_string("SERPAPI_KEY"),
            predicthq_api_key: env_string("PREDICTHQ_API_KEY"),
            bandsintown_app_id: env_string("BANDSINTOWN_APP_ID")
                .unwrap_or(defaults.bandsintown_app_id),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_credentials() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.ticketmaster_api_key.is_none());
        assert!(config.seatgeek_client_id.is_none());
        assert_eq!(config.bandsintown_app_id, "event-scout");
    }
}
