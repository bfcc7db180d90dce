pub mod bandsintown;
pub mod base;
pub mod duckduckgo;
pub mod eventbrite;
pub mod predicthq;
pub mod seatgeek;
pub mod serpapi;
pub mod songkick;
pub mod ticketmaster;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::models::Event;

/// One external event source. `search` is the single capability every source
/// offers, and it never fails upward; network errors, malformed payloads and
/// missing credentials all collapse to an empty list after a log line.
/// Retries are nobody's business; each call is one best-effort attempt.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str, location: &str) -> Vec<Event>;
}

/// All configured sources in merge priority order: credential-free scrapers
/// first, keyed APIs after. The aggregator concatenates results in this
/// order, so earlier sources win dedup ties.
pub fn active_sources(config: &AppConfig) -> Vec<Arc<dyn EventSource>> {
    vec![
        Arc::new(duckduckgo::DuckDuckGo),
        Arc::new(eventbrite::Eventbrite),
        Arc::new(songkick::Songkick),
        Arc::new(ticketmaster::Ticketmaster::new(
            config.ticketmaster_api_key.clone(),
        )),
        Arc::new(seatgeek::SeatGeek::new(config.seatgeek_client_id.clone())),
        Arc::new(bandsintown::Bandsintown::new(
            config.bandsintown_app_id.clone(),
        )),
        Arc::new(serpapi::SerpApi::new(config.serpapi_key.clone())),
        Arc::new(predicthq::PredictHq::new(config.predicthq_api_key.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapers_outrank_keyed_apis() {
        let names: Vec<&str> = active_sources(&AppConfig::default())
            .iter()
            .map(|source| source.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "duckduckgo",
                "eventbrite",
                "songkick",
                "ticketmaster",
                "seatgeek",
                "bandsintown",
                "serpapi",
                "predicthq",
            ]
        );
    }
}
