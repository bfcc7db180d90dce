use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Event, Venue};

const BASE_URL: &str = "https://serpapi.com/search";
const SOURCE: &str = "serpapi";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    events_results: Vec<EventDoc>,
}

#[derive(Debug, Deserialize)]
struct EventDoc {
    title: Option<String>,
    description: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
    thumbnail: Option<String>,
    date: Option<DateDoc>,
    venue: Option<VenueDoc>,
}

#[derive(Debug, Deserialize)]
struct DateDoc {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VenueDoc {
    name: Option<String>,
}

/// Google Events results by way of SerpAPI. Keyed; the free tier is tiny,
/// so this source usually sits dark.
pub struct SerpApi {
    api_key: Option<String>,
}

impl SerpApi {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    async fn fetch(&self, api_key: &str, query: &str, location: &str) -> Result<Vec<Event>> {
        let full_query = format!("{} events in {}", query, location);
        let response = base::api_client()
            .get(BASE_URL)
            .query(&[
                ("engine", "google_events"),
                ("q", full_query.as_str()),
                ("api_key", api_key),
                ("hl", "en"),
            ])
            .send()
            .await
            .context("serpapi request failed")?
            .error_for_status()
            .context("serpapi non-success status")?;
        let payload: SearchResponse = response.json().await.context("serpapi payload malformed")?;
        Ok(payload
            .events_results
            .into_iter()
            .map(|doc| normalize(doc, query, location))
            .collect())
    }
}

#[async_trait]
impl EventSource for SerpApi {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search(&self, query: &str, location: &str) -> Vec<Event> {
        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => {
                warn!(source = SOURCE, "SERPAPI_KEY not set, skipping");
                return Vec::new();
            }
        };
        match self.fetch(api_key, query, location).await {
            Ok(events) => {
                info!(source = SOURCE, count = events.len(), "events found");
                events
            }
            Err(err) => {
                warn!(source = SOURCE, error = %err, "search failed");
                Vec::new()
            }
        }
    }
}

fn normalize(doc: EventDoc, query: &str, location: &str) -> Event {
    let title = doc.title.unwrap_or_else(|| "Event".to_string());
    let description = doc.description.or(doc.snippet).unwrap_or_default();
    let category = base::detect_category(&format!("{} {}", query, title));
    let (raw_start, raw_end) = match doc.date {
        Some(date) => (date.start_date, date.end_date),
        None => (None, None),
    };
    let start = raw_start
        .as_deref()
        .map(base::parse_date_or_fallback)
        .unwrap_or_else(base::fallback_start);
    let end = raw_end.as_deref().and_then(base::parse_date).unwrap_or(start);
    let url = doc.link.unwrap_or_default();

    Event {
        id: base::scraped_id(SOURCE, &[&title, &url, location]),
        title,
        description,
        start_date: start,
        end_date: end,
        timezone: "UTC".to_string(),
        url,
        image_url: doc
            .thumbnail
            .unwrap_or_else(|| base::default_image(category).to_string()),
        venue: Venue {
            name: doc
                .venue
                .and_then(|venue| venue.name)
                .unwrap_or_else(|| "Venue TBA".to_string()),
            city: location.to_string(),
            ..Venue::default()
        },
        category,
        is_online: false,
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}
