use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Category, Event, Venue};

const BASE_URL: &str = "https://api.seatgeek.com/2";
const SOURCE: &str = "seatgeek";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    events: Vec<EventDoc>,
}

#[derive(Debug, Deserialize)]
struct EventDoc {
    id: u64,
    title: Option<String>,
    short_title: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    datetime_utc: Option<String>,
    url: Option<String>,
    venue: Option<VenueDoc>,
    #[serde(default)]
    performers: Vec<PerformerDoc>,
    #[serde(default)]
    taxonomies: Vec<TaxonomyDoc>,
}

#[derive(Debug, Deserialize)]
struct VenueDoc {
    name: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    timezone: Option<String>,
    location: Option<LocationDoc>,
}

#[derive(Debug, Deserialize)]
struct LocationDoc {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PerformerDoc {
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyDoc {
    parent_id: Option<u64>,
    name: Option<String>,
}

/// SeatGeek events API. Authenticates with a client id only.
pub struct SeatGeek {
    client_id: Option<String>,
}

impl SeatGeek {
    pub fn new(client_id: Option<String>) -> Self {
        Self { client_id }
    }

    async fn fetch(&self, client_id: &str, query: &str, location: &str) -> Result<Vec<Event>> {
        let response = base::api_client()
            .get(format!("{}/events", BASE_URL))
            .query(&[
                ("client_id", client_id),
                ("q", query),
                ("venue.city", location),
                ("per_page", "50"),
                ("sort", "datetime_utc.asc"),
            ])
            .send()
            .await
            .context("seatgeek request failed")?
            .error_for_status()
            .context("seatgeek non-success status")?;
        let payload: SearchResponse = response.json().await.context("seatgeek payload malformed")?;
        Ok(payload
            .events
            .into_iter()
            .map(|doc| normalize(doc, location))
            .collect())
    }
}

#[async_trait]
impl EventSource for SeatGeek {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search(&self, query: &str, location: &str) -> Vec<Event> {
        let client_id = match self.client_id.as_deref() {
            Some(id) => id,
            None => {
                warn!(source = SOURCE, "SEATGEEK_CLIENT_ID not set, skipping");
                return Vec::new();
            }
        };
        match self.fetch(client_id, query, location).await {
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

fn normalize(doc: EventDoc, location: &str) -> Event {
    let category = map_category(doc.event_type.as_deref(), &doc.taxonomies);
    let title = doc
        .title
        .or(doc.short_title)
        .unwrap_or_else(|| "Untitled Event".to_string());
    let start = doc
        .datetime_utc
        .as_deref()
        .and_then(base::parse_date)
        .unwrap_or_else(base::fallback_start);
    let venue = doc.venue.unwrap_or(VenueDoc {
        name: None,
        city: None,
        state: None,
        country: None,
        timezone: None,
        location: None,
    });
    let venue_name = venue.name.unwrap_or_else(|| "Venue TBA".to_string());

    Event {
        id: format!("{}-{}", SOURCE, doc.id),
        description: format!(
            "{} at {}",
            doc.event_type.as_deref().unwrap_or("Event"),
            venue_name
        ),
        title,
        start_date: start,
        end_date: start,
        timezone: venue.timezone.unwrap_or_else(|| "UTC".to_string()),
        url: doc.url.unwrap_or_default(),
        image_url: doc
            .performers
            .into_iter()
            .find_map(|performer| performer.image)
            .unwrap_or_else(|| base::default_image(category).to_string()),
        venue: Venue {
            name: venue_name,
            city: venue.city.unwrap_or_else(|| location.to_string()),
            region: venue.state.unwrap_or_default(),
            country: venue.country.unwrap_or_default(),
            latitude: venue
                .location
                .as_ref()
                .and_then(|loc| loc.lat)
                .unwrap_or(0.0),
            longitude: venue
                .location
                .as_ref()
                .and_then(|loc| loc.lon)
                .unwrap_or(0.0),
        },
        category,
        is_online: false,
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}

fn map_category(event_type: Option<&str>, taxonomies: &[TaxonomyDoc]) -> Category {
    let event_type = event_type.unwrap_or_default().to_lowercase();
    if event_type.contains("concert") || event_type.contains("music") {
        return Category::Music;
    }
    if event_type.contains("sports") || event_type.contains("nfl") || event_type.contains("nba") {
        return Category::Sports;
    }
    if event_type.contains("theater") || event_type.contains("broadway") {
        return Category::Theatre;
    }

    // otherwise consult the root taxonomy
    let root = taxonomies
        .iter()
        .find(|taxonomy| taxonomy.parent_id.is_none())
        .and_then(|taxonomy| taxonomy.name.as_deref())
        .unwrap_or_default()
        .to_lowercase();
    if root.contains("concert") {
        Category::Music
    } else if root.contains("sports") {
        Category::Sports
    } else if root.contains("theater") {
        Category::Theatre
    } else {
        Category::Entertainment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "events": [
            {
                "id": 6100211,
                "title": "Arsenal vs Chelsea",
                "type": "soccer",
                "datetime_utc": "2025-09-20T16:30:00",
                "url": "https://seatgeek.com/e/6100211",
                "venue": {
                    "name": "Emirates Stadium",
                    "city": "London",
                    "state": "",
                    "country": "GB",
                    "timezone": "Europe/London",
                    "location": { "lat": 51.5549, "lon": -0.1084 }
                },
                "performers": [ { "image": "https://img.example.com/arsenal.jpg" } ],
                "taxonomies": [ { "parent_id": null, "name": "sports" } ]
            },
            {
                "id": 42,
                "short_title": "Broadway Revue",
                "type": "broadway_tickets_national",
                "taxonomies": [ { "parent_id": null, "name": "theater" } ]
            }
        ]
    }"#;

    #[test]
    fn normalizes_seatgeek_payload() {
        let payload: SearchResponse = serde_json::from_str(SAMPLE_JSON).expect("parse json");
        let events: Vec<Event> = payload
            .events
            .into_iter()
            .map(|doc| normalize(doc, "London"))
            .collect();

        let match_event = &events[0];
        assert_eq!(match_event.id, "seatgeek-6100211");
        assert_eq!(match_event.category, Category::Sports);
        assert_eq!(match_event.timezone, "Europe/London");
        assert_eq!(match_event.image_url, "https://img.example.com/arsenal.jpg");
        assert_eq!(match_event.start_date.to_rfc3339(), "2025-09-20T16:30:00+00:00");
        assert!((match_event.venue.latitude - 51.5549).abs() < 1e-9);

        let revue = &events[1];
        assert_eq!(revue.title, "Broadway Revue");
        assert_eq!(revue.category, Category::Theatre);
        assert_eq!(revue.venue.name, "Venue TBA");
        assert_eq!(revue.venue.city, "London");
    }

    #[test]
    fn taxonomy_root_decides_when_type_is_opaque() {
        let taxonomies = vec![TaxonomyDoc {
            parent_id: None,
            name: Some("concerts".to_string()),
        }];
        assert_eq!(map_category(Some("event"), &taxonomies), Category::Music);
        assert_eq!(map_category(Some("event"), &[]), Category::Entertainment);
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let source = SeatGeek::new(None);
        assert!(source.search("jazz", "London").await.is_empty());
    }
}
