use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Category, Event, Venue};

const BASE_URL: &str = "https://api.predicthq.com/v1";
const SOURCE: &str = "predicthq";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<EventDoc>,
}

#[derive(Debug, Deserialize)]
struct EventDoc {
    id: String,
    title: String,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
    timezone: Option<String>,
    category: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    country: Option<String>,
    // GeoJSON order: [longitude, latitude]
    location: Option<Vec<f64>>,
    #[serde(default)]
    entities: Vec<EntityDoc>,
    phq_attendance: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EntityDoc {
    name: Option<String>,
    formatted_address: Option<String>,
}

/// PredictHQ events API, bearer-token authenticated.
pub struct PredictHq {
    api_key: Option<String>,
}

impl PredictHq {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    async fn fetch(&self, api_key: &str, query: &str, location: &str) -> Result<Vec<Event>> {
        let response = base::api_client()
            .get(format!("{}/events/", BASE_URL))
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("place.scope", location),
                ("limit", "50"),
                ("sort", "start"),
            ])
            .send()
            .await
            .context("predicthq request failed")?
            .error_for_status()
            .context("predicthq non-success status")?;
        let payload: SearchResponse =
            response.json().await.context("predicthq payload malformed")?;
        Ok(payload
            .results
            .into_iter()
            .map(|doc| normalize(doc, location))
            .collect())
    }
}

#[async_trait]
impl EventSource for PredictHq {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search(&self, query: &str, location: &str) -> Vec<Event> {
        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => {
                warn!(source = SOURCE, "PREDICTHQ_API_KEY not set, skipping");
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

fn normalize(doc: EventDoc, location: &str) -> Event {
    let category = map_category(doc.category.as_deref(), &doc.labels);
    let start = doc
        .start
        .as_deref()
        .and_then(base::parse_date)
        .unwrap_or_else(base::fallback_start);
    let end = doc.end.as_deref().and_then(base::parse_date).unwrap_or(start);
    let entity = doc.entities.into_iter().next();
    let (latitude, longitude) = match doc.location.as_deref() {
        Some([lon, lat, ..]) => (*lat, *lon),
        _ => (0.0, 0.0),
    };

    Event {
        id: format!("{}-{}", SOURCE, doc.id),
        description: doc
            .description
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| format!("{} in {}", doc.title, location)),
        title: doc.title,
        start_date: start,
        end_date: end,
        timezone: doc.timezone.unwrap_or_else(|| "UTC".to_string()),
        url: entity
            .as_ref()
            .and_then(|entity| entity.formatted_address.clone())
            .unwrap_or_default(),
        image_url: base::default_image(category).to_string(),
        venue: Venue {
            name: entity
                .and_then(|entity| entity.name)
                .unwrap_or_else(|| "Venue TBA".to_string()),
            city: location.to_string(),
            country: doc.country.unwrap_or_default(),
            latitude,
            longitude,
            ..Venue::default()
        },
        category,
        is_online: doc.phq_attendance == Some(0),
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}

fn map_category(category: Option<&str>, labels: &[String]) -> Category {
    let category = category.unwrap_or_default().to_lowercase();
    let labels = labels.join(" ").to_lowercase();

    if category.contains("concerts") || category.contains("music") || labels.contains("concert") {
        Category::Music
    } else if category.contains("sports") {
        Category::Sports
    } else if category.contains("performing-arts") || category.contains("theatre") {
        Category::Theatre
    } else if category.contains("conferences") {
        Category::Technology
    } else if category.contains("festivals") {
        Category::Music
    } else if category.contains("community") {
        Category::Community
    } else {
        Category::Entertainment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "results": [
            {
                "id": "z1psvA5Fe3Cy",
                "title": "Lumineers at the Dome",
                "description": "Folk rock night",
                "start": "2025-09-12T19:00:00Z",
                "end": "2025-09-12T23:00:00Z",
                "timezone": "Europe/London",
                "category": "concerts",
                "labels": ["concert", "music"],
                "country": "GB",
                "location": [-0.1278, 51.5074],
                "entities": [
                    { "name": "Millennium Dome", "formatted_address": "Peninsula Square, London" }
                ],
                "phq_attendance": 20000
            },
            {
                "id": "stream1",
                "title": "Global Dev Summit",
                "category": "conferences",
                "phq_attendance": 0
            }
        ]
    }"#;

    #[test]
    fn normalizes_predicthq_payload() {
        let payload: SearchResponse = serde_json::from_str(SAMPLE_JSON).expect("parse json");
        let events: Vec<Event> = payload
            .results
            .into_iter()
            .map(|doc| normalize(doc, "London"))
            .collect();

        let gig = &events[0];
        assert_eq!(gig.id, "predicthq-z1psvA5Fe3Cy");
        assert_eq!(gig.category, Category::Music);
        assert_eq!(gig.venue.name, "Millennium Dome");
        // GeoJSON pair arrives lon-first and must be swapped
        assert!((gig.venue.latitude - 51.5074).abs() < 1e-9);
        assert!((gig.venue.longitude + 0.1278).abs() < 1e-9);
        assert!(!gig.is_online);
        assert_eq!(gig.end_date.to_rfc3339(), "2025-09-12T23:00:00+00:00");
    }

    #[test]
    fn zero_attendance_means_online() {
        let payload: SearchResponse = serde_json::from_str(SAMPLE_JSON).expect("parse json");
        let events: Vec<Event> = payload
            .results
            .into_iter()
            .map(|doc| normalize(doc, "London"))
            .collect();
        let summit = &events[1];
        assert!(summit.is_online);
        assert_eq!(summit.category, Category::Technology);
        assert_eq!(summit.venue.name, "Venue TBA");
        assert_eq!(summit.venue.latitude, 0.0);
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let source = PredictHq::new(None);
        assert!(source.search("jazz", "London").await.is_empty());
    }
}
