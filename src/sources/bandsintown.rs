use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Category, Event, Venue};

const BASE_URL: &str = "https://rest.bandsintown.com";
const SOURCE: &str = "bandsintown";
const SEARCH_RADIUS_KM: &str = "50";

#[derive(Debug, Deserialize)]
struct EventDoc {
    id: serde_json::Value, // numeric in some responses, string in others
    datetime: Option<String>,
    url: Option<String>,
    description: Option<String>,
    #[serde(default)]
    lineup: Vec<String>,
    artist: Option<ArtistDoc>,
    venue: VenueDoc,
}

#[derive(Debug, Deserialize)]
struct ArtistDoc {
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VenueDoc {
    name: String,
    city: Option<String>,
    region: Option<String>,
    state_province: Option<String>,
    country: Option<String>,
    timezone: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

/// Bandsintown public API. Uses a plain app identifier rather than a secret,
/// so it is always on. Location search needs coordinates, which come from the
/// static gazetteer; it also offers a dedicated artist tour-date lookup.
pub struct Bandsintown {
    app_id: String,
}

impl Bandsintown {
    pub fn new(app_id: String) -> Self {
        Self { app_id }
    }

    /// Tour dates for one artist, independent of location.
    pub async fn search_by_artist(&self, artist: &str) -> Vec<Event> {
        match self.fetch_artist(artist).await {
            Ok(events) => {
                info!(source = SOURCE, artist, count = events.len(), "events found");
                events
            }
            Err(err) => {
                warn!(source = SOURCE, artist, error = %err, "artist search failed");
                Vec::new()
            }
        }
    }

    async fn fetch_artist(&self, artist: &str) -> Result<Vec<Event>> {
        let encoded: String = artist
            .trim()
            .chars()
            .map(|ch| if ch == '/' { ' ' } else { ch })
            .collect();
        let response = base::api_client()
            .get(format!("{}/artists/{}/events", BASE_URL, encoded))
            .query(&[("app_id", self.app_id.as_str())])
            .send()
            .await
            .context("bandsintown request failed")?
            .error_for_status()
            .context("bandsintown non-success status")?;
        let docs: Vec<EventDoc> = response
            .json()
            .await
            .context("bandsintown payload malformed")?;
        Ok(docs
            .into_iter()
            .map(|doc| normalize(doc, Some(artist)))
            .collect())
    }

    async fn fetch_location(&self, location: &str) -> Result<Vec<Event>> {
        let info = base::city_info(location)
            .with_context(|| format!("no coordinates known for {location}"))?;
        let response = base::api_client()
            .get(format!("{}/events/search", BASE_URL))
            .query(&[
                ("app_id", self.app_id.as_str()),
                (
                    "location",
                    &format!("{},{}", info.latitude, info.longitude),
                ),
                ("radius", SEARCH_RADIUS_KM),
            ])
            .send()
            .await
            .context("bandsintown request failed")?
            .error_for_status()
            .context("bandsintown non-success status")?;
        let docs: Vec<EventDoc> = response
            .json()
            .await
            .context("bandsintown payload malformed")?;
        Ok(docs.into_iter().map(|doc| normalize(doc, None)).collect())
    }
}

#[async_trait]
impl EventSource for Bandsintown {
    fn name(&self) -> &'static str {
        SOURCE
    }

    // Location-driven: concerts within a radius of the city, query unused.
    async fn search(&self, _query: &str, location: &str) -> Vec<Event> {
        match self.fetch_location(location).await {
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

fn normalize(doc: EventDoc, artist: Option<&str>) -> Event {
    let start = doc
        .datetime
        .as_deref()
        .and_then(base::parse_date)
        .unwrap_or_else(base::fallback_start);
    let lineup = if doc.lineup.is_empty() {
        artist.map(str::to_string).unwrap_or_else(|| "Various Artists".to_string())
    } else {
        doc.lineup.join(", ")
    };
    let provider_id = match &doc.id {
        serde_json::Value::String(id) => id.clone(),
        other => other.to_string(),
    };

    Event {
        id: format!("{}-{}", SOURCE, provider_id),
        title: format!("{} at {}", lineup, doc.venue.name),
        description: doc
            .description
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| format!("{} live performance", lineup)),
        start_date: start,
        end_date: start,
        timezone: doc
            .venue
            .timezone
            .unwrap_or_else(|| "UTC".to_string()),
        url: doc.url.unwrap_or_default(),
        image_url: doc
            .artist
            .and_then(|artist| artist.image_url)
            .unwrap_or_else(|| base::default_image(Category::Music).to_string()),
        venue: Venue {
            name: doc.venue.name,
            city: doc.venue.city.unwrap_or_default(),
            region: doc
                .venue
                .region
                .or(doc.venue.state_province)
                .unwrap_or_default(),
            country: doc.venue.country.unwrap_or_default(),
            latitude: doc
                .venue
                .latitude
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0),
            longitude: doc
                .venue
                .longitude
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0),
        },
        category: Category::Music,
        is_online: false,
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"[
        {
            "id": 104569210,
            "datetime": "2025-08-14T20:00:00",
            "url": "https://www.bandsintown.com/e/104569210",
            "lineup": ["Khruangbin", "Mild High Club"],
            "artist": { "image_url": "https://img.example.com/khruangbin.jpg" },
            "venue": {
                "name": "Alexandra Palace",
                "city": "London",
                "region": "England",
                "country": "United Kingdom",
                "timezone": "Europe/London",
                "latitude": "51.5942",
                "longitude": "-0.1278"
            }
        },
        {
            "id": "abc-1",
            "venue": { "name": "No Date Hall" }
        }
    ]"#;

    #[test]
    fn normalizes_lineup_and_venue() {
        let docs: Vec<EventDoc> = serde_json::from_str(SAMPLE_JSON).expect("parse json");
        let events: Vec<Event> = docs.into_iter().map(|doc| normalize(doc, None)).collect();
        assert_eq!(events.len(), 2);

        let gig = &events[0];
        assert_eq!(gig.id, "bandsintown-104569210");
        assert_eq!(gig.title, "Khruangbin, Mild High Club at Alexandra Palace");
        assert_eq!(gig.category, Category::Music);
        assert_eq!(gig.timezone, "Europe/London");
        assert!((gig.venue.latitude - 51.5942).abs() < 1e-9);
        // the offset-less datetime must survive as the given UTC instant
        assert_eq!(gig.start_date.to_rfc3339(), "2025-08-14T20:00:00+00:00");
    }

    #[test]
    fn undated_entry_gets_the_fallback_date() {
        let docs: Vec<EventDoc> = serde_json::from_str(SAMPLE_JSON).expect("parse json");
        let undated = normalize(docs.into_iter().nth(1).expect("second doc"), None);
        assert_eq!(undated.id, "bandsintown-abc-1");
        let days = (undated.start_date - Utc::now()).num_days();
        assert!((6..=7).contains(&days));
    }

    #[test]
    fn artist_name_fills_an_empty_lineup() {
        let doc: EventDoc = serde_json::from_str(
            r#"{ "id": 7, "datetime": "2025-08-14T20:00:00", "venue": { "name": "The Forum" } }"#,
        )
        .expect("parse doc");
        let event = normalize(doc, Some("Elbow"));
        assert_eq!(event.title, "Elbow at The Forum");
        assert_eq!(event.description, "Elbow live performance");
        assert_eq!(event.venue.latitude, 0.0);
    }

    #[tokio::test]
    async fn unknown_city_yields_empty_not_error() {
        let source = Bandsintown::new("event-scout".to_string());
        assert!(source.search("jazz", "Atlantis").await.is_empty());
    }
}
