use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Category, Event, Venue};

const BASE_URL: &str = "https://app.ticketmaster.com/discovery/v2";
const SOURCE: &str = "ticketmaster";
const PAGE_SIZE: &str = "50";

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    events: Vec<EventDoc>,
}

#[derive(Debug, Deserialize)]
struct EventDoc {
    id: String,
    name: String,
    info: Option<String>,
    #[serde(rename = "pleaseNote")]
    please_note: Option<String>,
    url: Option<String>,
    dates: Option<DatesDoc>,
    #[serde(default)]
    images: Vec<ImageDoc>,
    #[serde(default)]
    classifications: Vec<ClassificationDoc>,
    #[serde(rename = "_embedded")]
    embedded: Option<EventEmbedded>,
}

#[derive(Debug, Deserialize)]
struct DatesDoc {
    start: Option<DateDoc>,
    end: Option<DateDoc>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateDoc {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    #[serde(rename = "localDate")]
    local_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageDoc {
    url: Option<String>,
    #[serde(default)]
    width: u32,
}

#[derive(Debug, Deserialize)]
struct ClassificationDoc {
    segment: Option<NamedDoc>,
    genre: Option<NamedDoc>,
}

#[derive(Debug, Deserialize)]
struct NamedDoc {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEmbedded {
    #[serde(default)]
    venues: Vec<VenueDoc>,
}

#[derive(Debug, Deserialize)]
struct VenueDoc {
    name: Option<String>,
    city: Option<NamedDoc>,
    state: Option<NamedDoc>,
    country: Option<NamedDoc>,
    location: Option<LocationDoc>,
}

#[derive(Debug, Deserialize)]
struct LocationDoc {
    latitude: Option<String>,
    longitude: Option<String>,
}

/// Ticketmaster Discovery API. Needs an API key; without one it logs a
/// warning and contributes nothing.
pub struct Ticketmaster {
    api_key: Option<String>,
}

impl Ticketmaster {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    async fn fetch(&self, api_key: &str, query: &str, location: &str) -> Result<Vec<Event>> {
        let country_code = base::city_info(location)
            .map(|info| info.country_code)
            .unwrap_or("GB");
        let response = base::api_client()
            .get(format!("{}/events.json", BASE_URL))
            .query(&[
                ("apikey", api_key),
                ("keyword", query),
                ("city", location),
                ("countryCode", country_code),
                ("size", PAGE_SIZE),
                ("sort", "date,asc"),
            ])
            .send()
            .await
            .context("ticketmaster request failed")?
            .error_for_status()
            .context("ticketmaster non-success status")?;
        let payload: DiscoveryResponse = response
            .json()
            .await
            .context("ticketmaster payload malformed")?;
        Ok(normalize_payload(payload, location))
    }
}

#[async_trait]
impl EventSource for Ticketmaster {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search(&self, query: &str, location: &str) -> Vec<Event> {
        let api_key = match self.api_key.as_deref() {
            Some(key) => key,
            None => {
                warn!(source = SOURCE, "TICKETMASTER_API_KEY not set, skipping");
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

fn normalize_payload(payload: DiscoveryResponse, location: &str) -> Vec<Event> {
    payload
        .embedded
        .map(|embedded| embedded.events)
        .unwrap_or_default()
        .into_iter()
        .map(|doc| normalize(doc, location))
        .collect()
}

fn normalize(doc: EventDoc, location: &str) -> Event {
    let category = map_category(doc.classifications.first());
    let start = doc
        .dates
        .as_ref()
        .and_then(|dates| dates.start.as_ref())
        .and_then(|date| {
            date.date_time
                .as_deref()
                .or(date.local_date.as_deref())
                .and_then(base::parse_date)
        })
        .unwrap_or_else(base::fallback_start);
    let end = doc
        .dates
        .as_ref()
        .and_then(|dates| dates.end.as_ref())
        .and_then(|date| date.date_time.as_deref().and_then(base::parse_date))
        .unwrap_or(start);
    let timezone = doc
        .dates
        .as_ref()
        .and_then(|dates| dates.timezone.clone())
        .unwrap_or_else(|| "UTC".to_string());
    // prefer a reasonably sized image over whatever comes first
    let image_url = doc
        .images
        .iter()
        .find(|image| image.width > 500)
        .or_else(|| doc.images.first())
        .and_then(|image| image.url.clone())
        .unwrap_or_else(|| base::default_image(category).to_string());
    let venue = doc
        .embedded
        .map(|embedded| embedded.venues)
        .unwrap_or_default()
        .into_iter()
        .next();

    Event {
        id: format!("{}-{}", SOURCE, doc.id),
        description: doc
            .info
            .or(doc.please_note)
            .unwrap_or_else(|| format!("{} in {}", doc.name, location)),
        title: doc.name,
        start_date: start,
        end_date: end,
        timezone,
        url: doc.url.unwrap_or_default(),
        image_url,
        venue: normalize_venue(venue, location),
        category,
        is_online: false,
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}

fn normalize_venue(doc: Option<VenueDoc>, location: &str) -> Venue {
    let doc = match doc {
        Some(value) => value,
        None => {
            return Venue {
                name: "Venue TBA".to_string(),
                city: location.to_string(),
                ..Venue::default()
            }
        }
    };
    let coords = doc.location.as_ref();
    Venue {
        name: doc.name.unwrap_or_else(|| "Venue TBA".to_string()),
        city: doc
            .city
            .and_then(|city| city.name)
            .unwrap_or_else(|| location.to_string()),
        region: doc.state.and_then(|state| state.name).unwrap_or_default(),
        country: doc
            .country
            .and_then(|country| country.name)
            .unwrap_or_default(),
        latitude: coords
            .and_then(|c| c.latitude.as_deref())
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0.0),
        longitude: coords
            .and_then(|c| c.longitude.as_deref())
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0.0),
    }
}

fn map_category(classification: Option<&ClassificationDoc>) -> Category {
    let classification = match classification {
        Some(value) => value,
        None => return Category::Entertainment,
    };
    let segment = named_lower(&classification.segment);
    let genre = named_lower(&classification.genre);

    if segment.contains("music") || genre.contains("music") {
        Category::Music
    } else if segment.contains("sports") || genre.contains("sports") {
        Category::Sports
    } else if segment.contains("arts") || segment.contains("theatre") {
        Category::Theatre
    } else if segment.contains("film") {
        Category::Film
    } else {
        Category::Entertainment
    }
}

fn named_lower(doc: &Option<NamedDoc>) -> String {
    doc.as_ref()
        .and_then(|named| named.name.as_deref())
        .unwrap_or_default()
        .to_lowercase()
}
