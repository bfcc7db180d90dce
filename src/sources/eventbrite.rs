use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Category, Event, Venue};

const BASE_URL: &str = "https://www.eventbrite.com";
const SOURCE: &str = "eventbrite";

static NEXT_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json">(.*?)</script>"#)
        .expect("next data regex")
});

#[derive(Debug, Deserialize)]
struct PageData {
    props: Option<PageProps>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(rename = "pageProps")]
    page_props: Option<SearchProps>,
}

#[derive(Debug, Deserialize)]
struct SearchProps {
    #[serde(rename = "searchData")]
    search_data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    events: Option<SearchResults>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<EventDoc>,
}

#[derive(Debug, Deserialize)]
struct EventDoc {
    id: String,
    name: String,
    summary: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    url: Option<String>,
    image: Option<ImageDoc>,
    primary_venue: Option<VenueDoc>,
    #[serde(default)]
    is_online_event: bool,
}

#[derive(Debug, Deserialize)]
struct ImageDoc {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VenueDoc {
    name: Option<String>,
    address: Option<AddressDoc>,
}

#[derive(Debug, Deserialize)]
struct AddressDoc {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

/// Eventbrite publishes its search results inside a `__NEXT_DATA__` JSON
/// island on the public search page, so no OAuth token is needed.
pub struct Eventbrite;

#[async_trait]
impl EventSource for Eventbrite {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search(&self, query: &str, location: &str) -> Vec<Event> {
        match self.fetch(query, location).await {
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

impl Eventbrite {
    async fn fetch(&self, query: &str, location: &str) -> Result<Vec<Event>> {
        let url = format!(
            "{}/d/{}/{}/",
            BASE_URL,
            slug(location),
            slug(query)
        );
        let html = base::fetch_html(&url).await?;
        parse_page(&html, query, location)
    }
}

fn slug(text: &str) -> String {
    text.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

pub(crate) fn parse_page(html: &str, query: &str, location: &str) -> Result<Vec<Event>> {
    let json = NEXT_DATA_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| anyhow!("no __NEXT_DATA__ island in page"))?;
    let page: PageData =
        serde_json::from_str(json.as_str()).context("malformed __NEXT_DATA__ payload")?;

    let results = page
        .props
        .and_then(|props| props.page_props)
        .and_then(|props| props.search_data)
        .and_then(|data| data.events)
        .map(|events| events.results)
        .unwrap_or_default();

    Ok(results
        .into_iter()
        .map(|doc| normalize(doc, query, location))
        .collect())
}

fn normalize(doc: EventDoc, query: &str, location: &str) -> Event {
    let category = map_category(query);
    let start = doc
        .start_date
        .as_deref()
        .and_then(base::parse_date)
        .unwrap_or_else(base::fallback_start);
    let end = doc
        .end_date
        .as_deref()
        .and_then(base::parse_date)
        .unwrap_or(start);
    let (venue_name, address) = match doc.primary_venue {
        Some(venue) => (venue.name, venue.address),
        None => (None, None),
    };
    let address = address.unwrap_or(AddressDoc {
        city: None,
        region: None,
        country: None,
    });

    Event {
        url: doc
            .url
            .unwrap_or_else(|| format!("{}/e/{}", BASE_URL, doc.id)),
        id: format!("{}-{}", SOURCE, doc.id),
        title: doc.name,
        description: doc.summary.unwrap_or_default(),
        start_date: start,
        end_date: end,
        timezone: "UTC".to_string(),
        image_url: doc
            .image
            .and_then(|image| image.url)
            .unwrap_or_else(|| base::default_image(category).to_string()),
        venue: Venue {
            name: venue_name.unwrap_or_else(|| "Online Event".to_string()),
            city: address.city.unwrap_or_else(|| location.to_string()),
            region: address.region.unwrap_or_default(),
            country: address.country.unwrap_or_default(),
            ..Venue::default()
        },
        category,
        is_online: doc.is_online_event,
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}

// Eventbrite's own taxonomy names cover two categories the generic keyword
// rules do not, so it maps the query itself.
fn map_category(query: &str) -> Category {
    let lower = query.to_lowercase();
    if lower.contains("health") || lower.contains("wellness") {
        Category::Health
    } else if lower.contains("community") {
        Category::Community
    } else {
        base::detect_category(&lower)
    }
}
