use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Category, Event, Venue};

const BASE_URL: &str = "https://www.songkick.com";
const SOURCE: &str = "songkick";
const MAX_RESULTS: usize = 20;

static EVENT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-listings li.event").expect("songkick event selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.event-link").expect("songkick link selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-link strong").expect("songkick title selector"));
static ARTISTS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-link .artists").expect("songkick artists selector"));
static VENUE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".venue-name").expect("songkick venue selector"));
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time").expect("songkick time selector"));

/// Songkick metro-area concert listings. Location-driven: the free-text
/// query plays no part, every listing for the city's metro page comes back.
pub struct Songkick;

#[async_trait]
impl EventSource for Songkick {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search(&self, _query: &str, location: &str) -> Vec<Event> {
        match self.fetch(location).await {
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

impl Songkick {
    async fn fetch(&self, location: &str) -> Result<Vec<Event>> {
        let url = format!("{}{}", BASE_URL, metro_area_path(location));
        let html = base::fetch_html(&url).await?;
        Ok(parse_document(&html, location))
    }
}

// Songkick keys listings by metro-area path, not by free-text city.
fn metro_area_path(location: &str) -> &'static str {
    match base::city_info(location).map(|info| info.country_code) {
        Some("TR") => "/metro-areas/32463-turkey-istanbul",
        Some("US") if location.eq_ignore_ascii_case("Los Angeles") => {
            "/metro-areas/17835-us-los-angeles"
        }
        Some("US") => "/metro-areas/7644-us-new-york",
        Some("FR") => "/metro-areas/28909-france-paris",
        Some("DE") => "/metro-areas/28443-germany-berlin",
        _ => "/metro-areas/24426-uk-london",
    }
}

pub(crate) fn parse_document(html: &str, location: &str) -> Vec<Event> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();

    for item in document.select(&EVENT_SELECTOR) {
        if events.len() >= MAX_RESULTS {
            break;
        }

        let title = base::first_text(&item, &TITLE_SELECTOR);
        let artists = base::first_text(&item, &ARTISTS_SELECTOR);
        let venue = base::first_text(&item, &VENUE_SELECTOR);
        let datetime = item
            .select(&TIME_SELECTOR)
            .next()
            .and_then(|node| node.value().attr("datetime"))
            .map(str::to_string);

        let title = match artists.or(title) {
            Some(value) => value,
            None => continue,
        };
        let start = match datetime.as_deref().and_then(base::parse_date) {
            Some(value) => value,
            None => continue,
        };

        let event_url = item
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|node| node.value().attr("href"))
            .map(|href| {
                if href.starts_with("http") {
                    href.to_string()
                } else {
                    format!("{}{}", BASE_URL, href)
                }
            })
            .unwrap_or_default();
        let venue_name = venue.unwrap_or_else(|| "Venue TBA".to_string());

        events.push(Event {
            id: base::scraped_id(SOURCE, &[&title, &venue_name, &start.to_rfc3339()]),
            title: title.clone(),
            description: format!("Concert at {}", venue_name),
            start_date: start,
            end_date: start,
            timezone: "UTC".to_string(),
            url: event_url,
            image_url: base::default_image(Category::Music).to_string(),
            venue: Venue {
                name: venue_name,
                city: location.to_string(),
                ..Venue::default()
            },
            category: Category::Music,
            is_online: false,
            source: SOURCE.to_string(),
            scraped_at: Utc::now(),
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
    <ul class="event-listings">
        <li class="event">
            <a class="event-link" href="/concerts/41-pup-at-electric-ballroom">
                <strong>PUP</strong>
                <span class="artists">PUP with Chase Petra</span>
            </a>
            <span class="venue-name">Electric Ballroom</span>
            <time datetime="2025-10-08T19:00:00Z"></time>
        </li>
        <li class="event">
            <a class="event-link" href="https://www.songkick.com/concerts/42">
                <strong>Desert Dwellers</strong>
            </a>
            <span class="venue-name">Roundhouse</span>
            <time datetime="2025-10-17"></time>
        </li>
        <li class="event">
            <a class="event-link" href="/concerts/43"><strong>No Date Band</strong></a>
            <span class="venue-name">Somewhere</span>
        </li>
    </ul>
    "#;

    #[test]
    fn parses_metro_listing() {
        let events = parse_document(SAMPLE_HTML, "London");
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.title, "PUP with Chase Petra");
        assert_eq!(first.venue.name, "Electric Ballroom");
        assert_eq!(first.category, Category::Music);
        assert_eq!(
            first.url,
            "https://www.songkick.com/concerts/41-pup-at-electric-ballroom"
        );
        assert_eq!(first.start_date.to_rfc3339(), "2025-10-08T19:00:00+00:00");

        // second entry has no artists span, falls back to the strong title
        assert_eq!(events[1].title, "Desert Dwellers");
        assert_eq!(events[1].url, "https://www.songkick.com/concerts/42");
    }

    #[test]
    fn entries_without_a_date_are_skipped() {
        let events = parse_document(SAMPLE_HTML, "London");
        assert!(events.iter().all(|event| event.title != "No Date Band"));
    }

    #[test]
    fn unknown_cities_fall_back_to_london_metro() {
        assert_eq!(metro_area_path("Atlantis"), "/metro-areas/24426-uk-london");
        assert_eq!(metro_area_path("Paris"), "/metro-areas/28909-france-paris");
        assert_eq!(
            metro_area_path("Los Angeles"),
            "/metro-areas/17835-us-los-angeles"
        );
    }
}
