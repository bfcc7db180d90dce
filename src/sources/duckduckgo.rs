use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{info, warn};

use super::base;
use super::EventSource;
use crate::models::{Event, Venue};

const BASE_URL: &str = "https://html.duckduckgo.com/html/";
const SOURCE: &str = "duckduckgo";
const MAX_RESULTS: usize = 20;

static RESULT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.result").expect("ddg result selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("ddg link selector"));
static SNIPPET_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__snippet").expect("ddg snippet selector"));

/// Search-engine adapter: scrapes DuckDuckGo's HTML results page and keeps
/// whatever looks like an event listing. Zero credentials, best-effort data.
pub struct DuckDuckGo;

#[async_trait]
impl EventSource for DuckDuckGo {
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

impl DuckDuckGo {
    async fn fetch(&self, query: &str, location: &str) -> Result<Vec<Event>> {
        let full_query = format!("{} events in {}", query, location);
        let response = base::page_client()
            .post(BASE_URL)
            .form(&[("q", full_query.as_str())])
            .send()
            .await
            .context("duckduckgo request failed")?
            .error_for_status()
            .context("duckduckgo non-success status")?;
        let html = response.text().await.context("duckduckgo body unreadable")?;
        Ok(parse_document(&html, query, location))
    }
}

pub(crate) fn parse_document(html: &str, query: &str, location: &str) -> Vec<Event> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();

    for result in document.select(&RESULT_SELECTOR) {
        if events.len() >= MAX_RESULTS {
            break;
        }

        let link = match result.select(&LINK_SELECTOR).next() {
            Some(node) => node,
            None => continue,
        };
        let title = base::clean_title(&link.text().collect::<Vec<_>>().join(" "));
        let url = link.value().attr("href").unwrap_or_default().to_string();
        let snippet = result
            .select(&SNIPPET_SELECTOR)
            .next()
            .map(|node| base::clean_text(&node.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        if title.is_empty() || !base::is_event_like(&title, &snippet) {
            continue;
        }

        events.push(extract_event(&title, &snippet, &url, query, location));
    }

    events
}

fn extract_event(title: &str, snippet: &str, url: &str, query: &str, location: &str) -> Event {
    let start = base::find_date(snippet)
        .map(|raw| base::parse_date_or_fallback(&raw))
        .unwrap_or_else(base::fallback_start);
    let category = base::detect_category(&format!("{} {} {}", query, title, snippet));

    Event {
        id: base::scraped_id(SOURCE, &[title, url, snippet]),
        title: title.to_string(),
        description: snippet.chars().take(500).collect(),
        start_date: start,
        end_date: start,
        timezone: "UTC".to_string(),
        url: url.to_string(),
        image_url: base::default_image(category).to_string(),
        venue: Venue {
            name: base::find_venue(snippet).unwrap_or_else(|| "Venue TBA".to_string()),
            city: location.to_string(),
            ..Venue::default()
        },
        category,
        is_online: base::is_online_text(snippet),
        source: SOURCE.to_string(),
        scraped_at: Utc::now(),
    }
}
