use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::models::Category;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared client for JSON APIs. 10s timeout, identifies itself honestly.
pub fn api_client() -> &'static Client {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("event-scout/0.1 (+https://github.com/event-scout)")
            .build()
            .expect("http client")
    });
    &CLIENT
}

/// Shared client for HTML pages. Longer timeout and a browser user agent,
/// since event sites tend to reject obvious bots.
pub fn page_client() -> &'static Client {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_UA)
            .build()
            .expect("http client")
    });
    &CLIENT
}

pub async fn fetch_html(url: &str) -> Result<String> {
    let response = page_client()
        .get(url)
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .send()
        .await
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .await
        .with_context(|| format!("unable to read response body for {url}"))
}

pub fn inner_text(element: scraper::ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_text(
    element: &scraper::ElementRef<'_>,
    selector: &scraper::Selector,
) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

static TITLE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[|›»]\s*.*$").expect("valid title suffix regex"));

/// Collapse whitespace and strip trailing "| Site Name" style suffixes that
/// search-result titles carry.
pub fn clean_title(title: &str) -> String {
    clean_text(&TITLE_SUFFIX_RE.replace(title, ""))
}

const EVENT_KEYWORDS: [&str; 19] = [
    "concert",
    "festival",
    "show",
    "performance",
    "live",
    "exhibition",
    "match",
    "game",
    "theatre",
    "theater",
    "event",
    "happening",
    "gig",
    "tour",
    "comedy",
    "screening",
    "premiere",
    "opening",
    "conference",
];

/// Keyword gate used by search-engine adapters to decide whether a result
/// plausibly describes an event at all.
pub fn is_event_like(title: &str, snippet: &str) -> bool {
    let text = format!("{} {}", title, snippet).to_lowercase();
    EVENT_KEYWORDS.iter().any(|kw| text.contains(kw))
}

// Ordered: theatre listings mention "show" and "musical", so they must be
// checked before the music rules.
static CATEGORY_RULES: Lazy<Vec<(Regex, Category)>> = Lazy::new(|| {
    let rules: [(&str, Category); 7] = [
        (
            r"theatre|theater|play|drama|musical|west end|broadway",
            Category::Theatre,
        ),
        (
            r"concert|music|band|singer|dj|festival|gig|tour|album",
            Category::Music,
        ),
        (
            r"sport|game|match|championship|league|tournament|football|basketball",
            Category::Sports,
        ),
        (
            r"exhibition|art|gallery|museum|painting|sculpture",
            Category::Arts,
        ),
        (r"film|movie|cinema|screening|premiere", Category::Film),
        (
            r"food|restaurant|culinary|tasting|chef",
            Category::FoodDrink,
        ),
        (
            r"tech|conference|summit|workshop|seminar",
            Category::Technology,
        ),
    ];
    rules
        .into_iter()
        .map(|(pattern, category)| {
            (
                Regex::new(pattern).expect("valid category regex"),
                category,
            )
        })
        .collect()
});

/// First matching keyword rule wins; unmatched text is Entertainment.
pub fn detect_category(text: &str) -> Category {
    let lower = text.to_lowercase();
    for (regex, category) in CATEGORY_RULES.iter() {
        if regex.is_match(&lower) {
            return *category;
        }
    }
    Category::Entertainment
}

const FALLBACK_IMAGE: &str =
    "https://images.unsplash.com/photo-1492684223066-81342ee5ff30?w=800&h=600&fit=crop";

pub fn default_image(category: Category) -> &'static str {
    match category {
        Category::Music => {
            "https://images.unsplash.com/photo-1501281668745-f7f57925c3b4?w=800&h=600&fit=crop"
        }
        Category::Sports => {
            "https://images.unsplash.com/photo-1461896836934-ffe607ba8211?w=800&h=600&fit=crop"
        }
        Category::Theatre => {
            "https://images.unsplash.com/photo-1507676184212-d03ab07a01bf?w=800&h=600&fit=crop"
        }
        Category::Arts => {
            "https://images.unsplash.com/photo-1531243269054-5ebf6f34081e?w=800&h=600&fit=crop"
        }
        Category::Film => {
            "https://images.unsplash.com/photo-1489599849927-2ee91cede3ba?w=800&h=600&fit=crop"
        }
        Category::FoodDrink => {
            "https://images.unsplash.com/photo-1555939594-58d7cb561ad1?w=800&h=600&fit=crop"
        }
        Category::Technology => {
            "https://images.unsplash.com/photo-1540575467063-178a50c2df87?w=800&h=600&fit=crop"
        }
        Category::Entertainment | Category::Health | Category::Community => FALLBACK_IMAGE,
    }
}

/// Substitute start for events whose date could not be parsed: a week out.
/// Keeps the record schema-valid at the cost of ordering precision.
pub fn fallback_start() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::days(7)
}

static DATE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{4}",
        r"(?i)(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}",
        r"\d{1,2}/\d{1,2}/\d{4}",
        r"\d{4}-\d{2}-\d{2}",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid date regex"))
    .collect()
});

/// Pull the first recognizable date expression out of free text.
pub fn find_date(text: &str) -> Option<String> {
    for regex in DATE_RES.iter() {
        if let Some(found) = regex.find(text) {
            return Some(found.as_str().to_string());
        }
    }
    None
}

/// Parse a date expression into a UTC instant, or fall back a week out.
/// Date-only expressions resolve to midnight UTC.
pub fn parse_date_or_fallback(input: &str) -> DateTime<Utc> {
    parse_date(input).unwrap_or_else(fallback_start)
}

pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let cleaned = clean_text(input).replace('.', "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(&clean_text(input)) {
        return Some(instant.with_timezone(&Utc));
    }
    // Bandsintown and SeatGeek both ship ISO datetimes without an offset,
    // interpreted as UTC ("2025-08-14T20:00:00").
    if let Ok(naive) = NaiveDateTime::parse_from_str(&clean_text(input), "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    let formats = [
        "%d %B %Y",
        "%d %b %Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
        "%m/%d/%Y",
        "%Y-%m-%d",
    ];
    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return midnight_utc(date);
        }
    }
    None
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

static VENUE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"at\s+([A-Z][a-zA-Z\s&'-]+?)(?:,|\.|\s+in\s|$)",
        r"(?i)venue:\s*([A-Z][a-zA-Z\s&'-]+)",
        r"(?i)location:\s*([A-Z][a-zA-Z\s&'-]+)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid venue regex"))
    .collect()
});

/// Pull a venue name out of free text ("… at Royal Albert Hall, …").
pub fn find_venue(text: &str) -> Option<String> {
    for regex in VENUE_RES.iter() {
        if let Some(caps) = regex.captures(text) {
            let name = clean_text(caps.get(1)?.as_str());
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

pub fn is_online_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("online") || lower.contains("virtual")
}

/// Stable source-prefixed id for events whose source assigns none:
/// sha256 over the identifying parts, truncated for readability.
pub fn scraped_id(source: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    for part in parts {
        hasher.update(b"|");
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", source, &digest[..16])
}

pub struct CityInfo {
    pub region: &'static str,
    pub country: &'static str,
    pub country_code: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

/// Small static gazetteer covering the cities the sources are wired for.
/// Unknown cities simply fall through to the per-field defaults.
pub fn city_info(city: &str) -> Option<&'static CityInfo> {
    static CITIES: [(&str, CityInfo); 8] = [
        (
            "London",
            CityInfo {
                region: "England",
                country: "United Kingdom",
                country_code: "GB",
                latitude: 51.5074,
                longitude: -0.1278,
            },
        ),
        (
            "Istanbul",
            CityInfo {
                region: "Marmara",
                country: "Turkey",
                country_code: "TR",
                latitude: 41.0082,
                longitude: 28.9784,
            },
        ),
        (
            "New York",
            CityInfo {
                region: "NY",
                country: "United States",
                country_code: "US",
                latitude: 40.7128,
                longitude: -74.0060,
            },
        ),
        (
            "Los Angeles",
            CityInfo {
                region: "CA",
                country: "United States",
                country_code: "US",
                latitude: 34.0522,
                longitude: -118.2437,
            },
        ),
        (
            "Paris",
            CityInfo {
                region: "Île-de-France",
                country: "France",
                country_code: "FR",
                latitude: 48.8566,
                longitude: 2.3522,
            },
        ),
        (
            "Berlin",
            CityInfo {
                region: "Berlin",
                country: "Germany",
                country_code: "DE",
                latitude: 52.5200,
                longitude: 13.4050,
            },
        ),
        (
            "Tokyo",
            CityInfo {
                region: "Kanto",
                country: "Japan",
                country_code: "JP",
                latitude: 35.6762,
                longitude: 139.6503,
            },
        ),
        (
            "Sydney",
            CityInfo {
                region: "NSW",
                country: "Australia",
                country_code: "AU",
                latitude: -33.8688,
                longitude: 151.2093,
            },
        ),
    ];

    CITIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(city))
        .map(|(_, info)| info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn theatre_beats_music_in_rule_order() {
        // "musical" contains music keywords too; theatre must win
        assert_eq!(detect_category("A West End musical show"), Category::Theatre);
        assert_eq!(detect_category("indie band gig"), Category::Music);
        assert_eq!(detect_category("gardening fair"), Category::Entertainment);
    }

    #[test]
    fn date_formats_all_resolve_to_same_day() {
        for input in ["1 Jun 2025", "Jun 1, 2025", "June 1, 2025", "6/1/2025", "2025-06-01"] {
            let parsed = parse_date(input).unwrap_or_else(|| panic!("parse {input}"));
            assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2025, 6, 1), "{input}");
        }
    }

    #[test]
    fn unparseable_date_falls_back_a_week_out() {
        let parsed = parse_date_or_fallback("next Tuesday probably");
        let days = (parsed - Utc::now()).num_days();
        assert!((6..=7).contains(&days));
    }

    #[test]
    fn rfc3339_keeps_the_time_component() {
        let parsed = parse_date("2025-06-01T20:00:00Z").expect("rfc3339");
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T20:00:00+00:00");
    }

    #[test]
    fn offsetless_iso_datetime_reads_as_utc() {
        let parsed = parse_date("2025-08-14T20:00:00").expect("naive iso");
        assert_eq!(parsed.to_rfc3339(), "2025-08-14T20:00:00+00:00");
    }

    #[test]
    fn finds_dates_inside_snippets() {
        assert_eq!(
            find_date("Live at the Roundhouse on 12 Mar 2025, doors 7pm").as_deref(),
            Some("12 Mar 2025")
        );
        assert_eq!(find_date("no dates here"), None);
    }

    #[test]
    fn finds_venue_names() {
        assert_eq!(
            find_venue("An evening with the quartet at Royal Albert Hall, London").as_deref(),
            Some("Royal Albert Hall")
        );
        assert_eq!(
            find_venue("Venue: The Troubadour").as_deref(),
            Some("The Troubadour")
        );
        assert_eq!(find_venue("somewhere nice"), None);
    }

    #[test]
    fn cleans_search_result_titles() {
        assert_eq!(
            clean_title("Jazz   Night | Eventbrite"),
            "Jazz Night"
        );
        assert_eq!(clean_title("Plain Title"), "Plain Title");
    }

    #[test]
    fn event_gate_needs_a_keyword() {
        assert!(is_event_like("Jazz Night", "live concert downtown"));
        assert!(!is_event_like("Cheap flights", "compare airline prices"));
    }

    #[test]
    fn scraped_ids_are_stable_and_prefixed() {
        let a = scraped_id("duckduckgo", &["Jazz Night", "2025-06-01"]);
        let b = scraped_id("duckduckgo", &["Jazz Night", "2025-06-01"]);
        let c = scraped_id("duckduckgo", &["Jazz Night", "2025-06-02"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("duckduckgo-"));
    }

    #[test]
    fn gazetteer_lookup_is_case_insensitive() {
        let info = city_info("london").expect("london");
        assert_eq!(info.country_code, "GB");
        assert!(city_info("Atlantis").is_none());
    }
}
