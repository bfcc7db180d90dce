use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Music,
    Sports,
    Theatre,
    Arts,
    Film,
    #[serde(rename = "Food & Drink")]
    FoodDrink,
    Technology,
    Entertainment,
    Health,
    Community,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Venue {
    pub name: String,
    pub city: String,
    pub region: String,
    pub country: String,
    // 0.0/0.0 means "unknown location", not a real coordinate
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String, // source-prefixed: "ticketmaster-K8vZ…" or a stable hash
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub timezone: String,
    pub url: String,
    pub image_url: String,
    pub venue: Venue,
    pub category: Category,
    pub is_online: bool,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl Event {
    /// Identity key for cross-source deduplication: lowercased trimmed title
    /// plus the start day. Two events sharing a key are the same real-world
    /// event regardless of which source produced them.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}",
            self.title.trim().to_lowercase(),
            self.start_date.format("%Y-%m-%d")
        )
    }
}
