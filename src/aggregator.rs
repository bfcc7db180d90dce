use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::Event;
use crate::sources::EventSource;

/// Fan out to every configured source concurrently, join all of them, then
/// merge. Nothing here can fail: a source that errors or panics contributes
/// an empty list. The merged order is registry priority first, then each
/// source's own result order, and the first occurrence of a dedup key wins.
pub async fn aggregate(
    query: &str,
    location: &str,
    sources: &[Arc<dyn EventSource>],
) -> Vec<Event> {
    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            let query = query.to_string();
            let location = location.to_string();
            tokio::spawn(async move {
                let events = source.search(&query, &location).await;
                (source.name(), events)
            })
        })
        .collect();

    // Join in dispatch order so concatenation keeps registry priority, even
    // though the tasks themselves finish in whatever order the network allows.
    let mut merged = Vec::new();
    for handle in handles {
        match handle.await {
            Ok((name, mut events)) => {
                debug!(source = name, count = events.len(), "source joined");
                merged.append(&mut events);
            }
            Err(err) => {
                warn!(error = %err, "source task panicked, dropping its contribution");
            }
        }
    }

    dedupe(merged)
}

/// Keep the first occurrence of each dedup key, preserving order otherwise.
fn dedupe(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.dedup_key()))
        .collect()
}
