//! Parses RSS/Atom bytes into a normalized in-memory representation.
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

pub fn parse(bytes: &[u8]) -> Result<Vec<RawItem>, String> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| format!("feed parse error: {e}"))?;

    let mut items = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let published = entry.published.or(entry.updated);
        items.push(RawItem {
            title: entry.title.map(|t| t.content),
            link: entry.links.first().map(|l| l.href.clone()),
            published,
        });
    }
    Ok(items)
}
