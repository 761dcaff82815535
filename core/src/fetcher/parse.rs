//! Feed body parsing. RSS 2.0, RSS 1.0 (RDF) and Atom go through quick-xml;
//! JSON APIs are mapped field by field after a [`json_path`] lookup.

use chrono::{DateTime, NaiveDate, Utc};
use lookout_common::config::{FeedKind, FeedSource};
use lookout_common::error::FetchError;
use lookout_common::models::FeedItem;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use super::json_path;

const FEED_ROOTS: [&str; 3] = ["rss", "feed", "RDF"];

pub fn parse_feed(source: &FeedSource, body: &str) -> Result<Vec<FeedItem>, FetchError> {
    match source.kind {
        FeedKind::Rss => parse_xml_feed(body, &source.name),
        FeedKind::Json => parse_json_feed(body, source.json_path.as_deref().unwrap_or(""), &source.name),
    }
}

#[derive(Default)]
struct Draft {
    title: String,
    link: String,
    date: String,
    summary: String,
}

impl Draft {
    fn finish(self, source_name: &str) -> Option<FeedItem> {
        let title = self.title.trim();
        let link = self.link.trim();
        if title.is_empty() && link.is_empty() {
            return None;
        }
        let mut item = FeedItem::new(if title.is_empty() { link } else { title }, link, source_name);
        item.published_at = parse_date(&self.date);
        item.summary = self.summary.trim().to_string();
        Some(item)
    }

    fn field(&mut self, tag: &str) -> Option<&mut String> {
        match tag {
            "title" => Some(&mut self.title),
            "link" => Some(&mut self.link),
            "pubDate" | "published" | "updated" | "date" => Some(&mut self.date),
            "description" | "summary" => Some(&mut self.summary),
            _ => None,
        }
    }

    /// Atom carries the link in `href`; the `alternate` relation wins.
    fn take_href(&mut self, element: &BytesStart) {
        let href = attribute(element, "href");
        let rel = attribute(element, "rel");
        if let Some(href) = href
            && (self.link.is_empty() || rel.as_deref() == Some("alternate"))
            && rel.as_deref().is_none_or(|r| r == "alternate")
        {
            self.link = href;
        }
    }
}

fn attribute(element: &BytesStart, name: &str) -> Option<String> {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

pub fn parse_xml_feed(xml: &str, source_name: &str) -> Result<Vec<FeedItem>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut saw_root = false;
    let mut items = Vec::new();
    let mut draft: Option<Draft> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if !saw_root {
                    if !FEED_ROOTS.contains(&name.as_str()) {
                        return Err(FetchError::ParseError(format!("unexpected root element <{name}>")));
                    }
                    saw_root = true;
                }
                match name.as_str() {
                    "item" | "entry" => draft = Some(Draft::default()),
                    "link" => {
                        if let Some(d) = draft.as_mut() {
                            d.take_href(&e);
                        }
                    }
                    _ => {}
                }
                current_tag = name;
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link"
                    && let Some(d) = draft.as_mut()
                {
                    d.take_href(&e);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"item" | b"entry")
                    && let Some(d) = draft.take()
                    && let Some(item) = d.finish(source_name)
                {
                    items.push(item);
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| FetchError::ParseError(err.to_string()))?;
                if let Some(field) = draft.as_mut().and_then(|d| d.field(&current_tag)) {
                    field.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(field) = draft.as_mut().and_then(|d| d.field(&current_tag)) {
                    field.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::ParseError(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(FetchError::ParseError("body is not an RSS or Atom document".into()));
    }
    Ok(items)
}

pub fn parse_json_feed(body: &str, path: &str, source_name: &str) -> Result<Vec<FeedItem>, FetchError> {
    let root: Value = serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    let node = json_path::resolve(&root, path)
        .ok_or_else(|| FetchError::ParseError(format!("json_path '{path}' does not resolve")))?;
    let entries = node
        .as_array()
        .ok_or_else(|| FetchError::ParseError(format!("json_path '{path}' does not point to a list")))?;

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .map(unwrap_listing)
        .filter_map(|obj| json_item(obj, source_name))
        .collect())
}

/// Listing APIs wrap each post as `{ "kind": .., "data": { .. } }`.
fn unwrap_listing(obj: &Map<String, Value>) -> &Map<String, Value> {
    if obj.contains_key("title") {
        return obj;
    }
    obj.get("data").and_then(Value::as_object).unwrap_or(obj)
}

fn json_item(obj: &Map<String, Value>, source_name: &str) -> Option<FeedItem> {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let title = text(&["title", "name"])?;
    let link = text(&["url", "link", "permalink"]).unwrap_or_default();
    let mut item = FeedItem::new(title, link, source_name);

    item.published_at = text(&["published", "date_published", "date", "created_at", "pubDate"])
        .and_then(parse_date)
        .or_else(|| {
            ["created_utc", "time", "timestamp"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_f64))
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        });
    item.summary = text(&["summary", "description", "selftext", "content_text"])
        .unwrap_or_default()
        .to_string();
    Some(item)
}

/// RFC 2822 (RSS), RFC 3339 (Atom, JSON APIs) or a bare date.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
