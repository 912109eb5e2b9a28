//! RSS 2.0 output for recent published events.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::warn;

use argus_common::query::EventQuery;
use argus_common::types::{Event, EventStatus};

use crate::AppState;

const FEED_ITEM_LIMIT: u32 = 50;

/// Naive implementation of https://www.w3.org/TR/REC-xml/#syntax
fn xml_entity_escape(from: &str) -> String {
    let mut escaped = String::with_capacity(from.len());
    for c in from.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            any => escaped.push(any),
        }
    }
    escaped
}

/// Base URL for item links, derived from the request's Host header and
/// forwarded scheme.
fn base_url_from_headers(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

/// Render a channel of events as RSS 2.0.
pub fn render_feed(events: &[Event], base_url: &str, now: DateTime<Utc>) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str("<rss version=\"2.0\"><channel>\n");
    xml.push_str("<title>Argus Events</title>\n");
    xml.push_str(&format!("<link>{}</link>\n", xml_entity_escape(base_url)));
    xml.push_str("<description>Recently published OSINT events</description>\n");
    xml.push_str(&format!("<lastBuildDate>{}</lastBuildDate>\n", now.to_rfc2822()));

    for event in events {
        xml.push_str("<item>\n");
        xml.push_str(&format!("<title>{}</title>\n", xml_entity_escape(&event.title)));
        xml.push_str(&format!(
            "<link>{}/api/events/{}</link>\n",
            xml_entity_escape(base_url),
            xml_entity_escape(&event.id)
        ));
        xml.push_str(&format!(
            "<guid isPermaLink=\"false\">{}</guid>\n",
            xml_entity_escape(&event.id)
        ));
        xml.push_str(&format!(
            "<description>{}</description>\n",
            xml_entity_escape(&event.summary)
        ));
        xml.push_str(&format!(
            "<category>{}</category>\n",
            xml_entity_escape(&event.category.to_string())
        ));
        xml.push_str(&format!("<pubDate>{}</pubDate>\n", event.timestamp.to_rfc2822()));
        xml.push_str("</item>\n");
    }

    xml.push_str("</channel></rss>\n");
    xml
}

pub async fn api_feed_rss(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let query = EventQuery {
        status: Some(EventStatus::Published),
        limit: FEED_ITEM_LIMIT,
        ..EventQuery::default()
    };

    let events = match state.store.query_events(&query).await {
        Ok(response) => response.events,
        Err(e) => {
            warn!(error = %e, "store error rendering RSS feed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "feed unavailable").into_response();
        }
    };

    let base_url = base_url_from_headers(&headers);
    let xml = render_feed(&events, &base_url, Utc::now());

    (
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response()
}
