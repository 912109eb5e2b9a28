//! RSS/Atom feed connector.
//!
//! Fetches one feed URL and emits normalized candidate sources, applying the
//! item filter rules before anything reaches the store.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, FeedType};
use regex::Regex;
use tracing::info;

use argus_common::text::{feed_item_hash, normalize_content};
use argus_common::types::CandidateSource;

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Some feed hosts reject obvious bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Items with less content than this after normalization are dropped.
const MIN_CONTENT_CHARS: usize = 20;

pub struct FeedConnector {
    client: reqwest::Client,
}

impl FeedConnector {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build feed HTTP client");
        Self { client }
    }

    /// Fetch and parse one feed, returning filtered candidates sorted by
    /// publication date descending. Network and parse failures surface as a
    /// single error; nothing is partially emitted.
    pub async fn fetch(&self, feed_url: &str) -> Result<Vec<CandidateSource>> {
        let resp = self
            .client
            .get(feed_url)
            .send()
            .await
            .with_context(|| format!("feed fetch failed: {feed_url}"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("feed fetch failed: {feed_url} returned {status}");
        }

        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read feed body: {feed_url}"))?;

        // feed-rs recognizes RSS 2.0 and Atom in one pass; a payload that is
        // neither fails here.
        let feed = feed_rs::parser::parse(&bytes[..])
            .with_context(|| format!("failed to parse RSS/Atom feed: {feed_url}"))?;

        let is_reddit_atom = feed.feed_type == FeedType::Atom && is_reddit_feed(feed_url);
        let candidates = entries_to_candidates(feed, feed_url, is_reddit_atom, Utc::now());

        info!(feed_url, items = candidates.len(), "feed parsed");
        Ok(candidates)
    }
}

impl Default for FeedConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn entries_to_candidates(
    feed: Feed,
    feed_url: &str,
    is_reddit_atom: bool,
    now: DateTime<Utc>,
) -> Vec<CandidateSource> {
    let mut candidates: Vec<CandidateSource> = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_to_candidate(entry, feed_url, is_reddit_atom, now))
        .collect();
    candidates.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    candidates
}

/// Normalize one feed entry into a candidate, or drop it per the filter
/// rules (video URLs, root-domain-only URLs, near-empty content).
fn entry_to_candidate(
    entry: Entry,
    feed_url: &str,
    is_reddit_atom: bool,
    now: DateTime<Utc>,
) -> Option<CandidateSource> {
    let entry_url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let title = entry
        .title
        .as_ref()
        .map(|t| normalize_content(&t.content))
        .unwrap_or_default();

    let body = entry
        .summary
        .as_ref()
        .map(|t| t.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    // Reddit Atom entries link to reddit itself; the article lives in the
    // first external href of the entry body.
    let (url, reddit_url) = if is_reddit_atom {
        match extract_external_href(&body) {
            Some(article) => (article, Some(entry_url)),
            None => (entry_url, None),
        }
    } else {
        (entry_url, None)
    };

    if is_video_url(&url) || !has_article_path(&url) {
        return None;
    }

    let raw_content = normalize_content(&body);
    if raw_content.len() < MIN_CONTENT_CHARS {
        return None;
    }

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    let content_hash = feed_item_hash(&url, &title, &raw_content);

    Some(CandidateSource {
        url,
        title,
        raw_content,
        published_at,
        content_hash,
        feed_url: feed_url.to_string(),
        reddit_url,
    })
}

fn is_reddit_feed(feed_url: &str) -> bool {
    url::Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "reddit.com" || h.ends_with(".reddit.com")))
        .unwrap_or(false)
}

/// First href in an HTML fragment that does not point back at Reddit.
fn extract_external_href(html: &str) -> Option<String> {
    static HREF: OnceLock<Regex> = OnceLock::new();
    let href = HREF.get_or_init(|| {
        Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("invalid href regex")
    });

    for cap in href.captures_iter(html) {
        let candidate = cap.get(1)?.as_str();
        if !candidate.starts_with("http") {
            continue;
        }
        let is_reddit = url::Url::parse(candidate)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .map(|h| h.contains("reddit.com") || h.contains("redd.it"))
            })
            .unwrap_or(true);
        if !is_reddit {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Video pages carry no enrichable text.
fn is_video_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| {
            let path = u.path();
            path.contains("/video/") || path.contains("/videos/")
        })
        .unwrap_or(false)
}

/// True when the URL points at an article rather than a bare domain.
fn has_article_path(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(u) => {
            let path = u.path().trim_end_matches('/');
            !path.is_empty()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rss_feed(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>Test Feed</title><link>https://example.com</link>
{items}
</channel></rss>"#
        )
    }

    fn parse(xml: &str) -> Vec<CandidateSource> {
        let feed = feed_rs::parser::parse(xml.as_bytes()).expect("feed should parse");
        entries_to_candidates(feed, "https://example.com/rss", false, Utc::now())
    }

    #[test]
    fn emits_normalized_candidates_sorted_by_date() {
        let xml = rss_feed(
            r#"<item><title>Older story</title>
<link>https://example.com/news/older</link>
<description>An older report with plenty of detail in the body.</description>
<pubDate>Mon, 01 Jan 2024 08:00:00 GMT</pubDate></item>
<item><title>Newer story</title>
<link>https://example.com/news/newer</link>
<description>&lt;p&gt;A newer   report&lt;/p&gt; with markup to strip.</description>
<pubDate>Tue, 02 Jan 2024 08:00:00 GMT</pubDate></item>"#,
        );
        let candidates = parse(&xml);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Newer story");
        assert_eq!(candidates[0].raw_content, "A newer report with markup to strip.");
        assert_eq!(candidates[1].title, "Older story");
    }

    #[test]
    fn drops_video_urls() {
        let xml = rss_feed(
            r#"<item><title>Clip</title>
<link>https://example.com/video/abc</link>
<description>A video item with a reasonable description.</description></item>
<item><title>Playlist</title>
<link>https://example.com/videos/xyz</link>
<description>Another video item with a reasonable description.</description></item>"#,
        );
        assert!(parse(&xml).is_empty());
    }

    #[test]
    fn drops_root_domain_urls() {
        let xml = rss_feed(
            r#"<item><title>Homepage</title>
<link>https://example.com/</link>
<description>Links straight to the root of the domain, no article.</description></item>"#,
        );
        assert!(parse(&xml).is_empty());
    }

    #[test]
    fn drops_near_empty_content() {
        let xml = rss_feed(
            r#"<item><title>Stub</title>
<link>https://example.com/news/stub</link>
<description>too short</description></item>"#,
        );
        assert!(parse(&xml).is_empty());
    }

    #[test]
    fn hash_covers_url_title_and_content() {
        let xml = rss_feed(
            r#"<item><title>Same title</title>
<link>https://example.com/news/a</link>
<description>Identical description content for both items.</description></item>
<item><title>Same title</title>
<link>https://example.com/news/b</link>
<description>Identical description content for both items.</description></item>"#,
        );
        let candidates = parse(&xml);
        assert_eq!(candidates.len(), 2);
        assert_ne!(candidates[0].content_hash, candidates[1].content_hash);
    }

    #[test]
    fn reddit_atom_extracts_article_href() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
<title>r/worldnews</title>
<entry>
  <id>t3_abc</id>
  <title>Major development reported</title>
  <link href="https://www.reddit.com/r/worldnews/comments/abc/post/"/>
  <content type="html">&lt;a href="https://www.reddit.com/user/someone"&gt;submitted by&lt;/a&gt; &lt;a href="https://news.example.org/world/major-development"&gt;[link]&lt;/a&gt; with extra discussion text for length.</content>
  <updated>2024-01-02T08:00:00Z</updated>
</entry>
</feed>"#;
        let feed = feed_rs::parser::parse(xml.as_bytes()).expect("atom should parse");
        assert_eq!(feed.feed_type, FeedType::Atom);
        let candidates = entries_to_candidates(
            feed,
            "https://www.reddit.com/r/worldnews/.rss",
            true,
            Utc::now(),
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://news.example.org/world/major-development");
        assert_eq!(
            candidates[0].reddit_url.as_deref(),
            Some("https://www.reddit.com/r/worldnews/comments/abc/post/")
        );
    }

    #[test]
    fn unparseable_pub_date_falls_back_to_now() {
        let xml = rss_feed(
            r#"<item><title>Undated</title>
<link>https://example.com/news/undated</link>
<description>A report whose publication date did not parse at all.</description>
<pubDate>sometime last thursday</pubDate></item>"#,
        );
        let before = Utc::now();
        let candidates = parse(&xml);
        let after = Utc::now();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].published_at >= before && candidates[0].published_at <= after);
    }
}
