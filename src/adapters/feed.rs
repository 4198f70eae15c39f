//! RSS feed source.
//!
//! Offers the latest episode of each configured feed as a candidate item.
//! This is deliberately minimal extraction (title, guid, link, pubDate,
//! enclosure URL from the first `<item>`), not a general feed parser —
//! feed-format quirks are out of scope for the core.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::config::FeedConfig;
use crate::domain::{CandidateItem, MediaReference, SourceKind, SourceMetadata};

use super::MediaSource;

/// RSS feed fetcher over a set of configured feeds
pub struct RssFeedSource {
    client: reqwest::Client,
    feeds: Vec<FeedConfig>,
}

impl RssFeedSource {
    /// Create a source over the configured feeds
    pub fn new(feeds: Vec<FeedConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            feeds,
        }
    }

    async fn latest_episode(&self, feed: &FeedConfig) -> Result<Option<CandidateItem>> {
        let body = self
            .client
            .get(&feed.rss)
            .send()
            .await
            .with_context(|| format!("Failed to fetch feed: {}", feed.rss))?
            .error_for_status()
            .with_context(|| format!("Feed request rejected: {}", feed.rss))?
            .text()
            .await
            .with_context(|| format!("Failed to read feed body: {}", feed.rss))?;

        let Some(item_block) = extract_block(&body, "item") else {
            return Ok(None);
        };

        let Some(mp3_url) = extract_enclosure_url(&item_block) else {
            warn!(feed = %feed.name, "latest episode has no audio enclosure, skipping");
            return Ok(None);
        };

        let metadata = SourceMetadata {
            kind: SourceKind::Feed,
            source_name: feed.name.clone(),
            guid: extract_tag(&item_block, "guid"),
            link: extract_tag(&item_block, "link"),
            title: extract_tag(&item_block, "title"),
            published: extract_tag(&item_block, "pubDate"),
        };

        Ok(Some(CandidateItem {
            metadata,
            media: MediaReference::AudioUrl(mp3_url),
            static_tags: feed.tags.clone(),
        }))
    }
}

#[async_trait]
impl MediaSource for RssFeedSource {
    fn name(&self) -> &str {
        "rss"
    }

    async fn candidates(&self) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();

        for feed in &self.feeds {
            match self.latest_episode(feed).await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => warn!(feed = %feed.name, "no episodes found"),
                // One broken feed must not starve the rest of the batch
                Err(e) => warn!(feed = %feed.name, error = %e, "feed fetch failed"),
            }
        }

        Ok(items)
    }
}

/// Extract the inner text of the first `<tag>...</tag>` block
fn extract_block(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let start = xml.find(&open)?;
    let content_start = xml[start..].find('>')? + start + 1;
    let end = xml[content_start..].find(&close)? + content_start;

    Some(xml[content_start..end].to_string())
}

/// Extract a simple child tag's text, unwrapping CDATA
fn extract_tag(block: &str, tag: &str) -> Option<String> {
    let text = extract_block(block, tag)?;
    let text = text.trim();

    let text = text
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(text);

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Extract the url attribute of the first `<enclosure ... />`
fn extract_enclosure_url(block: &str) -> Option<String> {
    let start = block.find("<enclosure")?;
    let tag_end = block[start..].find('>')? + start;
    let tag = &block[start..tag_end];

    let url_pos = tag.find("url=")? + 4;
    let quote = tag.as_bytes().get(url_pos).copied()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let rest = &tag[url_pos + 1..];
    let end = rest.find(quote as char)?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Tech Weekly</title>
    <item>
      <title><![CDATA[Episode 42: The Answer]]></title>
      <guid isPermaLink="false">tw-ep-42</guid>
      <link>https://example.com/ep42</link>
      <pubDate>Thu, 21 Aug 2025 05:00:00 -0000</pubDate>
      <enclosure url="https://cdn.example.com/ep42.mp3" length="1234" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 41</title>
      <guid>tw-ep-41</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_extract_first_item_only() {
        let item = extract_block(SAMPLE_FEED, "item").unwrap();
        assert!(item.contains("tw-ep-42"));
        assert!(!item.contains("tw-ep-41"));
    }

    #[test]
    fn test_extract_tag_unwraps_cdata() {
        let item = extract_block(SAMPLE_FEED, "item").unwrap();
        assert_eq!(extract_tag(&item, "title").as_deref(), Some("Episode 42: The Answer"));
        assert_eq!(extract_tag(&item, "guid").as_deref(), Some("tw-ep-42"));
        assert_eq!(
            extract_tag(&item, "pubDate").as_deref(),
            Some("Thu, 21 Aug 2025 05:00:00 -0000")
        );
    }

    #[test]
    fn test_extract_enclosure_url() {
        let item = extract_block(SAMPLE_FEED, "item").unwrap();
        assert_eq!(
            extract_enclosure_url(&item).as_deref(),
            Some("https://cdn.example.com/ep42.mp3")
        );
    }

    #[test]
    fn test_missing_enclosure_yields_none() {
        assert_eq!(extract_enclosure_url("<item><title>x</title></item>"), None);
    }

    #[test]
    fn test_empty_tag_yields_none() {
        assert_eq!(extract_tag("<item><guid></guid></item>", "guid"), None);
    }
}
