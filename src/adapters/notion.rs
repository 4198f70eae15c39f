//! Notion publishing sink.
//!
//! Pages live in one database; each page carries the item identity in a
//! rich-text property so upsert can find and update an existing page
//! instead of creating a duplicate.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::ItemIdentity;

use super::{PublishSink, SinkDocument};

const API_VERSION: &str = "2022-06-28";

// Notion rejects rich_text fragments much beyond this size
const MAX_PARAGRAPH_CHARS: usize = 1800;

// Notion caps block appends at 100 children per request
const MAX_CHILDREN_PER_APPEND: usize = 100;

/// Notion API sink bound to one database
pub struct NotionSink {
    client: reqwest::Client,

    /// Integration token (from NOTION_TOKEN)
    token: String,

    /// Target database ID
    database_id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<PageRef>,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BlockList {
    results: Vec<PageRef>,
    has_more: bool,
    next_cursor: Option<String>,
}

impl NotionSink {
    /// Create a sink for one database
    pub fn new(token: String, database_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            database_id,
        }
    }

    /// Create from NOTION_TOKEN and NOTION_DATABASE_ID
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("NOTION_TOKEN").context("NOTION_TOKEN is not set")?;
        let database_id =
            std::env::var("NOTION_DATABASE_ID").context("NOTION_DATABASE_ID is not set")?;
        Ok(Self::new(token, database_id))
    }

    fn request(&self, method: reqwest::Method, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .timeout(timeout)
            .bearer_auth(&self.token)
            .header("Notion-Version", API_VERSION)
    }

    /// Find the existing page for an identity, if any
    async fn find_page(&self, identity: &ItemIdentity, timeout: Duration) -> Result<Option<String>> {
        let url = format!("https://api.notion.com/v1/databases/{}/query", self.database_id);

        let response = self
            .request(reqwest::Method::POST, &url, timeout)
            .json(&serde_json::json!({
                "filter": {
                    "property": "Identity",
                    "rich_text": { "equals": identity.as_str() }
                }
            }))
            .send()
            .await
            .context("Notion database query failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Notion query error {}: {}", status, body);
        }

        let parsed: QueryResponse = response.json().await.context("Failed to parse Notion query")?;
        Ok(parsed.results.into_iter().next().map(|p| p.id))
    }

    fn page_properties(&self, identity: &ItemIdentity, document: &SinkDocument) -> serde_json::Value {
        let sidecar = &document.sidecar;

        let mut properties = serde_json::json!({
            "Name": { "title": [{ "text": { "content": sidecar.title } }] },
            "Identity": { "rich_text": [{ "text": { "content": identity.as_str() } }] },
            "Source": { "rich_text": [{ "text": { "content": sidecar.source } }] },
            "Tags": {
                "multi_select": sidecar.tags.iter()
                    .map(|t| serde_json::json!({ "name": t }))
                    .collect::<Vec<_>>()
            },
        });

        if let Some(published) = &sidecar.published {
            properties["Published"] = serde_json::json!({ "date": { "start": published } });
        }
        if let Some(link) = &sidecar.link {
            properties["Link"] = serde_json::json!({ "url": link });
        }

        properties
    }

    fn page_children(&self, document: &SinkDocument) -> Vec<serde_json::Value> {
        let mut children = Vec::new();

        if !document.chapters.is_empty() {
            children.push(heading_block("Chapters"));
            for title in &document.chapters {
                children.push(bulleted_block(title));
            }
            children.push(heading_block("Summary"));
        }

        for chunk in chunk_text(&document.summary, MAX_PARAGRAPH_CHARS) {
            children.push(paragraph_block(&chunk));
        }

        children
    }

    /// List the ids of every block directly under a page
    async fn existing_children(&self, page_id: &str, timeout: Duration) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = format!(
                "https://api.notion.com/v1/blocks/{}/children?page_size=100",
                page_id
            );
            if let Some(cursor) = &cursor {
                url.push_str("&start_cursor=");
                url.push_str(cursor);
            }

            let response = self
                .request(reqwest::Method::GET, &url, timeout)
                .send()
                .await
                .context("Notion block listing failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Notion block listing error {}: {}", status, body);
            }

            let parsed: BlockList = response
                .json()
                .await
                .context("Failed to parse Notion block listing")?;
            ids.extend(parsed.results.into_iter().map(|b| b.id));

            match (parsed.has_more, parsed.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Replace a page's body: delete every existing block, then append the
    /// new children in API-sized batches. Used when a publish supersedes an
    /// earlier one, so stale summary and chapter blocks never survive.
    async fn replace_children(
        &self,
        page_id: &str,
        children: &[serde_json::Value],
        timeout: Duration,
    ) -> Result<()> {
        for block_id in self.existing_children(page_id, timeout).await? {
            let url = format!("https://api.notion.com/v1/blocks/{}", block_id);
            let response = self
                .request(reqwest::Method::DELETE, &url, timeout)
                .send()
                .await
                .context("Notion block delete failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Notion block delete error {}: {}", status, body);
            }
        }

        let url = format!("https://api.notion.com/v1/blocks/{}/children", page_id);
        for batch in children.chunks(MAX_CHILDREN_PER_APPEND) {
            let response = self
                .request(reqwest::Method::PATCH, &url, timeout)
                .json(&serde_json::json!({ "children": batch }))
                .send()
                .await
                .context("Notion block append failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Notion block append error {}: {}", status, body);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PublishSink for NotionSink {
    fn name(&self) -> &str {
        "notion"
    }

    async fn upsert(
        &self,
        identity: &ItemIdentity,
        document: &SinkDocument,
        timeout: Duration,
    ) -> Result<String> {
        let properties = self.page_properties(identity, document);

        if let Some(page_id) = self.find_page(identity, timeout).await? {
            // Update in place so a retried publish never duplicates
            let url = format!("https://api.notion.com/v1/pages/{}", page_id);
            let response = self
                .request(reqwest::Method::PATCH, &url, timeout)
                .json(&serde_json::json!({ "properties": properties }))
                .send()
                .await
                .context("Notion page update failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Notion update error {}: {}", status, body);
            }

            // Properties alone leave the old body in place
            self.replace_children(&page_id, &self.page_children(document), timeout)
                .await?;

            return Ok(page_id);
        }

        let response = self
            .request(reqwest::Method::POST, "https://api.notion.com/v1/pages", timeout)
            .json(&serde_json::json!({
                "parent": { "database_id": self.database_id },
                "properties": properties,
                "children": self.page_children(document),
            }))
            .send()
            .await
            .context("Notion page creation failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Notion create error {}: {}", status, body);
        }

        let page: PageRef = response.json().await.context("Failed to parse Notion page")?;
        Ok(page.id)
    }
}

fn paragraph_block(text: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": { "rich_text": [{ "type": "text", "text": { "content": text } }] }
    })
}

fn heading_block(text: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "block",
        "type": "heading_2",
        "heading_2": { "rich_text": [{ "type": "text", "text": { "content": text } }] }
    })
}

fn bulleted_block(text: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "block",
        "type": "bulleted_list_item",
        "bulleted_list_item": { "rich_text": [{ "type": "text", "text": { "content": text } }] }
    })
}

/// Split text into chunks of at most `max` characters, preferring paragraph
/// and space boundaries
fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if paragraph.len() <= max {
            chunks.push(paragraph.to_string());
            continue;
        }

        let mut rest = paragraph;
        while !rest.is_empty() {
            if rest.len() <= max {
                chunks.push(rest.to_string());
                break;
            }

            // Break on a char boundary, preferring the last space
            let mut cut = max;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if let Some(space) = rest[..cut].rfind(' ') {
                if space > max / 2 {
                    cut = space;
                }
            }

            chunks.push(rest[..cut].trim_end().to_string());
            rest = rest[cut..].trim_start();
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::MetadataSidecar;

    fn sink() -> NotionSink {
        NotionSink::new("token".to_string(), "db".to_string())
    }

    fn document(chapters: Vec<String>) -> SinkDocument {
        SinkDocument {
            sidecar: MetadataSidecar {
                source: "Test Podcast".to_string(),
                title: "Episode 1".to_string(),
                published: Some("2025-08-21".to_string()),
                link: None,
                tags: vec!["podcast".to_string()],
            },
            summary: "First part.\n\nSecond part.".to_string(),
            chapters,
        }
    }

    #[test]
    fn test_page_children_orders_chapters_before_summary() {
        let doc = document(vec!["Opening".to_string(), "Closing".to_string()]);
        let children = sink().page_children(&doc);

        let kinds: Vec<&str> = children.iter().map(|b| b["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                "heading_2",
                "bulleted_list_item",
                "bulleted_list_item",
                "heading_2",
                "paragraph",
                "paragraph",
            ]
        );
    }

    #[test]
    fn test_page_children_without_chapters_is_summary_only() {
        let children = sink().page_children(&document(Vec::new()));

        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|b| b["type"] == "paragraph"));
    }

    #[test]
    fn test_chunk_text_respects_paragraphs() {
        let chunks = chunk_text("first paragraph\n\nsecond paragraph", 100);
        assert_eq!(chunks, vec!["first paragraph", "second paragraph"]);
    }

    #[test]
    fn test_chunk_text_splits_long_paragraphs_on_spaces() {
        let long = "word ".repeat(100);
        let chunks = chunk_text(&long, 120);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 120);
        }
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), 100);
    }

    #[test]
    fn test_chunk_text_skips_blank_paragraphs() {
        let chunks = chunk_text("a\n\n\n\nb", 10);
        assert_eq!(chunks, vec!["a", "b"]);
    }
}
