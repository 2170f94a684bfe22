//! Workflow inventory from the gallery sitemap
//!
//! The gallery publishes every template page in a dedicated sitemap. One
//! fetch plus a URL-shape regex yields the complete workflow inventory —
//! id, title slug, and canonical page URL — without crawling listing pages.

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const SITEMAP_URL: &str = "https://n8n.io/sitemap-workflows.xml";

static WORKFLOW_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://n8n\.io/workflows/(\d+)-([^/]+?)/?$").expect("static workflow url pattern")
});

/// One discovered workflow: stable id, display title derived from the URL
/// slug, and the canonical page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    pub workflow_id: String,
    pub title: String,
    pub url: String,
}

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("sitemap fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("sitemap XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub struct InventoryCrawler {
    http: reqwest::Client,
    sitemap_url: String,
}

impl InventoryCrawler {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            sitemap_url: SITEMAP_URL.to_string(),
        }
    }

    pub fn with_sitemap_url(http: reqwest::Client, sitemap_url: impl Into<String>) -> Self {
        Self {
            http,
            sitemap_url: sitemap_url.into(),
        }
    }

    /// Fetch and parse the sitemap into an ordered workflow inventory.
    pub async fn fetch_inventory(&self) -> Result<Vec<WorkflowRef>, InventoryError> {
        info!(url = %self.sitemap_url, "fetching workflow sitemap");
        let xml = self
            .http
            .get(&self.sitemap_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let refs = parse_sitemap(&xml)?;
        info!(workflows = refs.len(), "workflow inventory built");
        Ok(refs)
    }
}

/// Parse sitemap XML, keeping `<loc>` entries that match the workflow page
/// URL shape. Non-workflow URLs (category pages, the gallery root) are
/// skipped, not errors.
pub fn parse_sitemap(xml: &str) -> Result<Vec<WorkflowRef>, InventoryError> {
    let mut reader = Reader::from_str(xml);
    let mut refs = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Event::End(e) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Event::Text(t) if in_loc => {
                let loc = match t.unescape() {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => {
                        warn!("skipping unescapable <loc>: {}", e);
                        continue;
                    }
                };
                if let Some(wf) = workflow_ref_from_url(&loc) {
                    refs.push(wf);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(refs)
}

/// Build a `WorkflowRef` from a workflow page URL, or `None` when the URL
/// does not have the `/workflows/<id>-<slug>` shape.
pub fn workflow_ref_from_url(url: &str) -> Option<WorkflowRef> {
    let caps = WORKFLOW_URL.captures(url.trim())?;
    Some(WorkflowRef {
        workflow_id: caps[1].to_string(),
        title: slug_to_title(&caps[2]),
        url: url.trim().trim_end_matches('/').to_string(),
    })
}

fn slug_to_title(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://n8n.io/workflows/2462-sync-jira-issues-to-notion/</loc></url>
  <url><loc>https://n8n.io/workflows/</loc></url>
  <url><loc>https://n8n.io/workflows/7639-ai-email-triage</loc></url>
</urlset>"#;

    #[test]
    fn parses_workflow_entries_in_order() {
        let refs = parse_sitemap(FIXTURE).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].workflow_id, "2462");
        assert_eq!(refs[0].title, "Sync Jira Issues To Notion");
        assert_eq!(
            refs[0].url,
            "https://n8n.io/workflows/2462-sync-jira-issues-to-notion"
        );
        assert_eq!(refs[1].workflow_id, "7639");
    }

    #[test]
    fn non_workflow_urls_are_skipped() {
        let refs = parse_sitemap(FIXTURE).unwrap();
        assert!(refs.iter().all(|r| r.url.contains("-")));
    }

    #[test]
    fn single_url_conversion_round_trips() {
        let wf = workflow_ref_from_url("https://n8n.io/workflows/123-hello-world/").unwrap();
        assert_eq!(wf.workflow_id, "123");
        assert_eq!(wf.title, "Hello World");
        assert_eq!(wf.url, "https://n8n.io/workflows/123-hello-world");
        assert!(workflow_ref_from_url("https://n8n.io/pricing").is_none());
    }

    #[tokio::test]
    async fn fetch_inventory_uses_sitemap_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/sitemap-workflows.xml")
            .with_status(200)
            .with_body(FIXTURE)
            .create_async()
            .await;

        let crawler = InventoryCrawler::with_sitemap_url(
            reqwest::Client::new(),
            format!("{}/sitemap-workflows.xml", server.url()),
        );
        let refs = crawler.fetch_inventory().await.unwrap();
        assert_eq!(refs.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_surfaces_as_inventory_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/sitemap-workflows.xml")
            .with_status(503)
            .create_async()
            .await;

        let crawler = InventoryCrawler::with_sitemap_url(
            reqwest::Client::new(),
            format!("{}/sitemap-workflows.xml", server.url()),
        );
        assert!(crawler.fetch_inventory().await.is_err());
    }
}
