//! Layer 1: page metadata from the serialized workflow page
//!
//! Pure selector-chain extraction over a page snapshot. Every field uses a
//! fallback list — gallery markup has shifted several times, and the older
//! shapes still appear on cached pages — and absence of any field is never
//! an error.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

impl PageMetadata {
    /// A metadata result counts as empty — and its layer as failed — when
    /// no field was extracted at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.author.is_none()
            && self.categories.is_empty()
            && self.tags.is_empty()
    }
}

/// Site suffixes stripped from `<title>` text.
const TITLE_SUFFIXES: &[&str] = &[" | n8n workflow template", " - n8n", " | n8n"];

/// Extract page metadata from serialized HTML.
pub fn extract_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    PageMetadata {
        title: extract_title(&document),
        description: extract_description(&document),
        author: extract_author(&document),
        categories: extract_categories(&document),
        tags: extract_tags(&document),
    }
}

fn select_first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = match Selector::parse(selector) {
        Ok(sel) => sel,
        Err(e) => {
            warn!("invalid metadata selector '{}': {}", selector, e);
            return None;
        }
    };
    document
        .select(&sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

fn select_first_content_attr(document: &Html, selector: &str) -> Option<String> {
    let sel = match Selector::parse(selector) {
        Ok(sel) => sel,
        Err(e) => {
            warn!("invalid metadata selector '{}': {}", selector, e);
            return None;
        }
    };
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn extract_title(document: &Html) -> Option<String> {
    if let Some(title) = select_first_content_attr(document, r#"meta[property="og:title"]"#) {
        return Some(strip_title_suffix(&title));
    }
    if let Some(title) = select_first_text(document, "h1") {
        return Some(title);
    }
    select_first_text(document, "title").map(|t| strip_title_suffix(&t))
}

fn strip_title_suffix(title: &str) -> String {
    for suffix in TITLE_SUFFIXES {
        if let Some(stripped) = title.strip_suffix(suffix) {
            return stripped.trim().to_string();
        }
    }
    title.trim().to_string()
}

fn extract_description(document: &Html) -> Option<String> {
    select_first_content_attr(document, r#"meta[name="description"]"#)
        .or_else(|| select_first_content_attr(document, r#"meta[property="og:description"]"#))
        .or_else(|| {
            // Last resort: the first substantial paragraph.
            select_first_text(document, "p").filter(|p| p.len() > 80)
        })
}

fn extract_author(document: &Html) -> Option<String> {
    select_first_content_attr(document, r#"meta[name="author"]"#)
        .or_else(|| select_first_text(document, r#"[class*="author"]"#))
        .or_else(|| select_first_text(document, r#"[class*="creator"]"#))
}

fn extract_categories(document: &Html) -> Vec<String> {
    let sel = match Selector::parse(r#"a[href*="/workflows/categories/"]"#) {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let mut categories: Vec<String> = Vec::new();
    for el in document.select(&sel) {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() && !categories.contains(&text) {
            categories.push(text);
        }
    }
    categories
}

fn extract_tags(document: &Html) -> Vec<String> {
    let sel = match Selector::parse(r#"[class*="tag"], [class*="badge"]"#) {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let mut tags: Vec<String> = Vec::new();
    for el in document.select(&sel) {
        let text = el.text().collect::<String>().trim().to_string();
        // Long strings are container text, not tag labels.
        if !text.is_empty() && text.len() <= 40 && !tags.contains(&text) {
            tags.push(text);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_title_wins_over_h1() {
        let html = r#"
            <head><meta property="og:title" content="Sync Jira to Notion | n8n workflow template"></head>
            <body><h1>Different heading</h1></body>
        "#;
        let meta = extract_metadata(html);
        assert_eq!(meta.title.as_deref(), Some("Sync Jira to Notion"));
    }

    #[test]
    fn title_falls_back_to_h1_then_title_tag() {
        let meta = extract_metadata("<body><h1>From Heading</h1></body>");
        assert_eq!(meta.title.as_deref(), Some("From Heading"));

        let meta = extract_metadata("<head><title>From Title - n8n</title></head>");
        assert_eq!(meta.title.as_deref(), Some("From Title"));
    }

    #[test]
    fn description_prefers_meta_over_paragraph() {
        let html = r#"
            <head><meta name="description" content="Short and canonical."></head>
            <body><p>A much longer paragraph that would otherwise be picked up as the description text.</p></body>
        "#;
        let meta = extract_metadata(html);
        assert_eq!(meta.description.as_deref(), Some("Short and canonical."));
    }

    #[test]
    fn categories_and_tags_are_deduplicated() {
        let html = r#"
            <a href="/workflows/categories/sales/">Sales</a>
            <a href="/workflows/categories/sales/">Sales</a>
            <span class="tag">Webhook</span>
            <span class="badge">AI</span>
            <span class="tag">Webhook</span>
        "#;
        let meta = extract_metadata(html);
        assert_eq!(meta.categories, vec!["Sales"]);
        assert_eq!(meta.tags, vec!["Webhook", "AI"]);
    }

    #[test]
    fn empty_page_yields_empty_metadata() {
        let meta = extract_metadata("<html><body></body></html>");
        assert!(meta.is_empty());
    }
}
