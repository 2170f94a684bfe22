//! Iframe enumeration with cross-origin fetch fallback
//!
//! The gallery embeds its explainer panel (and sometimes the whole tutorial)
//! in iframes. For each iframe on the loaded page we try to serialize its
//! content document in-process; when the frame is cross-origin and the
//! document is unreachable, we fall back to one plain HTTP GET of the
//! iframe `src` and treat the response body as a surrogate document.
//!
//! A single inaccessible iframe never fails the walk — it is logged and
//! contributes no document.

use std::time::Duration;

use chromiumoxide::page::Page;
use tracing::{debug, warn};
use url::Url;

use super::discover::DocumentSnapshot;

/// Outcome of walking one page's iframes. `iframes_found` counts every
/// iframe element seen, including those that yielded no document.
#[derive(Debug, Default)]
pub struct IframeWalk {
    pub iframes_found: usize,
    pub documents: Vec<DocumentSnapshot>,
}

/// Enumerate iframes on `page` and collect an accessible document for each
/// where possible. Depth is 1: iframes nested inside iframe documents are
/// scanned as markup, not walked again.
pub async fn walk_iframes(
    page: &Page,
    http: &reqwest::Client,
    page_url: &str,
    fetch_timeout: Duration,
) -> IframeWalk {
    let mut walk = IframeWalk::default();

    let iframes = match page.find_elements("iframe").await {
        Ok(elements) => elements,
        Err(e) => {
            // No iframes at all is an Ok(vec![]) — an Err here means the
            // query itself failed, which we treat like an empty walk.
            warn!("iframe enumeration failed: {}", e);
            return walk;
        }
    };
    walk.iframes_found = iframes.len();

    for (idx, element) in iframes.iter().enumerate() {
        let src = match element.attribute("src").await {
            Ok(src) => src,
            Err(e) => {
                warn!(iframe = idx, "could not read iframe src: {}", e);
                None
            }
        };

        match serialize_content_document(page, idx).await {
            Some(html) => {
                debug!(iframe = idx, src = src.as_deref(), "iframe document accessible in-process");
                walk.documents.push(DocumentSnapshot::iframe(src, false, html));
            }
            None => {
                // Cross-origin (or detached) frame: one fetch of the src,
                // response body used as a surrogate document.
                let Some(src) = src else {
                    debug!(iframe = idx, "iframe has no src and no accessible document, skipping");
                    continue;
                };
                let Some(fetch_url) = resolve_iframe_src(page_url, &src) else {
                    debug!(iframe = idx, src = %src, "iframe src not fetchable, skipping");
                    continue;
                };
                match fetch_surrogate(http, &fetch_url, fetch_timeout).await {
                    Ok(html) => {
                        debug!(iframe = idx, url = %fetch_url, "fetched cross-origin iframe as surrogate");
                        walk.documents
                            .push(DocumentSnapshot::iframe(Some(src), true, html));
                    }
                    Err(e) => {
                        warn!(iframe = idx, url = %fetch_url, "iframe inaccessible even via fetch: {}", e);
                    }
                }
            }
        }
    }

    walk
}

/// Serialize the iframe's content document from inside the page, or `None`
/// when the frame is cross-origin (contentDocument is null) or gone.
async fn serialize_content_document(page: &Page, idx: usize) -> Option<String> {
    let script = format!(
        "(() => {{ \
            const f = document.querySelectorAll('iframe')[{idx}]; \
            if (!f) return null; \
            try {{ \
                const d = f.contentDocument; \
                return d && d.documentElement ? d.documentElement.outerHTML : null; \
            }} catch (_) {{ return null; }} \
        }})()"
    );

    match page.evaluate(script).await {
        Ok(result) => match result.into_value::<Option<String>>() {
            Ok(Some(html)) if !html.trim().is_empty() => Some(html),
            Ok(_) => None,
            Err(e) => {
                warn!(iframe = idx, "could not decode iframe document: {}", e);
                None
            }
        },
        Err(e) => {
            warn!(iframe = idx, "iframe document evaluation failed: {}", e);
            None
        }
    }
}

/// Resolve an iframe `src` against the page URL, accepting only http(s)
/// results. Returns `None` for about:, data:, javascript: and friends.
pub fn resolve_iframe_src(page_url: &str, src: &str) -> Option<Url> {
    let resolved = match Url::parse(src) {
        Ok(absolute) => absolute,
        Err(_) => Url::parse(page_url).ok()?.join(src).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

async fn fetch_surrogate(
    http: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<String, reqwest::Error> {
    let response = http
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    response.text().await
}
