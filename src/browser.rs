//! Browser lifecycle wrappers
//!
//! `BrowserWrapper` owns a launched Chromium instance, its CDP event handler
//! task, and the temp profile directory; `PageGuard` owns one page for the
//! lifetime of one extraction. Both exist so that every exit path — success,
//! error, or caller cancellation — releases the underlying Chrome resources
//! promptly.

use anyhow::Result;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser_setup;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),
}

/// Wrapper for a Browser and its event handler task.
///
/// The handler MUST be aborted when the browser goes away or it runs
/// indefinitely against a dead websocket; `Drop` enforces that. The temp
/// profile directory is removed on `shutdown()` after Chrome has released
/// its file handles.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    /// Launch a browser with a unique profile directory for this process.
    pub async fn launch(headless: bool) -> Result<Self> {
        let user_data_dir =
            std::env::temp_dir().join(format!("n8n_harvester_{}", std::process::id()));
        let (browser, handler) =
            browser_setup::launch_browser(headless, Some(user_data_dir.clone())).await?;
        Ok(Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Open a fresh page for one extraction. The caller owns the returned
    /// guard exclusively for the extraction's lifetime.
    pub async fn new_page(&self) -> Result<PageGuard, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;
        Ok(PageGuard::new(page))
    }

    /// Graceful shutdown: close Chrome, wait for process exit, stop the
    /// handler, then remove the profile directory. Directory removal MUST
    /// happen after `wait()` — Windows cannot delete files Chrome still
    /// holds open.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down browser");
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();

        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
        Ok(())
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop kills the Chrome process itself.
        if self.user_data_dir.is_some() {
            warn!(
                "BrowserWrapper dropped without shutdown(); temp directory will be orphaned: {}",
                self.user_data_dir
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }
    }
}

/// Exclusive ownership of one browser page.
///
/// The page is closed on `close()` or, if the owning future is dropped
/// mid-extraction (caller cancellation), best-effort from `Drop` so the tab
/// does not linger for the rest of the browser's life.
pub struct PageGuard {
    page: Option<Page>,
}

impl PageGuard {
    pub fn new(page: Page) -> Self {
        Self { page: Some(page) }
    }

    /// The guarded page. Panics never: the inner option is only vacated by
    /// `close()`, which consumes the guard.
    pub fn page(&self) -> &Page {
        self.page
            .as_ref()
            .unwrap_or_else(|| unreachable!("PageGuard vacated only by close(), which consumes it"))
    }

    /// Close the page explicitly. Preferred over relying on Drop.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            // No async in Drop; hand the close to the runtime if one is
            // still running.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}
