//! Chromium lifecycle for the CLI
//!
//! One browser per process, one page per capture. The DevTools handler stream
//! is driven on its own task for as long as the browser lives.

use crate::{create_browser_config, validate_url, CaptureError, Config, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<std::result::Result<(), CdpError>>,
    page_load_wait: Duration,
}

impl BrowserSession {
    pub async fn launch(config: &Config) -> Result<Self> {
        let browser_config = create_browser_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;

        // The handler is a Stream and must be polled or every command stalls.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Handler error: {}", e);
                    return Err(e);
                }
            }
            debug!("Handler stream ended");
            Ok(())
        });

        info!(
            "Browser launched ({}x{} @ {}x)",
            config.viewport.width, config.viewport.height, config.viewport.device_scale_factor
        );

        Ok(Self {
            browser,
            handler,
            page_load_wait: config.page_load_wait,
        })
    }

    /// Open `url` in a new tab and give it `page_load_wait` to settle.
    pub async fn open_page(&self, url: &str) -> Result<Page> {
        let url = validate_url(url)?;

        if self.handler.is_finished() {
            return Err(CaptureError::BrowserLaunchFailed(
                "browser connection closed".to_string(),
            ));
        }

        let page = self
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| CaptureError::PageError(e.to_string()))?;

        if let Err(e) = page.wait_for_navigation().await {
            warn!("Navigation to {} did not complete cleanly: {}", url, e);
        }
        if !self.page_load_wait.is_zero() {
            sleep(self.page_load_wait).await;
        }

        info!("Opened {}", url);
        Ok(page)
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        info!("Browser shut down");
    }
}
