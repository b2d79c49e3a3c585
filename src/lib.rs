//! # stitchshot
//!
//! Full-page screenshots for pages taller than the viewport, built from
//! ordinary visible-area captures.
//!
//! A capture session measures the page, picks the element that actually
//! scrolls (the window, or an app-shell container such as a docs reader's
//! content pane), hides fixed and sticky overlays so headers are not repeated
//! in every tile, then scrolls through the content one viewport at a time.
//! Each visible area is captured at device resolution and drawn into a
//! composite surface sized in CSS pixels. The last tile is cropped to the rows
//! that were not captured already. Overlays are restored, the composite is
//! encoded and handed to a delivery sink.
//!
//! ## Session pipeline
//!
//! | Step | Component | Failure handling |
//! |------|-----------|------------------|
//! | Measure & pick scroller | [`resolver`] | fatal, nothing touched yet |
//! | Plan offsets | [`planner`] | pure |
//! | Hide overlays | [`overlay`] | logged, session continues |
//! | Scroll, settle, capture | [`ports`], [`rate_limiter`] | tile becomes a gap |
//! | Crop & draw | [`stitcher`] | tile becomes a gap |
//! | Restore overlays | [`overlay`] | always runs |
//! | Encode & deliver | [`stitcher`], [`delivery`] | fatal |
//!
//! Captures are spaced at least `min_interval` apart (1100 ms by default);
//! the browser rejects faster capture calls. Sessions on one
//! [`CaptureService`] are serialized.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stitchshot::{BrowserSession, CaptureService, CdpPage, Config, FileDelivery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let browser = BrowserSession::launch(&config).await?;
//!     let page = Arc::new(CdpPage::new(browser.open_page("https://example.com").await?));
//!
//!     let service = CaptureService::new(
//!         page.clone(),
//!         page.clone(),
//!         Arc::new(FileDelivery::new("screenshots")),
//!         config,
//!     );
//!     let report = service.capture(&page.page_title().await).await?;
//!     println!("{}: {}x{}", report.filename, report.width, report.height);
//!
//!     browser.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! stitchshot capture --url https://example.com --output screenshots/ --format jpeg --quality 0.9
//! stitchshot plan --total-height 2000 --viewport-height 800
//! stitchshot validate --config stitchshot.json
//! ```

/// Configuration, output settings and shared geometry types
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Scroll-container selection
pub mod resolver;

/// Scroll offset planning
pub mod planner;

/// Spacing between visible-area captures
pub mod rate_limiter;

/// Composite surface, tile cropping and encoding
pub mod stitcher;

/// Hiding and restoring fixed/sticky overlays
pub mod overlay;

/// Page, capture and delivery interfaces
pub mod ports;

/// Capture session orchestration
pub mod capture_service;

/// Headless Chromium lifecycle
pub mod browser;

/// Chromium implementation of the page and capture interfaces
pub mod cdp_page;

/// File output
pub mod delivery;

/// Command-line interface implementation
pub mod cli;

/// Capture metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use browser::*;
pub use capture_service::*;
pub use cdp_page::*;
pub use cli::*;
pub use config::*;
pub use delivery::*;
pub use error::*;
pub use metrics::*;
pub use overlay::*;
pub use planner::*;
pub use ports::*;
pub use rate_limiter::*;
pub use resolver::{resolve_scroll_target, ScrollCandidate, ScrollProbe, Size};
pub use stitcher::*;
pub use utils::*;
