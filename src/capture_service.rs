//! Full-page capture orchestration
//!
//! `CaptureService` runs one session at a time:
//!
//! ```text
//! resolve -> hide overlays -> for each planned offset {
//!     scroll, settle, rate-limit, capture, crop if partial, draw
//! } -> restore overlays -> encode -> deliver
//! ```
//!
//! Per-tile problems (failed scroll, missing image, undecodable tile) leave a
//! blank strip and the loop moves on. Only resolving the page, encoding the
//! composite and delivering it can fail a session.

use crate::{
    crop_top, output_filename, CaptureError, CaptureMetrics, CaptureRateLimiter, CapturePort,
    CaptureTarget, CompositeSurface, Config, DeliveryPort, OutputFormat, OverlayMask,
    PlannedTile, ReflectionPort, Result, TileFormat, TileGeometry, TilePlan,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// What happened to one planned tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    /// Full tile drawn
    Drawn,
    /// Partial tile cropped to its content rows, then drawn
    Cropped,
    /// Cropping failed; the whole capture was drawn at viewport height
    CropFallback,
    /// Nothing drawn; the strip stays blank
    Gap,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileReport {
    pub index: usize,
    pub offset: u32,
    pub content_height: u32,
    pub status: TileStatus,
}

/// Summary of a finished session
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub session_id: String,
    pub filename: String,
    pub format: OutputFormat,
    pub encoded_size: usize,
    pub width: u32,
    pub height: u32,
    pub window_scroller: bool,
    pub device_pixel_ratio: f64,
    pub overlays_hidden: usize,
    pub overlays_restored: usize,
    pub tiles: Vec<TileReport>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl CaptureReport {
    pub fn gap_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.status == TileStatus::Gap)
            .count()
    }
}

/// Stitches full-page images out of viewport captures.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stitchshot::{BrowserSession, CaptureService, CdpPage, Config, FileDelivery};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let browser = BrowserSession::launch(&config).await?;
///     let page = Arc::new(CdpPage::new(browser.open_page("https://example.com").await?));
///
///     let service = CaptureService::new(
///         page.clone(),
///         page.clone(),
///         Arc::new(FileDelivery::new("shots")),
///         config,
///     );
///     let report = service.capture(&page.page_title().await).await?;
///     println!("saved {} ({} tiles)", report.filename, report.tiles.len());
///
///     browser.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct CaptureService {
    reflection: Arc<dyn ReflectionPort>,
    capture: Arc<dyn CapturePort>,
    delivery: Arc<dyn DeliveryPort>,
    config: Config,
    // Held for the whole session; the limiter outlives sessions so spacing
    // also holds between back-to-back captures.
    session: Mutex<CaptureRateLimiter>,
    metrics: CaptureMetrics,
}

impl CaptureService {
    pub fn new(
        reflection: Arc<dyn ReflectionPort>,
        capture: Arc<dyn CapturePort>,
        delivery: Arc<dyn DeliveryPort>,
        config: Config,
    ) -> Self {
        let limiter = CaptureRateLimiter::new(config.rate_limit.min_interval);
        Self {
            reflection,
            capture,
            delivery,
            config,
            session: Mutex::new(limiter),
            metrics: CaptureMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: CaptureMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True while a session holds the lock.
    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    /// Capture the whole page and deliver it as `sanitize(page_title).ext`.
    ///
    /// Concurrent calls queue on the session lock and run one after another.
    pub async fn capture(&self, page_title: &str) -> Result<CaptureReport> {
        let mut limiter = self.session.lock().await;

        let session_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        info!("Capture session {} started for {:?}", session_id, page_title);

        let result = self
            .run_session(&session_id, page_title, &mut limiter)
            .await;
        let duration = start.elapsed();
        self.metrics.record_session(duration, result.is_ok());

        match result {
            Ok(mut report) => {
                report.started_at = started_at;
                report.duration = duration;
                info!(
                    "Capture session {} finished in {:?}: {} tiles, {} gaps, {} bytes",
                    session_id,
                    duration,
                    report.tiles.len(),
                    report.gap_count(),
                    report.encoded_size
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    "Capture session {} failed ({:?}): {}",
                    session_id,
                    e.severity(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn run_session(
        &self,
        session_id: &str,
        page_title: &str,
        limiter: &mut CaptureRateLimiter,
    ) -> Result<CaptureReport> {
        let settings = self.config.settings;
        let tile_format = settings.tile_format();

        let target = self
            .reflection
            .resolve_scroll_target()
            .await
            .map_err(|e| match e {
                CaptureError::ResolveFailed(_) => e,
                other => CaptureError::ResolveFailed(other.to_string()),
            })?;
        let plan = TilePlan::new(target.total_height, target.viewport_height);
        info!(
            "Session {}: {}x{} content, {}x{} viewport, dpr {}, {} tiles",
            session_id,
            target.total_width,
            target.total_height,
            target.viewport_width,
            target.viewport_height,
            target.device_pixel_ratio,
            plan.len()
        );

        let mut surface = CompositeSurface::new(target.total_width, target.total_height);

        let mut mask = OverlayMask::new();
        let overlays_hidden = match mask.hide(self.reflection.as_ref()).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Could not enumerate overlay elements: {}", e);
                0
            }
        };

        let mut tiles = Vec::with_capacity(plan.len());
        for tile in plan.tiles() {
            let status = self
                .capture_tile(&target, tile, tile_format, &mut surface, limiter)
                .await;
            if status == TileStatus::Gap {
                self.metrics.tile_gaps.increment(1);
            }
            tiles.push(TileReport {
                index: tile.index,
                offset: tile.offset,
                content_height: tile.content_height,
                status,
            });
        }

        let overlays_restored = mask.restore(self.reflection.as_ref()).await;

        let bytes = surface.encode(settings.output_format, settings.quality())?;
        let filename = output_filename(page_title, settings.output_format);
        let encoded_size = bytes.len();
        self.delivery.deliver(bytes, &filename).await?;

        Ok(CaptureReport {
            session_id: session_id.to_string(),
            filename,
            format: settings.output_format,
            encoded_size,
            width: surface.width(),
            height: surface.height(),
            window_scroller: target.is_window_scroller(),
            device_pixel_ratio: target.device_pixel_ratio,
            overlays_hidden,
            overlays_restored,
            tiles,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        })
    }

    async fn capture_tile(
        &self,
        target: &CaptureTarget,
        tile: PlannedTile,
        format: TileFormat,
        surface: &mut CompositeSurface,
        limiter: &mut CaptureRateLimiter,
    ) -> TileStatus {
        debug!(
            "Tile {} at offset {} ({} content rows)",
            tile.index, tile.offset, tile.content_height
        );

        if let Err(e) = self.reflection.scroll_to(target.scroller, tile.offset).await {
            warn!("Tile {}: {}", tile.index, e);
            return TileStatus::Gap;
        }
        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay).await;
        }

        let waited = limiter.acquire().await;
        self.metrics.record_throttle(waited);

        let bytes = match self.capture.capture_visible(format).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                warn!("Tile {}: {}", tile.index, CaptureError::EmptyCapture);
                return TileStatus::Gap;
            }
            Err(e) => {
                warn!("Tile {}: {}", tile.index, e);
                return TileStatus::Gap;
            }
        };
        self.metrics.tiles_captured.increment(1);

        let geometry = TileGeometry::for_tile(target, tile.offset, tile.content_height);
        if !tile.is_partial(target.viewport_height) {
            return Self::draw(surface, &bytes, &geometry, tile.index, TileStatus::Drawn);
        }

        match crop_top(&bytes, target.viewport_height, tile.content_height) {
            Ok(cropped) => Self::draw(surface, &cropped, &geometry, tile.index, TileStatus::Cropped),
            Err(e) => {
                warn!(
                    "Tile {}: crop failed ({}), drawing at full viewport height",
                    tile.index, e
                );
                self.metrics.crop_fallbacks.increment(1);
                let full = TileGeometry::for_tile(target, tile.offset, target.viewport_height);
                Self::draw(surface, &bytes, &full, tile.index, TileStatus::CropFallback)
            }
        }
    }

    fn draw(
        surface: &mut CompositeSurface,
        bytes: &[u8],
        geometry: &TileGeometry,
        index: usize,
        drawn: TileStatus,
    ) -> TileStatus {
        match surface.draw_tile(bytes, geometry) {
            Ok(()) => drawn,
            Err(e) => {
                warn!("Tile {}: draw failed: {}", index, e);
                TileStatus::Gap
            }
        }
    }
}
