use metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::info;

/// Counters and histograms for capture sessions.
///
/// Handles are registered against whatever recorder is installed when this is
/// built; without one they are no-ops.
#[derive(Clone)]
pub struct CaptureMetrics {
    pub sessions: Counter,
    pub sessions_failed: Counter,
    pub tiles_captured: Counter,
    pub tile_gaps: Counter,
    pub crop_fallbacks: Counter,
    pub throttle_wait: Histogram,
    pub session_duration: Histogram,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self {
            sessions: register_counter!("stitchshot_sessions_total"),
            sessions_failed: register_counter!("stitchshot_sessions_failed_total"),
            tiles_captured: register_counter!("stitchshot_tiles_captured_total"),
            tile_gaps: register_counter!("stitchshot_tile_gaps_total"),
            crop_fallbacks: register_counter!("stitchshot_crop_fallbacks_total"),
            throttle_wait: register_histogram!("stitchshot_throttle_wait_seconds"),
            session_duration: register_histogram!("stitchshot_session_duration_seconds"),
        }
    }

    pub fn record_session(&self, duration: Duration, success: bool) {
        if success {
            self.sessions.increment(1);
        } else {
            self.sessions_failed.increment(1);
        }
        self.session_duration.record(duration.as_secs_f64());
    }

    pub fn record_throttle(&self, waited: Duration) {
        self.throttle_wait.record(waited.as_secs_f64());
    }
}

impl Default for CaptureMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide Prometheus recorder; `render` produces the text exposition.
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    pub fn install() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus recorder installed");
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
