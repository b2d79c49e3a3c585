//! Scroll-container resolution
//!
//! Decides which element a session scrolls. Pages built as app shells keep the
//! document fixed and scroll an inner container; small inner scrollers such as
//! sidebars or comment boxes must not be picked over it.

use crate::{CaptureTarget, CssRect, Scroller};
use serde::{Deserialize, Serialize};

/// A candidate must cover at least this share of the viewport on both axes.
pub const MIN_VIEWPORT_SHARE: f64 = 0.5;

/// Raw page measurements gathered by the reflection port.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollProbe {
    /// `window.innerWidth` / `window.innerHeight`
    pub viewport: Size,
    pub device_pixel_ratio: f64,
    /// Scroll size of the page's scrolling root
    pub document: Size,
    /// Elements with a vertical overflow, in document order
    pub candidates: Vec<ScrollCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollCandidate {
    /// Position in the page-side registry, used to scroll it later
    pub index: usize,
    /// Computed `overflow-y`
    pub overflow_y: String,
    pub scroll_width: u32,
    pub scroll_height: u32,
    pub client_width: u32,
    pub client_height: u32,
    /// Bounding client rect, CSS px
    pub rect: CssRect,
}

impl ScrollCandidate {
    pub fn scrolls_vertically(&self) -> bool {
        matches!(self.overflow_y.as_str(), "auto" | "scroll")
            && self.scroll_height > self.client_height
    }

    pub fn covers_viewport(&self, viewport: Size) -> bool {
        self.rect.width >= viewport.width * MIN_VIEWPORT_SHARE
            && self.rect.height >= viewport.height * MIN_VIEWPORT_SHARE
    }
}

impl ScrollProbe {
    pub fn device_pixel_ratio(&self) -> f64 {
        if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }

    /// The qualifying candidate with the largest scroll height, first in
    /// document order on ties.
    pub fn primary_candidate(&self) -> Option<&ScrollCandidate> {
        self.candidates
            .iter()
            .filter(|c| c.scrolls_vertically() && c.covers_viewport(self.viewport))
            .fold(None, |best: Option<&ScrollCandidate>, c| match best {
                Some(b) if b.scroll_height >= c.scroll_height => Some(b),
                _ => Some(c),
            })
    }
}

/// Select the scroller and measure it. Falls back to the page's own scrolling
/// root when nothing qualifies; this never fails.
pub fn resolve_scroll_target(probe: &ScrollProbe) -> CaptureTarget {
    let dpr = probe.device_pixel_ratio();
    let px = |v: f64| v.max(0.0).round() as u32;

    match probe.primary_candidate() {
        Some(candidate) => CaptureTarget {
            scroller: Scroller::Element(candidate.index),
            crop_rect: CssRect::new(
                candidate.rect.x.max(0.0),
                candidate.rect.y.max(0.0),
                candidate.rect.width,
                candidate.rect.height,
            ),
            total_width: candidate.scroll_width.max(1),
            total_height: candidate.scroll_height.max(1),
            viewport_width: candidate.client_width.max(1),
            viewport_height: candidate.client_height.max(1),
            device_pixel_ratio: dpr,
        },
        None => CaptureTarget {
            scroller: Scroller::Window,
            crop_rect: CssRect::new(0.0, 0.0, probe.viewport.width, probe.viewport.height),
            total_width: px(probe.document.width).max(1),
            total_height: px(probe.document.height).max(1),
            viewport_width: px(probe.viewport.width).max(1),
            viewport_height: px(probe.viewport.height).max(1),
            device_pixel_ratio: dpr,
        },
    }
}
