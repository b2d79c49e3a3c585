//! Collaborator interfaces the orchestrator is constructed with.
//!
//! A browser adapter implements [`ReflectionPort`] and [`CapturePort`]
//! (see `CdpPage`); tests substitute in-memory fakes.

use crate::{CaptureTarget, Result, Scroller, TileFormat};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Opaque, session-stable identifier of a page element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

/// A fixed- or sticky-positioned element and its current inline visibility
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayElement {
    pub handle: ElementHandle,
    /// Inline `visibility` value; `None` when no inline rule is set
    pub inline_visibility: Option<String>,
}

/// Inline visibility change applied to one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityChange {
    /// `visibility: hidden !important`
    Hide,
    /// Put back a prior inline value, or remove the inline property for `None`
    Restore(Option<String>),
}

/// Read and mutate the live page.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReflectionPort: Send + Sync {
    /// Measure the page and pick the element to scroll.
    async fn resolve_scroll_target(&self) -> Result<CaptureTarget>;

    /// Scroll `scroller` to `offset` CSS px and return once two rendering
    /// frames have passed.
    async fn scroll_to(&self, scroller: Scroller, offset: u32) -> Result<()>;

    /// Every element whose computed position is `fixed` or `sticky`.
    async fn overlay_elements(&self) -> Result<Vec<OverlayElement>>;

    async fn set_visibility(&self, element: ElementHandle, change: VisibilityChange) -> Result<()>;
}

/// Photograph what is currently visible.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CapturePort: Send + Sync {
    /// Encoded image of the visible area. An empty buffer means no image.
    async fn capture_visible(&self, format: TileFormat) -> Result<Vec<u8>>;
}

/// Hand the finished image to whoever stores or sends it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn deliver(&self, bytes: Vec<u8>, filename: &str) -> Result<()>;
}
