//! Chromium page adapter
//!
//! Implements the reflection and capture ports over the DevTools protocol.
//! Elements the session needs to touch again (the chosen scroller, hidden
//! overlays) are kept in a page-side registry, `globalThis.__stitchshot`,
//! and referred to by their index in it.

use crate::ports::{CapturePort, ElementHandle, OverlayElement, ReflectionPort, VisibilityChange};
use crate::resolver::{self, ScrollProbe};
use crate::{CaptureError, CaptureTarget, Result, Scroller, TileFormat};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const REGISTRY: &str = "(globalThis.__stitchshot = globalThis.__stitchshot || { scrollers: [], overlays: [] })";

const PROBE_SCRIPT: &str = r#"(() => {
  const reg = %REGISTRY%;
  reg.scrollers = [];
  const root = document.scrollingElement || document.documentElement;
  const candidates = [];
  for (const el of document.querySelectorAll('*')) {
    if (el === root) continue;
    const cs = getComputedStyle(el);
    if (cs.overflowY !== 'auto' && cs.overflowY !== 'scroll') continue;
    if (el.scrollHeight <= el.clientHeight) continue;
    const r = el.getBoundingClientRect();
    candidates.push({
      index: reg.scrollers.push(el) - 1,
      overflowY: cs.overflowY,
      scrollWidth: el.scrollWidth,
      scrollHeight: el.scrollHeight,
      clientWidth: el.clientWidth,
      clientHeight: el.clientHeight,
      rect: { x: r.x, y: r.y, width: r.width, height: r.height },
    });
  }
  const body = document.body;
  return {
    viewport: { width: window.innerWidth, height: window.innerHeight },
    devicePixelRatio: window.devicePixelRatio || 1,
    document: {
      width: Math.max(document.documentElement.scrollWidth, body ? body.scrollWidth : 0),
      height: Math.max(document.documentElement.scrollHeight, body ? body.scrollHeight : 0),
    },
    candidates,
  };
})()"#;

const OVERLAY_SCRIPT: &str = r#"(() => {
  const reg = %REGISTRY%;
  const found = [];
  const all = document.body ? document.body.querySelectorAll('*') : [];
  for (const el of all) {
    const position = getComputedStyle(el).position;
    if (position !== 'fixed' && position !== 'sticky') continue;
    let handle = reg.overlays.indexOf(el);
    if (handle < 0) handle = reg.overlays.push(el) - 1;
    found.push({ handle, visibility: el.style.visibility || null });
  }
  return found;
})()"#;

#[derive(Debug, Deserialize)]
struct RawOverlay {
    handle: u64,
    visibility: Option<String>,
}

fn with_registry(script: &str) -> String {
    script.replace("%REGISTRY%", REGISTRY)
}

fn scroll_script(scroller: Scroller, offset: u32) -> String {
    let apply = match scroller {
        Scroller::Window => format!("window.scrollTo(0, {offset});"),
        Scroller::Element(index) => format!(
            "const el = (globalThis.__stitchshot || {{ scrollers: [] }}).scrollers[{index}];\n  \
             if (!el || !el.isConnected) throw new Error('scroll container {index} is gone');\n  \
             el.scrollTop = {offset};"
        ),
    };
    format!(
        "(async () => {{\n  {apply}\n  \
         await new Promise((r) => requestAnimationFrame(() => requestAnimationFrame(r)));\n  \
         return true;\n}})()"
    )
}

fn visibility_script(element: ElementHandle, change: &VisibilityChange) -> String {
    let apply = match change {
        VisibilityChange::Hide => {
            "el.style.setProperty('visibility', 'hidden', 'important');".to_string()
        }
        VisibilityChange::Restore(Some(value)) => {
            // JSON string literals are valid JS string literals.
            let literal = serde_json::to_string(value).unwrap_or_else(|_| "''".to_string());
            format!("el.style.setProperty('visibility', {literal});")
        }
        VisibilityChange::Restore(None) => "el.style.removeProperty('visibility');".to_string(),
    };
    format!(
        "(() => {{\n  const el = (globalThis.__stitchshot || {{ overlays: [] }}).overlays[{}];\n  \
         if (!el) return false;\n  {apply}\n  return true;\n}})()",
        element.0
    )
}

/// A live Chromium tab.
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Document title, empty when it cannot be read.
    pub async fn page_title(&self) -> String {
        self.page
            .get_title()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    async fn evaluate<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(CaptureError::ScriptError)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| CaptureError::ScriptError(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| CaptureError::ScriptError(format!("unexpected script result: {e}")))
    }
}

#[async_trait]
impl ReflectionPort for CdpPage {
    async fn resolve_scroll_target(&self) -> Result<CaptureTarget> {
        let probe: ScrollProbe = self
            .evaluate(with_registry(PROBE_SCRIPT))
            .await
            .map_err(|e| CaptureError::ResolveFailed(e.to_string()))?;
        debug!(
            "Probe: viewport {:?}, document {:?}, {} scroll candidates",
            probe.viewport,
            probe.document,
            probe.candidates.len()
        );
        Ok(resolver::resolve_scroll_target(&probe))
    }

    async fn scroll_to(&self, scroller: Scroller, offset: u32) -> Result<()> {
        self.evaluate::<bool>(scroll_script(scroller, offset))
            .await
            .map(|_| ())
            .map_err(|e| CaptureError::ScrollFailed {
                offset,
                reason: e.to_string(),
            })
    }

    async fn overlay_elements(&self) -> Result<Vec<OverlayElement>> {
        let raw: Vec<RawOverlay> = self
            .evaluate(with_registry(OVERLAY_SCRIPT))
            .await
            .map_err(|e| CaptureError::OverlayFailed(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|o| OverlayElement {
                handle: ElementHandle(o.handle),
                inline_visibility: o.visibility.filter(|v| !v.is_empty()),
            })
            .collect())
    }

    async fn set_visibility(&self, element: ElementHandle, change: VisibilityChange) -> Result<()> {
        let applied: bool = self
            .evaluate(visibility_script(element, &change))
            .await
            .map_err(|e| CaptureError::OverlayFailed(e.to_string()))?;

        if applied {
            Ok(())
        } else {
            Err(CaptureError::OverlayFailed(format!(
                "overlay element {} is no longer registered",
                element.0
            )))
        }
    }
}

#[async_trait]
impl CapturePort for CdpPage {
    async fn capture_visible(&self, format: TileFormat) -> Result<Vec<u8>> {
        let params = match format {
            TileFormat::Png => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
            TileFormat::Jpeg { quality } => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(quality as i64)
                .build(),
        };

        self.page
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
    }
}
