use crate::{ElementHandle, ReflectionPort, Result, VisibilityChange};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Fixed and sticky elements hidden for the duration of a session, with the
/// inline visibility each one had before.
///
/// The mask lives in memory only; nothing is written to the page besides the
/// visibility override itself.
#[derive(Debug, Default)]
pub struct OverlayMask {
    hidden: BTreeMap<ElementHandle, Option<String>>,
}

impl OverlayMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hidden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }

    pub fn contains(&self, handle: ElementHandle) -> bool {
        self.hidden.contains_key(&handle)
    }

    /// Hide every overlay element not already in the mask. Returns how many
    /// were newly hidden.
    ///
    /// Elements already masked are skipped so their recorded prior value is
    /// never replaced by the `hidden` value we set ourselves.
    pub async fn hide(&mut self, port: &dyn ReflectionPort) -> Result<usize> {
        let elements = port.overlay_elements().await?;
        let mut count = 0;

        for element in elements {
            if self.hidden.contains_key(&element.handle) {
                continue;
            }
            match port
                .set_visibility(element.handle, VisibilityChange::Hide)
                .await
            {
                Ok(()) => {
                    let prior = element.inline_visibility.filter(|v| !v.is_empty());
                    self.hidden.insert(element.handle, prior);
                    count += 1;
                }
                Err(e) => warn!("Could not hide overlay {:?}: {}", element.handle, e),
            }
        }

        debug!("Hid {} overlay elements", count);
        Ok(count)
    }

    /// Restore every masked element exactly once and empty the mask.
    /// Returns how many restores succeeded; a second call returns 0.
    pub async fn restore(&mut self, port: &dyn ReflectionPort) -> usize {
        let entries = std::mem::take(&mut self.hidden);
        let mut restored = 0;

        for (handle, prior) in entries {
            match port
                .set_visibility(handle, VisibilityChange::Restore(prior))
                .await
            {
                Ok(()) => restored += 1,
                Err(e) => warn!("Could not restore overlay {:?}: {}", handle, e),
            }
        }

        if restored > 0 {
            debug!("Restored {} overlay elements", restored);
        }
        restored
    }
}
