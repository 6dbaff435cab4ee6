//! Display and mode discovery

use tracing::{debug, error, warn};

use crate::platform::DisplayQuery;
use crate::ranking;
use crate::types::{Display, DisplayId, Mode};

/// Read-only view of the connected displays and their presentable modes
pub struct ModeCatalog<Q> {
    query: Q,
}

impl<Q: DisplayQuery> ModeCatalog<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Snapshot of every online display that has at least one presentable mode
    ///
    /// Best effort: if the display list cannot be read the result is empty.
    /// Displays whose modes cannot be read are left out.
    pub fn discover(&self) -> Vec<Display> {
        let ids = match self.query.online_displays() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Failed to get online display list");
                return Vec::new();
            }
        };

        let mut displays = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = match self.query.all_modes(id) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(display = %id, error = %e, "Failed to read display modes, skipping display");
                    continue;
                }
            };

            let modes = ranking::select(&raw);
            debug!(display = %id, raw = raw.len(), selected = modes.len(), "Ranked display modes");
            if modes.is_empty() {
                continue;
            }
            displays.push(Display { id, modes });
        }
        displays
    }

    /// The active mode of display `id`, `None` if inactive or unreadable
    pub fn current_mode(&self, id: DisplayId) -> Option<Mode> {
        self.query
            .current_mode(id)
            .inspect_err(|e| warn!(display = %id, error = %e, "Failed to read current mode"))
            .ok()
            .flatten()
    }

    /// Whether the presentation should offer `mode` on `display`
    pub fn can_apply(&self, _display: DisplayId, mode: &Mode) -> bool {
        ranking::can_apply(mode)
    }
}
