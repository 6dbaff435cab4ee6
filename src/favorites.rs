//! Per-display favorite resolutions
//!
//! Favorites are kept as `"<width>x<height>"` strings in insertion order under
//! a single persisted key, one list per display. Nothing is cached: every call
//! reads the record again, and every toggle writes the whole record back.

use tracing::{debug, info, warn};

use crate::constants::persistence::FAVORITES_KEY;
use crate::error::StorageResult;
use crate::storage::{KeyValueStore, StringListMap};
use crate::types::{DisplayId, Mode, Resolution};

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed,
}

pub struct FavoritesStore<S> {
    storage: S,
}

impl<S: KeyValueStore> FavoritesStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn load(&self) -> StorageResult<StringListMap> {
        Ok(self.storage.get(FAVORITES_KEY)?.unwrap_or_default())
    }

    /// Favorite strings for display `id` in the order they were added
    ///
    /// Unreadable storage yields an empty list.
    pub fn get(&self, id: DisplayId) -> Vec<String> {
        let map = match self.load() {
            Ok(map) => map,
            Err(e) => {
                warn!(display = %id, error = %e, "Failed to read favorites");
                return Vec::new();
            }
        };
        let mut favorites: Vec<String> = Vec::new();
        for entry in map.get(&id.key()).into_iter().flatten() {
            if !favorites.contains(entry) {
                favorites.push(entry.clone());
            }
        }
        favorites
    }

    pub fn is_favorite(&self, id: DisplayId, resolution: &str) -> bool {
        self.get(id).iter().any(|entry| entry == resolution)
    }

    /// Add `resolution` to the display's favorites, or remove it if present
    ///
    /// The full record is written back. A record that cannot be read is left
    /// untouched and the error returned.
    pub fn toggle(&mut self, id: DisplayId, resolution: &str) -> StorageResult<Toggled> {
        let mut map = self.load()?;
        let key = id.key();
        let entries = map.entry(key.clone()).or_default();

        let outcome = if entries.iter().any(|entry| entry == resolution) {
            entries.retain(|entry| entry != resolution);
            Toggled::Removed
        } else {
            entries.push(resolution.to_string());
            Toggled::Added
        };
        if entries.is_empty() {
            map.remove(&key);
        }

        self.storage.set(FAVORITES_KEY, &map)?;
        match outcome {
            Toggled::Added => info!(display = %id, resolution, "Added favorite"),
            Toggled::Removed => info!(display = %id, resolution, "Removed favorite"),
        }
        Ok(outcome)
    }

    /// Favorites that resolve to one of `current_modes`, largest area first
    ///
    /// Strings that do not parse, or match no current mode, are left out of
    /// the result but stay persisted.
    pub fn ranked_for(&self, id: DisplayId, current_modes: &[Mode]) -> Vec<(String, Mode)> {
        let mut ranked: Vec<(String, Mode)> = self
            .get(id)
            .into_iter()
            .filter_map(|entry| {
                let Some(resolution) = Resolution::parse(&entry) else {
                    debug!(display = %id, entry = %entry, "Skipping malformed favorite");
                    return None;
                };
                let Some(mode) = current_modes.iter().find(|m| m.resolution() == resolution) else {
                    debug!(display = %id, entry = %entry, "Favorite not available on display");
                    return None;
                };
                Some((entry, *mode))
            })
            .collect();
        ranked.sort_by(|(_, a), (_, b)| b.logical_area().cmp(&a.logical_area()));
        ranked
    }
}
