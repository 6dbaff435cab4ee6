//! resolution-change - pick, apply and remember HiDPI display modes
//!
//! Discovers the HiDPI modes each connected display offers, applies one
//! through a platform configuration transaction, keeps per-display favorite
//! resolutions, and watches for display reconfiguration so the mode list can
//! be rebuilt.
//!
//! The core is platform independent; `randr` binds it to X11.
//!
//! ```no_run
//! use resolution_change::{ModeCatalog, ResolutionApplier, randr::RandrPlatform};
//!
//! let platform = RandrPlatform::connect(None, None)?;
//! let catalog = ModeCatalog::new(&platform);
//! let applier = ResolutionApplier::new(&platform);
//! for display in catalog.discover() {
//!     if let Some(mode) = display.modes.first() {
//!         applier.apply(display.id, mode)?;
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod applier;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod favorites;
pub mod platform;
pub mod randr;
pub mod ranking;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use applier::ResolutionApplier;
pub use bridge::{BridgeState, ReconfigurationBridge, RefreshReason, RefreshRequest, RefreshRequester};
pub use catalog::ModeCatalog;
pub use error::{ApplyError, PlatformError, StorageError};
pub use favorites::{FavoritesStore, Toggled};
pub use platform::{ChangeFlags, ChangeNotifier, ConfigureOption, DisplayConfigurator, DisplayQuery};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use types::{Display, DisplayId, Mode, Resolution};
