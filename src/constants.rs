//! Application-wide constants
//!
//! Thresholds used by mode selection, persistence keys and file locations,
//! and the X11 protocol values the RandR backend relies on.

/// Mode eligibility thresholds
pub mod eligibility {
    /// Smallest logical width a mode may have to be offered or applied
    pub const MIN_WIDTH: u32 = 1000;

    /// Smallest logical height a mode may have to be applied
    pub const MIN_HEIGHT: u32 = 600;

    /// Physical/logical width ratio at which a mode counts as HiDPI
    pub const HIDPI_FACTOR: u32 = 2;
}

/// Persisted key-value record
pub mod persistence {
    /// Key holding the per-display favorites map
    pub const FAVORITES_KEY: &str = "FavoriteResolutionsByDisplay";

    /// Separator between width and height in a resolution string
    pub const RESOLUTION_SEPARATOR: char = 'x';
}

/// Configuration and data file locations
pub mod config {
    /// Directory under the XDG config/data dirs
    pub const APP_DIR: &str = "resolution-change";

    /// Settings file name
    pub const FILENAME: &str = "config.json";

    /// Favorites store file name
    pub const FAVORITES_FILENAME: &str = "favorites.json";

    /// Environment variable overriding the UI scale factor
    pub const ENV_SCALE: &str = "RESOLUTION_CHANGE_SCALE";

    /// Environment variable overriding the favorites file path
    pub const ENV_FAVORITES: &str = "RESOLUTION_CHANGE_FAVORITES";
}

/// Settings validation ranges
pub mod validation {
    /// Smallest accepted UI scale factor
    pub const MIN_UI_SCALE: u32 = 1;

    /// Largest accepted UI scale factor
    pub const MAX_UI_SCALE: u32 = 4;
}

/// X11 protocol constants
pub mod x11 {
    /// RandR protocol version requested at connect time
    pub const RANDR_MAJOR: u32 = 1;
    pub const RANDR_MINOR: u32 = 5;

    /// DPI corresponding to a scale factor of 1
    pub const BASE_DPI: u32 = 96;

    /// X resource carrying the desktop DPI
    pub const XFT_DPI_RESOURCE: &str = "Xft.dpi";

    /// Millimetres per inch, for recomputing physical screen size
    pub const MM_PER_INCH: f64 = 25.4;

    /// Largest value accepted for a screen dimension
    pub const MAX_SCREEN_DIMENSION: u32 = u16::MAX as u32;
}

/// Reconfiguration bridge timing
pub mod bridge {
    use std::time::Duration;

    /// How long the watch loop blocks before re-checking for shutdown
    pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
}
