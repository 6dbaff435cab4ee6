//! Core value types shared by discovery, switching and favorites

use serde::Serialize;
use std::fmt;

use crate::constants::{eligibility, persistence};

/// Platform identifier of a connected display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// Decimal rendering used as the persisted map key
    pub fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DisplayId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DisplayId)
    }
}

/// One supported video mode of a display
///
/// Logical size is what applications draw to, physical size is the pixel
/// count the panel is driven at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Mode {
    pub logical_width: u32,
    pub logical_height: u32,
    pub physical_width: u32,
    pub physical_height: u32,
    pub native_mode_id: u32,
}

impl Mode {
    pub fn new(
        logical_width: u32,
        logical_height: u32,
        physical_width: u32,
        physical_height: u32,
        native_mode_id: u32,
    ) -> Self {
        Self {
            logical_width,
            logical_height,
            physical_width,
            physical_height,
            native_mode_id,
        }
    }

    /// At least two physical pixels per logical pixel horizontally
    pub fn is_hidpi(&self) -> bool {
        self.logical_width != 0
            && self.physical_width / self.logical_width >= eligibility::HIDPI_FACTOR
    }

    pub fn logical_area(&self) -> u64 {
        u64::from(self.logical_width) * u64::from(self.logical_height)
    }

    pub fn physical_area(&self) -> u64 {
        u64::from(self.physical_width) * u64::from(self.physical_height)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.logical_width, self.logical_height)
    }

    /// Same displayed resolution, regardless of native mode id
    pub fn same_logical_size(&self, other: &Mode) -> bool {
        self.logical_width == other.logical_width && self.logical_height == other.logical_height
    }
}

/// A connected display and the modes worth presenting for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Display {
    pub id: DisplayId,
    pub modes: Vec<Mode>,
}

impl Display {
    /// First mode whose logical size matches `resolution`
    pub fn mode_for(&self, resolution: Resolution) -> Option<&Mode> {
        self.modes.iter().find(|mode| mode.resolution() == resolution)
    }
}

/// Logical `<width>x<height>` pair as stored in favorites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `"<width>x<height>"`
    ///
    /// Exactly one separator and two non-empty decimal components are
    /// required; anything else is not a resolution.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(persistence::RESOLUTION_SEPARATOR);
        let width = parse_component(parts.next()?)?;
        let height = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(width, height))
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.width, persistence::RESOLUTION_SEPARATOR, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::parse(s)
            .ok_or_else(|| anyhow::anyhow!("'{s}' is not a resolution (expected <width>x<height>)"))
    }
}
