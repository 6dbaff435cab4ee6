//! Pure conversions between RandR replies and core types

use x11rb::protocol::randr::{ModeInfo, Rotation};

use crate::constants::x11;
use crate::types::Mode;

/// Describe a RandR mode at the given UI scale
///
/// The RandR mode size is the physical pixel count; applications draw to
/// that size divided by the scale factor.
pub fn to_mode(info: &ModeInfo, scale: u32) -> Mode {
    let scale = scale.max(1);
    let physical_width = u32::from(info.width);
    let physical_height = u32::from(info.height);
    Mode::new(
        physical_width / scale,
        physical_height / scale,
        physical_width,
        physical_height,
        info.id,
    )
}

/// Scale factor implied by the `Xft.dpi` entry of an X resource string
pub fn scale_from_resources(resources: &str) -> Option<u32> {
    let dpi = resources.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim() != x11::XFT_DPI_RESOURCE {
            return None;
        }
        value.trim().parse::<f64>().ok()
    })?;
    if !dpi.is_finite() || dpi <= 0.0 {
        return None;
    }
    let scale = (dpi / f64::from(x11::BASE_DPI)).round() as u32;
    Some(scale.max(1))
}

/// Whether the CRTC scans out sideways, swapping width and height
pub fn is_sideways(rotation: Rotation) -> bool {
    let sideways = u32::from(Rotation::ROTATE90) | u32::from(Rotation::ROTATE270);
    u32::from(rotation) & sideways != 0
}

/// Area a CRTC occupies on the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtcExtent {
    pub x: i16,
    pub y: i16,
    pub width: u32,
    pub height: u32,
}

impl CrtcExtent {
    pub fn new(x: i16, y: i16, width: u32, height: u32, rotation: Rotation) -> Self {
        if is_sideways(rotation) {
            Self { x, y, width: height, height: width }
        } else {
            Self { x, y, width, height }
        }
    }

    fn right(&self) -> u32 {
        (i64::from(self.x) + i64::from(self.width)).max(0) as u32
    }

    fn bottom(&self) -> u32 {
        (i64::from(self.y) + i64::from(self.height)).max(0) as u32
    }
}

/// Smallest screen containing every active CRTC
pub fn bounding_size(extents: &[CrtcExtent]) -> (u32, u32) {
    extents.iter().fold((0, 0), |(w, h), extent| {
        (w.max(extent.right()), h.max(extent.bottom()))
    })
}

/// Screen size needed after a change, never smaller than the current one
///
/// `None` when the current screen already fits.
pub fn grown_screen_size(current: (u32, u32), required: (u32, u32)) -> Option<(u32, u32)> {
    if required.0 <= current.0 && required.1 <= current.1 {
        return None;
    }
    Some((
        current.0.max(required.0).min(x11::MAX_SCREEN_DIMENSION),
        current.1.max(required.1).min(x11::MAX_SCREEN_DIMENSION),
    ))
}

/// Physical screen size in millimetres for `pixels` at `dpi`
pub fn pixels_to_mm(pixels: u32, dpi: f64) -> u32 {
    let dpi = if dpi.is_finite() && dpi > 0.0 { dpi } else { f64::from(x11::BASE_DPI) };
    (f64::from(pixels) * x11::MM_PER_INCH / dpi).round() as u32
}
