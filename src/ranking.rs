//! Reduce a display's raw mode list to the few modes worth presenting

use tracing::trace;

use crate::constants::eligibility::{MIN_HEIGHT, MIN_WIDTH};
use crate::types::Mode;

/// Whether a mode is large enough to be worth switching to
///
/// A usability heuristic, not a platform guarantee.
pub fn can_apply(mode: &Mode) -> bool {
    mode.logical_width >= MIN_WIDTH && mode.logical_height >= MIN_HEIGHT
}

/// Pick the presentable modes out of `raw`, largest logical area first
///
/// Keeps every eligible HiDPI mode at least `MIN_WIDTH` wide, plus the mode
/// with the most physical pixels if it is eligible and its logical size is
/// not already present. Equal areas keep their input order. An empty result
/// means the display has nothing to offer.
pub fn select(raw: &[Mode]) -> Vec<Mode> {
    let mut selected: Vec<Mode> = raw
        .iter()
        .filter(|mode| mode.is_hidpi() && mode.logical_width >= MIN_WIDTH && can_apply(mode))
        .copied()
        .collect();

    if let Some(largest) = largest_physical(raw)
        && can_apply(largest)
        && !selected.iter().any(|mode| mode.same_logical_size(largest))
    {
        trace!(
            width = largest.logical_width,
            height = largest.logical_height,
            mode_id = largest.native_mode_id,
            "adding largest mode"
        );
        selected.push(*largest);
    }

    selected.sort_by(|a, b| b.logical_area().cmp(&a.logical_area()));
    selected
}

/// First mode with the greatest physical pixel count
fn largest_physical(raw: &[Mode]) -> Option<&Mode> {
    raw.iter().fold(None, |best: Option<&Mode>, mode| match best {
        Some(current) if current.physical_area() >= mode.physical_area() => Some(current),
        _ => Some(mode),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidpi(w: u32, h: u32, id: u32) -> Mode {
        Mode::new(w, h, w * 2, h * 2, id)
    }

    fn lodpi(w: u32, h: u32, id: u32) -> Mode {
        Mode::new(w, h, w, h, id)
    }

    fn logical_sizes(modes: &[Mode]) -> Vec<(u32, u32)> {
        modes.iter().map(|m| (m.logical_width, m.logical_height)).collect()
    }

    #[test]
    fn test_can_apply_thresholds() {
        assert!(can_apply(&lodpi(1000, 600, 1)));
        assert!(!can_apply(&lodpi(999, 600, 2)));
        assert!(!can_apply(&lodpi(1000, 599, 3)));
    }

    #[test]
    fn test_select_mixed_scenario() {
        let raw = vec![lodpi(800, 600, 1), hidpi(2560, 1440, 2), hidpi(1280, 800, 3)];
        let selected = select(&raw);
        assert_eq!(logical_sizes(&selected), vec![(2560, 1440), (1280, 800)]);
    }

    #[test]
    fn test_select_adds_largest_physical_mode() {
        // Scale 1 display: nothing is HiDPI, only the native mode survives
        let raw = vec![lodpi(1280, 720, 1), lodpi(3840, 2160, 2), lodpi(1920, 1080, 3)];
        let selected = select(&raw);
        assert_eq!(selected, vec![lodpi(3840, 2160, 2)]);
    }

    #[test]
    fn test_select_largest_compared_by_physical_pixels() {
        // The logically largest mode is not the one with the most pixels
        let raw = vec![lodpi(2048, 1280, 1), hidpi(1600, 1000, 2)];
        let selected = select(&raw);
        assert_eq!(logical_sizes(&selected), vec![(1600, 1000)]);
    }

    #[test]
    fn test_select_does_not_duplicate_largest() {
        let raw = vec![hidpi(1920, 1200, 1), Mode::new(1920, 1200, 3840, 2400, 9)];
        let selected = select(&raw);
        // Both are HiDPI step-one picks; largest is skipped as already present
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|m| m.logical_width == 1920));

        let raw = vec![Mode::new(1920, 1200, 3840, 2400, 7), lodpi(1600, 900, 8)];
        let selected = select(&raw);
        assert_eq!(selected, vec![Mode::new(1920, 1200, 3840, 2400, 7)]);
    }

    #[test]
    fn test_select_keeps_hidpi_duplicates_from_filter() {
        let a = Mode::new(1440, 900, 2880, 1800, 1);
        let b = Mode::new(1440, 900, 2880, 1800, 2);
        let selected = select(&[a, b]);
        assert_eq!(selected, vec![a, b]);
    }

    #[test]
    fn test_select_skips_ineligible_largest() {
        let raw = vec![lodpi(800, 600, 1), lodpi(640, 480, 2)];
        assert!(select(&raw).is_empty());
    }

    #[test]
    fn test_select_excludes_narrow_hidpi() {
        let raw = vec![hidpi(960, 600, 1), hidpi(1024, 640, 2)];
        let selected = select(&raw);
        assert_eq!(logical_sizes(&selected), vec![(1024, 640)]);
    }

    #[test]
    fn test_select_hidpi_below_height_floor_excluded() {
        let raw = vec![hidpi(1200, 500, 1), hidpi(1280, 800, 2)];
        let selected = select(&raw);
        assert_eq!(logical_sizes(&selected), vec![(1280, 800)]);
    }

    #[test]
    fn test_select_sorted_non_increasing_and_stable() {
        let raw = vec![
            hidpi(1280, 800, 1),
            hidpi(1600, 900, 2),
            hidpi(1440, 1000, 3),
            hidpi(2560, 1440, 4),
            hidpi(1200, 1200, 5),
        ];
        let selected = select(&raw);
        let areas: Vec<u64> = selected.iter().map(Mode::logical_area).collect();
        assert!(areas.windows(2).all(|w| w[0] >= w[1]));
        // 1600x900, 1440x1000 and 1200x1200 share an area and keep input order
        let ids: Vec<u32> = selected.iter().map(|m| m.native_mode_id).collect();
        assert_eq!(ids, vec![4, 2, 3, 5, 1]);
    }

    #[test]
    fn test_largest_prefers_first_on_tie() {
        let raw = vec![lodpi(1920, 1080, 1), lodpi(1080, 1920, 2)];
        assert_eq!(largest_physical(&raw).map(|m| m.native_mode_id), Some(1));
        assert!(largest_physical(&[]).is_none());
    }

    #[test]
    fn test_select_is_deterministic() {
        let raw = vec![hidpi(1280, 800, 1), lodpi(2560, 1600, 2), hidpi(1680, 1050, 3)];
        assert_eq!(select(&raw), select(&raw));
    }
}
