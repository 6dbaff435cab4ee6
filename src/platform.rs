//! Platform collaborators consumed by the core
//!
//! The core never talks to a display server directly. Enumeration, mode
//! switching and change notification are reached through these traits so
//! the engine can be driven by the RandR backend or by a scripted fake.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::PlatformError;
use crate::types::{DisplayId, Mode};

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Display enumeration and mode queries
pub trait DisplayQuery {
    /// Identifiers of every display currently online
    fn online_displays(&self) -> PlatformResult<Vec<DisplayId>>;

    /// Every mode the display supports, duplicate low-resolution variants included
    fn all_modes(&self, display: DisplayId) -> PlatformResult<Vec<Mode>>;

    /// The mode the display is currently driven at, if it is active
    fn current_mode(&self, display: DisplayId) -> PlatformResult<Option<Mode>>;
}

impl<T: DisplayQuery + ?Sized> DisplayQuery for &T {
    fn online_displays(&self) -> PlatformResult<Vec<DisplayId>> {
        (**self).online_displays()
    }

    fn all_modes(&self, display: DisplayId) -> PlatformResult<Vec<Mode>> {
        (**self).all_modes(display)
    }

    fn current_mode(&self, display: DisplayId) -> PlatformResult<Option<Mode>> {
        (**self).current_mode(display)
    }
}

/// How long a completed configuration should last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOption {
    /// Only until the application exits
    ForAppOnly,
    /// Only for the current login session
    ForSession,
    /// Beyond the current session
    Permanently,
}

/// Transactional display configuration
pub trait DisplayConfigurator {
    type Transaction;

    fn begin(&self) -> PlatformResult<Self::Transaction>;

    fn configure(
        &self,
        txn: &mut Self::Transaction,
        display: DisplayId,
        mode: &Mode,
    ) -> PlatformResult<()>;

    /// Roll back everything configured in `txn`
    fn cancel(&self, txn: Self::Transaction);

    fn complete(&self, txn: Self::Transaction, option: ConfigureOption) -> PlatformResult<()>;
}

impl<T: DisplayConfigurator + ?Sized> DisplayConfigurator for &T {
    type Transaction = T::Transaction;

    fn begin(&self) -> PlatformResult<Self::Transaction> {
        (**self).begin()
    }

    fn configure(
        &self,
        txn: &mut Self::Transaction,
        display: DisplayId,
        mode: &Mode,
    ) -> PlatformResult<()> {
        (**self).configure(txn, display, mode)
    }

    fn cancel(&self, txn: Self::Transaction) {
        (**self).cancel(txn)
    }

    fn complete(&self, txn: Self::Transaction, option: ConfigureOption) -> PlatformResult<()> {
        (**self).complete(txn, option)
    }
}

/// Callback invoked by the platform on an arbitrary thread
///
/// The last argument is the integer context handed to `register`.
pub type ReconfigurationCallback = fn(DisplayId, ChangeFlags, u64);

/// Display change notification subscription
pub trait ChangeNotifier {
    fn register(&mut self, callback: ReconfigurationCallback, context: u64) -> PlatformResult<()>;

    fn unregister(&mut self, callback: ReconfigurationCallback, context: u64);
}

/// Kinds of change carried by a reconfiguration notification
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeFlags(u32);

impl ChangeFlags {
    pub const NONE: ChangeFlags = ChangeFlags(0);
    pub const BEGIN_CONFIGURATION: ChangeFlags = ChangeFlags(1 << 0);
    pub const MOVED: ChangeFlags = ChangeFlags(1 << 1);
    pub const SET_MAIN: ChangeFlags = ChangeFlags(1 << 2);
    pub const SET_MODE: ChangeFlags = ChangeFlags(1 << 3);
    pub const ADD: ChangeFlags = ChangeFlags(1 << 4);
    pub const REMOVE: ChangeFlags = ChangeFlags(1 << 5);
    pub const ENABLED: ChangeFlags = ChangeFlags(1 << 8);
    pub const DISABLED: ChangeFlags = ChangeFlags(1 << 9);
    pub const MIRROR: ChangeFlags = ChangeFlags(1 << 10);
    pub const UNMIRROR: ChangeFlags = ChangeFlags(1 << 11);
    pub const DESKTOP_SHAPE_CHANGED: ChangeFlags = ChangeFlags(1 << 12);

    /// Changes that invalidate the discovered display list
    pub const REFRESH_TRIGGERS: ChangeFlags =
        ChangeFlags(Self::BEGIN_CONFIGURATION.0 | Self::ADD.0 | Self::REMOVE.0);

    const NAMES: [(ChangeFlags, &'static str); 11] = [
        (Self::BEGIN_CONFIGURATION, "BEGIN_CONFIGURATION"),
        (Self::MOVED, "MOVED"),
        (Self::SET_MAIN, "SET_MAIN"),
        (Self::SET_MODE, "SET_MODE"),
        (Self::ADD, "ADD"),
        (Self::REMOVE, "REMOVE"),
        (Self::ENABLED, "ENABLED"),
        (Self::DISABLED, "DISABLED"),
        (Self::MIRROR, "MIRROR"),
        (Self::UNMIRROR, "UNMIRROR"),
        (Self::DESKTOP_SHAPE_CHANGED, "DESKTOP_SHAPE_CHANGED"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        ChangeFlags(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: ChangeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: ChangeFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether this notification should trigger a fresh discovery pass
    pub const fn requests_refresh(&self) -> bool {
        self.intersects(Self::REFRESH_TRIGGERS)
    }
}

impl BitOr for ChangeFlags {
    type Output = ChangeFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ChangeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        let unknown = self.0 & !Self::NAMES.iter().fold(0, |acc, (flag, _)| acc | flag.0);
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_triggers() {
        assert!(ChangeFlags::BEGIN_CONFIGURATION.requests_refresh());
        assert!(ChangeFlags::ADD.requests_refresh());
        assert!(ChangeFlags::REMOVE.requests_refresh());
        assert!((ChangeFlags::SET_MODE | ChangeFlags::REMOVE).requests_refresh());
    }

    #[test]
    fn test_non_triggers() {
        assert!(!ChangeFlags::MOVED.requests_refresh());
        assert!(!ChangeFlags::NONE.requests_refresh());
        assert!(!(ChangeFlags::SET_MODE | ChangeFlags::DESKTOP_SHAPE_CHANGED).requests_refresh());
    }

    #[test]
    fn test_debug_lists_flag_names() {
        let flags = ChangeFlags::ADD | ChangeFlags::ENABLED;
        assert_eq!(format!("{flags:?}"), "ADD | ENABLED");
        assert_eq!(format!("{:?}", ChangeFlags::NONE), "NONE");
        assert_eq!(format!("{:?}", ChangeFlags::from_bits(1 << 20)), "0x100000");
    }
}
