//! X11 RandR display backend
//!
//! Displays are connected RandR outputs, identified by their output XID.
//! Mode sizes reported by RandR are physical pixels; the logical size is
//! derived from the desktop scale factor.

mod configure;
pub mod modes;
mod notify;

pub use configure::RandrTransaction;
pub use notify::RandrNotifier;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt};
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt as XprotoExt, Window};
use x11rb::rust_connection::RustConnection;

use crate::constants::x11;
use crate::error::PlatformError;
use crate::platform::{DisplayQuery, PlatformResult};
use crate::types::{DisplayId, Mode};

/// Connection to the X server plus what is needed to interpret RandR replies
pub struct RandrPlatform {
    conn: RustConnection,
    root: Window,
    screen_dpi: f64,
    scale: u32,
    display_name: Option<String>,
}

impl RandrPlatform {
    /// Connect to `display_name` (or `$DISPLAY`) and check RandR support
    ///
    /// `scale` overrides the scale factor otherwise read from `Xft.dpi`.
    pub fn connect(display_name: Option<&str>, scale: Option<u32>) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(display_name).context("Failed to connect to X server")?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .context(format!("X server has no screen {screen_num}"))?;
        let root = screen.root;
        let screen_dpi = if screen.width_in_millimeters > 0 {
            f64::from(screen.width_in_pixels) * x11::MM_PER_INCH
                / f64::from(screen.width_in_millimeters)
        } else {
            f64::from(x11::BASE_DPI)
        };

        let version = conn
            .randr_query_version(x11::RANDR_MAJOR, x11::RANDR_MINOR)
            .context("Failed to query RandR version")?
            .reply()
            .context("RandR extension not available")?;
        if (version.major_version, version.minor_version) < (1, 2) {
            anyhow::bail!(
                "RandR {}.{} is too old, 1.2 or newer is required",
                version.major_version,
                version.minor_version
            );
        }

        let scale = match scale {
            Some(scale) => scale.max(1),
            None => detect_scale(&conn, root),
        };
        info!(
            screen = screen_num,
            randr = %format!("{}.{}", version.major_version, version.minor_version),
            scale,
            "Connected to X server"
        );

        Ok(Self {
            conn,
            root,
            screen_dpi,
            scale,
            display_name: display_name.map(str::to_string),
        })
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Change notifier using its own connection to the same server
    pub fn notifier(&self) -> RandrNotifier {
        RandrNotifier::new(self.display_name.clone())
    }

    fn resources(&self) -> PlatformResult<randr::GetScreenResourcesCurrentReply> {
        self.conn
            .randr_get_screen_resources_current(self.root)
            .map_err(PlatformError::query)?
            .reply()
            .map_err(PlatformError::query)
    }

    fn output_info(
        &self,
        output: randr::Output,
        config_timestamp: u32,
    ) -> PlatformResult<randr::GetOutputInfoReply> {
        self.conn
            .randr_get_output_info(output, config_timestamp)
            .map_err(PlatformError::query)?
            .reply()
            .map_err(PlatformError::query)
    }

    fn crtc_info(
        &self,
        crtc: randr::Crtc,
        config_timestamp: u32,
    ) -> PlatformResult<randr::GetCrtcInfoReply> {
        self.conn
            .randr_get_crtc_info(crtc, config_timestamp)
            .map_err(PlatformError::query)?
            .reply()
            .map_err(PlatformError::query)
    }

    /// Output info for a connected output listed in `resources`
    fn connected_output(
        &self,
        resources: &randr::GetScreenResourcesCurrentReply,
        display: DisplayId,
    ) -> PlatformResult<randr::GetOutputInfoReply> {
        if !resources.outputs.contains(&display.0) {
            return Err(PlatformError::UnknownDisplay(display));
        }
        let info = self.output_info(display.0, resources.config_timestamp)?;
        if info.connection != randr::Connection::CONNECTED {
            return Err(PlatformError::UnknownDisplay(display));
        }
        Ok(info)
    }

    fn mode_info(
        resources: &randr::GetScreenResourcesCurrentReply,
        mode_id: u32,
    ) -> Option<&randr::ModeInfo> {
        resources.modes.iter().find(|info| info.id == mode_id)
    }
}

impl DisplayQuery for RandrPlatform {
    fn online_displays(&self) -> PlatformResult<Vec<DisplayId>> {
        let resources = self.resources()?;
        let mut displays = Vec::new();
        for &output in &resources.outputs {
            let info = self.output_info(output, resources.config_timestamp)?;
            if info.connection == randr::Connection::CONNECTED {
                debug!(
                    output,
                    name = %String::from_utf8_lossy(&info.name),
                    modes = info.modes.len(),
                    "Found connected output"
                );
                displays.push(DisplayId(output));
            }
        }
        Ok(displays)
    }

    fn all_modes(&self, display: DisplayId) -> PlatformResult<Vec<Mode>> {
        let resources = self.resources()?;
        let info = self.connected_output(&resources, display)?;
        Ok(info
            .modes
            .iter()
            .filter_map(|&mode_id| Self::mode_info(&resources, mode_id))
            .map(|mode_info| modes::to_mode(mode_info, self.scale))
            .collect())
    }

    fn current_mode(&self, display: DisplayId) -> PlatformResult<Option<Mode>> {
        let resources = self.resources()?;
        let info = self.connected_output(&resources, display)?;
        if info.crtc == x11rb::NONE {
            return Ok(None);
        }
        let crtc = self.crtc_info(info.crtc, resources.config_timestamp)?;
        Ok(Self::mode_info(&resources, crtc.mode).map(|mode_info| modes::to_mode(mode_info, self.scale)))
    }
}

/// Scale factor from the root window's `Xft.dpi` resource, 1 if absent
fn detect_scale(conn: &RustConnection, root: Window) -> u32 {
    let resources = conn
        .get_property(
            false,
            root,
            AtomEnum::RESOURCE_MANAGER,
            AtomEnum::STRING,
            0,
            u32::MAX,
        )
        .map_err(anyhow::Error::from)
        .and_then(|cookie| cookie.reply().map_err(anyhow::Error::from));
    match resources {
        Ok(prop) => {
            let text = String::from_utf8_lossy(&prop.value);
            match modes::scale_from_resources(&text) {
                Some(scale) => {
                    debug!(scale, "Scale factor from Xft.dpi");
                    scale
                }
                None => {
                    debug!("No Xft.dpi resource, assuming scale 1");
                    1
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to read X resources, assuming scale 1");
            1
        }
    }
}
