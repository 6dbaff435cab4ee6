//! Mode switching as a server-grab transaction
//!
//! X11 applies `SetCrtcConfig` immediately, so a transaction holds the server
//! grab, remembers what it changed, and on cancel puts it back before
//! releasing the grab.

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt, Rotation, SetConfig};
use x11rb::protocol::xproto::ConnectionExt as XprotoExt;

use super::RandrPlatform;
use super::modes::{self, CrtcExtent};
use crate::error::PlatformError;
use crate::platform::{ConfigureOption, DisplayConfigurator, PlatformResult};
use crate::types::{DisplayId, Mode};

struct CrtcSnapshot {
    crtc: randr::Crtc,
    x: i16,
    y: i16,
    mode: randr::Mode,
    rotation: Rotation,
    outputs: Vec<randr::Output>,
}

struct ScreenSnapshot {
    width: u16,
    height: u16,
    mm_width: u32,
    mm_height: u32,
}

/// Open configuration; the server stays grabbed until cancel or complete
#[derive(Default)]
pub struct RandrTransaction {
    crtcs: Vec<CrtcSnapshot>,
    screen: Option<ScreenSnapshot>,
}

impl RandrPlatform {
    fn screen_size(&self) -> PlatformResult<ScreenSnapshot> {
        let geometry = self
            .conn
            .get_geometry(self.root)
            .map_err(PlatformError::query)?
            .reply()
            .map_err(PlatformError::query)?;
        let width = u32::from(geometry.width);
        let height = u32::from(geometry.height);
        Ok(ScreenSnapshot {
            width: geometry.width,
            height: geometry.height,
            mm_width: modes::pixels_to_mm(width, self.screen_dpi),
            mm_height: modes::pixels_to_mm(height, self.screen_dpi),
        })
    }

    fn set_screen_size(&self, width: u32, height: u32) -> PlatformResult<()> {
        debug!(width, height, "Resizing screen");
        self.conn
            .randr_set_screen_size(
                self.root,
                width as u16,
                height as u16,
                modes::pixels_to_mm(width, self.screen_dpi),
                modes::pixels_to_mm(height, self.screen_dpi),
            )
            .map_err(PlatformError::rejected)?
            .check()
            .map_err(PlatformError::rejected)
    }

    #[allow(clippy::too_many_arguments)]
    fn set_crtc(
        &self,
        crtc: randr::Crtc,
        config_timestamp: u32,
        x: i16,
        y: i16,
        mode: randr::Mode,
        rotation: Rotation,
        outputs: &[randr::Output],
    ) -> PlatformResult<()> {
        let reply = self
            .conn
            .randr_set_crtc_config(
                crtc,
                x11rb::CURRENT_TIME,
                config_timestamp,
                x,
                y,
                mode,
                rotation,
                outputs,
            )
            .map_err(PlatformError::rejected)?
            .reply()
            .map_err(PlatformError::rejected)?;
        if reply.status != SetConfig::SUCCESS {
            return Err(PlatformError::Rejected(format!(
                "SetCrtcConfig returned {:?}",
                reply.status
            )));
        }
        Ok(())
    }

    /// CRTC driving the output, or a free one it can use
    fn crtc_for_output(
        &self,
        info: &randr::GetOutputInfoReply,
        config_timestamp: u32,
    ) -> PlatformResult<randr::Crtc> {
        if info.crtc != x11rb::NONE {
            return Ok(info.crtc);
        }
        for &crtc in &info.crtcs {
            let crtc_info = self.crtc_info(crtc, config_timestamp)?;
            if crtc_info.outputs.is_empty() {
                return Ok(crtc);
            }
        }
        Err(PlatformError::Rejected("no free CRTC for output".to_string()))
    }
}

impl DisplayConfigurator for RandrPlatform {
    type Transaction = RandrTransaction;

    fn begin(&self) -> PlatformResult<RandrTransaction> {
        self.conn
            .grab_server()
            .map_err(PlatformError::rejected)?
            .check()
            .map_err(PlatformError::rejected)?;
        debug!("Server grabbed");
        Ok(RandrTransaction::default())
    }

    fn configure(
        &self,
        txn: &mut RandrTransaction,
        id: DisplayId,
        mode: &Mode,
    ) -> PlatformResult<()> {
        let resources = self.resources()?;
        let output = self.connected_output(&resources, id)?;
        if !output.modes.contains(&mode.native_mode_id) {
            return Err(PlatformError::UnsupportedMode {
                display: id,
                mode_id: mode.native_mode_id,
            });
        }
        let mode_info = Self::mode_info(&resources, mode.native_mode_id).ok_or(
            PlatformError::UnsupportedMode {
                display: id,
                mode_id: mode.native_mode_id,
            },
        )?;

        let target = self.crtc_for_output(&output, resources.config_timestamp)?;
        let mut extents = Vec::new();
        let mut target_info = None;
        for &crtc in &resources.crtcs {
            let info = self.crtc_info(crtc, resources.config_timestamp)?;
            if crtc == target {
                target_info = Some(info);
            } else if info.mode != x11rb::NONE {
                // Reported size is already rotated
                extents.push(CrtcExtent::new(
                    info.x,
                    info.y,
                    u32::from(info.width),
                    u32::from(info.height),
                    Rotation::ROTATE0,
                ));
            }
        }
        let target_info = target_info
            .ok_or_else(|| PlatformError::Rejected(format!("CRTC {target} not in screen resources")))?;
        let rotation = if target_info.mode == x11rb::NONE {
            Rotation::ROTATE0
        } else {
            target_info.rotation
        };
        extents.push(CrtcExtent::new(
            target_info.x,
            target_info.y,
            u32::from(mode_info.width),
            u32::from(mode_info.height),
            rotation,
        ));

        if !txn.crtcs.iter().any(|saved| saved.crtc == target) {
            txn.crtcs.push(CrtcSnapshot {
                crtc: target,
                x: target_info.x,
                y: target_info.y,
                mode: target_info.mode,
                rotation: target_info.rotation,
                outputs: target_info.outputs.clone(),
            });
        }

        let current = self.screen_size()?;
        let required = modes::bounding_size(&extents);
        if let Some((width, height)) =
            modes::grown_screen_size((u32::from(current.width), u32::from(current.height)), required)
        {
            if txn.screen.is_none() {
                txn.screen = Some(current);
            }
            self.set_screen_size(width, height)?;
        }

        let mut outputs = target_info.outputs.clone();
        if !outputs.contains(&id.0) {
            outputs.push(id.0);
        }
        self.set_crtc(
            target,
            resources.config_timestamp,
            target_info.x,
            target_info.y,
            mode.native_mode_id,
            rotation,
            &outputs,
        )?;
        debug!(display = %id, crtc = target, mode_id = mode.native_mode_id, "CRTC configured");
        Ok(())
    }

    fn cancel(&self, txn: RandrTransaction) {
        let config_timestamp = match self.resources() {
            Ok(resources) => resources.config_timestamp,
            Err(e) => {
                warn!(error = %e, "Failed to read screen resources for rollback");
                x11rb::CURRENT_TIME
            }
        };
        for saved in txn.crtcs.iter().rev() {
            if let Err(e) = self.set_crtc(
                saved.crtc,
                config_timestamp,
                saved.x,
                saved.y,
                saved.mode,
                saved.rotation,
                &saved.outputs,
            ) {
                warn!(crtc = saved.crtc, error = %e, "Failed to restore CRTC");
            }
        }
        if let Some(screen) = txn.screen {
            let restored = self
                .conn
                .randr_set_screen_size(
                    self.root,
                    screen.width,
                    screen.height,
                    screen.mm_width,
                    screen.mm_height,
                )
                .map_err(PlatformError::rejected)
                .and_then(|cookie| cookie.check().map_err(PlatformError::rejected));
            if let Err(e) = restored {
                warn!(error = %e, "Failed to restore screen size");
            }
        }
        if let Err(e) = self.conn.ungrab_server().map_err(anyhow::Error::from).and_then(|_| {
            self.conn.flush().map_err(anyhow::Error::from)
        }) {
            warn!(error = %e, "Failed to release server grab");
        }
        debug!("Configuration cancelled");
    }

    fn complete(&self, _txn: RandrTransaction, option: ConfigureOption) -> PlatformResult<()> {
        self.conn
            .ungrab_server()
            .map_err(PlatformError::rejected)?
            .check()
            .map_err(PlatformError::rejected)?;
        if option != ConfigureOption::ForAppOnly {
            debug!(option = ?option, "X11 keeps the configuration until the server exits");
        }
        Ok(())
    }
}
