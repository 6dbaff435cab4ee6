//! All-or-nothing resolution switching

use tracing::{error, info};

use crate::error::ApplyError;
use crate::platform::{ConfigureOption, DisplayConfigurator};
use crate::types::{DisplayId, Mode};

/// Switches a display to a mode inside a single configuration transaction
pub struct ResolutionApplier<C> {
    configurator: C,
}

impl<C: DisplayConfigurator> ResolutionApplier<C> {
    pub fn new(configurator: C) -> Self {
        Self { configurator }
    }

    /// Switch `display` to `mode`, committing permanently
    ///
    /// If the configure step fails the transaction is cancelled so no partial
    /// change survives. Failures are not retried.
    pub fn apply(&self, id: DisplayId, mode: &Mode) -> Result<(), ApplyError> {
        info!(
            display = %id,
            width = mode.logical_width,
            height = mode.logical_height,
            mode_id = mode.native_mode_id,
            "Switching resolution"
        );

        let mut txn = self.configurator.begin().map_err(|e| {
            error!(display = %id, error = %e, "Failed to begin display configuration");
            ApplyError::BeginFailed(e)
        })?;

        if let Err(e) = self.configurator.configure(&mut txn, id, mode) {
            error!(
                display = %id,
                width = mode.logical_width,
                height = mode.logical_height,
                error = %e,
                "Failed to set resolution, cancelling configuration"
            );
            self.configurator.cancel(txn);
            return Err(ApplyError::ConfigureFailed {
                display: id,
                mode: *mode,
                source: e,
            });
        }

        self.configurator
            .complete(txn, ConfigureOption::Permanently)
            .map_err(|e| {
                error!(display = %id, error = %e, "Failed to complete display configuration");
                ApplyError::CommitFailed(e)
            })?;

        info!(
            display = %id,
            width = mode.logical_width,
            height = mode.logical_height,
            "Resolution set"
        );
        Ok(())
    }
}
