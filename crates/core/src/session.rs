//! Open device session: validate, encode, write, settle.
//!
//! A [`Session`] owns exactly one transport. Every operation validates its
//! parameters first (no I/O on failure), encodes one frame, writes it, then
//! blocks for [`SETTLE_DELAY`] so the panel can apply the command before
//! the next one arrives.
//!
//! The protocol has no acknowledgement. Success means the write call did not
//! fail. After a failed write the device state is unknown; close the session
//! instead of retrying.

use crate::codec::{AutoDitherProfile, Command, RefreshMode};
use crate::error::{Error, Result};
use crate::safety;
use crate::settings::Settings;
use crate::transport::HidTransport;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause after every write.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// An open connection to one Mira device.
pub struct Session {
    // `None` only after close has taken it.
    transport: Option<Box<dyn HidTransport>>,
    settle: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.transport.is_some())
            .field("settle", &self.settle)
            .finish()
    }
}

impl Session {
    /// Wrap an already opened transport.
    pub fn new(transport: Box<dyn HidTransport>) -> Self {
        Self {
            transport: Some(transport),
            settle: SETTLE_DELAY,
        }
    }

    /// Override the post-write settle delay.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    /// Validate, encode and write one command, then wait for the device to settle.
    ///
    /// Out-of-range values are rejected before anything is written.
    pub fn send(&mut self, command: Command) -> Result<()> {
        safety::validate_command(&command)?;
        let frame = command.encode();
        let name = command.opcode().name();
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::io(name, "session is closed"))?;
        transport.write_report(name, &frame)?;
        debug!(command = name, settle_ms = self.settle.as_millis() as u64, "Settling");
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        Ok(())
    }

    /// Trigger a full screen refresh.
    pub fn refresh(&mut self) -> Result<()> {
        self.send(Command::Refresh)
    }

    /// Apply an auto-dither profile (preset or raw vector).
    pub fn set_auto_dither_profile(&mut self, profile: AutoDitherProfile) -> Result<()> {
        self.send(Command::SetAutoDitherMode(profile))
    }

    /// Set refresh speed, 1 (slowest) to 7 (fastest).
    pub fn set_speed(&mut self, speed: i32) -> Result<()> {
        let speed = safety::validate_speed(speed)?;
        self.send(Command::SetSpeed(speed))
    }

    /// Set contrast, 0 to 15.
    pub fn set_contrast(&mut self, contrast: i32) -> Result<()> {
        let contrast = safety::validate_contrast(contrast)?;
        self.send(Command::SetContrast(contrast))
    }

    /// Select the refresh algorithm (direct, gray, or a2).
    pub fn set_refresh_mode(&mut self, mode: RefreshMode) -> Result<()> {
        self.send(Command::SetRefreshMode(mode))
    }

    /// Set dither mode, 0 to 3.
    pub fn set_dither_mode(&mut self, mode: i32) -> Result<()> {
        let mode = safety::validate_dither_mode(mode)?;
        self.send(Command::SetDitherMode(mode))
    }

    /// Set both color filters in one frame. Each is 0 to 254.
    ///
    /// Both values are checked before either is encoded.
    pub fn set_color_filter(&mut self, white: i32, black: i32) -> Result<()> {
        let white = safety::validate_filter_level("white_filter", white)?;
        let black = safety::validate_filter_level("black_filter", black)?;
        self.send(Command::SetColorFilter { white, black })
    }

    /// Set cold backlight level, 0 to 254.
    pub fn set_cold_light(&mut self, level: i32) -> Result<()> {
        let level = safety::validate_light_level("cold_light", level)?;
        self.send(Command::SetColdLight(level))
    }

    /// Set warm backlight level, 0 to 254.
    pub fn set_warm_light(&mut self, level: i32) -> Result<()> {
        let level = safety::validate_light_level("warm_light", level)?;
        self.send(Command::SetWarmLight(level))
    }

    /// Apply a settings batch.
    ///
    /// The whole batch is validated before the first write. Returns the
    /// number of commands sent.
    pub fn apply(&mut self, settings: &Settings) -> Result<usize> {
        let commands = settings.commands()?;
        for command in &commands {
            self.send(*command)?;
        }
        Ok(commands.len())
    }

    /// Close the device handle and release the HID subsystem lease.
    ///
    /// Consumes the session; a closed session cannot be used or closed again.
    pub fn close(mut self) -> Result<()> {
        match self.transport.take() {
            Some(transport) => {
                transport.close()?;
                info!("Session closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                warn!(error = %e, "Failed to close session on drop");
            }
        }
    }
}
