//! Settings batches: a set of optional display settings applied together.
//!
//! A batch can come from CLI flags, a JSON file, or both (flags win). The
//! whole batch is validated before anything is written, and commands are
//! always sent in the same order.

use crate::codec::{Command, RefreshMode};
use crate::error::{Error, Result};
use crate::safety;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Optional display settings. `None` leaves the device value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_mode: Option<RefreshMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dither_mode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_filter: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_filter: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cold_light: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warm_light: Option<i32>,
}

impl Settings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-wise override: values set in `overrides` replace ours.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            refresh_mode: overrides.refresh_mode.or(self.refresh_mode),
            speed: overrides.speed.or(self.speed),
            contrast: overrides.contrast.or(self.contrast),
            dither_mode: overrides.dither_mode.or(self.dither_mode),
            white_filter: overrides.white_filter.or(self.white_filter),
            black_filter: overrides.black_filter.or(self.black_filter),
            cold_light: overrides.cold_light.or(self.cold_light),
            warm_light: overrides.warm_light.or(self.warm_light),
        }
    }

    /// Validate every present value.
    pub fn validate(&self) -> Result<()> {
        self.commands().map(|_| ())
    }

    /// Validated commands in send order.
    ///
    /// Order: refresh mode, speed, contrast, dither mode, color filter,
    /// cold light, warm light. If either filter is set both go out in one
    /// frame, with the unset one as 0.
    pub fn commands(&self) -> Result<Vec<Command>> {
        let mut commands = Vec::new();

        if let Some(mode) = self.refresh_mode {
            commands.push(Command::SetRefreshMode(mode));
        }
        if let Some(speed) = self.speed {
            commands.push(Command::SetSpeed(safety::validate_speed(speed)?));
        }
        if let Some(contrast) = self.contrast {
            commands.push(Command::SetContrast(safety::validate_contrast(contrast)?));
        }
        if let Some(mode) = self.dither_mode {
            commands.push(Command::SetDitherMode(safety::validate_dither_mode(mode)?));
        }
        if self.white_filter.is_some() || self.black_filter.is_some() {
            let white =
                safety::validate_filter_level("white_filter", self.white_filter.unwrap_or(0))?;
            let black =
                safety::validate_filter_level("black_filter", self.black_filter.unwrap_or(0))?;
            commands.push(Command::SetColorFilter { white, black });
        }
        if let Some(level) = self.cold_light {
            commands.push(Command::SetColdLight(safety::validate_light_level(
                "cold_light",
                level,
            )?));
        }
        if let Some(level) = self.warm_light {
            commands.push(Command::SetWarmLight(safety::validate_light_level(
                "warm_light",
                level,
            )?));
        }

        Ok(commands)
    }
}

/// Load a settings batch from a JSON file.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Settings(format!("read {}: {e}", path.display())))?;
    let settings: Settings = serde_json::from_str(&text)
        .map_err(|e| Error::Settings(format!("parse {}: {e}", path.display())))?;
    debug!(path = %path.display(), ?settings, "Loaded settings file");
    Ok(settings)
}
