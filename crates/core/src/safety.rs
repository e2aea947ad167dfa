//! Safety layer: validates every command parameter against the ranges the
//! Mira firmware accepts before anything is encoded or written.
//!
//! # Mira parameter bounds
//!
//! | Parameter          | Range   | Wire transform   |
//! |--------------------|---------|------------------|
//! | speed              | 1 – 7   | `11 - speed`     |
//! | contrast           | 0 – 15  | none             |
//! | dither mode        | 0 – 3   | none             |
//! | white/black filter | 0 – 254 | `255 - white`    |
//! | cold/warm light    | 0 – 254 | none             |
//!
//! Validation returns the value unchanged as a byte. Transforms are applied
//! once, by [`crate::codec::Command::encode`].

use crate::codec::Command;
use crate::error::{Error, Result};
use std::ops::RangeInclusive;

pub const SPEED_MIN: i32 = 1;
pub const SPEED_MAX: i32 = 7;

pub const CONTRAST_MIN: i32 = 0;
pub const CONTRAST_MAX: i32 = 15;

pub const DITHER_MODE_MIN: i32 = 0;
pub const DITHER_MODE_MAX: i32 = 3;

/// Shared bound for the color filters and both backlights.
pub const LEVEL_MIN: i32 = 0;
pub const LEVEL_MAX: i32 = 254;

fn check(field: &'static str, value: i32, range: RangeInclusive<i32>) -> Result<u8> {
    if !range.contains(&value) {
        return Err(Error::Validation {
            field,
            value: value.into(),
            min: (*range.start()).into(),
            max: (*range.end()).into(),
        });
    }
    u8::try_from(value).map_err(|_| Error::Validation {
        field,
        value: value.into(),
        min: 0,
        max: u8::MAX.into(),
    })
}

/// Validate a refresh speed.
pub fn validate_speed(speed: i32) -> Result<u8> {
    check("speed", speed, SPEED_MIN..=SPEED_MAX)
}

/// Validate a contrast level.
pub fn validate_contrast(contrast: i32) -> Result<u8> {
    check("contrast", contrast, CONTRAST_MIN..=CONTRAST_MAX)
}

/// Validate a dither mode.
pub fn validate_dither_mode(mode: i32) -> Result<u8> {
    check("dither_mode", mode, DITHER_MODE_MIN..=DITHER_MODE_MAX)
}

/// Validate a white or black filter level.
pub fn validate_filter_level(field: &'static str, level: i32) -> Result<u8> {
    check(field, level, LEVEL_MIN..=LEVEL_MAX)
}

/// Validate a cold or warm backlight level.
pub fn validate_light_level(field: &'static str, level: i32) -> Result<u8> {
    check(field, level, LEVEL_MIN..=LEVEL_MAX)
}

/// Range-check every numeric parameter carried by `command`.
pub fn validate_command(command: &Command) -> Result<()> {
    match *command {
        Command::Refresh | Command::SetRefreshMode(_) | Command::SetAutoDitherMode(_) => Ok(()),
        Command::SetSpeed(v) => validate_speed(v.into()).map(|_| ()),
        Command::SetContrast(v) => validate_contrast(v.into()).map(|_| ()),
        Command::SetDitherMode(v) => validate_dither_mode(v.into()).map(|_| ()),
        Command::SetColdLight(v) => validate_light_level("cold_light", v.into()).map(|_| ()),
        Command::SetWarmLight(v) => validate_light_level("warm_light", v.into()).map(|_| ()),
        Command::SetColorFilter { white, black } => {
            validate_filter_level("white_filter", white.into())?;
            validate_filter_level("black_filter", black.into())?;
            Ok(())
        }
    }
}
