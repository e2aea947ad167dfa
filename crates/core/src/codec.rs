//! Mira command frame encoding.
//!
//! Every frame is a single HID output report:
//!
//! ```text
//! [REPORT_ID (0x00), opcode, payload...]
//! ```
//!
//! The payload width is fixed per opcode. Two parameters are inverted on the
//! wire because the firmware expects "lower is stronger":
//!   - speed: `11 - speed`
//!   - white filter: `255 - white`
//!
//! Encoding is pure and infallible; range checks live in [`crate::safety`].

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Report ID prefixed to every frame.
pub const REPORT_ID: u8 = 0x00;

/// Base for the speed inversion (`encoded = SPEED_INVERT_BASE - speed`).
pub const SPEED_INVERT_BASE: u8 = 11;

/// Base for the white filter inversion (`encoded = WHITE_INVERT_BASE - white`).
pub const WHITE_INVERT_BASE: u8 = 255;

/// One-byte operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Refresh = 0x01,
    SetRefreshMode = 0x02,
    SetSpeed = 0x04,
    SetContrast = 0x05,
    SetColdLight = 0x06,
    SetWarmLight = 0x07,
    SetDitherMode = 0x09,
    SetColorFilter = 0x11,
    SetAutoDitherMode = 0x12,
}

impl OpCode {
    /// All opcodes.
    pub const ALL: &'static [OpCode] = &[
        OpCode::Refresh,
        OpCode::SetRefreshMode,
        OpCode::SetSpeed,
        OpCode::SetContrast,
        OpCode::SetColdLight,
        OpCode::SetWarmLight,
        OpCode::SetDitherMode,
        OpCode::SetColorFilter,
        OpCode::SetAutoDitherMode,
    ];

    /// Wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Number of payload bytes following the opcode.
    pub fn payload_len(self) -> usize {
        match self {
            Self::Refresh => 0,
            Self::SetRefreshMode
            | Self::SetSpeed
            | Self::SetContrast
            | Self::SetColdLight
            | Self::SetWarmLight
            | Self::SetDitherMode => 1,
            Self::SetColorFilter => 2,
            Self::SetAutoDitherMode => 4,
        }
    }

    /// Total frame length: report ID + opcode + payload.
    pub fn frame_len(self) -> usize {
        2 + self.payload_len()
    }

    /// Command name used in logs and error context.
    pub fn name(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::SetRefreshMode => "set-refresh-mode",
            Self::SetSpeed => "set-speed",
            Self::SetContrast => "set-contrast",
            Self::SetColdLight => "set-cold-light",
            Self::SetWarmLight => "set-warm-light",
            Self::SetDitherMode => "set-dither-mode",
            Self::SetColorFilter => "set-color-filter",
            Self::SetAutoDitherMode => "set-auto-dither-mode",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.as_byte())
    }
}

/// Screen refresh algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum RefreshMode {
    /// Black/white, fast.
    #[serde(rename = "direct")]
    DirectUpdate = 0x01,
    /// Grayscale, slow.
    #[serde(rename = "gray", alias = "grey")]
    GrayUpdate = 0x02,
    /// Fast partial update.
    A2 = 0x03,
}

impl RefreshMode {
    pub const ALL: &'static [RefreshMode] = &[
        RefreshMode::DirectUpdate,
        RefreshMode::GrayUpdate,
        RefreshMode::A2,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// CLI-facing name.
    pub fn name(self) -> &'static str {
        match self {
            Self::DirectUpdate => "direct",
            Self::GrayUpdate => "gray",
            Self::A2 => "a2",
        }
    }
}

impl FromStr for RefreshMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(Self::DirectUpdate),
            "gray" | "grey" => Ok(Self::GrayUpdate),
            "a2" => Ok(Self::A2),
            _ => Err(Error::UnknownName {
                kind: "refresh mode",
                name: s.to_string(),
                expected: "direct, gray, a2",
            }),
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Auto-dither profile: `[enable, reserved, threshold_a, threshold_b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AutoDitherProfile([u8; 4]);

impl AutoDitherProfile {
    pub const DISABLE: Self = Self([0, 0, 0, 0]);
    pub const LOW: Self = Self([1, 0, 30, 10]);
    pub const MIDDLE: Self = Self([1, 0, 40, 10]);
    pub const HIGH: Self = Self([1, 0, 50, 30]);

    /// Named presets in ascending strength.
    pub const PRESETS: &'static [(&'static str, AutoDitherProfile)] = &[
        ("disable", Self::DISABLE),
        ("low", Self::LOW),
        ("middle", Self::MIDDLE),
        ("high", Self::HIGH),
    ];

    /// Wrap a raw 4-byte vector.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Preset name, if this profile is one of the presets.
    pub fn preset_name(&self) -> Option<&'static str> {
        Self::PRESETS
            .iter()
            .find(|(_, p)| p == self)
            .map(|(name, _)| *name)
    }
}

impl TryFrom<&[u8]> for AutoDitherProfile {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 4] = bytes
            .try_into()
            .map_err(|_| Error::ProfileLength { len: bytes.len() })?;
        Ok(Self(raw))
    }
}

impl FromStr for AutoDitherProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        let lower = if lower == "disabled" || lower == "off" {
            "disable"
        } else {
            lower.as_str()
        };
        Self::PRESETS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, p)| *p)
            .ok_or_else(|| Error::UnknownName {
                kind: "auto-dither profile",
                name: s.to_string(),
                expected: "disable, low, middle, high",
            })
    }
}

impl fmt::Display for AutoDitherProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.preset_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// A logical command with logical (pre-transform) parameter values.
///
/// [`crate::session::Session::send`] checks every command with
/// [`crate::safety::validate_command`] before encoding. `encode` itself does
/// no range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    SetRefreshMode(RefreshMode),
    /// Logical speed, 1 (slowest) ..= 7 (fastest).
    SetSpeed(u8),
    SetContrast(u8),
    SetColdLight(u8),
    SetWarmLight(u8),
    SetDitherMode(u8),
    /// Logical filter strengths; white is inverted on the wire.
    SetColorFilter { white: u8, black: u8 },
    SetAutoDitherMode(AutoDitherProfile),
}

impl Command {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Refresh => OpCode::Refresh,
            Self::SetRefreshMode(_) => OpCode::SetRefreshMode,
            Self::SetSpeed(_) => OpCode::SetSpeed,
            Self::SetContrast(_) => OpCode::SetContrast,
            Self::SetColdLight(_) => OpCode::SetColdLight,
            Self::SetWarmLight(_) => OpCode::SetWarmLight,
            Self::SetDitherMode(_) => OpCode::SetDitherMode,
            Self::SetColorFilter { .. } => OpCode::SetColorFilter,
            Self::SetAutoDitherMode(_) => OpCode::SetAutoDitherMode,
        }
    }

    /// Encode into the exact output report bytes.
    pub fn encode(&self) -> Vec<u8> {
        let opcode = self.opcode();
        let mut buf = Vec::with_capacity(opcode.frame_len());
        buf.push(REPORT_ID);
        buf.push(opcode.as_byte());
        match *self {
            Self::Refresh => {}
            Self::SetRefreshMode(mode) => buf.push(mode.as_byte()),
            // Validated speed never exceeds 7; saturate rather than wrap otherwise.
            Self::SetSpeed(speed) => buf.push(SPEED_INVERT_BASE.saturating_sub(speed)),
            Self::SetContrast(v)
            | Self::SetColdLight(v)
            | Self::SetWarmLight(v)
            | Self::SetDitherMode(v) => buf.push(v),
            Self::SetColorFilter { white, black } => {
                buf.push(WHITE_INVERT_BASE - white);
                buf.push(black);
            }
            Self::SetAutoDitherMode(profile) => buf.extend_from_slice(profile.as_bytes()),
        }
        buf
    }
}
