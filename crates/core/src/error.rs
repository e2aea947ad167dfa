//! Error types for mira-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameter outside its documented range. Raised before any I/O.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    Validation {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A named preset or mode that does not exist.
    #[error("unknown {kind} '{name}' (expected one of: {expected})")]
    UnknownName {
        kind: &'static str,
        name: String,
        expected: &'static str,
    },

    /// Raw auto-dither profile with the wrong number of bytes.
    #[error("auto-dither profile must be exactly 4 bytes, got {len}")]
    ProfileLength { len: usize },

    /// No connected device matches the requested identifiers.
    #[error("no device found (VID=0x{vid:04X} PID=0x{pid:04X})")]
    DeviceNotFound { vid: u16, pid: u16 },

    /// The HID subsystem could not be initialized.
    #[error("failed to initialize HID: {0}")]
    TransportInit(String),

    /// Opening, writing to, or closing the device handle failed.
    #[error("HID I/O failed during {command}: {message}")]
    Io {
        command: &'static str,
        message: String,
    },

    /// Settings file could not be read or parsed.
    #[error("settings error: {0}")]
    Settings(String),
}

/// Coarse classification of [`Error`] for callers that report or branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DeviceNotFound,
    TransportInit,
    Io,
    Settings,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } | Error::UnknownName { .. } | Error::ProfileLength { .. } => {
                ErrorKind::Validation
            }
            Error::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Error::TransportInit(_) => ErrorKind::TransportInit,
            Error::Io { .. } => ErrorKind::Io,
            Error::Settings(_) => ErrorKind::Settings,
        }
    }

    pub(crate) fn io(command: &'static str, message: impl Into<String>) -> Self {
        Error::Io {
            command,
            message: message.into(),
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
