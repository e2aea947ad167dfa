//! mira-core: command codec, device discovery, and HID sessions for Boox
//! Mira e-ink monitors.
//!
//! The Mira is driven through a vendor HID channel with fire-and-forget
//! output reports. Discovery opens a device into a [`session::Session`],
//! which validates parameters, encodes frames via [`codec`], writes them,
//! and paces the device with a fixed settle delay.

pub mod codec;
pub mod discovery;
pub mod error;
pub mod safety;
pub mod session;
pub mod settings;
pub mod subsystem;
pub mod transport;

/// Mira USB Vendor ID.
pub const MIRA_VID: u16 = 0x0416;

/// Mira USB Product ID.
pub const MIRA_PID: u16 = 0x5020;
