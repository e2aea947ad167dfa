//! HID transport abstraction for device communication.
//!
//! The Mira protocol is write-only: a command is one output report and the
//! device sends nothing back. Real hidapi handles and test doubles share the
//! [`HidTransport`] trait.

use crate::error::{Error, Result};
use crate::subsystem::HidSubsystem;
use tracing::{info, trace};

/// Abstraction over an exclusively owned, open HID handle.
pub trait HidTransport: Send {
    /// Write one output report. `command` names the operation for error context.
    fn write_report(&mut self, command: &'static str, data: &[u8]) -> Result<()>;

    /// Close the handle and release anything acquired at open time.
    fn close(self: Box<Self>) -> Result<()>;
}

/// hidapi-backed transport.
///
/// Field order matters: the device handle is dropped before the subsystem
/// lease.
pub struct HidapiTransport {
    device: hidapi::HidDevice,
    lease: HidSubsystem,
}

impl HidapiTransport {
    pub(crate) fn new(device: hidapi::HidDevice, lease: HidSubsystem) -> Self {
        Self { device, lease }
    }
}

impl HidTransport for HidapiTransport {
    fn write_report(&mut self, command: &'static str, data: &[u8]) -> Result<()> {
        trace!(
            command,
            report_hex = format_args!("{:02X?}", data),
            "HID TX"
        );
        let written = self
            .device
            .write(data)
            .map_err(|e| Error::io(command, format!("write: {e}")))?;
        if written < data.len() {
            return Err(Error::io(
                command,
                format!("short write: {written} of {} bytes", data.len()),
            ));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self { device, lease } = *self;
        drop(device);
        lease.release();
        info!("Device handle closed");
        Ok(())
    }
}

/// A recording HID transport for testing.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared view of what a [`MockTransport`] saw.
    #[derive(Debug, Default)]
    pub struct MockLog {
        pub frames: Vec<Vec<u8>>,
        pub commands: Vec<&'static str>,
        pub closed: bool,
    }

    /// Mock transport that records every written frame.
    pub struct MockTransport {
        log: Arc<Mutex<MockLog>>,
        fail_writes: bool,
    }

    impl MockTransport {
        pub fn new() -> (Self, Arc<Mutex<MockLog>>) {
            let log = Arc::new(Mutex::new(MockLog::default()));
            (
                Self {
                    log: Arc::clone(&log),
                    fail_writes: false,
                },
                log,
            )
        }

        /// A transport whose writes always fail.
        pub fn failing() -> (Self, Arc<Mutex<MockLog>>) {
            let (mut mock, log) = Self::new();
            mock.fail_writes = true;
            (mock, log)
        }
    }

    impl HidTransport for MockTransport {
        fn write_report(&mut self, command: &'static str, data: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(Error::io(command, "mock: write failed"));
            }
            let mut log = self.log.lock().unwrap();
            log.frames.push(data.to_vec());
            log.commands.push(command);
            Ok(())
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.log.lock().unwrap().closed = true;
            Ok(())
        }
    }
}
