//! Device discovery: enumeration, listing, and opening a session.
//!
//! Opening always enumerates first and then opens the chosen device by path,
//! so "nothing connected" is reported as [`Error::DeviceNotFound`] before any
//! handle exists.
//!
//! When several matching devices are connected the first one in host
//! enumeration order wins. That order is not stable across hosts or
//! replugs; a warning is logged so the ambiguity is visible.

use crate::error::{Error, Result};
use crate::session::Session;
use crate::subsystem::HidSubsystem;
use crate::transport::{HidTransport, HidapiTransport};
use crate::{MIRA_PID, MIRA_VID};
use serde::Serialize;
use std::ffi::CString;
use tracing::{debug, info, warn};

/// Read-only record of one enumerated HID device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl DeviceDescriptor {
    /// Whether this device matches `vid`/`pid`. Zero matches anything.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        (vid == 0 || self.vendor_id == vid) && (pid == 0 || self.product_id == pid)
    }

    /// Whether this is a Mira monitor.
    pub fn is_mira(&self) -> bool {
        self.matches(MIRA_VID, MIRA_PID)
    }

    fn from_hidapi(info: &hidapi::DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            manufacturer: info.manufacturer_string().unwrap_or_default().to_string(),
            product: info.product_string().unwrap_or_default().to_string(),
            path: info.path().to_string_lossy().into_owned(),
            serial_number: info.serial_number().map(|s| s.to_string()),
        }
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (VID: 0x{:04X}, PID: 0x{:04X}, path: {})",
            self.manufacturer, self.product, self.vendor_id, self.product_id, self.path
        )
    }
}

/// Source of HID devices: enumeration plus opening by descriptor.
pub trait HidBackend {
    /// Every currently connected HID device.
    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Open one enumerated device.
    fn open(&mut self, device: &DeviceDescriptor) -> Result<Box<dyn HidTransport>>;
}

/// hidapi-backed device source. Holds a subsystem lease while alive.
pub struct HidapiBackend {
    lease: HidSubsystem,
}

impl HidapiBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            lease: HidSubsystem::acquire()?,
        })
    }

    /// Release the subsystem lease held by this backend.
    pub fn release(self) {
        self.lease.release();
    }
}

impl HidBackend for HidapiBackend {
    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>> {
        debug!("Starting HID device enumeration");
        let devices = self.lease.with_api(|api| {
            api.refresh_devices()
                .map_err(|e| Error::TransportInit(format!("enumerate: {e}")))?;
            Ok(api
                .device_list()
                .map(DeviceDescriptor::from_hidapi)
                .collect::<Vec<_>>())
        })?;
        debug!(count = devices.len(), "Device enumeration complete");
        Ok(devices)
    }

    fn open(&mut self, device: &DeviceDescriptor) -> Result<Box<dyn HidTransport>> {
        let path = CString::new(device.path.as_str())
            .map_err(|e| Error::io("open", format!("invalid device path: {e}")))?;
        // The transport keeps its own lease so it outlives this backend.
        let lease = HidSubsystem::acquire()?;
        let handle = self.lease.with_api(|api| {
            api.open_path(&path).map_err(|e| {
                Error::io(
                    "open",
                    format!(
                        "open HID device (VID=0x{:04X} PID=0x{:04X} path={}): {e}",
                        device.vendor_id, device.product_id, device.path
                    ),
                )
            })
        })?;
        Ok(Box::new(HidapiTransport::new(handle, lease)))
    }
}

/// List every connected HID device through `backend`.
pub fn list_devices_with(backend: &mut dyn HidBackend) -> Result<Vec<DeviceDescriptor>> {
    backend.enumerate()
}

/// List connected devices matching `vid`/`pid` (zero is a wildcard).
pub fn list_matching_with(
    backend: &mut dyn HidBackend,
    vid: u16,
    pid: u16,
) -> Result<Vec<DeviceDescriptor>> {
    Ok(backend
        .enumerate()?
        .into_iter()
        .filter(|d| d.matches(vid, pid))
        .collect())
}

/// Open the first device matching `vid`/`pid` into a new session.
pub fn open_first_matching_with(
    backend: &mut dyn HidBackend,
    vid: u16,
    pid: u16,
) -> Result<Session> {
    let candidates = list_matching_with(backend, vid, pid)?;
    let first = candidates
        .first()
        .ok_or(Error::DeviceNotFound { vid, pid })?;
    if candidates.len() > 1 {
        warn!(
            count = candidates.len(),
            path = %first.path,
            "Multiple matching devices; using the first in host enumeration order"
        );
    }

    let transport = backend.open(first)?;
    info!(
        vid = format_args!("0x{:04X}", first.vendor_id),
        pid = format_args!("0x{:04X}", first.product_id),
        product = %first.product,
        path = %first.path,
        "Opened device"
    );
    Ok(Session::new(transport))
}

/// List every connected HID device, system-wide.
pub fn list_devices() -> Result<Vec<DeviceDescriptor>> {
    let mut backend = HidapiBackend::new()?;
    let devices = list_devices_with(&mut backend);
    backend.release();
    devices
}

/// List connected devices matching `vid`/`pid` (zero is a wildcard).
pub fn list_matching(vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>> {
    let mut backend = HidapiBackend::new()?;
    let devices = list_matching_with(&mut backend, vid, pid);
    backend.release();
    devices
}

/// Open the first connected device matching `vid`/`pid`.
pub fn open_first_matching(vid: u16, pid: u16) -> Result<Session> {
    let mut backend = HidapiBackend::new()?;
    let session = open_first_matching_with(&mut backend, vid, pid);
    backend.release();
    session
}

/// Open the first connected Mira monitor.
pub fn open_default() -> Result<Session> {
    open_first_matching(MIRA_VID, MIRA_PID)
}


#[cfg(test)]
mod tests {
    use super::mock::{descriptor, FakeBackend};
    use super::*;
    use crate::subsystem::lock_for_test;

    #[test]
    fn zero_ids_are_wildcards() {
        let dev = descriptor(0x0416, 0x5020, "/dev/hidraw0");
        assert!(dev.matches(0, 0));
        assert!(dev.matches(0x0416, 0));
        assert!(dev.matches(0, 0x5020));
        assert!(dev.matches(MIRA_VID, MIRA_PID));
        assert!(!dev.matches(0x046D, 0));
        assert!(dev.is_mira());
    }

    #[test]
    fn list_devices_is_unfiltered() {
        let mut backend = FakeBackend::with_devices(vec![
            descriptor(0x046D, 0xC08B, "/dev/hidraw0"),
            descriptor(MIRA_VID, MIRA_PID, "/dev/hidraw1"),
        ]);
        let all = list_devices_with(&mut backend).unwrap();
        assert_eq!(all.len(), 2);
        assert!(backend.opened.is_empty());
    }

    #[test]
    fn list_matching_filters() {
        let mut backend = FakeBackend::with_devices(vec![
            descriptor(0x046D, 0xC08B, "/dev/hidraw0"),
            descriptor(MIRA_VID, MIRA_PID, "/dev/hidraw1"),
        ]);
        let mira = list_matching_with(&mut backend, MIRA_VID, MIRA_PID).unwrap();
        assert_eq!(mira.len(), 1);
        assert_eq!(mira[0].path, "/dev/hidraw1");
    }

    #[test]
    fn open_missing_device_is_not_found() {
        let mut backend = FakeBackend::with_devices(vec![descriptor(0x046D, 0xC08B, "/dev/hidraw0")]);
        let err = open_first_matching_with(&mut backend, MIRA_VID, MIRA_PID).unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceNotFound {
                vid: MIRA_VID,
                pid: MIRA_PID
            }
        ));
        assert!(backend.opened.is_empty());
    }

    #[test]
    fn open_picks_first_in_enumeration_order() {
        let mut backend = FakeBackend::with_devices(vec![
            descriptor(MIRA_VID, MIRA_PID, "/dev/hidraw3"),
            descriptor(MIRA_VID, MIRA_PID, "/dev/hidraw1"),
        ]);
        let session = open_first_matching_with(&mut backend, MIRA_VID, MIRA_PID).unwrap();
        assert_eq!(backend.opened, vec!["/dev/hidraw3".to_string()]);
        session.close().unwrap();
    }

    #[test]
    fn enumeration_failure_is_transport_init() {
        let mut backend = FakeBackend {
            fail_enumerate: true,
            ..FakeBackend::default()
        };
        let err = open_first_matching_with(&mut backend, MIRA_VID, MIRA_PID).unwrap_err();
        assert!(matches!(err, Error::TransportInit(_)));
    }

    #[test]
    fn not_found_releases_subsystem() {
        let _guard = lock_for_test();
        let before = HidSubsystem::holders();
        match open_first_matching(0xFFFE, 0xFFFE) {
            Err(Error::DeviceNotFound { vid, pid }) => assert_eq!((vid, pid), (0xFFFE, 0xFFFE)),
            // No HID backend on this host.
            Err(Error::TransportInit(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("unexpected device 0xFFFE:0xFFFE"),
        }
        assert_eq!(HidSubsystem::holders(), before);
    }

    #[test]
    fn failed_open_keeps_only_backend_lease() {
        let _guard = lock_for_test();
        let before = HidSubsystem::holders();
        let mut backend = match HidapiBackend::new() {
            Ok(backend) => backend,
            Err(Error::TransportInit(_)) => return,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(HidSubsystem::holders(), before + 1);

        let missing = descriptor(MIRA_VID, MIRA_PID, "/dev/does-not-exist");
        let err = match backend.open(&missing) {
            Err(e) => e,
            Ok(_) => panic!("opened a nonexistent path"),
        };
        assert!(matches!(err, Error::Io { command: "open", .. }));
        assert_eq!(HidSubsystem::holders(), before + 1);

        backend.release();
        assert_eq!(HidSubsystem::holders(), before);
    }

    #[test]
    fn listing_releases_subsystem() {
        let _guard = lock_for_test();
        let before = HidSubsystem::holders();
        match list_devices() {
            Ok(_) | Err(Error::TransportInit(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
        assert_eq!(HidSubsystem::holders(), before);
    }

    #[test]
    fn descriptor_serializes_for_listing() {
        let dev = descriptor(MIRA_VID, MIRA_PID, "/dev/hidraw1");
        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["vendor_id"], 0x0416);
        assert_eq!(json["product_id"], 0x5020);
        assert!(json.get("serial_number").is_none());
    }

    #[test]
    fn descriptor_display_shows_hex_ids() {
        let dev = descriptor(MIRA_VID, MIRA_PID, "/dev/hidraw1");
        assert_eq!(
            dev.to_string(),
            "Test Device 5020 (VID: 0x0416, PID: 0x5020, path: /dev/hidraw1)"
        );
    }
}
