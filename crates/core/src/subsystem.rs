//! Process-wide HID subsystem lease.
//!
//! hidapi needs one-time setup before the first device is opened and
//! teardown after the last one is closed. Every discovery call and every open
//! session holds a [`HidSubsystem`] lease; the shared `HidApi` is created by
//! the first [`HidSubsystem::acquire`] and dropped when the last lease is
//! released.
//!
//! Release is explicit via [`HidSubsystem::release`]. A lease dropped without
//! release (early return, failed open) is released in `Drop`, so no code path
//! leaks a holder.

use crate::error::{Error, Result};
use hidapi::HidApi;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Reference-counted slot for a lazily created shared resource.
struct LeaseRegistry<A> {
    resource: Option<A>,
    holders: usize,
}

impl<A> LeaseRegistry<A> {
    const fn new() -> Self {
        Self {
            resource: None,
            holders: 0,
        }
    }

    /// Add a holder, creating the resource if this is the first one.
    ///
    /// Returns the holder count after acquisition. On init failure the count
    /// is unchanged.
    fn acquire(&mut self, init: impl FnOnce() -> Result<A>) -> Result<usize> {
        if self.resource.is_none() {
            self.resource = Some(init()?);
        }
        self.holders += 1;
        Ok(self.holders)
    }

    /// Remove a holder, dropping the resource when none remain.
    ///
    /// Returns the remaining holder count.
    fn release(&mut self) -> usize {
        self.holders = self.holders.saturating_sub(1);
        if self.holders == 0 {
            self.resource = None;
        }
        self.holders
    }

    fn resource_mut(&mut self) -> Option<&mut A> {
        self.resource.as_mut()
    }
}

static HID_REGISTRY: Mutex<LeaseRegistry<HidApi>> = Mutex::new(LeaseRegistry::new());

// A panic while holding the lock leaves the count itself consistent.
fn registry() -> MutexGuard<'static, LeaseRegistry<HidApi>> {
    HID_REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A held reference to the process-wide hidapi context.
#[derive(Debug)]
pub struct HidSubsystem {
    released: bool,
}

impl HidSubsystem {
    /// Acquire a lease, initializing hidapi if no other lease is live.
    pub fn acquire() -> Result<Self> {
        let holders = registry().acquire(|| {
            debug!("Initializing HID subsystem");
            HidApi::new().map_err(|e| Error::TransportInit(e.to_string()))
        })?;
        debug!(holders, "HID subsystem lease acquired");
        Ok(Self { released: false })
    }

    /// Run `f` against the shared hidapi context.
    pub fn with_api<T>(&self, f: impl FnOnce(&mut HidApi) -> Result<T>) -> Result<T> {
        let mut reg = registry();
        let api = reg.resource_mut().ok_or_else(|| {
            Error::TransportInit("HID subsystem not initialized".to_string())
        })?;
        f(api)
    }

    /// Release this lease. The last release tears hidapi down.
    pub fn release(mut self) {
        self.release_once();
    }

    /// Number of live leases in this process.
    pub fn holders() -> usize {
        registry().holders
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let remaining = registry().release();
        if remaining == 0 {
            debug!("HID subsystem torn down");
        } else {
            debug!(holders = remaining, "HID subsystem lease released");
        }
    }
}

impl Drop for HidSubsystem {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// Serializes tests that touch the process-wide lease count.
#[cfg(test)]
pub(crate) fn lock_for_test() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn first_acquire_initializes_once() {
        let inits = Cell::new(0);
        let mut reg = LeaseRegistry::<u32>::new();
        let init = || {
            inits.set(inits.get() + 1);
            Ok(7)
        };

        assert_eq!(reg.acquire(init).unwrap(), 1);
        assert_eq!(
            reg.acquire(|| {
                inits.set(inits.get() + 1);
                Ok(8)
            })
            .unwrap(),
            2
        );
        assert_eq!(inits.get(), 1);
        assert_eq!(reg.resource_mut().copied(), Some(7));
    }

    #[test]
    fn last_release_drops_resource() {
        let mut reg = LeaseRegistry::<u32>::new();
        reg.acquire(|| Ok(1)).unwrap();
        reg.acquire(|| Ok(1)).unwrap();

        assert_eq!(reg.release(), 1);
        assert!(reg.resource_mut().is_some());
        assert_eq!(reg.release(), 0);
        assert!(reg.resource_mut().is_none());
    }

    #[test]
    fn failed_init_leaves_no_holder() {
        let mut reg = LeaseRegistry::<u32>::new();
        let err = reg
            .acquire(|| Err(Error::TransportInit("no backend".into())))
            .unwrap_err();
        assert!(matches!(err, Error::TransportInit(_)));
        assert_eq!(reg.holders, 0);
        assert!(reg.resource_mut().is_none());
    }

    #[test]
    fn reacquire_after_teardown_reinitializes() {
        let mut reg = LeaseRegistry::<u32>::new();
        reg.acquire(|| Ok(1)).unwrap();
        reg.release();
        reg.acquire(|| Ok(2)).unwrap();
        assert_eq!(reg.resource_mut().copied(), Some(2));
    }

    #[test]
    fn dropped_lease_releases_holder() {
        let _guard = lock_for_test();
        let before = HidSubsystem::holders();
        let lease = match HidSubsystem::acquire() {
            Ok(lease) => lease,
            // No HID backend on this host.
            Err(Error::TransportInit(_)) => return,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(HidSubsystem::holders(), before + 1);
        drop(lease);
        assert_eq!(HidSubsystem::holders(), before);
    }

    #[test]
    fn nested_leases_release_in_any_order() {
        let _guard = lock_for_test();
        let before = HidSubsystem::holders();
        let Ok(first) = HidSubsystem::acquire() else {
            return;
        };
        let second = HidSubsystem::acquire().unwrap();
        assert_eq!(HidSubsystem::holders(), before + 2);
        first.release();
        assert_eq!(HidSubsystem::holders(), before + 1);
        second.with_api(|_| Ok(())).unwrap();
        second.release();
        assert_eq!(HidSubsystem::holders(), before);
    }

    #[test]
    fn release_below_zero_saturates() {
        let mut reg = LeaseRegistry::<u32>::new();
        assert_eq!(reg.release(), 0);
    }
}
