//! Network availability.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether a network path is currently usable.
///
/// Called with the client's lock held, so implementations must answer
/// immediately and must not perform I/O.
pub trait Connectivity: Send + Sync {
    fn is_available(&self) -> bool;
}

/// Always reports the network as available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Online;

impl Connectivity for Online {
    fn is_available(&self) -> bool {
        true
    }
}

/// Never reports the network as available. Requests only accumulate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl Connectivity for Offline {
    fn is_available(&self) -> bool {
        false
    }
}

/// A shared flag the host flips from its own network-change notifications.
///
/// After setting the flag back to available, call
/// [`Tracker::send`](crate::Tracker::send) to resume delivery.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    available: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(available: bool) -> Self {
        Self {
            available: Arc::new(AtomicBool::new(available)),
        }
    }

    pub fn set(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_clones_share_state() {
        let flag = ConnectivityFlag::new(false);
        let observer = flag.clone();
        assert!(!observer.is_available());
        flag.set(true);
        assert!(observer.is_available());
    }

    #[test]
    fn fixed_sources() {
        assert!(Online.is_available());
        assert!(!Offline.is_available());
    }
}
