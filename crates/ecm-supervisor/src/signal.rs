//! Cooperative shutdown flag shared between a Unix signal and the cyclic
//! worker loop. SIGTERM and SIGINT are the only signals intercepted; the
//! worker checks the flag once per cycle and never blocks on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared shutdown flag. Cheap to clone; every clone observes the same flag.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create a new, unset shutdown signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register SIGTERM and SIGINT handlers that set this flag.
    ///
    /// Async-signal-safe: the handler only stores to an atomic.
    #[cfg(unix)]
    pub fn install(&self) {
        static FLAG_PTR: std::sync::atomic::AtomicPtr<AtomicBool> =
            std::sync::atomic::AtomicPtr::new(std::ptr::null_mut());

        FLAG_PTR.store(Arc::as_ptr(&self.flag) as *mut AtomicBool, Ordering::SeqCst);

        extern "C" fn handler(_: libc::c_int) {
            let ptr = FLAG_PTR.load(Ordering::SeqCst);
            if !ptr.is_null() {
                // SAFETY: the pointee outlives the process because `self.flag`
                // is kept alive by the supervisor for the process lifetime.
                unsafe { (*ptr).store(true, Ordering::SeqCst) };
            }
        }

        unsafe {
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
    }

    #[cfg(not(unix))]
    pub fn install(&self) {}

    /// Whether shutdown has been requested, by signal or by a manual call.
    #[inline]
    #[must_use]
    pub fn requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request shutdown (used by `ProcessSupervisor::stop`).
    pub fn request(&self) {
        info!("shutdown requested");
        self.flag.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_request_is_observed() {
        let signal = ShutdownSignal::new();
        assert!(!signal.requested());
        signal.request();
        assert!(signal.requested());
    }

    #[test]
    fn clones_share_state() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        clone.request();
        assert!(signal.requested());
    }
}
