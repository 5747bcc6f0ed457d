//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT both request a cooperative stop through the
//! runtime's shutdown token. Handlers must stay async-signal-safe, so
//! they only set a static flag; a bridge thread forwards the flag to
//! the token and exits once the stop is underway.

use pulsegen_runtime::Shutdown;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Installed signal handlers bound to a shutdown token.
pub struct SignalHandler {
    shutdown: Shutdown,
    signal_count: Arc<AtomicU32>,
}

impl SignalHandler {
    /// Register SIGTERM and SIGINT handlers that request a stop
    /// through `shutdown`.
    ///
    /// On non-Unix platforms only manual shutdown is supported.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge thread cannot be spawned.
    pub fn install(shutdown: Shutdown) -> std::io::Result<Self> {
        let handler = Self {
            shutdown,
            signal_count: Arc::new(AtomicU32::new(0)),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;
        use std::sync::atomic::AtomicBool;

        static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);

        let shutdown = self.shutdown.clone();
        let signal_count = Arc::clone(&self.signal_count);
        std::thread::Builder::new()
            .name("pulsegen-signals".to_string())
            .spawn(move || loop {
                if SHUTDOWN_FLAG.swap(false, Ordering::Relaxed) {
                    info!("shutdown signal received");
                    signal_count.fetch_add(1, Ordering::Relaxed);
                    shutdown.request();
                }
                if shutdown.is_requested() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            })?;

        // SAFETY: the handlers only store to a static atomic, which is
        // async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
        }

        extern "C" fn sigterm_handler(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sigint_handler(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        debug!("unix signal handlers registered");
        Ok(())
    }

    /// Check if a stop has been requested, by signal or manually.
    #[inline]
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Manually request a stop through the shared token.
    pub fn request_shutdown(&self) {
        info!("manual shutdown requested");
        self.shutdown.request();
    }

    /// Number of shutdown signals received.
    #[must_use]
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}
