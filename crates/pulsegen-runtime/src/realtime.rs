//! Real-time scheduling and memory locking.
//!
//! Process-wide concerns (memory locking, stack pre-faulting) are
//! applied once at startup through [`init_process`]; each channel and
//! reporter thread then applies its own static priority through
//! [`apply_thread_priority`]. Missing privileges degrade to a logged
//! warning unless `fail_fast` is set.
//!
//! Full support on Linux with a PREEMPT_RT kernel; no-op elsewhere.

use pulsegen_common::{PulseError, PulseResult, RealtimeConfig, SchedPolicy};
use tracing::{debug, error, info, warn};

/// Result of process-wide real-time initialization.
#[derive(Debug, Clone)]
pub struct RealtimeStatus {
    /// Whether real-time mode was requested at all.
    pub enabled: bool,
    /// Whether memory was locked successfully.
    pub memory_locked: bool,
    /// Stack bytes pre-faulted.
    pub stack_prefaulted: usize,
}

/// Initialize the process for real-time execution.
///
/// `max_priority` is the highest thread priority the deployment will
/// request, checked against RLIMIT_RTPRIO when `fail_fast` is set.
///
/// # Errors
///
/// Returns an error if a required feature fails hard, or if
/// `fail_fast` is set and the capability check finds the requested
/// priorities unattainable.
pub fn init_process(config: &RealtimeConfig, max_priority: u8) -> PulseResult<RealtimeStatus> {
    if !config.enabled {
        info!("real-time scheduling disabled in configuration");
        return Ok(RealtimeStatus {
            enabled: false,
            memory_locked: false,
            stack_prefaulted: 0,
        });
    }

    if config.fail_fast {
        info!("validating real-time capabilities (fail_fast=true)");
        validate_rt_capabilities(config, max_priority)?;
    }

    let memory_locked = if config.lock_memory {
        lock_memory()?
    } else {
        false
    };

    let stack_prefaulted = prefault_stack(config.prefault_stack_size);

    let status = RealtimeStatus {
        enabled: true,
        memory_locked,
        stack_prefaulted,
    };
    info!(?status, "real-time initialization complete");
    Ok(status)
}

/// Apply a static real-time priority to the calling thread.
///
/// Returns the applied priority, or `None` when the policy is
/// `Other` or privileges are missing (EPERM degrades to a warning).
///
/// # Errors
///
/// Returns an error for any scheduler failure other than EPERM.
#[cfg(target_os = "linux")]
pub fn apply_thread_priority(policy: SchedPolicy, priority: u8) -> PulseResult<Option<u8>> {
    let linux_policy = match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
        SchedPolicy::Other => {
            debug!("SCHED_OTHER requested, leaving thread at default priority");
            return Ok(None);
        }
    };

    // RT policies accept 1-99 only.
    let clamped = priority.clamp(1, 99);
    if clamped != priority {
        warn!(
            original = priority,
            clamped, "thread priority clamped to valid range"
        );
    }

    let param = libc::sched_param {
        sched_priority: i32::from(clamped),
    };

    // Pid 0 targets the calling thread under NPTL.
    // SAFETY: param is a valid sched_param for the requested policy.
    let result = unsafe { libc::sched_setscheduler(0, linux_policy, &param) };

    if result == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            warn!(
                priority = clamped,
                "sched_setscheduler failed with EPERM, thread stays at default priority. \
                 Grant CAP_SYS_NICE or raise RLIMIT_RTPRIO."
            );
            return Ok(None);
        }
        return Err(PulseError::Config(format!(
            "sched_setscheduler failed: {err}"
        )));
    }

    info!(?policy, priority = clamped, "thread priority applied");
    Ok(Some(clamped))
}

#[cfg(not(target_os = "linux"))]
pub fn apply_thread_priority(policy: SchedPolicy, priority: u8) -> PulseResult<Option<u8>> {
    warn!(
        ?policy,
        priority, "real-time scheduling not available on this platform"
    );
    Ok(None)
}

/// Lock all current and future memory pages.
#[cfg(target_os = "linux")]
fn lock_memory() -> PulseResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    debug!("locking memory pages with mlockall");

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => {
            info!("memory locked");
            Ok(true)
        }
        Err(e) => {
            // EPERM is common without CAP_IPC_LOCK.
            if e == nix::errno::Errno::EPERM {
                warn!(
                    "mlockall failed with EPERM, running without CAP_IPC_LOCK. \
                     Page faults may occur during execution."
                );
                Ok(false)
            } else {
                Err(PulseError::Config(format!("mlockall failed: {e}")))
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> PulseResult<bool> {
    warn!("mlockall not available on this platform");
    Ok(false)
}

/// Pre-fault stack pages so the cyclic loops never page-fault on
/// stack growth. Touches pages through recursive frames with volatile
/// writes the compiler cannot elide.
fn prefault_stack(size: usize) -> usize {
    if size == 0 {
        return 0;
    }

    debug!(size, page_size = page_size(), "pre-faulting stack pages");
    let faulted = prefault_frames(size, 0);
    debug!(faulted, "stack pre-fault complete");
    faulted
}

#[inline(never)]
fn prefault_frames(remaining: usize, depth: usize) -> usize {
    const FRAME_SIZE: usize = 4096;
    // Depth cap keeps the recursion itself within common 8 MiB stack
    // limits; a larger request is faulted only up to this bound.
    const MAX_DEPTH: usize = 1000;

    if remaining < FRAME_SIZE || depth >= MAX_DEPTH {
        return 0;
    }

    let mut frame = [0u8; FRAME_SIZE];
    // SAFETY: writes land inside this frame's own buffer.
    unsafe {
        std::ptr::write_volatile(frame.as_mut_ptr(), 0xAA);
        std::ptr::write_volatile(frame.as_mut_ptr().add(FRAME_SIZE - 1), 0x55);
    }
    std::hint::black_box(&frame);

    FRAME_SIZE + prefault_frames(remaining - FRAME_SIZE, depth + 1)
}

/// Get system page size.
fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is always safe to call.
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }
    #[cfg(not(unix))]
    {
        4096
    }
}

/// Real-time capabilities of the running system.
#[derive(Debug, Clone, Default)]
pub struct RtCapabilities {
    /// Whether running as root.
    pub is_root: bool,
    /// RLIMIT_RTPRIO value (max RT priority allowed).
    pub rtprio_limit: Option<u64>,
    /// RLIMIT_MEMLOCK value (max lockable memory).
    pub memlock_limit: Option<u64>,
    /// Whether running on a PREEMPT_RT kernel.
    pub preempt_rt: bool,
}

impl RtCapabilities {
    /// Check whether a thread priority of `priority` is attainable.
    #[must_use]
    pub fn allows_priority(&self, priority: u8) -> bool {
        self.is_root || self.rtprio_limit.is_some_and(|l| l >= u64::from(priority))
    }

    /// Check if memory locking is likely to succeed.
    #[must_use]
    pub fn can_lock_memory(&self) -> bool {
        if self.is_root {
            return true;
        }

        #[cfg(target_family = "unix")]
        {
            self.memlock_limit.is_some_and(|l| l == libc::RLIM_INFINITY)
        }

        #[cfg(not(target_family = "unix"))]
        {
            false
        }
    }
}

/// Probe real-time capabilities of the current process.
#[cfg(target_os = "linux")]
#[must_use]
pub fn check_rt_capabilities() -> RtCapabilities {
    use std::fs;

    let mut caps = RtCapabilities {
        // SAFETY: geteuid never fails.
        is_root: unsafe { libc::geteuid() } == 0,
        ..Default::default()
    };

    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: rlim is a valid out-pointer for getrlimit.
    if unsafe { libc::getrlimit(libc::RLIMIT_RTPRIO, &mut rlim) } == 0 {
        caps.rtprio_limit = Some(rlim.rlim_cur);
    }
    // SAFETY: as above.
    if unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut rlim) } == 0 {
        caps.memlock_limit = Some(rlim.rlim_cur);
    }

    if let Ok(version) = fs::read_to_string("/proc/version") {
        caps.preempt_rt = version.contains("PREEMPT_RT") || version.contains("PREEMPT RT");
    }

    caps
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn check_rt_capabilities() -> RtCapabilities {
    RtCapabilities::default()
}

/// Validate that the deployment's real-time requirements can be met.
///
/// Called when `fail_fast` is enabled. `max_priority` is the highest
/// priority any thread in the deployment will request.
///
/// # Errors
///
/// Returns an error listing every requirement the system cannot meet.
pub fn validate_rt_capabilities(config: &RealtimeConfig, max_priority: u8) -> PulseResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let caps = check_rt_capabilities();
    let mut issues = Vec::new();

    if !caps.preempt_rt {
        // Vanilla kernels still work for soft real-time.
        warn!(
            "PREEMPT_RT kernel not detected, timing jitter may be higher. \
             Production deployments should run a PREEMPT_RT kernel."
        );
    }

    if config.policy != SchedPolicy::Other && !caps.allows_priority(max_priority) {
        issues.push(format!(
            "cannot reach priority {max_priority} (policy {:?}): RLIMIT_RTPRIO={:?}, is_root={}. \
             Grant CAP_SYS_NICE or raise RLIMIT_RTPRIO.",
            config.policy, caps.rtprio_limit, caps.is_root
        ));
    }

    if config.lock_memory && !caps.can_lock_memory() {
        issues.push(format!(
            "cannot lock memory: RLIMIT_MEMLOCK={:?}, is_root={}. \
             Grant CAP_IPC_LOCK or set RLIMIT_MEMLOCK to unlimited.",
            caps.memlock_limit, caps.is_root
        ));
    }

    if issues.is_empty() {
        info!("real-time capabilities validated");
        Ok(())
    } else {
        let message = format!(
            "real-time requirements not met (fail_fast=true):\n  - {}",
            issues.join("\n  - ")
        );
        error!("{message}");
        Err(PulseError::Config(message))
    }
}
