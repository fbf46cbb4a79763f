//! Best-effort memory reclamation after unloading plugins.
//!
//! Unloading returns memory to the allocator, not necessarily to the
//! operating system. Where the platform allocator can be asked to give free
//! pages back, [`reclaim`] does so; everywhere else it does nothing.
//! Correctness never depends on it.

/// Ask the allocator to return free memory to the operating system.
///
/// Returns `true` if the allocator reported that memory was released.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub fn reclaim() -> bool {
    // SAFETY: malloc_trim only inspects allocator state; 0 keeps no extra padding.
    unsafe { libc::malloc_trim(0) != 0 }
}

/// Ask the allocator to return free memory to the operating system.
///
/// This platform offers no trim call; nothing is released.
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn reclaim() -> bool {
    false
}
