#![allow(unsafe_code)]

//! The two process-level calls recovery needs: liveness probing and priority lowering.

/// Whether `pid` names a running process. `EPERM` means it exists under another user.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission checks.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    true
}

/// Drop the calling thread's scheduling priority; failure is logged and ignored.
#[cfg(unix)]
pub fn lower_priority() {
    // SAFETY: nice() has no memory-safety preconditions. On Linux it applies to the calling
    // thread only.
    let rc = unsafe { libc::nice(10) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        tracing::debug!(error = %err, "could not lower recovery thread priority");
    }
}

#[cfg(not(unix))]
pub fn lower_priority() {}
