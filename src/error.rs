use std::io;

/// Failures of a single kernel query.
///
/// Collectors never propagate these past a refresh cycle: the affected
/// fields are reset to their fallback values first and the error is
/// returned so the caller can tell which metrics were degraded.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A sysctl MIB read failed.
    #[error("sysctl {name} failed: {source}")]
    Sysctl {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    /// The kernel returned fewer bytes than the structure needs.
    #[error("sysctl {name} returned {got} bytes, expected {expected}")]
    Truncated {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    /// The kernel-memory handle is not open, so the process table cannot be read.
    #[error("no kernel process-table access")]
    ProcessAccess,

    /// `swapctl(2)` failed or reported no devices.
    #[error("swapctl failed: {0}")]
    Swapctl(#[source] io::Error),

    /// `getifaddrs(3)` failed.
    #[error("getifaddrs failed: {0}")]
    Interfaces(#[source] io::Error),

    /// The configured hw.sensors device does not exist.
    #[error("no sensor device {0}")]
    NoSuchSensorDevice(i32),

    /// The query has no implementation on this platform.
    #[error("{0} is not available on this platform")]
    Unsupported(&'static str),
}

impl KernelError {
    /// Captures `errno` for a failed sysctl.
    pub fn sysctl(name: &'static str) -> Self {
        KernelError::Sysctl {
            name,
            source: io::Error::last_os_error(),
        }
    }
}
