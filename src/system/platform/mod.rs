#[cfg(target_os = "openbsd")]
mod openbsd;
#[cfg(not(target_os = "openbsd"))]
mod unsupported;

#[cfg(target_os = "openbsd")]
pub use openbsd::OpenBsd as NativeKernel;
#[cfg(not(target_os = "openbsd"))]
pub use unsupported::Unsupported as NativeKernel;

/// The kernel backend for the build target.
pub fn native() -> NativeKernel {
    NativeKernel::new()
}
