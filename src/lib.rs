//! Kernel data collection for a desktop system monitor.
//!
//! [`system::collector::Collector`] owns all state carried between refresh
//! cycles and reads the kernel through the [`system::kernel::Kernel`] trait.
//! [`system::platform::native`] returns the backend for the build target.

pub mod config;
pub mod error;
pub mod format;
pub mod system;
