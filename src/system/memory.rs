//! Page and swap-block conversions to KiB.

use super::kernel::{SwapDevice, VmTotals};

/// log2(1024): pages are reported in KiB.
const LOG1024: i32 = 10;
/// Disk block size used by `struct swapent`.
pub const DEV_BSIZE: u64 = 512;

/// Shift that turns a page count into KiB: `log2(page_size) - 10`.
pub fn page_shift(page_size: usize) -> i32 {
    let mut size = page_size;
    let mut shift = 0;
    while size > 1 {
        shift += 1;
        size >>= 1;
    }
    shift - LOG1024
}

pub fn pagetok(pages: u64, shift: i32) -> u64 {
    if shift >= 0 {
        pages << shift
    } else {
        pages >> -shift
    }
}

/// Memory figures in KiB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryTotals {
    pub memmax: u64,
    pub mem: u64,
    pub memfree: u64,
}

impl MemoryTotals {
    pub fn from_vm(totals: VmTotals, page_size: usize) -> Self {
        let shift = page_shift(page_size);
        let mem = pagetok(totals.real_pages, shift);
        let memmax = mem + pagetok(totals.free_pages, shift);
        Self {
            memmax,
            mem,
            memfree: memmax - mem,
        }
    }
}

/// Sums enabled swap devices into `(used, total)` KiB.
pub fn swap_totals(devices: &[SwapDevice]) -> (u64, u64) {
    let blocks_per_kib = 1024 / DEV_BSIZE;
    devices
        .iter()
        .filter(|dev| dev.enabled)
        .fold((0, 0), |(used, total), dev| {
            (
                used + dev.in_use_blocks / blocks_per_kib,
                total + dev.total_blocks / blocks_per_kib,
            )
        })
}
