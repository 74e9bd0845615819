//! The kernel query surface every collector reads through.
//!
//! Each method maps onto one OpenBSD query mechanism (a sysctl MIB, the kvm
//! process table, `getifaddrs`, `swapctl`). Implementations decode the raw
//! kernel structures into the plain types below so the arithmetic in the
//! collectors stays platform independent.

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::KernelError;

/// Number of CPU state buckets in `kern.cp_time` (user, nice, sys, spin, intr, idle).
pub const CPUSTATES: usize = 6;
/// Index of the idle bucket.
pub const CP_IDLE: usize = 5;
/// Number of `enum sensor_type` values the kernel knows about.
pub const SENSOR_MAX_TYPES: usize = 23;

/// One sample of cumulative per-state tick counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTicks(pub [u64; CPUSTATES]);

impl CpuTicks {
    pub fn total(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, &t| acc.wrapping_add(t))
    }

    /// Ticks spent outside the idle bucket.
    pub fn used(&self) -> u64 {
        self.total().wrapping_sub(self.0[CP_IDLE])
    }
}

/// The two page counts of `struct vmtotal` the memory collector needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VmTotals {
    /// `t_rm`: resident pages in use.
    pub real_pages: u64,
    /// `t_free`: free pages.
    pub free_pages: u64,
}

/// One `struct swapent` row, sizes in `DEV_BSIZE` blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapDevice {
    pub enabled: bool,
    pub in_use_blocks: u64,
    pub total_blocks: u64,
}

/// A seconds/microseconds pair as stored in `struct kinfo_proc`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTime {
    pub sec: u32,
    pub usec: u32,
}

/// One decoded `struct kinfo_proc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KernelProc {
    pub pid: u32,
    /// `P_SYSTEM` is set in `p_flag`.
    pub system: bool,
    /// `p_stat == SRUN`.
    pub running: bool,
    /// `p_comm`, empty for nameless kernel threads.
    pub comm: String,
    pub uid: u32,
    pub user_time: CpuTime,
    pub system_time: CpuTime,
    pub real_time: CpuTime,
    /// `p_pctcpu`, fixed point scaled by `FSCALE`.
    pub pctcpu: u32,
    /// `p_vm_map_size` in bytes.
    pub vm_map_size: u64,
    /// `p_vm_rssize` in pages.
    pub rss_pages: u64,
}

/// The part of an interface address record the network collector reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IfAddress {
    /// `AF_LINK` record carrying the interface's `struct if_data` byte counters.
    Link { ibytes: u64, obytes: u64 },
    /// `AF_INET` address.
    Inet(Ipv4Addr),
    Other,
}

/// One entry of the `getifaddrs` list, in list order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfAddrRecord {
    pub name: String,
    /// `IFF_UP` is set.
    pub up: bool,
    pub addr: IfAddress,
}

/// `struct sensordev` for one hw.sensors device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorDevice {
    pub xname: String,
    /// Number of sensors per type, indexed by `SensorType as usize`.
    pub maxnumt: [i32; SENSOR_MAX_TYPES],
}

/// `enum sensor_type`; only the variants the collectors store are named.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorType {
    Temperature,
    FanRpm,
    VoltsDc,
    Other(usize),
}

impl SensorType {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => SensorType::Temperature,
            1 => SensorType::FanRpm,
            2 => SensorType::VoltsDc,
            n => SensorType::Other(n),
        }
    }

    pub fn index(self) -> usize {
        match self {
            SensorType::Temperature => 0,
            SensorType::FanRpm => 1,
            SensorType::VoltsDc => 2,
            SensorType::Other(n) => n,
        }
    }
}

/// The fields of `struct sensor` the collectors read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSensor {
    pub value: i64,
    /// `SENSOR_FINVALID` is set.
    pub invalid: bool,
    pub numt: i32,
}

/// Hardware identity strings under `CTL_HW`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwString {
    Vendor,
    Product,
}

/// Kernel queries used by [`Collector`](crate::system::collector::Collector).
///
/// Every method is a single synchronous query; failures are reported, never
/// retried.
pub trait Kernel {
    /// Opens the kernel-memory handle used for process enumeration.
    fn open_process_access(&mut self) -> Result<(), KernelError>;

    /// `kern.boottime` seconds.
    fn boot_time(&self) -> Result<i64, KernelError>;

    /// Current wall clock in seconds since the epoch.
    fn wall_clock(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn page_size(&self) -> usize;

    /// `vm.vmmeter`.
    fn vm_totals(&self) -> Result<VmTotals, KernelError>;

    /// All swap devices reported by `swapctl(SWAP_STATS)`.
    fn swap_devices(&self) -> Result<Vec<SwapDevice>, KernelError>;

    /// `hw.ncpu`.
    fn cpu_count(&self) -> Result<usize, KernelError>;

    /// `kern.cp_time`, summed over all cores.
    fn cpu_ticks(&self) -> Result<CpuTicks, KernelError>;

    /// `kern.cp_time2.<core>`.
    fn core_ticks(&self, core: usize) -> Result<CpuTicks, KernelError>;

    fn load_average(&self) -> Result<[f64; 3], KernelError>;

    /// Every entry of `KERN_PROC_ALL`.
    fn processes(&self) -> Result<Vec<KernelProc>, KernelError>;

    fn interfaces(&self) -> Result<Vec<IfAddrRecord>, KernelError>;

    /// `hw.sensors.<device>`.
    fn sensor_device(&self, device: i32) -> Result<SensorDevice, KernelError>;

    /// `hw.sensors.<device>.<type>.<index>`.
    fn sensor(
        &self,
        device: i32,
        kind: SensorType,
        index: i32,
    ) -> Result<RawSensor, KernelError>;

    fn hw_string(&self, which: HwString) -> Result<String, KernelError>;

    /// `hw.cpuspeed` in MHz.
    fn cpu_speed(&self) -> Result<i32, KernelError>;
}
