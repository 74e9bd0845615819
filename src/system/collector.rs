use std::fmt;

use tracing::{debug, error, warn};

use super::cpu::CpuAccumulator;
use super::kernel::{HwString, Kernel, SENSOR_MAX_TYPES, SensorType};
use super::memory::{MemoryTotals, swap_totals};
use super::network::NetStatTable;
use super::process::ProcessRegistry;
use super::sensors::SensorCache;
use super::snapshot::{SystemSnapshot, UpdateClock};
use crate::config::{Config, TemperatureUnit};
use crate::error::KernelError;
use crate::format;

/// Settings the collectors take from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectorSettings {
    pub sensor_device: i32,
    pub text_buffer_size: usize,
    pub temperature_unit: TemperatureUnit,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            sensor_device: 0,
            text_buffer_size: 256,
            temperature_unit: TemperatureUnit::Celsius,
        }
    }
}

impl From<&Config> for CollectorSettings {
    fn from(config: &Config) -> Self {
        CollectorSettings {
            sensor_device: config.sensors.device,
            text_buffer_size: config.top.text_buffer_size,
            temperature_unit: config.sensors.temperature_unit,
        }
    }
}

/// The metric an updater is responsible for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Uptime,
    Memory,
    Network,
    TotalProcesses,
    RunningProcesses,
    CpuUsage,
    LoadAverage,
    Sensors,
    TopInfo,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Uptime => "uptime",
            Metric::Memory => "memory",
            Metric::Network => "network",
            Metric::TotalProcesses => "total_processes",
            Metric::RunningProcesses => "running_processes",
            Metric::CpuUsage => "cpu_usage",
            Metric::LoadAverage => "load_average",
            Metric::Sensors => "sensors",
            Metric::TopInfo => "top_info",
        };
        f.write_str(name)
    }
}

/// Metrics that fell back to default or stale values during one cycle.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub degraded: Vec<(Metric, KernelError)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }

    fn check(&mut self, metric: Metric, result: Result<(), KernelError>) {
        if let Err(err) = result {
            self.degraded.push((metric, err));
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KernelAccess {
    NotAttempted,
    Open,
    Failed,
}

/// All state shared between refresh cycles: the kernel backend, the
/// snapshot a renderer reads and the delta-tracking tables.
///
/// Each updater resets its fields to a documented fallback before reporting
/// an error, so a renderer can always read the snapshot.
pub struct Collector<K: Kernel> {
    kernel: K,
    settings: CollectorSettings,
    access: KernelAccess,
    cpu: Option<CpuAccumulator>,
    snapshot: SystemSnapshot,
    net: NetStatTable,
    top: ProcessRegistry,
    sensors: SensorCache,
}

impl<K: Kernel> Collector<K> {
    /// Opens kernel access and sizes the per-core tables.
    pub fn new(kernel: K, settings: CollectorSettings) -> Self {
        let mut collector = Collector {
            kernel,
            settings,
            access: KernelAccess::NotAttempted,
            cpu: None,
            snapshot: SystemSnapshot::default(),
            net: NetStatTable::default(),
            top: ProcessRegistry::default(),
            sensors: SensorCache::default(),
        };
        collector.ensure_kernel_access();
        collector.discover_cpu_count();
        collector
    }

    pub fn snapshot(&self) -> &SystemSnapshot {
        &self.snapshot
    }

    pub fn net_stats(&self) -> &NetStatTable {
        &self.net
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.top
    }

    pub fn sensors(&self) -> &SensorCache {
        &self.sensors
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn set_sensor_device(&mut self, device: i32) {
        self.settings.sensor_device = device;
    }

    /// Opens the process-table handle once. A failed open is logged and not
    /// retried; process queries then report [`KernelError::ProcessAccess`].
    pub fn ensure_kernel_access(&mut self) {
        if self.access != KernelAccess::NotAttempted {
            return;
        }
        match self.kernel.open_process_access() {
            Ok(()) => self.access = KernelAccess::Open,
            Err(err) => {
                error!(%err, "error opening kvm");
                self.access = KernelAccess::Failed;
            }
        }
    }

    pub fn has_process_access(&self) -> bool {
        self.access == KernelAccess::Open
    }

    /// Queries hw.ncpu (1 on failure) and sizes the usage vector and the
    /// accumulator to `count + 1`. Later calls keep the first sizing.
    pub fn discover_cpu_count(&mut self) {
        if self.cpu.is_some() {
            return;
        }
        let count = match self.kernel.cpu_count() {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                warn!("hw.ncpu reported no cpus, defaulting to 1");
                1
            }
            Err(err) => {
                warn!(%err, "unable to get hw.ncpu, defaulting to 1");
                1
            }
        };
        self.snapshot.cpu_count = count;
        self.snapshot.cpu_usage = vec![0.0; count + 1];
        self.cpu = Some(CpuAccumulator::new(count));
    }

    /// Hook run at the start of each cycle. Nothing needs preparing on this platform.
    pub fn prepare_update(&mut self) {}

    /// Runs every updater once and reports which metrics were degraded.
    /// Never fails: a broken query only affects its own fields.
    pub fn refresh(&mut self, clock: &UpdateClock) -> RefreshReport {
        let mut report = RefreshReport::default();

        self.prepare_update();
        report.check(Metric::Uptime, self.update_uptime());
        report.check(Metric::Memory, self.update_meminfo());
        report.check(Metric::Network, self.update_net_stats(clock));
        report.check(Metric::TotalProcesses, self.update_total_processes());
        report.check(Metric::RunningProcesses, self.update_running_processes());
        report.check(Metric::CpuUsage, self.update_cpu_usage());
        report.check(Metric::LoadAverage, self.update_load_average());
        report.check(Metric::Sensors, self.update_sensors());
        report.check(Metric::TopInfo, self.get_top_info(clock.tick));
        let _ = self.update_diskio();

        debug!(
            tick = clock.tick,
            degraded = report.degraded.len(),
            "refresh cycle complete"
        );
        report
    }

    pub fn update_uptime(&mut self) -> Result<(), KernelError> {
        match self.kernel.boot_time() {
            Ok(boot) if boot != 0 => {
                self.snapshot.uptime = self.kernel.wall_clock() - boot;
                Ok(())
            }
            Ok(_) => {
                warn!("could not get uptime: zero boot time");
                self.snapshot.uptime = 0;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "could not get uptime");
                self.snapshot.uptime = 0;
                Err(err)
            }
        }
    }

    /// Memory from vm.vmmeter and swap from swapctl, both in KiB. The VM
    /// error is reported in preference to the swap error.
    pub fn update_meminfo(&mut self) -> Result<(), KernelError> {
        let page_size = self.kernel.page_size();
        let (totals, vm_result) = match self.kernel.vm_totals() {
            Ok(totals) => (totals, Ok(())),
            Err(err) => {
                warn!(%err, "sysctl vm.vmmeter failed");
                (Default::default(), Err(err))
            }
        };

        let mem = MemoryTotals::from_vm(totals, page_size);
        let snap = &mut self.snapshot;
        snap.memmax = mem.memmax;
        snap.mem = mem.mem;
        snap.memwithbuffers = mem.mem;
        snap.legacymem = mem.mem;
        snap.memfree = mem.memfree;
        snap.memeasyfree = mem.memfree;

        let swap_result = match self.kernel.swap_devices() {
            Ok(devices) => {
                let (used, total) = swap_totals(&devices);
                snap.swapmax = total;
                snap.swap = used;
                snap.swapfree = total.saturating_sub(used);
                Ok(())
            }
            Err(err) => {
                debug!(%err, "no swap information");
                snap.swapmax = 0;
                snap.swap = 0;
                snap.swapfree = 0;
                Err(err)
            }
        };

        vm_result.and(swap_result)
    }

    /// Skipped entirely when less than the minimum interval has elapsed.
    pub fn update_net_stats(&mut self, clock: &UpdateClock) -> Result<(), KernelError> {
        let delta = clock.delta();
        if delta <= super::network::MIN_UPDATE_DELTA {
            return Ok(());
        }

        let records = match self.kernel.interfaces() {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "could not list interfaces");
                return Err(err);
            }
        };
        self.net.apply(&records, delta);
        Ok(())
    }

    pub fn update_total_processes(&mut self) -> Result<(), KernelError> {
        match self.scan_processes() {
            Ok(procs) => {
                self.snapshot.procs = procs.len() as u32;
                Ok(())
            }
            Err(err) => {
                self.snapshot.procs = 0;
                Err(err)
            }
        }
    }

    pub fn update_running_processes(&mut self) -> Result<(), KernelError> {
        match self.scan_processes() {
            Ok(procs) => {
                self.snapshot.run_procs = procs.iter().filter(|p| p.running).count() as u32;
                Ok(())
            }
            Err(err) => {
                self.snapshot.run_procs = 0;
                Err(err)
            }
        }
    }

    /// Aggregate usage into slot 0 and per-core usage into slots 1..=N. A
    /// failed query stops the update; slots already sampled keep their values.
    pub fn update_cpu_usage(&mut self) -> Result<(), KernelError> {
        self.discover_cpu_count();
        let Some(cpu) = self.cpu.as_mut() else {
            return Ok(());
        };

        let ticks = self.kernel.cpu_ticks().inspect_err(|err| {
            warn!(%err, "unable to get kern.cp_time");
        })?;
        if let Some(usage) = cpu.sample(0, &ticks) {
            self.snapshot.cpu_usage[0] = usage;
        }

        for core in 0..self.snapshot.cpu_count {
            let ticks = self.kernel.core_ticks(core).inspect_err(|err| {
                warn!(%err, core, "unable to get kern.cp_time2");
            })?;
            let slot = core + 1;
            if let Some(usage) = cpu.sample(slot, &ticks) {
                self.snapshot.cpu_usage[slot] = usage;
            }
        }
        Ok(())
    }

    pub fn update_load_average(&mut self) -> Result<(), KernelError> {
        match self.kernel.load_average() {
            Ok(avg) => {
                self.snapshot.loadavg = avg.map(|v| v as f32);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "getloadavg failed");
                self.snapshot.loadavg = [0.0; 3];
                Err(err)
            }
        }
    }

    /// Re-reads every sensor of the configured device into the cache.
    /// Unreadable or invalid sensors keep their previous values.
    pub fn update_sensors(&mut self) -> Result<(), KernelError> {
        let dev = self.settings.sensor_device;
        let device = match self.kernel.sensor_device(dev) {
            Ok(device) => device,
            Err(err) => {
                if !matches!(err, KernelError::NoSuchSensorDevice(_)) {
                    warn!(%err, device = dev, "sysctl hw.sensors failed");
                }
                return Err(err);
            }
        };

        let mut read = 0usize;
        for type_index in 0..SENSOR_MAX_TYPES {
            let kind = SensorType::from_index(type_index);
            for numt in 0..device.maxnumt[type_index] {
                match self.kernel.sensor(dev, kind, numt) {
                    Ok(sensor) => {
                        if self.sensors.store(dev, kind, &sensor) {
                            read += 1;
                        }
                    }
                    Err(err) => {
                        debug!(%err, device = dev, numt, "sensor unreadable");
                    }
                }
            }
        }
        debug!(device = %device.xname, read, "sensors updated");
        Ok(())
    }

    /// Fresh temperature reading of sensor `index`, in the configured unit.
    pub fn print_sensor_temp(&mut self, index: usize) -> String {
        let _ = self.update_sensors();
        let value = self
            .sensors
            .temperature(self.settings.sensor_device, index)
            .unwrap_or(0.0);
        self.bounded(format::temperature(value, self.settings.temperature_unit))
    }

    pub fn print_sensor_fan(&mut self, index: usize) -> String {
        let _ = self.update_sensors();
        let value = self
            .sensors
            .fan(self.settings.sensor_device, index)
            .unwrap_or(0);
        self.bounded(format::fan(value))
    }

    pub fn print_sensor_volt(&mut self, index: usize) -> String {
        let _ = self.update_sensors();
        let value = self
            .sensors
            .voltage(self.settings.sensor_device, index)
            .unwrap_or(0.0);
        self.bounded(format::voltage(value))
    }

    /// Refreshes the process registry from a full scan, stamping every
    /// touched entry with `tick`.
    pub fn get_top_info(&mut self, tick: u64) -> Result<(), KernelError> {
        let procs = self.scan_processes()?;
        let page_size = self.kernel.page_size();
        let updated = self
            .top
            .ingest(&procs, page_size, self.settings.text_buffer_size, tick);
        debug!(scanned = procs.len(), updated, "process registry refreshed");
        Ok(())
    }

    /// Chipset vendor, "unknown" when the query fails.
    pub fn vendor(&self) -> String {
        self.hw_string(HwString::Vendor)
    }

    /// Chipset product name, "unknown" when the query fails.
    pub fn product(&self) -> String {
        self.hw_string(HwString::Product)
    }

    /// hw.cpuspeed divided by `divisor` (1 for MHz, 1000 for GHz); 0.0 when
    /// the query fails and `None` for a non-positive divisor.
    pub fn cpu_frequency(&self, divisor: i32) -> Option<f32> {
        if divisor <= 0 {
            return None;
        }
        match self.kernel.cpu_speed() {
            Ok(mhz) => Some(mhz as f32 / divisor as f32),
            Err(err) => {
                debug!(%err, "sysctl hw.cpuspeed failed");
                Some(0.0)
            }
        }
    }

    /// Disk I/O statistics are not collected on this platform.
    pub fn update_diskio(&mut self) -> Result<(), KernelError> {
        Ok(())
    }

    /// Battery status is not collected on this platform.
    pub fn battery_short_status(&self, _battery: &str) -> String {
        String::new()
    }

    pub fn entropy_avail(&self) -> u32 {
        0
    }

    pub fn entropy_poolsize(&self) -> u32 {
        0
    }

    /// Mount-point checks are not implemented on this platform.
    pub fn check_mount(&self, _path: &str) -> bool {
        false
    }

    fn scan_processes(&self) -> Result<Vec<super::kernel::KernelProc>, KernelError> {
        if !self.has_process_access() {
            return Err(KernelError::ProcessAccess);
        }
        self.kernel.processes().inspect_err(|err| {
            warn!(%err, "kvm_getprocs failed");
        })
    }

    fn hw_string(&self, which: HwString) -> String {
        match self.kernel.hw_string(which) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, ?which, "error reading hardware identity");
                "unknown".to_string()
            }
        }
    }

    fn bounded(&self, text: String) -> String {
        format::truncate_name(&text, self.settings.text_buffer_size)
    }
}
