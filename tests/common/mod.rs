#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use bsdstat::error::KernelError;
use bsdstat::system::kernel::{
    CpuTicks, CpuTime, HwString, IfAddrRecord, IfAddress, Kernel, KernelProc, RawSensor,
    SENSOR_MAX_TYPES, SensorDevice, SensorType, SwapDevice, VmTotals,
};

/// Kernel whose every answer is set by the test. `None` fields fail.
#[derive(Default)]
pub struct FakeKernel {
    pub open_ok: bool,
    pub open_calls: u32,
    pub cpu_count_calls: Cell<u32>,
    pub interface_calls: Cell<u32>,
    pub boot_time: Option<i64>,
    pub now: i64,
    pub page_size: usize,
    pub vm: Option<VmTotals>,
    pub swap: Option<Vec<SwapDevice>>,
    pub ncpu: Option<usize>,
    pub cp_time: Option<CpuTicks>,
    pub cp_time2: Vec<Option<CpuTicks>>,
    pub loadavg: Option<[f64; 3]>,
    pub procs: Vec<KernelProc>,
    pub interfaces: Option<Vec<IfAddrRecord>>,
    pub sensor_devices: HashMap<i32, SensorDevice>,
    pub sensors: HashMap<(i32, usize, i32), RawSensor>,
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub cpu_speed: Option<i32>,
}

fn unavailable(what: &'static str) -> KernelError {
    KernelError::Unsupported(what)
}

impl FakeKernel {
    /// A healthy two-core machine with no processes, interfaces or sensors.
    pub fn healthy() -> Self {
        FakeKernel {
            open_ok: true,
            boot_time: Some(1_000),
            now: 4_600,
            page_size: 4096,
            vm: Some(VmTotals {
                real_pages: 100,
                free_pages: 50,
            }),
            swap: Some(Vec::new()),
            ncpu: Some(2),
            cp_time: Some(CpuTicks::default()),
            cp_time2: vec![Some(CpuTicks::default()); 2],
            loadavg: Some([0.5, 0.25, 0.125]),
            interfaces: Some(Vec::new()),
            vendor: Some("OpenBSD".to_string()),
            product: Some("VMM".to_string()),
            cpu_speed: Some(2400),
            ..FakeKernel::default()
        }
    }

    /// Every query fails.
    pub fn broken() -> Self {
        FakeKernel {
            page_size: 4096,
            ..FakeKernel::default()
        }
    }

    pub fn add_sensor_device(&mut self, device: i32, counts: &[(SensorType, i32)]) {
        let mut maxnumt = [0; SENSOR_MAX_TYPES];
        for &(kind, count) in counts {
            maxnumt[kind.index()] = count;
        }
        self.sensor_devices.insert(
            device,
            SensorDevice {
                xname: format!("fake{device}"),
                maxnumt,
            },
        );
    }

    pub fn set_sensor(&mut self, device: i32, kind: SensorType, index: i32, value: i64, invalid: bool) {
        self.sensors.insert(
            (device, kind.index(), index),
            RawSensor {
                value,
                invalid,
                numt: index,
            },
        );
    }
}

impl Kernel for FakeKernel {
    fn open_process_access(&mut self) -> Result<(), KernelError> {
        self.open_calls += 1;
        if self.open_ok {
            Ok(())
        } else {
            Err(KernelError::ProcessAccess)
        }
    }

    fn boot_time(&self) -> Result<i64, KernelError> {
        self.boot_time.ok_or(unavailable("kern.boottime"))
    }

    fn wall_clock(&self) -> i64 {
        self.now
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn vm_totals(&self) -> Result<VmTotals, KernelError> {
        self.vm.ok_or(unavailable("vm.vmmeter"))
    }

    fn swap_devices(&self) -> Result<Vec<SwapDevice>, KernelError> {
        self.swap.clone().ok_or(unavailable("swapctl"))
    }

    fn cpu_count(&self) -> Result<usize, KernelError> {
        self.cpu_count_calls.set(self.cpu_count_calls.get() + 1);
        self.ncpu.ok_or(unavailable("hw.ncpu"))
    }

    fn cpu_ticks(&self) -> Result<CpuTicks, KernelError> {
        self.cp_time.ok_or(unavailable("kern.cp_time"))
    }

    fn core_ticks(&self, core: usize) -> Result<CpuTicks, KernelError> {
        self.cp_time2
            .get(core)
            .copied()
            .flatten()
            .ok_or(unavailable("kern.cp_time2"))
    }

    fn load_average(&self) -> Result<[f64; 3], KernelError> {
        self.loadavg.ok_or(unavailable("getloadavg"))
    }

    fn processes(&self) -> Result<Vec<KernelProc>, KernelError> {
        Ok(self.procs.clone())
    }

    fn interfaces(&self) -> Result<Vec<IfAddrRecord>, KernelError> {
        self.interface_calls.set(self.interface_calls.get() + 1);
        self.interfaces.clone().ok_or(unavailable("getifaddrs"))
    }

    fn sensor_device(&self, device: i32) -> Result<SensorDevice, KernelError> {
        self.sensor_devices
            .get(&device)
            .cloned()
            .ok_or(KernelError::NoSuchSensorDevice(device))
    }

    fn sensor(&self, device: i32, kind: SensorType, index: i32) -> Result<RawSensor, KernelError> {
        self.sensors
            .get(&(device, kind.index(), index))
            .copied()
            .ok_or(unavailable("hw.sensors"))
    }

    fn hw_string(&self, which: HwString) -> Result<String, KernelError> {
        let value = match which {
            HwString::Vendor => &self.vendor,
            HwString::Product => &self.product,
        };
        value.clone().ok_or(unavailable("hw.vendor"))
    }

    fn cpu_speed(&self) -> Result<i32, KernelError> {
        self.cpu_speed.ok_or(unavailable("hw.cpuspeed"))
    }
}

pub fn ticks(busy: u64, idle: u64) -> CpuTicks {
    CpuTicks([busy, 0, 0, 0, 0, idle])
}

pub fn proc_entry(pid: u32, comm: &str, running: bool) -> KernelProc {
    KernelProc {
        pid,
        running,
        comm: comm.to_string(),
        uid: 1000,
        user_time: CpuTime {
            sec: 2,
            usec: 500_000,
        },
        system_time: CpuTime { sec: 0, usec: 0 },
        real_time: CpuTime { sec: 3, usec: 0 },
        pctcpu: 205,
        vm_map_size: 1 << 20,
        rss_pages: 10,
        ..KernelProc::default()
    }
}

pub fn link(name: &str, ibytes: u64, obytes: u64) -> IfAddrRecord {
    IfAddrRecord {
        name: name.to_string(),
        up: true,
        addr: IfAddress::Link { ibytes, obytes },
    }
}

pub fn inet(name: &str, addr: Ipv4Addr) -> IfAddrRecord {
    IfAddrRecord {
        name: name.to_string(),
        up: true,
        addr: IfAddress::Inet(addr),
    }
}
