use crate::error::KernelError;
use crate::system::kernel::{
    CpuTicks, HwString, IfAddrRecord, Kernel, KernelProc, RawSensor, SensorDevice, SensorType,
    SwapDevice, VmTotals,
};

/// Backend for targets without the OpenBSD kernel interfaces. Every query
/// reports itself unavailable, so a collector built on it stays at its
/// fallback values.
#[derive(Default)]
pub struct Unsupported;

impl Unsupported {
    pub fn new() -> Self {
        Unsupported
    }
}

impl Kernel for Unsupported {
    fn open_process_access(&mut self) -> Result<(), KernelError> {
        Err(KernelError::Unsupported("kvm"))
    }

    fn boot_time(&self) -> Result<i64, KernelError> {
        Err(KernelError::Unsupported("kern.boottime"))
    }

    fn page_size(&self) -> usize {
        4096
    }

    fn vm_totals(&self) -> Result<VmTotals, KernelError> {
        Err(KernelError::Unsupported("vm.vmmeter"))
    }

    fn swap_devices(&self) -> Result<Vec<SwapDevice>, KernelError> {
        Err(KernelError::Unsupported("swapctl"))
    }

    fn cpu_count(&self) -> Result<usize, KernelError> {
        Err(KernelError::Unsupported("hw.ncpu"))
    }

    fn cpu_ticks(&self) -> Result<CpuTicks, KernelError> {
        Err(KernelError::Unsupported("kern.cp_time"))
    }

    fn core_ticks(&self, _core: usize) -> Result<CpuTicks, KernelError> {
        Err(KernelError::Unsupported("kern.cp_time2"))
    }

    fn load_average(&self) -> Result<[f64; 3], KernelError> {
        Err(KernelError::Unsupported("getloadavg"))
    }

    fn processes(&self) -> Result<Vec<KernelProc>, KernelError> {
        Err(KernelError::Unsupported("kvm_getprocs"))
    }

    fn interfaces(&self) -> Result<Vec<IfAddrRecord>, KernelError> {
        Err(KernelError::Unsupported("getifaddrs"))
    }

    fn sensor_device(&self, _device: i32) -> Result<SensorDevice, KernelError> {
        Err(KernelError::Unsupported("hw.sensors"))
    }

    fn sensor(
        &self,
        _device: i32,
        _kind: SensorType,
        _index: i32,
    ) -> Result<RawSensor, KernelError> {
        Err(KernelError::Unsupported("hw.sensors"))
    }

    fn hw_string(&self, which: HwString) -> Result<String, KernelError> {
        Err(KernelError::Unsupported(match which {
            HwString::Vendor => "hw.vendor",
            HwString::Product => "hw.product",
        }))
    }

    fn cpu_speed(&self) -> Result<i32, KernelError> {
        Err(KernelError::Unsupported("hw.cpuspeed"))
    }
}
