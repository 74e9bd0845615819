//! OpenBSD kernel queries: sysctl(2), kvm(3), getifaddrs(3), swapctl(2).

use std::ffi::CStr;
use std::io;
use std::mem::{MaybeUninit, size_of};
use std::net::Ipv4Addr;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_uint, c_void};
use tracing::debug;

use crate::error::KernelError;
use crate::system::kernel::{
    CPUSTATES, CpuTicks, CpuTime, HwString, IfAddrRecord, IfAddress, Kernel, KernelProc, RawSensor,
    SENSOR_MAX_TYPES, SensorDevice, SensorType, SwapDevice, VmTotals,
};

mod ffi {
    use libc::{c_char, c_int, c_void, size_t, timeval};

    use crate::system::kernel::SENSOR_MAX_TYPES;

    pub const CTL_KERN: c_int = 1;
    pub const CTL_VM: c_int = 2;
    pub const CTL_HW: c_int = 6;

    pub const KERN_BOOTTIME: c_int = 21;
    pub const KERN_CPTIME: c_int = 40;
    pub const KERN_CPTIME2: c_int = 71;
    pub const VM_METER: c_int = 1;
    pub const HW_NCPU: c_int = 3;
    pub const HW_SENSORS: c_int = 11;
    pub const HW_CPUSPEED: c_int = 12;
    pub const HW_VENDOR: c_int = 14;
    pub const HW_PRODUCT: c_int = 15;

    pub const KVM_NO_FILES: c_int = 0x8000_0000_u32 as c_int;
    pub const P_SYSTEM: c_int = 0x0000_0200;
    pub const SRUN: i8 = 2;

    pub const SWAP_NSWAP: c_int = 3;
    pub const SWAP_STATS: c_int = 4;
    pub const SWF_ENABLE: c_int = 0x0000_0002;

    pub const IFF_UP: u32 = 0x1;
    pub const AF_INET: u8 = 2;
    pub const AF_LINK: u8 = 18;

    pub const SENSOR_FINVALID: c_int = 0x0001;

    #[repr(C)]
    pub struct KvmT {
        _private: [u8; 0],
    }

    /// `struct vmtotal` from <sys/vmmeter.h>.
    #[repr(C)]
    #[derive(Clone, Copy)]
    pub struct VmTotal {
        pub t_rq: u16,
        pub t_dw: u16,
        pub t_pw: u16,
        pub t_sl: u16,
        pub t_sw: u16,
        pub t_vm: u32,
        pub t_avm: u32,
        pub t_rm: u32,
        pub t_arm: u32,
        pub t_vmshr: u32,
        pub t_avmshr: u32,
        pub t_rmshr: u32,
        pub t_armshr: u32,
        pub t_free: u32,
    }

    /// `struct swapent` from <sys/swap.h>.
    #[repr(C)]
    #[derive(Clone, Copy)]
    pub struct SwapEnt {
        pub se_dev: i32,
        pub se_flags: c_int,
        pub se_nblks: c_int,
        pub se_inuse: c_int,
        pub se_priority: c_int,
        pub se_path: [c_char; 1024],
    }

    /// `struct sensordev` from <sys/sensors.h>.
    #[repr(C)]
    #[derive(Clone, Copy)]
    pub struct SensorDev {
        pub num: c_int,
        pub xname: [c_char; 16],
        pub maxnumt: [c_int; SENSOR_MAX_TYPES],
        pub sensors_count: c_int,
    }

    /// `struct sensor` from <sys/sensors.h>.
    #[repr(C)]
    #[derive(Clone, Copy)]
    pub struct Sensor {
        pub desc: [c_char; 32],
        pub tv: timeval,
        pub value: i64,
        pub kind: c_int,
        pub status: c_int,
        pub numt: c_int,
        pub flags: c_int,
    }

    /// Leading fields of `struct if_data` from <net/if.h>, up to the byte counters.
    #[repr(C)]
    pub struct IfData {
        pub ifi_type: u8,
        pub ifi_addrlen: u8,
        pub ifi_hdrlen: u8,
        pub ifi_link_state: u8,
        pub ifi_mtu: u32,
        pub ifi_metric: u32,
        pub ifi_rdomain: u32,
        pub ifi_baudrate: u64,
        pub ifi_ipackets: u64,
        pub ifi_ierrors: u64,
        pub ifi_opackets: u64,
        pub ifi_oerrors: u64,
        pub ifi_collisions: u64,
        pub ifi_ibytes: u64,
        pub ifi_obytes: u64,
    }

    #[link(name = "kvm")]
    unsafe extern "C" {
        pub fn kvm_open(
            execfile: *const c_char,
            corefile: *const c_char,
            swapfile: *const c_char,
            flag: c_int,
            errstr: *const c_char,
        ) -> *mut KvmT;
        pub fn kvm_getprocs(
            kd: *mut KvmT,
            op: c_int,
            arg: c_int,
            elemsize: size_t,
            cnt: *mut c_int,
        ) -> *mut libc::kinfo_proc;
        pub fn kvm_close(kd: *mut KvmT) -> c_int;
    }

    unsafe extern "C" {
        pub fn swapctl(cmd: c_int, arg: *mut c_void, misc: c_int) -> c_int;
        pub fn getloadavg(loadavg: *mut f64, nelem: c_int) -> c_int;
    }
}

/// Live OpenBSD kernel. Holds the kvm handle once opened; it is closed on drop.
pub struct OpenBsd {
    kd: Option<NonNull<ffi::KvmT>>,
    page_size: usize,
}

impl OpenBsd {
    pub fn new() -> Self {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        OpenBsd {
            kd: None,
            page_size: if page_size > 0 { page_size as usize } else { 4096 },
        }
    }
}

impl Drop for OpenBsd {
    fn drop(&mut self) {
        if let Some(kd) = self.kd.take() {
            unsafe { ffi::kvm_close(kd.as_ptr()) };
        }
    }
}

/// Reads a fixed-size value from a sysctl MIB.
fn sysctl_value<T: Copy>(mib: &[c_int], name: &'static str) -> Result<T, KernelError> {
    let mut value = MaybeUninit::<T>::zeroed();
    let mut size = size_of::<T>();
    let rc = unsafe {
        libc::sysctl(
            mib.as_ptr(),
            mib.len() as c_uint,
            value.as_mut_ptr().cast::<c_void>(),
            &mut size,
            ptr::null_mut(),
            0,
        )
    };
    if rc == -1 {
        return Err(KernelError::sysctl(name));
    }
    if size < size_of::<T>() {
        return Err(KernelError::Truncated {
            name,
            got: size,
            expected: size_of::<T>(),
        });
    }
    Ok(unsafe { value.assume_init() })
}

fn sysctl_string(mib: &[c_int], name: &'static str) -> Result<String, KernelError> {
    let mut buf = [0u8; 64];
    let mut size = buf.len();
    let rc = unsafe {
        libc::sysctl(
            mib.as_ptr(),
            mib.len() as c_uint,
            buf.as_mut_ptr().cast::<c_void>(),
            &mut size,
            ptr::null_mut(),
            0,
        )
    };
    if rc == -1 {
        return Err(KernelError::sysctl(name));
    }
    let bytes = &buf[..size.min(buf.len())];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

fn c_chars_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn ticks_from<T: Copy + Into<u64>>(raw: [T; CPUSTATES]) -> CpuTicks {
    CpuTicks(raw.map(Into::into))
}

fn decode_proc(kp: &libc::kinfo_proc) -> KernelProc {
    KernelProc {
        pid: kp.p_pid as u32,
        system: (kp.p_flag as c_int & ffi::P_SYSTEM) != 0,
        running: kp.p_stat as i8 == ffi::SRUN,
        comm: c_chars_to_string(&kp.p_comm),
        uid: kp.p_uid as u32,
        user_time: CpuTime {
            sec: kp.p_uutime_sec as u32,
            usec: kp.p_uutime_usec as u32,
        },
        system_time: CpuTime {
            sec: kp.p_ustime_sec as u32,
            usec: kp.p_ustime_usec as u32,
        },
        real_time: CpuTime {
            sec: kp.p_rtime_sec as u32,
            usec: kp.p_rtime_usec as u32,
        },
        pctcpu: kp.p_pctcpu as u32,
        vm_map_size: kp.p_vm_map_size as u64,
        rss_pages: (kp.p_vm_rssize as i64).max(0) as u64,
    }
}

/// Frees the `getifaddrs` list on every exit path.
struct IfAddrs(*mut libc::ifaddrs);

impl Drop for IfAddrs {
    fn drop(&mut self) {
        unsafe { libc::freeifaddrs(self.0) };
    }
}

impl Kernel for OpenBsd {
    fn open_process_access(&mut self) -> Result<(), KernelError> {
        if self.kd.is_some() {
            return Ok(());
        }
        let kd = unsafe {
            ffi::kvm_open(
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ffi::KVM_NO_FILES,
                ptr::null(),
            )
        };
        self.kd = Some(NonNull::new(kd).ok_or(KernelError::ProcessAccess)?);
        Ok(())
    }

    fn boot_time(&self) -> Result<i64, KernelError> {
        let tv: libc::timeval = sysctl_value(&[ffi::CTL_KERN, ffi::KERN_BOOTTIME], "kern.boottime")?;
        Ok(tv.tv_sec as i64)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn vm_totals(&self) -> Result<VmTotals, KernelError> {
        let vm: ffi::VmTotal = sysctl_value(&[ffi::CTL_VM, ffi::VM_METER], "vm.vmmeter")?;
        Ok(VmTotals {
            real_pages: vm.t_rm as u64,
            free_pages: vm.t_free as u64,
        })
    }

    fn swap_devices(&self) -> Result<Vec<SwapDevice>, KernelError> {
        let nswap = unsafe { ffi::swapctl(ffi::SWAP_NSWAP, ptr::null_mut(), 0) };
        if nswap < 0 {
            return Err(KernelError::Swapctl(io::Error::last_os_error()));
        }
        if nswap == 0 {
            return Ok(Vec::new());
        }

        let mut entries: Vec<MaybeUninit<ffi::SwapEnt>> = Vec::with_capacity(nswap as usize);
        entries.resize_with(nswap as usize, MaybeUninit::zeroed);
        let rnswap =
            unsafe { ffi::swapctl(ffi::SWAP_STATS, entries.as_mut_ptr().cast::<c_void>(), nswap) };
        if rnswap == -1 {
            return Err(KernelError::Swapctl(io::Error::last_os_error()));
        }

        let filled = (rnswap as usize).min(entries.len());
        Ok(entries[..filled]
            .iter()
            .map(|entry| {
                let entry = unsafe { entry.assume_init_ref() };
                SwapDevice {
                    enabled: entry.se_flags & ffi::SWF_ENABLE != 0,
                    in_use_blocks: entry.se_inuse.max(0) as u64,
                    total_blocks: entry.se_nblks.max(0) as u64,
                }
            })
            .collect())
    }

    fn cpu_count(&self) -> Result<usize, KernelError> {
        let n: c_int = sysctl_value(&[ffi::CTL_HW, ffi::HW_NCPU], "hw.ncpu")?;
        Ok(n.max(0) as usize)
    }

    fn cpu_ticks(&self) -> Result<CpuTicks, KernelError> {
        let raw: [libc::c_long; CPUSTATES] =
            sysctl_value(&[ffi::CTL_KERN, ffi::KERN_CPTIME], "kern.cp_time")?;
        Ok(CpuTicks(raw.map(|t| t as u64)))
    }

    fn core_ticks(&self, core: usize) -> Result<CpuTicks, KernelError> {
        let raw: [u64; CPUSTATES] = sysctl_value(
            &[ffi::CTL_KERN, ffi::KERN_CPTIME2, core as c_int],
            "kern.cp_time2",
        )?;
        Ok(ticks_from(raw))
    }

    fn load_average(&self) -> Result<[f64; 3], KernelError> {
        let mut avg = [0.0f64; 3];
        let n = unsafe { ffi::getloadavg(avg.as_mut_ptr(), 3) };
        if n < 3 {
            return Err(KernelError::Sysctl {
                name: "vm.loadavg",
                source: io::Error::last_os_error(),
            });
        }
        Ok(avg)
    }

    fn processes(&self) -> Result<Vec<KernelProc>, KernelError> {
        let kd = self.kd.ok_or(KernelError::ProcessAccess)?;
        let mut count: c_int = 0;
        let procs = unsafe {
            ffi::kvm_getprocs(
                kd.as_ptr(),
                libc::KERN_PROC_ALL,
                0,
                size_of::<libc::kinfo_proc>(),
                &mut count,
            )
        };
        if procs.is_null() {
            return Err(KernelError::ProcessAccess);
        }
        // The array belongs to the kvm handle and stays valid until the next call.
        let table = unsafe { std::slice::from_raw_parts(procs, count.max(0) as usize) };
        Ok(table.iter().map(decode_proc).collect())
    }

    fn interfaces(&self) -> Result<Vec<IfAddrRecord>, KernelError> {
        let mut head: *mut libc::ifaddrs = ptr::null_mut();
        if unsafe { libc::getifaddrs(&mut head) } < 0 {
            return Err(KernelError::Interfaces(io::Error::last_os_error()));
        }
        let list = IfAddrs(head);

        let mut records = Vec::new();
        let mut cursor = list.0;
        while let Some(ifa) = unsafe { cursor.as_ref() } {
            cursor = ifa.ifa_next;
            if ifa.ifa_name.is_null() {
                continue;
            }
            let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
                .to_string_lossy()
                .into_owned();
            let addr = match unsafe { ifa.ifa_addr.as_ref() } {
                Some(sa) if sa.sa_family == ffi::AF_LINK && !ifa.ifa_data.is_null() => {
                    let data = unsafe { &*(ifa.ifa_data as *const ffi::IfData) };
                    IfAddress::Link {
                        ibytes: data.ifi_ibytes,
                        obytes: data.ifi_obytes,
                    }
                }
                Some(sa) if sa.sa_family == ffi::AF_INET => {
                    let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                    IfAddress::Inet(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
                }
                _ => IfAddress::Other,
            };
            records.push(IfAddrRecord {
                name,
                up: ifa.ifa_flags & ffi::IFF_UP != 0,
                addr,
            });
        }
        debug!(count = records.len(), "interfaces listed");
        Ok(records)
    }

    fn sensor_device(&self, device: i32) -> Result<SensorDevice, KernelError> {
        let dev: ffi::SensorDev =
            match sysctl_value(&[ffi::CTL_HW, ffi::HW_SENSORS, device], "hw.sensors") {
                Ok(dev) => dev,
                Err(KernelError::Sysctl { source, .. })
                    if matches!(source.raw_os_error(), Some(libc::ENOENT | libc::ENXIO)) =>
                {
                    return Err(KernelError::NoSuchSensorDevice(device));
                }
                Err(err) => return Err(err),
            };
        let mut maxnumt = [0i32; SENSOR_MAX_TYPES];
        maxnumt.copy_from_slice(&dev.maxnumt);
        Ok(SensorDevice {
            xname: c_chars_to_string(&dev.xname),
            maxnumt,
        })
    }

    fn sensor(
        &self,
        device: i32,
        kind: SensorType,
        index: i32,
    ) -> Result<RawSensor, KernelError> {
        let mib = [
            ffi::CTL_HW,
            ffi::HW_SENSORS,
            device,
            kind.index() as c_int,
            index,
        ];
        let sensor: ffi::Sensor = sysctl_value(&mib, "hw.sensors")?;
        Ok(RawSensor {
            value: sensor.value,
            invalid: sensor.flags & ffi::SENSOR_FINVALID != 0,
            numt: sensor.numt,
        })
    }

    fn hw_string(&self, which: HwString) -> Result<String, KernelError> {
        match which {
            HwString::Vendor => sysctl_string(&[ffi::CTL_HW, ffi::HW_VENDOR], "hw.vendor"),
            HwString::Product => sysctl_string(&[ffi::CTL_HW, ffi::HW_PRODUCT], "hw.product"),
        }
    }

    fn cpu_speed(&self) -> Result<i32, KernelError> {
        sysctl_value(&[ffi::CTL_HW, ffi::HW_CPUSPEED], "hw.cpuspeed")
    }
}
