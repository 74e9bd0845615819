use std::collections::HashMap;

use serde::Serialize;

use super::kernel::{CpuTime, KernelProc};
use crate::format::truncate_name;

/// Kernel fixed-point scale for `p_pctcpu` (`1 << FSHIFT`).
pub const FSCALE: f64 = 2048.0;

/// Converts a seconds/microseconds pair to centiseconds.
pub fn to_centiseconds(time: CpuTime) -> u64 {
    time.sec as u64 * 100 + (time.usec as f64 * 0.0001) as u64
}

/// Latest reading for one process, as consumed by the "top" display.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub basename: String,
    pub uid: u32,
    /// Resident set in bytes.
    pub rss: u64,
    /// Virtual size in bytes.
    pub vsize: u64,
    /// User CPU time in centiseconds.
    pub user_time: u64,
    /// Kernel CPU time in centiseconds.
    pub kernel_time: u64,
    /// `user_time + kernel_time`.
    pub total: u64,
    /// Real (wall) run time in centiseconds.
    pub total_cpu_time: u64,
    /// Percent CPU as computed by the scheduler.
    pub amount: f64,
    /// Tick of the refresh cycle that last touched this entry.
    pub time_stamp: u64,
}

/// Registry of every process seen so far, keyed by pid.
///
/// Entries are only created and overwritten here; pruning pids that have
/// exited is left to the display that owns the list.
#[derive(Clone, Debug, Default)]
pub struct ProcessRegistry {
    pub processes: HashMap<u32, ProcessEntry>,
}

impl ProcessRegistry {
    pub fn get(&self, pid: u32) -> Option<&ProcessEntry> {
        self.processes.get(&pid)
    }

    pub fn get_or_insert(&mut self, pid: u32) -> &mut ProcessEntry {
        self.processes.entry(pid).or_insert_with(|| ProcessEntry {
            pid,
            ..ProcessEntry::default()
        })
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Overwrites entries from one full process-table scan. Kernel threads
    /// and nameless entries are skipped. Returns the number of entries updated.
    pub fn ingest(
        &mut self,
        procs: &[KernelProc],
        page_size: usize,
        max_name_len: usize,
        tick: u64,
    ) -> usize {
        let mut updated = 0;
        for kp in procs {
            if kp.system || kp.comm.is_empty() {
                continue;
            }

            let entry = self.get_or_insert(kp.pid);
            entry.time_stamp = tick;
            entry.user_time = to_centiseconds(kp.user_time);
            entry.kernel_time = to_centiseconds(kp.system_time);
            entry.total = entry.user_time + entry.kernel_time;
            entry.uid = kp.uid;
            entry.name = truncate_name(&kp.comm, max_name_len);
            entry.basename = entry.name.clone();
            entry.amount = 100.0 * kp.pctcpu as f64 / FSCALE;
            entry.vsize = kp.vm_map_size;
            entry.rss = kp.rss_pages * page_size as u64;
            entry.total_cpu_time = to_centiseconds(kp.real_time);
            updated += 1;
        }
        updated
    }

    /// Entries sorted by descending CPU percent, ties by pid.
    pub fn top_by_cpu(&self, limit: usize) -> Vec<&ProcessEntry> {
        let mut all: Vec<&ProcessEntry> = self.processes.values().collect();
        all.sort_by(|a, b| b.amount.total_cmp(&a.amount).then(a.pid.cmp(&b.pid)));
        all.truncate(limit);
        all
    }

    /// Entries sorted by descending resident size, ties by pid.
    pub fn top_by_mem(&self, limit: usize) -> Vec<&ProcessEntry> {
        let mut all: Vec<&ProcessEntry> = self.processes.values().collect();
        all.sort_by(|a, b| b.rss.cmp(&a.rss).then(a.pid.cmp(&b.pid)));
        all.truncate(limit);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kproc(pid: u32, comm: &str) -> KernelProc {
        KernelProc {
            pid,
            comm: comm.to_string(),
            uid: 1000,
            user_time: CpuTime {
                sec: 2,
                usec: 500_000,
            },
            system_time: CpuTime { sec: 1, usec: 0 },
            real_time: CpuTime {
                sec: 10,
                usec: 999_999,
            },
            pctcpu: 1024,
            vm_map_size: 8 * 1024 * 1024,
            rss_pages: 100,
            ..KernelProc::default()
        }
    }

    #[test]
    fn centiseconds_truncate_microseconds() {
        assert_eq!(to_centiseconds(CpuTime { sec: 2, usec: 500_000 }), 250);
        assert_eq!(to_centiseconds(CpuTime { sec: 0, usec: 9_999 }), 0);
        assert_eq!(to_centiseconds(CpuTime { sec: 0, usec: 10_000 }), 1);
    }

    #[test]
    fn ingest_fills_entry() {
        let mut registry = ProcessRegistry::default();
        let updated = registry.ingest(&[kproc(42, "sshd")], 4096, 256, 7);
        assert_eq!(updated, 1);

        let entry = registry.get(42).unwrap();
        assert_eq!(entry.name, "sshd");
        assert_eq!(entry.basename, "sshd");
        assert_eq!(entry.user_time, 250);
        assert_eq!(entry.kernel_time, 100);
        assert_eq!(entry.total, 350);
        assert_eq!(entry.total_cpu_time, 1099);
        assert_eq!(entry.rss, 409_600);
        assert_eq!(entry.vsize, 8 * 1024 * 1024);
        assert!((entry.amount - 50.0).abs() < f64::EPSILON);
        assert_eq!(entry.uid, 1000);
        assert_eq!(entry.time_stamp, 7);
    }

    #[test]
    fn ingest_skips_system_and_nameless() {
        let mut registry = ProcessRegistry::default();
        let mut kthread = kproc(1, "idle0");
        kthread.system = true;
        let procs = vec![kthread, kproc(2, ""), kproc(3, "ksh")];
        assert_eq!(registry.ingest(&procs, 4096, 256, 1), 1);
        assert!(registry.get(1).is_none());
        assert!(registry.get(2).is_none());
        assert!(registry.get(3).is_some());
    }

    #[test]
    fn stale_entries_are_kept() {
        let mut registry = ProcessRegistry::default();
        registry.ingest(&[kproc(5, "cron"), kproc(6, "ntpd")], 4096, 256, 1);
        registry.ingest(&[kproc(6, "ntpd")], 4096, 256, 2);
        assert_eq!(registry.get(5).unwrap().time_stamp, 1);
        assert_eq!(registry.get(6).unwrap().time_stamp, 2);
    }

    #[test]
    fn names_are_truncated() {
        let mut registry = ProcessRegistry::default();
        registry.ingest(&[kproc(9, "verylongname")], 4096, 4, 1);
        assert_eq!(registry.get(9).unwrap().name, "very");
    }

    #[test]
    fn top_orders_by_cpu_then_pid() {
        let mut registry = ProcessRegistry::default();
        let mut busy = kproc(20, "make");
        busy.pctcpu = 2048;
        registry.ingest(&[kproc(11, "a"), busy, kproc(10, "b")], 4096, 256, 1);
        let pids: Vec<u32> = registry.top_by_cpu(3).iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![20, 10, 11]);
        assert_eq!(registry.top_by_cpu(1).len(), 1);
    }
}
