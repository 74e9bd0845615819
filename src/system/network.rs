use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;

use super::kernel::{IfAddrRecord, IfAddress};

/// Largest value of the 32-bit hardware byte counters.
const COUNTER_MAX: u64 = 4_294_967_295;
/// Elapsed seconds at or below which a network update is skipped.
pub const MIN_UPDATE_DELTA: f64 = 0.0001;

/// Cumulative traffic for one interface.
#[derive(Clone, Debug, Default, Serialize)]
pub struct NetStat {
    pub name: String,
    pub up: bool,
    pub addr: Option<Ipv4Addr>,
    /// Bytes received since the first sample.
    pub recv: u64,
    /// Bytes transmitted since the first sample.
    pub trans: u64,
    pub last_read_recv: u64,
    pub last_read_trans: u64,
    /// Bytes per second over the last cycle.
    pub recv_speed: f64,
    pub trans_speed: f64,
}

/// Adds the distance from `*last_raw` to `raw` to `*total`, treating a smaller
/// reading as a 32-bit rollover.
pub fn accumulate(total: &mut u64, last_raw: &mut u64, raw: u64) {
    let step = if raw < *last_raw {
        (COUNTER_MAX - *last_raw).wrapping_add(raw)
    } else {
        raw - *last_raw
    };
    *total = total.wrapping_add(step);
    *last_raw = raw;
}

impl NetStat {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Folds in new raw link counters and derives rates over `delta` seconds.
    pub fn record(&mut self, ibytes: u64, obytes: u64, delta: f64) {
        let last_recv = self.recv;
        let last_trans = self.trans;

        accumulate(&mut self.recv, &mut self.last_read_recv, ibytes);
        accumulate(&mut self.trans, &mut self.last_read_trans, obytes);

        self.recv_speed = self.recv.wrapping_sub(last_recv) as f64 / delta;
        self.trans_speed = self.trans.wrapping_sub(last_trans) as f64 / delta;
    }
}

/// Per-interface statistics keyed by interface name.
#[derive(Debug, Default)]
pub struct NetStatTable {
    stats: HashMap<String, NetStat>,
}

impl NetStatTable {
    pub fn get(&self, name: &str) -> Option<&NetStat> {
        self.stats.get(name)
    }

    pub fn get_or_insert(&mut self, name: &str) -> &mut NetStat {
        self.stats
            .entry(name.to_string())
            .or_insert_with(|| NetStat::new(name))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Interfaces sorted by name.
    pub fn sorted(&self) -> Vec<&NetStat> {
        let mut all: Vec<&NetStat> = self.stats.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Applies one `getifaddrs` listing. Returns false without touching any
    /// counters when `delta` is too small to derive a rate from.
    pub fn apply(&mut self, records: &[IfAddrRecord], delta: f64) -> bool {
        if delta <= MIN_UPDATE_DELTA {
            return false;
        }

        for (i, record) in records.iter().enumerate() {
            let ns = self.get_or_insert(&record.name);
            if !record.up {
                ns.up = false;
                continue;
            }
            ns.up = true;

            let IfAddress::Link { ibytes, obytes } = record.addr else {
                continue;
            };

            // Addresses of one interface follow its link record.
            for next in records[i + 1..]
                .iter()
                .take_while(|next| next.name == record.name)
            {
                if let IfAddress::Inet(addr) = next.addr {
                    ns.addr = Some(addr);
                }
            }

            ns.record(ibytes, obytes, delta);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(name: &str, up: bool, ibytes: u64, obytes: u64) -> IfAddrRecord {
        IfAddrRecord {
            name: name.to_string(),
            up,
            addr: IfAddress::Link { ibytes, obytes },
        }
    }

    fn inet(name: &str, addr: [u8; 4]) -> IfAddrRecord {
        IfAddrRecord {
            name: name.to_string(),
            up: true,
            addr: IfAddress::Inet(Ipv4Addr::from(addr)),
        }
    }

    #[test]
    fn wraparound_adds_rolled_distance() {
        let mut total = 0;
        let mut last = 0;
        accumulate(&mut total, &mut last, 4_294_967_290);
        let before = total;
        accumulate(&mut total, &mut last, 10);
        assert_eq!(total - before, 15);
        assert_eq!(last, 10);
    }

    #[test]
    fn rates_use_elapsed_time() {
        let mut table = NetStatTable::default();
        assert!(table.apply(&[link("em0", true, 1000, 500)], 1.0));
        assert!(table.apply(&[link("em0", true, 3000, 1500)], 2.0));
        let em0 = table.get("em0").unwrap();
        assert_eq!(em0.recv, 3000);
        assert_eq!(em0.trans, 1500);
        assert!((em0.recv_speed - 1000.0).abs() < f64::EPSILON);
        assert!((em0.trans_speed - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tiny_delta_skips_update() {
        let mut table = NetStatTable::default();
        assert!(!table.apply(&[link("em0", true, 1000, 500)], 0.0001));
        assert!(table.is_empty());
    }

    #[test]
    fn address_comes_from_following_records_of_same_interface() {
        let records = vec![
            link("em0", true, 10, 10),
            inet("em0", [192, 168, 1, 2]),
            link("lo0", true, 1, 1),
            inet("lo0", [127, 0, 0, 1]),
        ];
        let mut table = NetStatTable::default();
        table.apply(&records, 1.0);
        assert_eq!(
            table.get("em0").unwrap().addr,
            Some(Ipv4Addr::new(192, 168, 1, 2))
        );
        assert_eq!(table.get("lo0").unwrap().addr, Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn down_interface_keeps_counters() {
        let mut table = NetStatTable::default();
        table.apply(&[link("em0", true, 100, 100)], 1.0);
        table.apply(&[link("em0", false, 900, 900)], 1.0);
        let em0 = table.get("em0").unwrap();
        assert!(!em0.up);
        assert_eq!(em0.recv, 100);
    }

    #[test]
    fn non_link_up_record_only_marks_up() {
        let mut table = NetStatTable::default();
        table.apply(&[inet("pflog0", [10, 0, 0, 1])], 1.0);
        let stat = table.get("pflog0").unwrap();
        assert!(stat.up);
        assert_eq!(stat.addr, None);
        assert_eq!(stat.recv, 0);
    }
}
