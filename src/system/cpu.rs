use super::kernel::CpuTicks;

/// Previous cumulative busy and total ticks for one usage slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuLoad {
    pub old_used: u64,
    pub old_total: u64,
}

impl CpuLoad {
    /// Folds a new sample in and returns the busy fraction since the last one.
    ///
    /// A zero total delta yields exactly 0. A shrinking total (counter reset)
    /// is not special-cased and produces whatever the signed ratio is.
    pub fn sample(&mut self, ticks: &CpuTicks) -> f32 {
        let total = ticks.total();
        let used = ticks.used();

        let diff_total = total.wrapping_sub(self.old_total) as i64;
        let usage = if diff_total != 0 {
            let diff_used = used.wrapping_sub(self.old_used) as i64;
            diff_used as f32 / diff_total as f32
        } else {
            0.0
        };

        self.old_used = used;
        self.old_total = total;
        usage
    }
}

/// One accumulator per usage slot: slot 0 is the aggregate, 1..=N the cores.
#[derive(Clone, Debug)]
pub struct CpuAccumulator {
    loads: Vec<CpuLoad>,
}

impl CpuAccumulator {
    pub fn new(cpu_count: usize) -> Self {
        Self {
            loads: vec![CpuLoad::default(); cpu_count + 1],
        }
    }

    pub fn slots(&self) -> usize {
        self.loads.len()
    }

    pub fn load(&self, slot: usize) -> Option<&CpuLoad> {
        self.loads.get(slot)
    }

    /// Samples `slot`; slots past the discovered core count are ignored.
    pub fn sample(&mut self, slot: usize, ticks: &CpuTicks) -> Option<f32> {
        self.loads.get_mut(slot).map(|load| load.sample(ticks))
    }
}
