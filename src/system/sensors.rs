//! hw.sensors readings for one selected device.

use std::collections::HashMap;

use tracing::warn;

use super::kernel::{RawSensor, SensorType};

/// Highest sensor index (exclusive) a user may ask for.
pub const MAX_SENSORS: usize = 256;

/// Microkelvin offset of 0 °C.
const ZERO_CELSIUS_UK: i64 = 273_150_000;

/// Parses a user-supplied sensor index. Anything that does not start with a
/// digit or whose leading number is out of range logs a warning and maps to 0.
pub fn parse_sensor_index(arg: &str) -> usize {
    let digits: &str = {
        let end = arg
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(arg.len());
        &arg[..end]
    };

    match digits.parse::<usize>() {
        Ok(index) if index < MAX_SENSORS => index,
        _ => {
            warn!(arg, "invalid sensor number");
            0
        }
    }
}

/// Last valid reading of every temperature, fan and voltage sensor, keyed by
/// `(device, sensor index)`.
#[derive(Clone, Debug, Default)]
pub struct SensorCache {
    temp: HashMap<(i32, usize), f32>,
    fan: HashMap<(i32, usize), u32>,
    volt: HashMap<(i32, usize), f32>,
}

impl SensorCache {
    /// Stores one reading after unit conversion. Invalid readings and types
    /// other than temperature, fan and DC voltage leave the cache untouched.
    /// Returns whether the reading was a valid sensor.
    pub fn store(&mut self, device: i32, kind: SensorType, sensor: &RawSensor) -> bool {
        if sensor.invalid {
            return false;
        }
        let Ok(index) = usize::try_from(sensor.numt) else {
            return false;
        };
        let key = (device, index);

        match kind {
            SensorType::Temperature => {
                let celsius = (sensor.value - ZERO_CELSIUS_UK) as f64 / 1_000_000.0;
                self.temp.insert(key, celsius as f32);
            }
            SensorType::FanRpm => {
                self.fan.insert(key, sensor.value as u32);
            }
            SensorType::VoltsDc => {
                self.volt.insert(key, (sensor.value as f64 / 1_000_000.0) as f32);
            }
            SensorType::Other(_) => {}
        }
        true
    }

    /// Degrees Celsius.
    pub fn temperature(&self, device: i32, index: usize) -> Option<f32> {
        self.temp.get(&(device, index)).copied()
    }

    /// Revolutions per minute.
    pub fn fan(&self, device: i32, index: usize) -> Option<u32> {
        self.fan.get(&(device, index)).copied()
    }

    /// Volts DC.
    pub fn voltage(&self, device: i32, index: usize) -> Option<f32> {
        self.volt.get(&(device, index)).copied()
    }

    /// All cached temperatures of `device`, sorted by index.
    pub fn temperatures(&self, device: i32) -> Vec<(usize, f32)> {
        collect_sorted(&self.temp, device)
    }

    pub fn fans(&self, device: i32) -> Vec<(usize, u32)> {
        collect_sorted(&self.fan, device)
    }

    pub fn voltages(&self, device: i32) -> Vec<(usize, f32)> {
        collect_sorted(&self.volt, device)
    }
}

fn collect_sorted<T: Copy>(map: &HashMap<(i32, usize), T>, device: i32) -> Vec<(usize, T)> {
    let mut out: Vec<(usize, T)> = map
        .iter()
        .filter(|((dev, _), _)| *dev == device)
        .map(|(&(_, index), &value)| (index, value))
        .collect();
    out.sort_by_key(|&(index, _)| index);
    out
}
