pub mod collector;
pub mod cpu;
pub mod kernel;
pub mod memory;
pub mod network;
pub mod platform;
pub mod process;
pub mod sensors;
pub mod snapshot;
