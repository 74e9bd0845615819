use std::path::PathBuf;
use std::time::Duration;

use bsdstat::config::{Config, LogLevel, load_config, load_config_from_path};
use bsdstat::format;
use bsdstat::system::collector::{Collector, CollectorSettings, RefreshReport};
use bsdstat::system::kernel::Kernel;
use bsdstat::system::platform;
use bsdstat::system::snapshot::UpdateClock;
use clap::Parser;
use color_eyre::Result;
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "bsdstat",
    about = "Collect OpenBSD kernel statistics for a system monitor"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// hw.sensors device id
    #[arg(long)]
    sensor_device: Option<i32>,

    /// Run a single refresh cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Print each snapshot as a JSON line
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Number of processes to list
    #[arg(long, default_value_t = 5)]
    top: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    tick: u64,
    snapshot: &'a bsdstat::system::snapshot::SystemSnapshot,
    interfaces: Vec<&'a bsdstat::system::network::NetStat>,
    top: Vec<&'a bsdstat::system::process::ProcessEntry>,
    degraded: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    init_tracing(config.general.log_level);

    let tick_rate = Duration::from_millis(config.general.refresh_rate_ms.max(1));
    let mut collector = Collector::new(platform::native(), CollectorSettings::from(&config));
    let mut clock = UpdateClock::default();

    if !cli.json {
        println!(
            "{} {} @ {:.0} MHz",
            collector.vendor(),
            collector.product(),
            collector.cpu_frequency(1).unwrap_or(0.0)
        );
    }

    let mut interval = tokio::time::interval(tick_rate);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                clock.advance_to_now();
                let report = collector.refresh(&clock);
                print_cycle(&collector, &clock, &report, &cli)?;
                if cli.once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(device) = cli.sensor_device {
        config.sensors.device = device;
    }

    config
}

fn init_tracing(level: LogLevel) {
    let max_level = match level {
        LogLevel::Off => return,
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_cycle<K: Kernel>(
    collector: &Collector<K>,
    clock: &UpdateClock,
    report: &RefreshReport,
    cli: &Cli,
) -> Result<()> {
    let top = collector.processes().top_by_cpu(cli.top);
    if cli.json {
        let out = JsonReport {
            tick: clock.tick,
            snapshot: collector.snapshot(),
            interfaces: collector.net_stats().sorted(),
            top,
            degraded: report
                .degraded
                .iter()
                .map(|(metric, err)| format!("{metric}: {err}"))
                .collect(),
        };
        println!("{}", serde_json::to_string(&out)?);
        return Ok(());
    }

    let snap = collector.snapshot();
    println!(
        "up {} | load {:.2} {:.2} {:.2} | procs {} ({} running)",
        format::uptime(snap.uptime),
        snap.loadavg[0],
        snap.loadavg[1],
        snap.loadavg[2],
        snap.procs,
        snap.run_procs
    );
    println!(
        "mem {} / {} | swap {} / {}",
        format::format_kib(snap.mem),
        format::format_kib(snap.memmax),
        format::format_kib(snap.swap),
        format::format_kib(snap.swapmax)
    );
    let cores: Vec<String> = snap
        .cpu_usage
        .iter()
        .skip(1)
        .map(|u| format!("{:.0}%", u * 100.0))
        .collect();
    println!(
        "cpu {:.0}% [{}]",
        snap.cpu_usage.first().copied().unwrap_or(0.0) * 100.0,
        cores.join(" ")
    );
    for ns in collector.net_stats().sorted().into_iter().filter(|ns| ns.up) {
        println!(
            "  {:<8} down {:>12} up {:>12}",
            format::truncate_unicode(&ns.name, 8),
            format::format_rate(ns.recv_speed),
            format::format_rate(ns.trans_speed)
        );
    }
    let device = collector.settings().sensor_device;
    let unit = collector.settings().temperature_unit;
    for (index, celsius) in collector.sensors().temperatures(device) {
        println!("  temp{index} {}", format::temperature(celsius, unit));
    }
    for entry in top {
        println!(
            "  {:>6} {:<16} {:>5.1}% {:>10}",
            entry.pid,
            format::truncate_unicode(&entry.name, 16),
            entry.amount,
            format::format_bytes(entry.rss)
        );
    }
    for (metric, err) in &report.degraded {
        tracing::debug!(%metric, %err, "degraded");
    }
    Ok(())
}
