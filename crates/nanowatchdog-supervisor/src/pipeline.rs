//! The health-check pipeline: an ordered, short-circuited
//! battery of probes. Each external data source sits behind a small
//! trait so tests can substitute deterministic fakes instead of touching `/proc`, `/sys`, or the
//! process table.

use std::io;
use std::process::Command as ProcessCommand;
use std::time::Duration;

use nanowatchdog_proto::command::{
    REASON_INTERFACE, REASON_LOAD_1, REASON_LOAD_15, REASON_LOAD_5, REASON_MAX_TEMPERATURE,
    REASON_MIN_MEMORY, REASON_PIDFILE, REASON_PING,
};

pub trait MeminfoSource: Send {
    fn swap_free_kb(&self) -> io::Result<u64>;
}

pub trait LoadavgSource: Send {
    fn loads(&self) -> io::Result<[f64; 3]>;
}

pub trait ThermalSource: Send {
    fn zone_temps_millic(&self) -> io::Result<Vec<i64>>;
}

pub trait ProcessLiveness: Send {
    fn is_alive(&self, pid: i32) -> bool;
}

pub trait PingProbe: Send {
    fn reachable(&self, host: &str) -> bool;
}

pub trait InterfaceCounters: Send {
    fn rx_tx(&self, iface: &str) -> io::Result<(u64, u64)>;
}

/// Per-probe wall-clock ceiling for anything that shells out or blocks on
/// an external device.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RealMeminfoSource;
impl MeminfoSource for RealMeminfoSource {
    fn swap_free_kb(&self) -> io::Result<u64> {
        let text = std::fs::read_to_string("/proc/meminfo")?;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("SwapFree:") {
                let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
                return digits
                    .parse()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "unparsable SwapFree"));
            }
        }
        Err(io::Error::new(io::ErrorKind::NotFound, "SwapFree not found"))
    }
}

pub struct RealLoadavgSource;
impl LoadavgSource for RealLoadavgSource {
    fn loads(&self) -> io::Result<[f64; 3]> {
        let text = std::fs::read_to_string("/proc/loadavg")?;
        let mut fields = text.split_whitespace();
        let parse_one = |f: Option<&str>| {
            f.and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unparsable loadavg"))
        };
        Ok([
            parse_one(fields.next())?,
            parse_one(fields.next())?,
            parse_one(fields.next())?,
        ])
    }
}

pub struct RealThermalSource;
impl ThermalSource for RealThermalSource {
    fn zone_temps_millic(&self) -> io::Result<Vec<i64>> {
        let mut temps = Vec::new();
        let Ok(entries) = std::fs::read_dir("/sys/class/thermal") else {
            return Ok(temps);
        };
        for entry in entries.flatten() {
            let path = entry.path().join("temp");
            if let Ok(text) = std::fs::read_to_string(&path) {
                if let Ok(v) = text.trim().parse::<i64>() {
                    temps.push(v);
                }
            }
        }
        Ok(temps)
    }
}

pub struct RealProcessLiveness;
impl ProcessLiveness for RealProcessLiveness {
    fn is_alive(&self, pid: i32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
    }
}

pub struct RealPingProbe;
impl PingProbe for RealPingProbe {
    fn reachable(&self, host: &str) -> bool {
        ProcessCommand::new("ping")
            .args(["-c1", "-W", &PROBE_TIMEOUT.as_secs().to_string(), host])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

pub struct RealInterfaceCounters;
impl InterfaceCounters for RealInterfaceCounters {
    fn rx_tx(&self, iface: &str) -> io::Result<(u64, u64)> {
        let rx = std::fs::read_to_string(format!("/sys/class/net/{iface}/statistics/rx_packets"))?;
        let tx = std::fs::read_to_string(format!("/sys/class/net/{iface}/statistics/tx_packets"))?;
        let rx: u64 = rx.trim().parse().unwrap_or(0);
        let tx: u64 = tx.trim().parse().unwrap_or(0);
        Ok((rx, tx))
    }
}

/// Parameters the pipeline evaluates probes against, lifted straight from
/// `SupervisorConfig` so the pipeline itself stays config-shape-agnostic.
pub struct PipelineConfig {
    pub min_memory: Option<u64>,
    pub max_load: [Option<f64>; 3],
    pub max_temperature: f64,
    pub pidfiles: Vec<(std::path::PathBuf, i32)>,
    pub pings: Vec<String>,
    pub interfaces: Vec<String>,
}

pub struct CheckPipeline {
    pub meminfo: Box<dyn MeminfoSource>,
    pub loadavg: Box<dyn LoadavgSource>,
    pub thermal: Box<dyn ThermalSource>,
    pub liveness: Box<dyn ProcessLiveness>,
    pub ping: Box<dyn PingProbe>,
    pub interfaces: Box<dyn InterfaceCounters>,
}

impl CheckPipeline {
    pub fn real() -> Self {
        CheckPipeline {
            meminfo: Box::new(RealMeminfoSource),
            loadavg: Box::new(RealLoadavgSource),
            thermal: Box::new(RealThermalSource),
            liveness: Box::new(RealProcessLiveness),
            ping: Box::new(RealPingProbe),
            interfaces: Box::new(RealInterfaceCounters),
        }
    }

    /// Evaluate the battery of checks in a fixed order, short-circuiting
    /// on the first one that requests a reboot.
    pub fn evaluate(&self, cfg: &PipelineConfig) -> Option<u8> {
        if let Some(min_memory) = cfg.min_memory {
            if min_memory > 0 {
                if let Ok(swap_free_kb) = self.meminfo.swap_free_kb() {
                    // min-memory is expressed in 4-KiB pages; swap_free_kb
                    // is in KiB, so divide by 4 before comparing.
                    let swap_free_pages = swap_free_kb / 4;
                    if swap_free_pages < min_memory {
                        return Some(REASON_MIN_MEMORY);
                    }
                }
            }
        }

        if cfg.max_load.iter().any(|l| l.is_some()) {
            if let Ok(loads) = self.loadavg.loads() {
                let reasons = [REASON_LOAD_1, REASON_LOAD_5, REASON_LOAD_15];
                for i in 0..3 {
                    if let Some(max) = cfg.max_load[i] {
                        if max > 0.0 && loads[i] > max {
                            return Some(reasons[i]);
                        }
                    }
                }
            }
        }

        if let Ok(temps) = self.thermal.zone_temps_millic() {
            if temps
                .iter()
                .any(|&t| (t as f64 / 1000.0) > cfg.max_temperature)
            {
                return Some(REASON_MAX_TEMPERATURE);
            }
        }

        for (_path, pid) in &cfg.pidfiles {
            if !self.liveness.is_alive(*pid) {
                return Some(REASON_PIDFILE);
            }
        }

        for host in &cfg.pings {
            if !self.ping.reachable(host) {
                return Some(REASON_PING);
            }
        }

        for iface in &cfg.interfaces {
            if let Ok((rx, tx)) = self.interfaces.rx_tx(iface) {
                if rx == 0 && tx == 0 {
                    return Some(REASON_INTERFACE);
                }
            }
        }

        // test-directory: reserved, always returns false.
        None
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeMeminfoSource(pub Option<u64>);
    impl MeminfoSource for FakeMeminfoSource {
        fn swap_free_kb(&self) -> io::Result<u64> {
            self.0
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "fake meminfo unset"))
        }
    }

    #[derive(Default)]
    pub struct FakeLoadavgSource(pub Option<[f64; 3]>);
    impl LoadavgSource for FakeLoadavgSource {
        fn loads(&self) -> io::Result<[f64; 3]> {
            self.0
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "fake loadavg unset"))
        }
    }

    #[derive(Default)]
    pub struct FakeThermalSource(pub Vec<i64>);
    impl ThermalSource for FakeThermalSource {
        fn zone_temps_millic(&self) -> io::Result<Vec<i64>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    pub struct FakeProcessLiveness(pub HashMap<i32, bool>);
    impl ProcessLiveness for FakeProcessLiveness {
        fn is_alive(&self, pid: i32) -> bool {
            self.0.get(&pid).copied().unwrap_or(true)
        }
    }

    #[derive(Default)]
    pub struct FakePingProbe(pub HashMap<String, bool>);
    impl PingProbe for FakePingProbe {
        fn reachable(&self, host: &str) -> bool {
            self.0.get(host).copied().unwrap_or(true)
        }
    }

    #[derive(Default)]
    pub struct FakeInterfaceCounters(pub HashMap<String, (u64, u64)>);
    impl InterfaceCounters for FakeInterfaceCounters {
        fn rx_tx(&self, iface: &str) -> io::Result<(u64, u64)> {
            Ok(self.0.get(iface).copied().unwrap_or((1, 1)))
        }
    }
}
