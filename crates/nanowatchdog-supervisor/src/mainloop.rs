//! The supervisor's single-threaded, one-second-cadence main loop. Strictly cooperative: nothing here spawns a thread, and
//! every suspension point (the sleep, the serial read, an external probe
//! invocation) is bounded.

use std::net::TcpListener;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::command_endpoint;
use crate::config::SupervisorConfig;
use crate::mail::MailSink;
use crate::pipeline::{CheckPipeline, PipelineConfig};
use crate::serial::SerialTransport;
use crate::signals;
use crate::tcp;

pub struct MainLoop {
    pub config: SupervisorConfig,
    pub config_path: Option<PathBuf>,
    pub serial: Box<dyn SerialTransport>,
    pub board_listener: TcpListener,
    pub daemon_listener: TcpListener,
    pub pipeline: CheckPipeline,
    pub mail: Box<dyn MailSink>,
    tick: u32,
    subtick: u32,
}

impl MainLoop {
    pub fn new(
        config: SupervisorConfig,
        config_path: Option<PathBuf>,
        serial: Box<dyn SerialTransport>,
        board_listener: TcpListener,
        daemon_listener: TcpListener,
        pipeline: CheckPipeline,
        mail: Box<dyn MailSink>,
    ) -> Self {
        MainLoop {
            config,
            config_path,
            serial,
            board_listener,
            daemon_listener,
            pipeline,
            mail,
            tick: 0,
            subtick: 0,
        }
    }

    /// Run until the quit flag is set. Returns the process exit code.
    pub fn run(&mut self) -> i32 {
        loop {
            self.step(|| thread::sleep(Duration::from_secs(1)));
            if signals::quit_requested() {
                break;
            }
        }
        self.shutdown();
        if signals::exit_code_is_one() {
            1
        } else {
            0
        }
    }

    /// One iteration, with the inter-iteration sleep injected so tests can
    /// run many iterations without real wall-clock delay.
    pub fn step(&mut self, sleep: impl FnOnce()) {
        self.service_board_listener();
        self.service_daemon_listener();

        if signals::quit_requested() {
            return;
        }
        if signals::take_hup() {
            self.reload();
        }
        if signals::take_usr1() {
            self.reconfigure_board();
        }

        sleep();

        self.subtick += 1;
        if self.subtick > self.config.interval.value {
            self.subtick = 0;
            self.tick += 1;
            if self.config.ping_enabled.value {
                if let Err(e) = self.serial.send("PING") {
                    warn!(error = %e, "serial PING failed");
                }
            }
            self.run_check_pipeline();
            if self.tick >= self.config.logtick.value {
                self.tick = 0;
            }
        }
    }

    fn service_board_listener(&mut self) {
        let serial = &mut self.serial;
        if let Err(e) = tcp::service_one(&self.board_listener, |req| {
            serial.send(req).unwrap_or_else(|e| {
                warn!(error = %e, "board-forward serial error");
                String::new()
            })
        }) {
            warn!(error = %e, "board-forward listener error");
        }
    }

    fn service_daemon_listener(&mut self) {
        let config = &mut self.config;
        if let Err(e) = tcp::service_one(&self.daemon_listener, |req| command_endpoint::handle(req, config)) {
            warn!(error = %e, "supervisor-command listener error");
        }
    }

    fn run_check_pipeline(&mut self) {
        let pipeline_cfg = self.pipeline_config();
        if let Some(reason) = self.pipeline.evaluate(&pipeline_cfg) {
            self.reboot(reason);
        }
    }

    /// Reboot action: log-only when `action` is disabled,
    /// otherwise issue `REBOOT <reason>` on the serial line.
    fn reboot(&mut self, reason: u8) {
        if !self.config.action.value {
            info!(reason, "check pipeline would reboot (action disabled)");
            return;
        }
        info!(reason, "check pipeline requesting reboot");
        if let Err(e) = self.serial.send(&format!("REBOOT {reason}")) {
            warn!(error = %e, "failed to send REBOOT to board");
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let pidfiles = self
            .config
            .pidfiles
            .value
            .iter()
            .filter_map(|p| read_pid_file(p).map(|pid| (p.clone(), pid)))
            .collect();
        PipelineConfig {
            min_memory: self.config.min_memory.value,
            max_load: self.config.max_load.value,
            max_temperature: self.config.max_temperature.value,
            pidfiles,
            pings: self.config.pings.value.clone(),
            interfaces: self.config.interfaces.value.clone(),
        }
    }

    /// `HUP`: re-read the configuration file, preserving command-line and
    /// runtime origin fields.
    pub fn reload(&mut self) {
        info!("SIGHUP received, reloading configuration");
        if let Some(path) = self.config_path.clone() {
            crate::config::file::load_into(&mut self.config, &path);
        }
        self.config.apply_load_defaults();
        self.config.clamp_ranges();
    }

    /// `USR1`: STOP, pause one second, re-run the startup configuration
    /// sequence.
    fn reconfigure_board(&mut self) {
        info!("SIGUSR1 received, re-running board configuration sequence");
        if let Err(e) = self.serial.send("STOP") {
            warn!(error = %e, "STOP failed during USR1 reconfiguration");
        }
        thread::sleep(Duration::from_secs(1));
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = crate::serial::configure_board(
            &mut *self.serial,
            !self.config.action.value,
            now,
            self.config.delay.value,
        ) {
            warn!(error = %e, "board configuration sequence failed during USR1");
        }
    }

    /// `TERM`/`QUIT`: STOP the board, close the serial line (dropped),
    /// close both listeners (dropped).
    fn shutdown(&mut self) {
        info!("shutting down");
        if let Err(e) = self.serial.send("STOP") {
            warn!(error = %e, "STOP failed during shutdown");
        }
    }
}

fn read_pid_file(path: &std::path::Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::fake::RecordingSink;
    use crate::pipeline::fake::*;
    use crate::serial::fake::FakeSerialTransport;

    fn fixture() -> MainLoop {
        let board = tcp::bind_nonblocking("127.0.0.1:0".parse().unwrap()).unwrap();
        let daemon = tcp::bind_nonblocking("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut config = SupervisorConfig::default();
        config.interval.value = 5;
        let pipeline = CheckPipeline {
            meminfo: Box::new(FakeMeminfoSource::default()),
            loadavg: Box::new(FakeLoadavgSource::default()),
            thermal: Box::new(FakeThermalSource::default()),
            liveness: Box::new(FakeProcessLiveness::default()),
            ping: Box::new(FakePingProbe::default()),
            interfaces: Box::new(FakeInterfaceCounters::default()),
        };
        MainLoop::new(
            config,
            None,
            Box::new(FakeSerialTransport::default()),
            board,
            daemon,
            pipeline,
            Box::new(RecordingSink::default()),
        )
    }

    fn sent(ml: &MainLoop) -> Vec<String> {
        ml.serial
            .as_any()
            .downcast_ref::<FakeSerialTransport>()
            .unwrap()
            .sent
            .clone()
    }

    #[test]
    fn pings_board_and_runs_pipeline_on_interval_boundary() {
        let mut ml = fixture();
        for _ in 0..=ml.config.interval.value {
            ml.step(|| {});
        }
        assert!(sent(&ml).iter().any(|l| l == "PING"));
    }

    #[test]
    fn disabling_ping_withholds_it_but_still_runs_pipeline() {
        let mut ml = fixture();
        ml.config.ping_enabled.value = false;
        for _ in 0..=ml.config.interval.value {
            ml.step(|| {});
        }
        assert!(!sent(&ml).iter().any(|l| l == "PING"));
    }

    #[test]
    fn failing_check_sends_reboot_with_reason() {
        let mut ml = fixture();
        ml.config.max_temperature.value = 50.0;
        ml.pipeline.thermal = Box::new(FakeThermalSource(vec![91_000]));
        for _ in 0..=ml.config.interval.value {
            ml.step(|| {});
        }
        assert!(sent(&ml).iter().any(|l| l == "REBOOT 20"));
    }

    #[test]
    fn action_disabled_logs_only_and_never_sends_reboot() {
        let mut ml = fixture();
        ml.config.action.value = false;
        ml.config.max_temperature.value = 50.0;
        ml.pipeline.thermal = Box::new(FakeThermalSource(vec![91_000]));
        for _ in 0..=ml.config.interval.value {
            ml.step(|| {});
        }
        assert!(!sent(&ml).iter().any(|l| l.starts_with("REBOOT")));
    }
}
