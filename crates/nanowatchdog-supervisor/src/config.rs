//! The supervisor's single owned configuration value, replacing the
//! original's process-wide hash.
//! Every field is `Tracked<T>`, pairing a value with the `Origin` it was
//! last set from, so `DUMP PARMS`/`GET` can report provenance honestly
//! without any global mutable state.

pub mod file;

use std::net::IpAddr;
use std::path::PathBuf;

/// Where a configuration field's current value came from. Runtime
/// overrides (via the supervisor-command TCP endpoint) always win and
/// are never clamped away by a later `HUP` reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Default,
    ConfigFile,
    CommandLine,
    Runtime,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Origin::Default => "default",
            Origin::ConfigFile => "config-file",
            Origin::CommandLine => "command-line",
            Origin::Runtime => "runtime",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tracked<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Tracked<T> {
    pub fn new(value: T, origin: Origin) -> Self {
        Tracked { value, origin }
    }

    pub fn default_value(value: T) -> Self {
        Tracked::new(value, Origin::Default)
    }

    /// `HUP` reload semantics: overwrite unless the current value came
    /// from the command line or a prior runtime override.
    pub fn reload_from_file(&mut self, value: T) {
        if !matches!(self.origin, Origin::CommandLine | Origin::Runtime) {
            self.value = value;
            self.origin = Origin::ConfigFile;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMailPolicy {
    Never,
    Auto,
    Always,
}

impl SendMailPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "never" => Some(SendMailPolicy::Never),
            "auto" => Some(SendMailPolicy::Auto),
            "always" => Some(SendMailPolicy::Always),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SendMailPolicy::Never => "never",
            SendMailPolicy::Auto => "auto",
            SendMailPolicy::Always => "always",
        }
    }
}

/// Min/max bounds applied to range-bound fields at load time, unless
/// `force` is set.
pub const DELAY_MIN: u16 = 1;
pub const DELAY_MAX: u16 = 65535;
pub const INTERVAL_MIN: u32 = 5;
pub const INTERVAL_MAX: u32 = 60;

pub struct SupervisorConfig {
    pub serial_enabled: Tracked<bool>,
    pub device: Tracked<PathBuf>,
    pub baudrate: Tracked<u32>,
    pub open_timeout: Tracked<u64>,
    pub read_timeout: Tracked<u64>,
    pub ip: Tracked<IpAddr>,
    pub port_board: Tracked<u16>,
    pub port_daemon: Tracked<u16>,
    pub delay: Tracked<u16>,
    pub interval: Tracked<u32>,
    pub logtick: Tracked<u32>,
    pub pid_file: Tracked<Option<PathBuf>>,
    pub status_file: Tracked<Option<PathBuf>>,
    pub send_mail: Tracked<SendMailPolicy>,
    pub send_from: Tracked<Option<String>>,
    pub admin: Tracked<Option<String>>,
    pub max_load: Tracked<[Option<f64>; 3]>,
    pub min_memory: Tracked<Option<u64>>,
    pub max_temperature: Tracked<f64>,
    pub pidfiles: Tracked<Vec<PathBuf>>,
    pub pings: Tracked<Vec<String>>,
    pub interfaces: Tracked<Vec<String>>,
    pub test_directory: Tracked<Option<PathBuf>>,
    pub ping_enabled: Tracked<bool>,
    pub action: Tracked<bool>,
    pub verbose: Tracked<u32>,
    pub force: Tracked<bool>,
    pub daemon: Tracked<bool>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            serial_enabled: Tracked::default_value(true),
            device: Tracked::default_value(PathBuf::from("/dev/ttyUSB0")),
            baudrate: Tracked::default_value(19200),
            open_timeout: Tracked::default_value(10),
            read_timeout: Tracked::default_value(5),
            ip: Tracked::default_value("127.0.0.1".parse().unwrap()),
            port_board: Tracked::default_value(7777),
            port_daemon: Tracked::default_value(7778),
            delay: Tracked::default_value(60),
            interval: Tracked::default_value(10),
            logtick: Tracked::default_value(6),
            pid_file: Tracked::default_value(None),
            status_file: Tracked::default_value(None),
            send_mail: Tracked::default_value(SendMailPolicy::Auto),
            send_from: Tracked::default_value(None),
            admin: Tracked::default_value(None),
            max_load: Tracked::default_value([None, None, None]),
            min_memory: Tracked::default_value(None),
            max_temperature: Tracked::default_value(90.0),
            pidfiles: Tracked::default_value(Vec::new()),
            pings: Tracked::default_value(Vec::new()),
            interfaces: Tracked::default_value(Vec::new()),
            test_directory: Tracked::default_value(None),
            ping_enabled: Tracked::default_value(true),
            action: Tracked::default_value(true),
            verbose: Tracked::default_value(0),
            force: Tracked::default_value(false),
            daemon: Tracked::default_value(false),
        }
    }
}

impl SupervisorConfig {
    /// Fill in `max-load-5`/`max-load-15` from `max-load-1` when unset:
    /// `max-load-5 := floor(0.75 * max-load-1)`, `max-load-15 := floor(0.5
    /// * max-load-1)`.
    pub fn apply_load_defaults(&mut self) {
        if let Some(l1) = self.max_load.value[0] {
            if self.max_load.value[1].is_none() {
                self.max_load.value[1] = Some((0.75 * l1).floor());
            }
            if self.max_load.value[2].is_none() {
                self.max_load.value[2] = Some((0.5 * l1).floor());
            }
        }
    }

    /// Clamp range-bound fields to [min, max], logging once per clamp
    /// unless `force` is set.
    pub fn clamp_ranges(&mut self) {
        if self.force.value {
            return;
        }
        if self.delay.value < DELAY_MIN {
            tracing::warn!(field = "delay", value = self.delay.value, clamped_to = DELAY_MIN, "clamping out-of-range config value");
            self.delay.value = DELAY_MIN;
        } else if self.delay.value > DELAY_MAX {
            tracing::warn!(field = "delay", value = self.delay.value, clamped_to = DELAY_MAX, "clamping out-of-range config value");
            self.delay.value = DELAY_MAX;
        }
        if self.interval.value < INTERVAL_MIN {
            tracing::warn!(field = "interval", value = self.interval.value, clamped_to = INTERVAL_MIN, "clamping out-of-range config value");
            self.interval.value = INTERVAL_MIN;
        } else if self.interval.value > INTERVAL_MAX {
            tracing::warn!(field = "interval", value = self.interval.value, clamped_to = INTERVAL_MAX, "clamping out-of-range config value");
            self.interval.value = INTERVAL_MAX;
        }
    }

    /// Render the `DUMP PARMS` / `DUMP OPTS` reply: one line per
    /// configuration parameter, in declaration order, `name = value [origin]`.
    pub fn dump_parms(&self) -> String {
        let mut lines = Vec::new();
        macro_rules! line {
            ($name:expr, $field:expr) => {
                lines.push(format!("{} = {} [{}]", $name, fmt_value(&$field.value), $field.origin.label()))
            };
        }
        line!("serial", self.serial_enabled);
        line!("device", self.device_display());
        line!("baudrate", self.baudrate);
        line!("open-timeout", self.open_timeout);
        line!("read-timeout", self.read_timeout);
        line!("ip", self.ip_display());
        line!("port-board", self.port_board);
        line!("port-daemon", self.port_daemon);
        line!("delay", self.delay);
        line!("interval", self.interval);
        line!("logtick", self.logtick);
        line!("pid-file", self.pid_file_display());
        line!("status-file", self.status_file_display());
        line!("send-mail", self.send_mail_display());
        line!("send-from", self.send_from_display());
        line!("admin", self.admin_display());
        line!("max-load-1", self.max_load_display(0));
        line!("max-load-5", self.max_load_display(1));
        line!("max-load-15", self.max_load_display(2));
        line!("min-memory", self.min_memory_display());
        line!("max-temperature", self.max_temperature);
        line!("pidfile", self.pidfiles_display());
        line!("ping", self.pings_display());
        line!("interface", self.interfaces_display());
        line!("test-directory", self.test_directory_display());
        line!("nwping", self.ping_enabled);
        line!("action", self.action);
        line!("verbose", self.verbose);
        line!("force", self.force);
        line!("daemon", self.daemon);
        lines.join("\n")
    }

    fn device_display(&self) -> Tracked<String> {
        Tracked::new(self.device.value.display().to_string(), self.device.origin)
    }

    fn ip_display(&self) -> Tracked<String> {
        Tracked::new(self.ip.value.to_string(), self.ip.origin)
    }

    fn send_mail_display(&self) -> Tracked<String> {
        Tracked::new(self.send_mail.value.as_str().to_string(), self.send_mail.origin)
    }

    fn pid_file_display(&self) -> Tracked<String> {
        Tracked::new(fmt_opt_path(&self.pid_file.value), self.pid_file.origin)
    }

    fn status_file_display(&self) -> Tracked<String> {
        Tracked::new(fmt_opt_path(&self.status_file.value), self.status_file.origin)
    }

    fn send_from_display(&self) -> Tracked<String> {
        Tracked::new(fmt_opt(&self.send_from.value), self.send_from.origin)
    }

    fn admin_display(&self) -> Tracked<String> {
        Tracked::new(fmt_opt(&self.admin.value), self.admin.origin)
    }

    fn max_load_display(&self, index: usize) -> Tracked<String> {
        Tracked::new(fmt_opt(&self.max_load.value[index]), self.max_load.origin)
    }

    fn min_memory_display(&self) -> Tracked<String> {
        Tracked::new(fmt_opt(&self.min_memory.value), self.min_memory.origin)
    }

    fn pidfiles_display(&self) -> Tracked<String> {
        let paths: Vec<String> = self.pidfiles.value.iter().map(|p| p.display().to_string()).collect();
        Tracked::new(fmt_list(&paths), self.pidfiles.origin)
    }

    fn pings_display(&self) -> Tracked<String> {
        Tracked::new(fmt_list(&self.pings.value), self.pings.origin)
    }

    fn interfaces_display(&self) -> Tracked<String> {
        Tracked::new(fmt_list(&self.interfaces.value), self.interfaces.origin)
    }

    fn test_directory_display(&self) -> Tracked<String> {
        Tracked::new(fmt_opt_path(&self.test_directory.value), self.test_directory.origin)
    }

    /// `GET <name>`: echo `name=value` for a known field, or `None` for
    /// an unrecognized one.
    pub fn get(&self, name: &str) -> Option<String> {
        let value = match name {
            "serial" => self.serial_enabled.value.to_string(),
            "device" => self.device.value.display().to_string(),
            "baudrate" => self.baudrate.value.to_string(),
            "open-timeout" => self.open_timeout.value.to_string(),
            "read-timeout" => self.read_timeout.value.to_string(),
            "ip" => self.ip.value.to_string(),
            "port-board" => self.port_board.value.to_string(),
            "port-daemon" => self.port_daemon.value.to_string(),
            "delay" => self.delay.value.to_string(),
            "interval" => self.interval.value.to_string(),
            "logtick" => self.logtick.value.to_string(),
            "pid-file" => fmt_opt_path(&self.pid_file.value),
            "status-file" => fmt_opt_path(&self.status_file.value),
            "send-mail" => self.send_mail.value.as_str().to_string(),
            "send-from" => fmt_opt(&self.send_from.value),
            "admin" => fmt_opt(&self.admin.value),
            "max-load-1" => fmt_opt(&self.max_load.value[0]),
            "max-load-5" => fmt_opt(&self.max_load.value[1]),
            "max-load-15" => fmt_opt(&self.max_load.value[2]),
            "min-memory" => fmt_opt(&self.min_memory.value),
            "max-temperature" => self.max_temperature.value.to_string(),
            "pidfile" => fmt_list(&self.pidfiles.value.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()),
            "ping" => fmt_list(&self.pings.value),
            "interface" => fmt_list(&self.interfaces.value),
            "test-directory" => fmt_opt_path(&self.test_directory.value),
            "nwping" => self.ping_enabled.value.to_string(),
            "action" => self.action.value.to_string(),
            "verbose" => self.verbose.value.to_string(),
            "force" => self.force.value.to_string(),
            "daemon" => self.daemon.value.to_string(),
            _ => return None,
        };
        Some(format!("{name}={value}"))
    }
}

fn fmt_value<T: std::fmt::Display>(v: &T) -> String {
    format!("{v}")
}

/// Render an optional scalar the way an absent config value should read
/// back in `DUMP PARMS`/`GET`: `unset` rather than an empty string.
fn fmt_opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(x) => x.to_string(),
        None => "unset".to_string(),
    }
}

fn fmt_opt_path(v: &Option<PathBuf>) -> String {
    match v {
        Some(p) => p.display().to_string(),
        None => "unset".to_string(),
    }
}

/// Render a repeatable config key's collected values as a comma-joined
/// list, or `none` when nothing was configured.
fn fmt_list<T: std::fmt::Display>(v: &[T]) -> String {
    if v.is_empty() {
        "none".to_string()
    } else {
        v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
    }
}
