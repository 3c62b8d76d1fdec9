//! `key = value` / `# comment` / `include = <path>` config file reader
//!. Deliberately hand-rolled rather than
//! pulled in via a parser crate — per SPEC_FULL.md §3 the grammar is three
//! lines of logic and not worth a dependency for.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::config::{SendMailPolicy, SupervisorConfig};
use crate::error::ConfigError;

/// One `key = value` pair together with the line it came from, used only
/// for error messages; repeatable keys (`pidfile`, `ping`, `interface`)
/// are collected separately.
struct ParsedFile {
    scalars: HashMap<String, String>,
    pidfiles: Vec<String>,
    pings: Vec<String>,
    interfaces: Vec<String>,
    include: Option<String>,
}

fn parse_lines(path: &Path, text: &str) -> Result<ParsedFile, ConfigError> {
    let mut scalars = HashMap::new();
    let mut pidfiles = Vec::new();
    let mut pings = Vec::new();
    let mut interfaces = Vec::new();
    let mut include = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::MalformedLine {
                path: path.to_path_buf(),
                line_no,
                text: raw.to_string(),
            });
        };
        let key = key.trim().to_string();
        let value = value.trim().to_string();
        match key.as_str() {
            "pidfile" => pidfiles.push(value),
            "ping" => pings.push(value),
            "interface" => interfaces.push(value),
            "include" => include = Some(value),
            _ => {
                scalars.insert(key, value);
            }
        }
    }

    Ok(ParsedFile {
        scalars,
        pidfiles,
        pings,
        interfaces,
        include,
    })
}

/// Apply one config file's contents onto `cfg`, then chase its `include =`
/// if present. An unreadable file is logged and skipped, leaving `cfg`
/// at its current values.
pub fn load_into(cfg: &mut SupervisorConfig, path: &Path) {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(source) => {
            tracing::warn!(path = %path.display(), error = %source, "config file unreadable, skipping");
            return;
        }
    };

    let parsed = match parse_lines(path, &text) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "malformed config file, skipping remainder");
            return;
        }
    };

    apply_parsed(cfg, &parsed);

    if let Some(include_path) = &parsed.include {
        load_into(cfg, Path::new(include_path));
    }
}

fn apply_parsed(cfg: &mut SupervisorConfig, parsed: &ParsedFile) {
    // Reload semantics (spec §4.6): a field whose current origin is
    // command-line or runtime is left alone; everything else is
    // overwritten from the file and tagged `Origin::ConfigFile`. Routed
    // through `Tracked::reload_from_file` rather than a bare assignment
    // so the same rule applies whether this is the initial load (nothing
    // is command-line/runtime yet, so it behaves like a plain set) or a
    // SIGHUP reload.
    macro_rules! set_str {
        ($key:literal, $field:expr, $parse:expr) => {
            if let Some(v) = parsed.scalars.get($key) {
                if let Some(parsed_v) = $parse(v.as_str()) {
                    $field.reload_from_file(parsed_v);
                } else {
                    tracing::warn!(key = $key, value = %v, "unparsable config value, keeping previous");
                }
            }
        };
    }

    set_str!("device", cfg.device, |v: &str| Some(PathBuf::from(v)));
    set_str!("baudrate", cfg.baudrate, |v: &str| v.parse::<u32>().ok());
    set_str!("open-timeout", cfg.open_timeout, |v: &str| v.parse::<u64>().ok());
    set_str!("read-timeout", cfg.read_timeout, |v: &str| v.parse::<u64>().ok());
    set_str!("ip", cfg.ip, |v: &str| v.parse::<IpAddr>().ok());
    set_str!("port-serial", cfg.port_board, |v: &str| v.parse::<u16>().ok());
    set_str!("port-daemon", cfg.port_daemon, |v: &str| v.parse::<u16>().ok());
    set_str!("delay", cfg.delay, |v: &str| v.parse::<u16>().ok());
    set_str!("interval", cfg.interval, |v: &str| v.parse::<u32>().ok());
    set_str!("logtick", cfg.logtick, |v: &str| v.parse::<u32>().ok());
    set_str!("pid-file", cfg.pid_file, |v: &str| Some(Some(PathBuf::from(v))));
    set_str!("status-file", cfg.status_file, |v: &str| Some(Some(PathBuf::from(v))));
    set_str!("send-mail", cfg.send_mail, SendMailPolicy::parse);
    set_str!("send-from", cfg.send_from, |v: &str| Some(Some(v.to_string())));
    set_str!("admin", cfg.admin, |v: &str| Some(Some(v.to_string())));
    set_str!("min-memory", cfg.min_memory, |v: &str| v.parse::<u64>().ok().map(Some));
    set_str!("max-temperature", cfg.max_temperature, |v: &str| v.parse::<f64>().ok());
    set_str!("test-directory", cfg.test_directory, |v: &str| Some(Some(PathBuf::from(v))));

    if let Some(v) = parsed.scalars.get("max-load-1") {
        if let Ok(n) = v.parse::<f64>() {
            let mut loads = cfg.max_load.value;
            loads[0] = Some(n);
            cfg.max_load.reload_from_file(loads);
        }
    }
    if let Some(v) = parsed.scalars.get("max-load-5") {
        if let Ok(n) = v.parse::<f64>() {
            let mut loads = cfg.max_load.value;
            loads[1] = Some(n);
            cfg.max_load.reload_from_file(loads);
        }
    }
    if let Some(v) = parsed.scalars.get("max-load-15") {
        if let Ok(n) = v.parse::<f64>() {
            let mut loads = cfg.max_load.value;
            loads[2] = Some(n);
            cfg.max_load.reload_from_file(loads);
        }
    }

    if !parsed.pidfiles.is_empty() {
        cfg.pidfiles
            .reload_from_file(parsed.pidfiles.iter().map(PathBuf::from).collect());
    }
    if !parsed.pings.is_empty() {
        cfg.pings.reload_from_file(parsed.pings.clone());
    }
    if !parsed.interfaces.is_empty() {
        cfg.interfaces.reload_from_file(parsed.interfaces.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Origin;
    use std::io::Write;

    #[test]
    fn parses_scalars_comments_and_repeated_keys() {
        let mut dir = tempfile::NamedTempFile::new().unwrap();
        writeln!(dir, "# a comment\ndelay = 42\ninterval=15\npidfile = /var/run/a.pid\npidfile = /var/run/b.pid").unwrap();

        let mut cfg = SupervisorConfig::default();
        load_into(&mut cfg, dir.path());

        assert_eq!(cfg.delay.value, 42);
        assert_eq!(cfg.delay.origin, Origin::ConfigFile);
        assert_eq!(cfg.interval.value, 15);
        assert_eq!(cfg.pidfiles.value.len(), 2);
    }

    #[test]
    fn unreadable_file_is_skipped_leaving_defaults() {
        let mut cfg = SupervisorConfig::default();
        load_into(&mut cfg, Path::new("/nonexistent/path/to/watchdog.conf"));
        assert_eq!(cfg.delay.origin, Origin::Default);
    }

    #[test]
    fn include_chains_to_second_file() {
        let mut base = tempfile::NamedTempFile::new().unwrap();
        let included = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(included.path(), "admin = ops@example.com\n").unwrap();
        writeln!(base, "delay = 30\ninclude = {}", included.path().display()).unwrap();

        let mut cfg = SupervisorConfig::default();
        load_into(&mut cfg, base.path());
        assert_eq!(cfg.delay.value, 30);
        assert_eq!(cfg.admin.value.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn reload_preserves_command_line_and_runtime_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delay = 99\ninterval = 15\nmax-load-1 = 4.0").unwrap();

        let mut cfg = SupervisorConfig::default();
        cfg.delay = crate::config::Tracked::new(120, Origin::CommandLine);
        cfg.interval = crate::config::Tracked::new(20, Origin::Runtime);
        cfg.max_load.origin = Origin::CommandLine;

        load_into(&mut cfg, file.path());

        // command-line/runtime fields are untouched by the reload...
        assert_eq!(cfg.delay.value, 120);
        assert_eq!(cfg.delay.origin, Origin::CommandLine);
        assert_eq!(cfg.interval.value, 20);
        assert_eq!(cfg.interval.origin, Origin::Runtime);
        assert_eq!(cfg.max_load.value, [None, None, None]);
        assert_eq!(cfg.max_load.origin, Origin::CommandLine);

        // ...while a field still at its default origin picks up the file.
        assert_eq!(cfg.logtick.origin, Origin::Default);
    }
}
