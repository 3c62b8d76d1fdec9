//! `nanowatchdogd`: the host supervisor binary. Wires the CLI surface,
//! configuration loading/clamping, the serial handshake and startup
//! configuration sequence, the two TCP listeners, the boot-time notifier,
//! and the main loop together.
//!
//! OS packaging, daemonization, and syslog/mail transport selection are
//! injected-sink concerns outside this binary's scope; `--daemon` is
//! accepted and logged but does not fork.

use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nanowatchdog_supervisor::cli::{parse_verbose, Cli};
use nanowatchdog_supervisor::config::{file as config_file, Origin, SendMailPolicy, SupervisorConfig, Tracked};
use nanowatchdog_supervisor::error::SupervisorError;
use nanowatchdog_supervisor::mail::{MailSink, NullSink, SendmailSink};
use nanowatchdog_supervisor::pidfile::PidFileGuard;
use nanowatchdog_supervisor::pipeline::CheckPipeline;
use nanowatchdog_supervisor::serial::{self, DisabledSerialTransport, SerialTransport, StreamSerialTransport};
use nanowatchdog_supervisor::{signals, tcp, MainLoop};

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,nanowatchdogd=debug")),
        )
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fatal startup error");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = SupervisorConfig::default();
    let config_path = cli.config.clone();
    if let Some(path) = &config_path {
        config_file::load_into(&mut config, path);
    }
    apply_cli_overrides(&mut config, &cli);
    config.apply_load_defaults();
    config.clamp_ranges();

    if config.daemon.value {
        info!("--daemon requested; daemonization is an injected OS-packaging concern, running in the foreground");
    }

    let _pid_guard = match &config.pid_file.value {
        Some(path) => Some(PidFileGuard::acquire(path)?),
        None => None,
    };

    signals::install()?;

    let mut serial_transport: Box<dyn SerialTransport> = if config.serial_enabled.value {
        let port = serial::open_real(&config.device.value.display().to_string(), config.baudrate.value)
            .map_err(|source| SupervisorError::SerialOpen {
                device: config.device.value.display().to_string(),
                source,
            })?;
        let read_timeout_polls = config.read_timeout.value as u32;
        let mut transport: Box<dyn SerialTransport> =
            Box::new(StreamSerialTransport::new(port, read_timeout_polls));

        if !serial::await_handshake(&mut *transport, Duration::from_secs(config.open_timeout.value)) {
            return Err(SupervisorError::HandshakeTimeout {
                timeout_secs: config.open_timeout.value,
            }
            .into());
        }
        info!("board answered NOOP, handshake complete");

        let test_mode_on = !config.action.value;
        serial::configure_board(
            &mut *transport,
            test_mode_on,
            chrono::Utc::now().timestamp(),
            config.delay.value,
        )?;
        info!("board startup configuration sequence complete");
        transport
    } else {
        warn!("serial layer disabled (--noserial); board-forward requests will be echoed");
        Box::new(DisabledSerialTransport)
    };

    let board_addr: SocketAddr = (config.ip.value, config.port_board.value).into();
    let daemon_addr: SocketAddr = (config.ip.value, config.port_daemon.value).into();
    let board_listener = tcp::bind_nonblocking(board_addr).map_err(|source| SupervisorError::ListenerBind {
        addr: board_addr.to_string(),
        source,
    })?;
    let daemon_listener = tcp::bind_nonblocking(daemon_addr).map_err(|source| SupervisorError::ListenerBind {
        addr: daemon_addr.to_string(),
        source,
    })?;
    info!(%board_addr, %daemon_addr, "listeners bound");

    if config.serial_enabled.value {
        run_boot_notifier(&mut config, &mut *serial_transport);
    }

    let pipeline = CheckPipeline::real();
    let mail: Box<dyn MailSink> = match config.send_mail.value {
        SendMailPolicy::Never => Box::new(NullSink),
        _ => Box::new(SendmailSink {
            from: config.send_from.value.clone(),
        }),
    };

    let mut main_loop = MainLoop::new(
        config,
        config_path,
        serial_transport,
        board_listener,
        daemon_listener,
        pipeline,
        mail,
    );

    Ok(main_loop.run())
}

/// Send `STATUS`, write the optional status-file snapshot, and run the
/// boot-time notifier against the reply.
fn run_boot_notifier(config: &mut SupervisorConfig, serial_transport: &mut dyn SerialTransport) {
    let status_text = match serial_transport.send("STATUS") {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to read startup STATUS, skipping boot notifier");
            return;
        }
    };

    if let Some(path) = &config.status_file.value {
        if let Err(e) = fs::write(path, &status_text) {
            warn!(error = %e, path = %path.display(), "failed to write status-file snapshot");
        }
    }

    let mail: Box<dyn MailSink> = match config.send_mail.value {
        SendMailPolicy::Never => Box::new(NullSink),
        _ => Box::new(SendmailSink {
            from: config.send_from.value.clone(),
        }),
    };

    if let Err(e) = nanowatchdog_supervisor::notifier::run(
        &status_text,
        config.send_mail.value,
        config.admin.value.as_deref(),
        mail.as_ref(),
        serial_transport,
    ) {
        warn!(error = %e, "boot notifier failed");
    }
}

/// Merge parsed CLI flags onto `config`, marking any field the user
/// actually passed with `Origin::CommandLine` so it survives a later
/// `SIGHUP` reload.
fn apply_cli_overrides(config: &mut SupervisorConfig, cli: &Cli) {
    macro_rules! set_opt {
        ($field:expr, $opt:expr) => {
            if let Some(v) = $opt {
                $field = Tracked::new(v, Origin::CommandLine);
            }
        };
    }
    macro_rules! set_bool_pair {
        ($field:expr, $positive:expr, $negative:expr) => {
            if $negative {
                $field = Tracked::new(false, Origin::CommandLine);
            } else if $positive {
                $field = Tracked::new(true, Origin::CommandLine);
            }
        };
    }

    set_opt!(config.device, cli.device.clone());
    set_opt!(config.ip, cli.ip);
    set_opt!(config.port_daemon, cli.port_daemon);
    set_opt!(config.port_board, cli.port_board);
    set_opt!(config.delay, cli.delay);
    set_opt!(config.interval, cli.interval);

    set_bool_pair!(config.serial_enabled, cli.serial, cli.no_serial);
    set_bool_pair!(config.ping_enabled, cli.ping, cli.no_ping);
    set_bool_pair!(config.action, cli.action, cli.no_action);
    set_bool_pair!(config.force, cli.force, cli.no_force);
    set_bool_pair!(config.daemon, cli.daemon, cli.no_daemon);

    if let Some(v) = &cli.verbose {
        if let Some(n) = parse_verbose(v) {
            config.verbose = Tracked::new(n, Origin::CommandLine);
        } else {
            warn!(value = %v, "unparsable --verbose value, ignoring");
        }
    }
}
