//! Host supervisor library: the serial transport, the two TCP listeners,
//! the health-check pipeline, the main loop, and the ambient
//! configuration/signal/mail machinery around them. Split out from the
//! `nanowatchdogd` binary so integration tests can drive a `MainLoop`
//! directly against fake transports.

pub mod cli;
pub mod command_endpoint;
pub mod config;
pub mod error;
pub mod mail;
pub mod mainloop;
pub mod notifier;
pub mod pidfile;
pub mod pipeline;
pub mod serial;
pub mod signals;
pub mod tcp;

pub use config::SupervisorConfig;
pub use error::{ConfigError, SupervisorError};
pub use mainloop::MainLoop;
