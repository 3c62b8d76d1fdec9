//! The supervisor-command TCP endpoint: operator-local
//! commands distinct from the board-forwarding endpoint. Matching is
//! case-sensitive with tolerated leading/trailing whitespace, expressed
//! as a small set of regexes rather than a hand-rolled tokenizer.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cli::parse_verbose;
use crate::config::{Origin, SupervisorConfig};
use crate::signals;

static RE_DUMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^DUMP\s+(PARMS|OPTS)$").unwrap());
static RE_GET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^GET\s+(\S+)$").unwrap());
static RE_PING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PING\s+(ON|OFF)$").unwrap());
static RE_SET_VERBOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SET\s+VERBOSE\s+(\S+)$").unwrap());

const HELP_TEXT: &str = "Commands: DUMP PARMS DUMP OPTS GET <name> HELP PING ON|OFF SET VERBOSE <n> QUIT";

/// Handle one already-trimmed supervisor-command line, returning the
/// single reply line (or multi-line text for `DUMP PARMS`/`HELP`) to
/// write back. Mutates `config` for runtime overrides and calls
/// `signals::request_quit` for `QUIT`.
pub fn handle(line: &str, config: &mut SupervisorConfig) -> String {
    let line = line.trim();

    if RE_DUMP.is_match(line) {
        return config.dump_parms();
    }
    if let Some(caps) = RE_GET.captures(line) {
        return config.get(&caps[1]).unwrap_or_default();
    }
    if line == "HELP" {
        return HELP_TEXT.to_string();
    }
    if let Some(caps) = RE_PING.captures(line) {
        config.ping_enabled = crate::config::Tracked::new(&caps[1] == "ON", Origin::Runtime);
        return format!("OK: {line}");
    }
    if let Some(caps) = RE_SET_VERBOSE.captures(line) {
        if let Some(n) = parse_verbose(&caps[1]) {
            config.verbose = crate::config::Tracked::new(n, Origin::Runtime);
            return format!("OK: {line}");
        }
        return format!("unknown command: {line}");
    }
    if line == "QUIT" {
        signals::request_quit();
        return format!("OK: {line}");
    }

    format!("unknown command: {line}")
}
