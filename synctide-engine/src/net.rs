//! Network reachability gate.

use std::process::{Command, Stdio};

/// Well-known address probed before any task runs.
pub const PROBE_ADDR: &str = "8.8.8.8";

/// Reachability precondition for a run.
pub trait Probe {
    fn is_reachable(&self) -> bool;
}

/// Probes with a single ICMP echo and a five-second timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingProbe;

/// Timeout argument differs by platform: milliseconds via `-w` on Windows,
/// seconds via `-W` elsewhere.
fn ping_args() -> [&'static str; 5] {
    if cfg!(windows) {
        ["-n", "1", "-w", "5000", PROBE_ADDR]
    } else {
        ["-c", "1", "-W", "5", PROBE_ADDR]
    }
}

impl Probe for PingProbe {
    /// One echo, no retries. A missing ping binary counts as unreachable.
    fn is_reachable(&self) -> bool {
        Command::new("ping")
            .args(ping_args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
