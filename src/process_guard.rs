//! Lifecycle management for installer child processes
//!
//! pip, venv and launched tools run as child processes. If envkit is
//! interrupted (Ctrl+C, SIGTERM, closed terminal) while one of them is
//! running, the child must not keep installing into the environment on its
//! own.
//!
//! - Background children are spawned in their own process group
//! - Interactive children (launched shells, REPLs, Jupyter) stay in the
//!   terminal's foreground group so they receive their own Ctrl+C
//! - PIDs are tracked in a global registry while they run
//! - On SIGINT/SIGTERM/SIGHUP every tracked child gets SIGTERM, then SIGKILL
//!   after a grace period, and envkit exits with `128 + signal`. SIGINT is
//!   left to the child while an interactive child is running.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::io;
use std::process::{Child, Command, ExitStatus, Output};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running children
#[derive(Debug, Default)]
pub struct ChildRegistry {
    /// Process group leaders
    pids: HashSet<u32>,
    /// Children sharing envkit's process group
    interactive: HashSet<u32>,
    /// Set once termination has started, so a second signal is a no-op
    terminating: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Tracking child process group {}", pid);
    }

    pub fn register_interactive(&mut self, pid: u32) {
        self.interactive.insert(pid);
        debug!("Tracking interactive child {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        if self.pids.remove(&pid) || self.interactive.remove(&pid) {
            debug!("Released child {}", pid);
        }
    }

    pub fn count(&self) -> usize {
        self.pids.len() + self.interactive.len()
    }

    /// True while an interactive child owns the terminal
    pub fn has_interactive(&self) -> bool {
        !self.interactive.is_empty()
    }

    fn signal_all(&self, signal: Signal, only_alive: bool) {
        let targets = self
            .pids
            .iter()
            .map(|&pid| (pid, true))
            .chain(self.interactive.iter().map(|&pid| (pid, false)));
        for (pid, group) in targets {
            if only_alive && !is_process_alive(pid) {
                continue;
            }
            let sent = if group {
                signal_group(pid, signal)
            } else {
                signal::kill(Pid::from_raw(pid as i32), signal)
            };
            if let Err(e) = sent {
                warn!("{:?} to child {} failed: {}", signal, pid, e);
            }
        }
    }

    /// SIGTERM every tracked group, wait up to `grace_period`, then SIGKILL
    /// whatever is still alive.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.terminating {
            return;
        }
        self.terminating = true;

        if self.count() == 0 {
            return;
        }
        info!("Stopping {} running child process(es)", self.count());

        self.signal_all(Signal::SIGTERM, false);

        let start = Instant::now();
        while start.elapsed() < grace_period {
            let all_gone = self
                .pids
                .iter()
                .chain(self.interactive.iter())
                .all(|&pid| !is_process_alive(pid));
            if all_gone {
                self.pids.clear();
                self.interactive.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        warn!("Children ignored SIGTERM, sending SIGKILL");
        self.signal_all(Signal::SIGKILL, true);
        self.pids.clear();
        self.interactive.clear();
    }
}

/// Signal a whole process group (negative PID)
fn signal_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// True if the process exists and is not a zombie
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Field 3 is the state; Z = zombie, X = dead
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }
    true
}

/// Install SIGINT/SIGTERM/SIGHUP handlers that stop tracked children and
/// exit. Call once at startup.
pub fn init_signal_handlers() -> io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig == SIGINT && interactive_running() {
                debug!("SIGINT left to the interactive child");
                continue;
            }
            info!("Received signal {}, stopping child processes", sig);
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for `Command` to run the child in its own process group
pub trait CommandProcessGroup {
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // PGID = child PID
        self.process_group(0)
    }
}

fn interactive_running() -> bool {
    ChildRegistry::global()
        .lock()
        .map(|registry| registry.has_interactive())
        .unwrap_or(false)
}

fn track(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }
}

fn untrack(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }
}

/// Spawn `cmd` in its own process group, tracked until it exits, and collect
/// its output. Stdio must already be configured by the caller.
pub fn output_guarded(cmd: &mut Command) -> io::Result<Output> {
    let child = cmd.in_new_process_group().spawn()?;
    let pid = child.id();
    track(pid);
    let output = child.wait_with_output();
    untrack(pid);
    output
}

/// Spawn an interactive `cmd` that shares the terminal with envkit.
/// Pair with [`wait_guarded`].
pub fn spawn_interactive(cmd: &mut Command) -> io::Result<Child> {
    let child = cmd.spawn()?;
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register_interactive(child.id());
    }
    Ok(child)
}

/// Wait for a child from [`spawn_interactive`] and stop tracking it.
pub fn wait_guarded(mut child: Child) -> io::Result<ExitStatus> {
    let pid = child.id();
    let status = child.wait();
    untrack(pid);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_output_guarded_collects_and_untracks() {
        let output = output_guarded(
            Command::new("sh")
                .args(["-c", "echo out; echo err >&2; exit 3"])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped()),
        )
        .expect("spawn sh");

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[test]
    fn test_terminate_all_stops_real_process_group() {
        let child = Command::new("sh")
            .args(["-c", "sleep 60"])
            .in_new_process_group()
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();

        let mut registry = ChildRegistry::default();
        registry.register(pid);
        registry.terminate_all(Duration::from_millis(500));

        let status = wait_guarded(child).expect("wait");
        assert!(!status.success());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.register(999_999);
        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.terminating);

        registry.register(999_998);
        registry.terminate_all(Duration::from_millis(10));
        assert_eq!(registry.count(), 1, "second call is a no-op");
    }

    #[test]
    fn test_interactive_children_are_counted_separately() {
        let mut registry = ChildRegistry::default();
        assert!(!registry.has_interactive());
        registry.register(10);
        registry.register_interactive(11);
        assert!(registry.has_interactive());
        assert_eq!(registry.count(), 2);

        registry.unregister(11);
        assert!(!registry.has_interactive());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(999_999));
    }
}
