//! Sandboxed command execution for the planner's `run_command` tool.
//!
//! Contract:
//! - Fresh environment containing only an allowlisted set of variable
//!   names and prefixes; credentials never reach the subprocess.
//! - New process group, so teardown can signal every descendant.
//! - Two parallel reader threads drain stdout and stderr independently,
//!   each capped at half of [`MAX_OUTPUT_BYTES`]. Hitting a cap signals
//!   the process group with SIGTERM; SIGKILL follows after a short grace
//!   period if the group survives.
//! - An overall wall-clock timeout triggers the same teardown.
//!
//! The blocking implementation is bridged into async via
//! `spawn_blocking`, so one command blocks one worker thread, not the
//! cooperative runtime.

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

/// Default and maximum command timeout.
pub const COMMAND_TIMEOUT_SECS: u64 = 30;
/// Total output budget across both streams.
pub const MAX_OUTPUT_BYTES: usize = 50_000;

const SAFE_ENV_KEYS: &[&str] = &[
    "PATH", "HOME", "LANG", "TERM", "TMPDIR", "USER", "LOGNAME", "SHELL",
];
const SAFE_ENV_PREFIXES: &[&str] = &["LC_"];

const READ_CHUNK_SIZE: usize = 4096;
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Result of one sandboxed command run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// True if either stream hit its cap.
    pub truncated: bool,
    pub timed_out: bool,
}

/// Build an environment using a strict allowlist.
fn safe_env() -> Vec<(String, String)> {
    std::env::vars()
        .filter(|(key, _)| {
            SAFE_ENV_KEYS.contains(&key.as_str())
                || SAFE_ENV_PREFIXES.iter().any(|p| key.starts_with(p))
        })
        .collect()
}

/// Serializes group termination so a cap-triggered kill and a
/// timeout-triggered kill do not race.
struct GroupKiller {
    pgid: libc::pid_t,
    killed: Mutex<bool>,
}

impl GroupKiller {
    fn new(pgid: libc::pid_t) -> Self {
        Self {
            pgid,
            killed: Mutex::new(false),
        }
    }

    fn terminate(&self) {
        let mut killed = match self.killed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *killed {
            return;
        }
        *killed = true;

        // SIGTERM first; the group may already be gone.
        if unsafe { libc::killpg(self.pgid, libc::SIGTERM) } != 0 {
            return;
        }

        // Grace period, then SIGKILL if the group still exists.
        let deadline = std::time::Instant::now() + KILL_GRACE;
        while std::time::Instant::now() < deadline {
            if unsafe { libc::killpg(self.pgid, 0) } != 0 {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
        unsafe {
            libc::killpg(self.pgid, libc::SIGKILL);
        }
    }
}

/// Read up to `budget` bytes from a stream; on hitting the cap, tear the
/// process group down.
fn read_capped<R: Read>(mut stream: R, budget: usize, killer: &GroupKiller) -> (Vec<u8>, bool) {
    let mut collected = Vec::with_capacity(budget.min(8 * 1024));
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    while collected.len() < budget {
        let want = READ_CHUNK_SIZE.min(budget - collected.len());
        match stream.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => collected.extend_from_slice(&chunk[..n]),
            Err(_) => break,
        }
    }

    let truncated = collected.len() >= budget;
    if truncated {
        killer.terminate();
    }
    (collected, truncated)
}

/// Run a shell command in the workspace directory. Blocking; see
/// [`run_command`] for the async bridge.
pub fn run_command_sync(
    workspace: &Path,
    command: &str,
    timeout_secs: u64,
) -> std::io::Result<CommandOutput> {
    let timeout_secs = timeout_secs.clamp(1, COMMAND_TIMEOUT_SECS);

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workspace)
        .env_clear()
        .envs(safe_env())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()?;

    let killer = Arc::new(GroupKiller::new(child.id() as libc::pid_t));
    let half = MAX_OUTPUT_BYTES / 2;

    let stdout = child.stdout.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "child stdout not captured")
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "child stderr not captured")
    })?;

    let out_killer = Arc::clone(&killer);
    let t_out = thread::spawn(move || read_capped(stdout, half, &out_killer));
    let err_killer = Arc::clone(&killer);
    let t_err = thread::spawn(move || read_capped(stderr, half, &err_killer));

    match child.wait_timeout(Duration::from_secs(timeout_secs))? {
        Some(status) => {
            let (stdout, stdout_trunc) = t_out.join().unwrap_or_default();
            let (stderr, stderr_trunc) = t_err.join().unwrap_or_default();
            Ok(CommandOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                truncated: stdout_trunc || stderr_trunc,
                timed_out: false,
            })
        }
        None => {
            killer.terminate();
            let _ = child.wait();
            let _ = t_out.join();
            let _ = t_err.join();
            Ok(CommandOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: String::new(),
                truncated: false,
                timed_out: true,
            })
        }
    }
}

/// Async bridge: run the blocking implementation on the worker pool.
pub async fn run_command(
    workspace: &Path,
    command: &str,
    timeout_secs: u64,
) -> std::io::Result<CommandOutput> {
    let workspace = workspace.to_path_buf();
    let command = command.to_string();
    tokio::task::spawn_blocking(move || run_command_sync(&workspace, &command, timeout_secs))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}
