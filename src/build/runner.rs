//! External build tool invocation
//!
//! Running a build never fails from the caller's point of view: a missing
//! tool, a spawn error, a non-zero exit or a timeout all come back as a
//! [`BuildStatus`] that is simply "not successful".

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Lines of stderr kept for diagnostics
const STDERR_TAIL_LINES: usize = 20;

/// Poll interval while waiting on a build with a deadline
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A program plus arguments, run in the project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `go build -o build/discloud_bin .`
    pub fn go() -> Self {
        Self::new("go", &["build", "-o", "build/discloud_bin", "."])
    }

    /// `cargo build --release`
    pub fn cargo_release() -> Self {
        Self::new("cargo", &["build", "--release"])
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of a build invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Exit code zero
    Succeeded,
    /// Ran but exited non-zero (or was killed by a signal)
    Failed {
        code: Option<i32>,
        stderr_tail: String,
    },
    /// Could not be started (tool missing, bad working directory)
    Unavailable(String),
    /// Killed after exceeding the configured timeout
    TimedOut(Duration),
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Succeeded)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Succeeded => write!(f, "succeeded"),
            BuildStatus::Failed { code: Some(code), .. } => write!(f, "exited with code {}", code),
            BuildStatus::Failed { code: None, .. } => write!(f, "terminated by signal"),
            BuildStatus::Unavailable(reason) => write!(f, "could not start: {}", reason),
            BuildStatus::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// Runs build commands
pub trait BuildRunner: Send + Sync {
    /// Run `command` with `cwd` as working directory and wait for it
    fn run(&self, command: &BuildCommand, cwd: &Path) -> BuildStatus;
}

/// Runs build commands as child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// Runner without a timeout: a hung build blocks until it exits
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill builds that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl BuildRunner for SystemRunner {
    fn run(&self, command: &BuildCommand, cwd: &Path) -> BuildStatus {
        tracing::info!(command = %command, cwd = %cwd.display(), "running build");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Own process group, so a timeout also reaches the compilers the tool spawns
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return BuildStatus::Unavailable(e.to_string()),
        };

        // Drain stderr on its own thread so a chatty build cannot fill the pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let waited = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit),
            None => child.wait().map(Some),
        };

        match waited {
            Ok(Some(status)) => {
                let stderr = stderr_reader
                    .and_then(|handle| handle.join().ok())
                    .unwrap_or_default();
                status_from_exit(status, &stderr)
            }
            // The reader is detached: a descendant outside the group may still hold the pipe
            Ok(None) => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!(command = %command, timeout = ?limit, "build timed out, killed");
                BuildStatus::TimedOut(limit)
            }
            Err(e) => BuildStatus::Unavailable(e.to_string()),
        }
    }
}

/// Wait for `child`, killing it once `limit` has elapsed. `Ok(None)` means killed.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the whole process group led by `child`
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        tracing::debug!(pgid = child.id(), error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn status_from_exit(status: ExitStatus, stderr: &str) -> BuildStatus {
    if status.success() {
        return BuildStatus::Succeeded;
    }
    BuildStatus::Failed {
        code: status.code(),
        stderr_tail: tail_lines(stderr, STDERR_TAIL_LINES),
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
