//! Process Supervision
//!
//! Runs one script invocation as the leader of its own process group so that a
//! timeout can signal everything the script started, not just the shell.
//!
//! Output pipes are drained by reader threads for the whole life of the child,
//! so a chatty program never blocks on a full pipe while we wait on it.

use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Grace period between SIGTERM and SIGKILL
pub const DEFAULT_GRACE: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from running a script process
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `sh` could not be started
    #[error("Failed to spawn script: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Polling the child failed
    #[error("Failed to wait for script: {0}")]
    Wait(#[source] std::io::Error),
}

/// Send `signal` to every process of group `pgid`
fn signal_group(pgid: i32, signal: libc::c_int) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::killpg(pgid, signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error keeps whatever was received before it
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Handle on a running `sh -c` invocation
pub struct ProcessHandle {
    child: Child,
    pgid: i32,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
    stdin: Option<JoinHandle<()>>,
    exit: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Spawn `script` through `sh -c` in a new process group.
    ///
    /// `stdin` is written in full then closed. `bin_dir`, when given, is
    /// prepended to `PATH`.
    pub fn spawn(
        script: &str,
        stdin: &[u8],
        bin_dir: Option<&Path>,
        work_dir: &Path,
    ) -> Result<Self, SupervisorError> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(script)
            .current_dir(work_dir)
            .process_group(0)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(bin_dir) = bin_dir {
            let path = match std::env::var_os("PATH") {
                Some(existing) => {
                    let mut path = bin_dir.as_os_str().to_owned();
                    path.push(":");
                    path.push(existing);
                    path
                }
                None => bin_dir.as_os_str().to_owned(),
            };
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(SupervisorError::SpawnFailed)?;
        let pgid = child.id() as i32;
        tracing::debug!("Spawned script in process group {}", pgid);

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);
        let stdin = child.stdin.take().map(|mut pipe| {
            let payload = stdin.to_vec();
            std::thread::spawn(move || {
                // The script may exit without reading its input
                let _ = pipe.write_all(&payload);
            })
        });

        Ok(Self {
            child,
            pgid,
            stdout,
            stderr,
            stdin,
            exit: None,
        })
    }

    /// Process group id (the leader's pid)
    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    /// Check if the group leader is still running
    pub fn is_alive(&mut self) -> bool {
        self.poll().map(|status| status.is_none()).unwrap_or(false)
    }

    fn poll(&mut self) -> Result<Option<ExitStatus>, std::io::Error> {
        if self.exit.is_none() {
            self.exit = self.child.try_wait()?;
        }
        Ok(self.exit)
    }

    /// Wait for the leader to exit, giving up after `timeout`
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<ExitStatus>, SupervisorError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.poll().map_err(SupervisorError::Wait)? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Send SIGTERM to the whole group
    pub fn terminate(&self) -> Result<(), std::io::Error> {
        signal_group(self.pgid, libc::SIGTERM)
    }

    /// Send SIGKILL to the whole group
    pub fn force_kill(&self) -> Result<(), std::io::Error> {
        signal_group(self.pgid, libc::SIGKILL)
    }

    /// SIGTERM the group, wait up to `grace`, then SIGKILL whatever is left and reap.
    pub fn shutdown(&mut self, grace: Duration) {
        // ESRCH only means the group is already gone
        let _ = self.terminate();
        let _ = self.wait_timeout(grace);
        let _ = self.force_kill();
        if self.exit.is_none() {
            if let Ok(status) = self.child.wait() {
                self.exit = Some(status);
            }
        }
        tracing::debug!("Process group {} shut down", self.pgid);
    }

    /// Wait for every process holding the output pipes to close them.
    ///
    /// Background members of the group keep the pipes open after the leader
    /// exits. Returns `false` if they are still open after `timeout`.
    pub fn wait_output(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let drained = [&self.stdout, &self.stderr]
                .iter()
                .all(|reader| reader.as_ref().map_or(true, JoinHandle::is_finished));
            if drained {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Join the pipe threads and return captured `(stdout, stderr)`.
    ///
    /// Blocks until every process holding the pipes has exited.
    pub fn take_output(&mut self) -> (String, String) {
        if let Some(stdin) = self.stdin.take() {
            let _ = stdin.join();
        }
        let stdout = self
            .stdout
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        (stdout, stderr)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            self.shutdown(Duration::from_millis(50));
        } else {
            // Members may outlive the leader; ESRCH means none did
            let _ = self.force_kill();
        }
    }
}
