//! Bounded-timeout execution of external control commands.
//!
//! Every process invocation made by the controllers routes through
//! [`run_with_timeout`]; nothing blocks indefinitely on a child process.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::debug;

const WAIT_POLL: Duration = Duration::from_millis(50);

/// Captured result of a finished control command.
#[derive(Debug)]
pub struct ExecOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Spawn `program` with `args`, wait up to `timeout` for it to exit and
/// capture its output. The child is killed when the deadline passes.
pub fn run_with_timeout(
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> anyhow::Result<ExecOutput> {
    debug!(program = %program.display(), ?args, "running control command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn {}", program.display()))?;

    // The pipes are drained on their own threads while the child runs; a
    // command writing more than the OS pipe buffer would otherwise block on
    // write and never exit.
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child
            .try_wait()
            .with_context(|| format!("Failed to wait on {}", program.display()))?
        {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    anyhow::bail!(
                        "{} did not exit within {:?}",
                        program.display(),
                        timeout
                    );
                }
                std::thread::sleep(WAIT_POLL);
            }
        }
    };

    Ok(ExecOutput {
        code: status.code().unwrap_or(-1),
        stdout: collect_reader(stdout_reader),
        stderr: collect_reader(stderr_reader),
    })
}

fn spawn_reader(mut pipe: impl Read + Send + 'static) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        let _ = pipe.read_to_string(&mut buffer);
        buffer
    })
}

fn collect_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
