//! Subprocess execution with timeout and bounded output capture

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default per-stream capture limit
pub const DEFAULT_OUTPUT_CAP: usize = 10 * 1024 * 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const READ_CHUNK: usize = 8 * 1024;

/// How long to wait for pipe readers once the process has exited or been killed.
/// Grandchildren that inherited the pipes can keep them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A single toolchain command to execute
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub env: Vec<(String, String)>,
    pub max_output_bytes: usize,
}

impl Invocation {
    /// Create an invocation with default timeout and output cap
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
            env: Vec::new(),
            max_output_bytes: DEFAULT_OUTPUT_CAP,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_output(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Look up an environment override by key
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Human-readable command line for logs and error messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Failure modes of a toolchain command
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` {}", exit_label(.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the program itself could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    pub fn stdout(&self) -> &str {
        match self {
            Self::Spawn { .. } => "",
            Self::Timeout { stdout, .. } | Self::NonZeroExit { stdout, .. } => stdout,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            Self::Spawn { .. } => "",
            Self::Timeout { stderr, .. } | Self::NonZeroExit { stderr, .. } => stderr,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }
}

/// Abstract command execution
///
/// `ProcessRunner` spawns real processes; tests substitute scripted runners
/// so the orchestration logic can be exercised without a toolchain.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, failing on timeout or non-zero exit
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvokeError>;
}

/// Runs commands as child processes via tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvokeError> {
        let command = invocation.command_line();
        debug!(command = %command, cwd = %invocation.cwd.display(), "Spawning toolchain process");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(
                invocation
                    .env
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down npx/cargo children too
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| InvokeError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdout_buf = Arc::new(Mutex::new(CappedBuffer::new(invocation.max_output_bytes)));
        let stderr_buf = Arc::new(Mutex::new(CappedBuffer::new(invocation.max_output_bytes)));
        let readers = [
            spawn_reader(child.stdout.take(), Arc::clone(&stdout_buf)),
            spawn_reader(child.stderr.take(), Arc::clone(&stderr_buf)),
        ];

        let started = Instant::now();
        let waited = tokio::time::timeout(invocation.timeout, child.wait()).await;

        match waited {
            Ok(Ok(status)) => {
                drain(readers).await;
                let stdout = take_output(&stdout_buf);
                let stderr = take_output(&stderr_buf);
                debug!(
                    command = %command,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    code = ?status.code(),
                    "Toolchain process exited"
                );

                if status.success() {
                    Ok(CommandOutput {
                        stdout,
                        stderr,
                        exit_code: 0,
                    })
                } else {
                    Err(InvokeError::NonZeroExit {
                        command,
                        code: status.code(),
                        stdout,
                        stderr,
                    })
                }
            }
            Ok(Err(source)) => {
                kill_tree(&mut child);
                drain(readers).await;
                Err(InvokeError::Spawn { command, source })
            }
            Err(_) => {
                warn!(
                    command = %command,
                    timeout_secs = invocation.timeout.as_secs(),
                    "Toolchain process timed out, killing"
                );
                kill_tree(&mut child);
                let _ = tokio::time::timeout(DRAIN_GRACE, child.wait()).await;
                drain(readers).await;
                Err(InvokeError::Timeout {
                    command,
                    timeout: invocation.timeout,
                    stdout: take_output(&stdout_buf),
                    stderr: take_output(&stderr_buf),
                })
            }
        }
    }
}

fn kill_tree(child: &mut Child) {
    // the child leads its own group, so this also reaches npx/cargo children
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                debug!(pgid, error = %e, "Process group already gone");
            }
        }
    }
    let _ = child.start_kill();
}

fn spawn_reader<R>(reader: Option<R>, sink: Arc<Mutex<CappedBuffer>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(&chunk[..n]),
            }
        }
    })
}

async fn drain(readers: [JoinHandle<()>; 2]) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }
}

fn take_output(buf: &Mutex<CappedBuffer>) -> String {
    let mut guard = buf.lock().unwrap_or_else(PoisonError::into_inner);
    let cap = guard.cap;
    std::mem::replace(&mut *guard, CappedBuffer::new(cap)).into_string()
}

/// Byte buffer that keeps only the most recent `cap` bytes
#[derive(Debug)]
pub(crate) struct CappedBuffer {
    data: VecDeque<u8>,
    cap: usize,
    dropped: usize,
}

impl CappedBuffer {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            data: VecDeque::new(),
            cap,
            dropped: 0,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.data.extend(chunk);
        if self.data.len() > self.cap {
            let excess = self.data.len() - self.cap;
            self.data.drain(..excess);
            self.dropped += excess;
        }
    }

    pub(crate) fn into_string(self) -> String {
        let bytes: Vec<u8> = self.data.into();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if self.dropped > 0 {
            format!("[... {} bytes truncated ...]\n{}", self.dropped, text)
        } else {
            text
        }
    }
}
