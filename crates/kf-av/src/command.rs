//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use kf_core::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::process_tree::{self, TreeGuard};

/// Default command timeout: 3 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The spawned process leads its own process group. If the timeout elapses,
/// or the returned future is dropped before completion, the whole group is
/// killed.
///
/// # Example
///
/// ```no_run
/// use kf_av::ToolCommand;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() -> kf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-version")
///     .timeout(Duration::from_secs(10))
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Run the process from `dir` instead of the current directory.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments passed to the program.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if the process cannot be launched.
    /// - [`Error::NonZeroExit`] if it exits unsuccessfully (carries both
    ///   captured streams).
    /// - [`Error::TimedOut`] if the timeout elapses. The process group has
    ///   been killed and the leader reaped before this is returned.
    /// - [`Error::Io`] if waiting on the process fails.
    pub async fn execute(&self) -> kf_core::Result<ToolOutput> {
        let tool = self.tool_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        process_tree::isolate(&mut cmd);

        tracing::debug!("exec: {} {}", self.program.display(), self.args.join(" "));

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(&tool, format!("failed to spawn: {e}")))?;
        let mut guard = TreeGuard::new(child.id());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Completion means the leader exited *and* both pipes closed, so a
        // descendant still holding a pipe keeps the clock running.
        let completion = async {
            let (status, out, err) =
                tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
            Ok::<_, std::io::Error>((status?, out?, err?))
        };

        match tokio::time::timeout(self.timeout, completion).await {
            Ok(Ok((status, stdout, stderr))) => {
                guard.disarm();
                if !status.success() {
                    return Err(Error::NonZeroExit {
                        tool,
                        code: status.code(),
                        stdout,
                        stderr,
                    });
                }
                Ok(ToolOutput {
                    status,
                    stdout,
                    stderr,
                })
            }
            Ok(Err(e)) => {
                guard.terminate();
                let _ = child.wait().await;
                Err(Error::Io { source: e })
            }
            Err(_elapsed) => {
                guard.terminate();
                if let Err(e) = child.wait().await {
                    tracing::warn!("failed to reap {tool} after timeout: {e}");
                }
                tracing::warn!("{tool} timed out after {:?}; process tree killed", self.timeout);
                Err(Error::TimedOut {
                    tool,
                    timeout: self.timeout,
                })
            }
        }
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).to_string())
}
