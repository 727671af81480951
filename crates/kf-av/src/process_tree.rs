//! Process-tree termination.
//!
//! Every spawned command becomes the leader of its own process group (unix)
//! or console process group (windows). Terminating the tree then means
//! signalling the group rather than one pid, so encoder subprocesses started
//! by a renderer die with it. The backend is selected at build time; both
//! uphold the same contract: after [`kill_tree`] returns, no member of the
//! tree can keep running.

use tokio::process::Command;

/// Configure `cmd` so the spawned process leads a fresh process group.
#[cfg(unix)]
pub(crate) fn isolate(cmd: &mut Command) {
    cmd.process_group(0);
}

/// Configure `cmd` so the spawned process leads a fresh process group.
#[cfg(windows)]
pub(crate) fn isolate(cmd: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

/// Forcibly kill the process group led by `pid`.
#[cfg(unix)]
pub(crate) fn kill_tree(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!("pid {pid} does not fit a process group id");
        return;
    };

    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => tracing::debug!("killed process group {pid}"),
        Err(Errno::ESRCH) => tracing::trace!("process group {pid} already gone"),
        Err(e) => tracing::warn!("failed to kill process group {pid}: {e}"),
    }
}

/// Forcibly kill the process tree rooted at `pid`.
#[cfg(windows)]
pub(crate) fn kill_tree(pid: u32) {
    use std::process::Stdio;

    let result = std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(status) if status.success() => tracing::debug!("killed process tree {pid}"),
        Ok(status) => tracing::trace!("taskkill for {pid} exited with {status}"),
        Err(e) => tracing::warn!("failed to run taskkill for {pid}: {e}"),
    }
}

/// Kills the tree when dropped unless disarmed.
///
/// Covers timeouts, wait errors, and the caller dropping the future mid-run.
pub(crate) struct TreeGuard {
    pid: Option<u32>,
}

impl TreeGuard {
    pub(crate) fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The leader exited and its pipes closed; nothing is left to kill.
    pub(crate) fn disarm(&mut self) {
        self.pid = None;
    }

    /// Kill the tree now. Later calls and the drop are no-ops.
    pub(crate) fn terminate(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_tree(pid);
        }
    }
}

impl Drop for TreeGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}
