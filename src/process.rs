//! Child-process supervision with a hard wall-clock deadline.
//!
//! The renderer runs in its own process group on Unix so a timeout can take down any helper
//! processes it spawned; the direct child is always waited on afterwards so nothing is left as a
//! zombie.

use std::io;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of [`run_with_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
  Exited(ExitStatus),
  /// The deadline passed; the process tree was killed and reaped.
  TimedOut,
}

/// Signal that terminated the process, if any.
#[cfg(unix)]
pub fn exit_signal(status: &ExitStatus) -> Option<i32> {
  use std::os::unix::process::ExitStatusExt;
  status.signal()
}

#[cfg(not(unix))]
pub fn exit_signal(_status: &ExitStatus) -> Option<i32> {
  None
}

/// Put the command in a fresh process group so [`kill_tree`] can reach its descendants.
pub fn isolate_process_group(cmd: &mut Command) {
  #[cfg(unix)]
  {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
  }
  #[cfg(not(unix))]
  {
    let _ = cmd;
  }
}

/// Spawn `cmd` in its own process group.
pub fn spawn_isolated(cmd: &mut Command) -> io::Result<Child> {
  isolate_process_group(cmd);
  cmd.spawn()
}

/// Spawn `cmd` and wait for it for at most `timeout`.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<(Completion, Duration)> {
  let mut child = spawn_isolated(cmd)?;
  let start = Instant::now();
  let completion = wait_with_deadline(&mut child, start, timeout)?;
  Ok((completion, start.elapsed()))
}

/// Poll `child` until it exits or `timeout` has passed since `start`.
///
/// On timeout the whole process group is killed and the child reaped before returning. A polling
/// error also kills the group before it is returned. The group is only signalled while the child
/// is still unreaped, so its id cannot belong to another process group yet.
pub fn wait_with_deadline(
  child: &mut Child,
  start: Instant,
  timeout: Duration,
) -> io::Result<Completion> {
  loop {
    match poll_exit(child) {
      Ok(Some(status)) => return Ok(Completion::Exited(status)),
      Ok(None) => {}
      Err(err) => {
        kill_tree(child);
        let _ = child.kill();
        let _ = child.wait();
        return Err(err);
      }
    }
    if start.elapsed() >= timeout {
      tracing::debug!(pid = child.id(), "deadline reached, killing process group");
      kill_tree(child);
      let _ = child.kill();
      child.wait()?;
      return Ok(Completion::TimedOut);
    }
    std::thread::sleep(POLL_INTERVAL);
  }
}

/// Exit status of `child` if it has finished.
///
/// On Linux the exit is observed without reaping, helpers left in the group are killed, and only
/// then is the child reaped. Elsewhere helpers outliving a normal exit are left alone.
#[cfg(target_os = "linux")]
fn poll_exit(child: &mut Child) -> io::Result<Option<ExitStatus>> {
  // SAFETY: an all-zero siginfo_t is valid; waitid only writes into it.
  let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
  // SAFETY: `info` is a valid out pointer and the pid names our own unreaped child.
  let rc = unsafe {
    libc::waitid(
      libc::P_PID,
      child.id() as libc::id_t,
      &mut info,
      libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
    )
  };
  if rc != 0 {
    return Err(io::Error::last_os_error());
  }
  // SAFETY: waitid filled `info` (or left it zeroed when nothing changed state).
  if unsafe { info.si_pid() } == 0 {
    return Ok(None);
  }
  kill_tree(child);
  child.wait().map(Some)
}

#[cfg(not(target_os = "linux"))]
fn poll_exit(child: &mut Child) -> io::Result<Option<ExitStatus>> {
  child.try_wait()
}

/// SIGKILL the child's process group. Best-effort; errors such as ESRCH are ignored.
#[cfg(unix)]
fn kill_tree(child: &Child) {
  let pgid = child.id() as libc::pid_t;
  if pgid <= 0 {
    return;
  }
  // SAFETY: `kill` has no memory-safety preconditions; a negative pid addresses the group created
  // by `isolate_process_group`.
  unsafe {
    libc::kill(-pgid, libc::SIGKILL);
  }
}

#[cfg(not(unix))]
fn kill_tree(_child: &Child) {}
