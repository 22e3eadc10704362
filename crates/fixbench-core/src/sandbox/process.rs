//! Process-group signalling for sandboxed children.
//!
//! Every child is spawned as the leader of a fresh process group so that a
//! timeout can take down anything it forked as well. The group is killed at
//! most once: explicitly by the sandbox, or on drop for early `?` returns and
//! a caller dropping the future mid-flight. After that the guard is spent, so
//! a recycled pgid is never signalled.

/// Put the command's child in its own process group.
pub(crate) fn isolate_group(command: &mut tokio::process::Command) {
    #[cfg(unix)]
    {
        unsafe {
            command.pre_exec(|| {
                if libc::setpgid(0, 0) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }
    #[cfg(not(unix))]
    {
        let _ = command;
    }
}

/// Owns the process group of one spawned child for the duration of a call.
#[derive(Debug)]
pub(crate) struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    pub(crate) fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|p| i32::try_from(p).ok()).filter(|p| *p > 0),
        }
    }

    /// Ask the group to exit (SIGTERM).
    pub(crate) fn terminate(&self) {
        #[cfg(unix)]
        self.signal(libc::SIGTERM);
    }

    /// Kill the group (SIGKILL) and disarm the guard.
    pub(crate) fn kill(&mut self) {
        #[cfg(unix)]
        self.signal(libc::SIGKILL);
        self.pgid = None;
    }

    #[cfg(unix)]
    fn signal(&self, sig: libc::c_int) {
        if let Some(pgid) = self.pgid {
            // ESRCH once the group is gone is expected and ignored.
            unsafe {
                let _ = libc::kill(-pgid, sig);
            }
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_invalid_pids() {
        assert!(ProcessGroupGuard::new(None).pgid.is_none());
        assert!(ProcessGroupGuard::new(Some(0)).pgid.is_none());
        assert!(ProcessGroupGuard::new(Some(u32::MAX)).pgid.is_none());
        let guard = ProcessGroupGuard::new(Some(4242));
        assert_eq!(guard.pgid, Some(4242));
        // Never signal a real group from a unit test.
        std::mem::forget(guard);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_signals_group_once() {
        use std::os::unix::process::ExitStatusExt;

        let mut command = tokio::process::Command::new("sleep");
        command.arg("30").kill_on_drop(true);
        isolate_group(&mut command);
        let mut child = command.spawn().unwrap();

        let mut guard = ProcessGroupGuard::new(child.id());
        assert!(guard.pgid.is_some());
        guard.kill();
        assert!(guard.pgid.is_none());

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));

        // Spent: later calls and the drop send nothing.
        guard.terminate();
        guard.kill();
        drop(guard);
    }
}
