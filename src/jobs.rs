//! Registry of background children, collected without blocking.

use std::fmt;
use std::process::{Child, ExitStatus};

/// Terminal state of a reaped child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Exited(i32),
    Signaled(i32),
}

impl fmt::Display for ChildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildState::Exited(code) => write!(f, "exited with {code}"),
            ChildState::Signaled(signal) => write!(f, "killed by signal {signal}"),
        }
    }
}

impl From<ExitStatus> for ChildState {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ChildState::Signaled(signal);
            }
        }
        ChildState::Exited(status.code().unwrap_or(-1))
    }
}

struct Job {
    pid: u32,
    name: String,
    child: Child,
}

/// Holds children launched with `&` until a later prompt iteration collects
/// them. Children must stay registered while running: dropping an unwaited
/// `Child` leaks a zombie once it terminates.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    /// Adopts a freshly spawned background child, returning its pid.
    pub fn register(&mut self, name: &str, child: Child) -> u32 {
        let pid = child.id();
        self.jobs.push(Job {
            pid,
            name: name.to_owned(),
            child,
        });
        pid
    }

    /// Non-blocking poll of every registered job. Finished children are
    /// waited on, removed, and returned; still-running ones stay registered,
    /// as does any job whose poll failed, so it can be retried later instead
    /// of being dropped unreaped.
    pub fn reap(&mut self) -> Vec<(u32, String, ChildState)> {
        let mut finished = Vec::new();
        self.jobs.retain_mut(|job| match job.child.try_wait() {
            Ok(Some(status)) => {
                finished.push((job.pid, std::mem::take(&mut job.name), status.into()));
                false
            }
            Ok(None) => true,
            Err(e) => {
                eprintln!("lsh: [{}] {}: {e}", job.pid, job.name);
                true
            }
        });
        finished
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
