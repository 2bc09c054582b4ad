use crate::error::VmError;
use crate::throw_exception;
use std::sync::{Condvar, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

#[derive(Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Recursive mutex + condition variable pair. Every class instance and every
/// array carries one. Two condvars keep `notify` from waking threads that
/// are merely blocked on `enter`.
#[derive(Default)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    entry: Condvar,
    waiters: Condvar,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Monitor")
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until this thread owns the monitor. Re-entrant.
    pub fn enter(&self) {
        let me = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                Some(_) => state = self.entry.wait(state).unwrap(),
            }
        }
    }

    /// Releases one level of ownership.
    pub fn leave(&self) -> Result<(), VmError> {
        let me = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.owner != Some(me) {
            return throw_exception!(IllegalMonitorStateException);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.entry.notify_one();
        }
        Ok(())
    }

    pub fn wait(&self) -> Result<(), VmError> {
        self.wait_inner(None)
    }

    /// Timed wait; returns when notified or after `ms` elapse.
    pub fn wait_for(&self, ms: u64) -> Result<(), VmError> {
        self.wait_inner(Some(Duration::from_millis(ms)))
    }

    fn wait_inner(&self, timeout: Option<Duration>) -> Result<(), VmError> {
        let me = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.owner != Some(me) {
            return throw_exception!(IllegalMonitorStateException);
        }

        // Release the full recursion depth, park, then reacquire it.
        let depth = state.depth;
        state.owner = None;
        state.depth = 0;
        self.entry.notify_one();

        state = match timeout {
            None => self.waiters.wait(state).unwrap(),
            Some(duration) => self.waiters.wait_timeout(state, duration).unwrap().0,
        };

        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = depth;
                    return Ok(());
                }
                Some(_) => state = self.entry.wait(state).unwrap(),
            }
        }
    }

    pub fn notify(&self) -> Result<(), VmError> {
        self.check_owned()?;
        self.waiters.notify_one();
        Ok(())
    }

    pub fn notify_all(&self) -> Result<(), VmError> {
        self.check_owned()?;
        self.waiters.notify_all();
        Ok(())
    }

    /// Drops ownership unconditionally. Used when tearing down a thread that
    /// terminated while holding the monitor.
    pub fn force_unlock(&self) {
        let mut state = self.state.lock().unwrap();
        state.owner = None;
        state.depth = 0;
        drop(state);
        self.entry.notify_one();
    }

    pub fn is_owned_by_current_thread(&self) -> bool {
        self.state.lock().unwrap().owner == Some(std::thread::current().id())
    }

    fn check_owned(&self) -> Result<(), VmError> {
        if !self.is_owned_by_current_thread() {
            return throw_exception!(IllegalMonitorStateException);
        }
        Ok(())
    }
}
