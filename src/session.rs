//! Connection lifecycle: `Connect`, the keep-alive heartbeat thread, and
//! the state a broken heartbeat moves the whole client into.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{HsiError, Result};
use crate::protocol::{ConnectStatus, Transport};

/// A shutdown flag threads can wait on interruptibly, shared by the
/// keep-alive thread and the pipeline thread.
#[derive(Clone)]
pub struct ShutdownToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn signal(&self) {
        let (lock, condvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        condvar.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Sleep for `duration` or until shutdown is signaled, whichever comes
    /// first. Returns `true` if woken by shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (lock, condvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        let (guard, _timeout) = condvar.wait_timeout_while(guard, duration, |shutdown| !*shutdown).unwrap();
        *guard
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse connection lifecycle state, observable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Broken,
}

/// Owns the transport connection and the keep-alive heartbeat.
pub struct Session {
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    shutdown: ShutdownToken,
    keepalive_handle: Mutex<Option<std::thread::JoinHandle<()>>>,
    consecutive_failures: AtomicU32,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, shutdown: ShutdownToken) -> Arc<Self> {
        Arc::new(Self {
            transport,
            state: Mutex::new(SessionState::Disconnected),
            shutdown,
            keepalive_handle: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Connect, then spawn the keep-alive thread.
    ///
    /// Exhausting `config.keepalive_failure_limit` consecutive failures
    /// moves the session to `Broken` and marks `coordinator` broken so any
    /// blocked `access_data` caller is woken with an error instead of
    /// hanging forever.
    pub fn connect(
        self: &Arc<Self>,
        client_name: &str,
        config: &Config,
        coordinator: Arc<Coordinator>,
    ) -> Result<()> {
        *self.state.lock().unwrap() = SessionState::Connecting;
        match self.transport.connect(client_name) {
            Ok(ConnectStatus::Success) => {}
            Ok(other) => {
                *self.state.lock().unwrap() = SessionState::Broken;
                return Err(HsiError::Connection(other));
            }
            Err(e) => {
                *self.state.lock().unwrap() = SessionState::Broken;
                return Err(HsiError::Transport(e));
            }
        }
        *self.state.lock().unwrap() = SessionState::Connected;

        let session = Arc::clone(self);
        let interval = config.keepalive_interval;
        let failure_limit = config.keepalive_failure_limit;
        let shutdown = self.shutdown.clone();
        let handle = std::thread::spawn(move || {
            session.run_keepalive(interval, failure_limit, shutdown, coordinator);
        });
        *self.keepalive_handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn run_keepalive(
        self: Arc<Self>,
        interval: Duration,
        failure_limit: u32,
        shutdown: ShutdownToken,
        coordinator: Arc<Coordinator>,
    ) {
        loop {
            if shutdown.sleep(interval) {
                debug!("keepalive thread observed shutdown");
                return;
            }
            if self.state() != SessionState::Connected {
                return;
            }
            match self.transport.keep_alive() {
                Ok(ConnectStatus::Success) => {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                }
                other => {
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(?other, failures, "keepalive failed");
                    if failures >= failure_limit {
                        *self.state.lock().unwrap() = SessionState::Broken;
                        coordinator.mark_broken();
                        return;
                    }
                }
            }
        }
    }

    /// Disconnect and join the keep-alive thread. Idempotent.
    pub fn disconnect(&self) {
        self.shutdown.signal();
        if let Some(handle) = self.keepalive_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        if self.state() != SessionState::Disconnected {
            let _ = self.transport.disconnect();
        }
        *self.state.lock().unwrap() = SessionState::Disconnected;
    }
}
