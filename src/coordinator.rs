//! The producer/consumer handoff between the pipeline thread and foreground
//! callers: a `Mutex`-guarded committed bundle, a condition variable for
//! waiters, and a single "pin" that serializes pipeline replacement against
//! concurrent foreground access.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::bundle::AcquisitionBundle;
use crate::error::{HsiError, Result};
use crate::waveform::TypedWaveform;

/// The acquisition callback signature: invoked with the newly committed
/// bundle, once per commit, never while the coordinator's lock is held.
pub type AcquisitionCallback = Arc<dyn Fn(&AcquisitionBundle) + Send + Sync>;

/// What `access_data` waits for before returning a scope.
#[derive(Debug, Clone, Copy)]
pub enum WaitMode {
    /// Return as soon as any committed bundle newer than the caller's
    /// `last_seen` sequence number exists (possibly already committed).
    NewData,
    /// Wait specifically for the next acquisition committed after this
    /// call starts, even if one newer than `last_seen` already exists.
    NextAcq,
    /// Return immediately if any bundle has ever been committed.
    AnyAcq,
    /// Sleep until the given instant, then behave as `NextAcq`: wait for a
    /// commit strictly newer than whatever was committed at the moment the
    /// sleep ended (never hands back a bundle that was already committed
    /// before `after` elapsed).
    Time { after: Instant },
}

struct State {
    committed: Option<Arc<AcquisitionBundle>>,
    commit_seq: u64,
    pinned: bool,
    pending: Option<AcquisitionBundle>,
    broken: bool,
    closed: bool,
    callback: Option<AcquisitionCallback>,
}

/// The shared hub a [`crate::pipeline::Pipeline`] commits into and
/// [`crate::client::Client::access_data`] waits on.
pub struct Coordinator {
    state: Mutex<State>,
    condvar: std::sync::Condvar,
    active_callback_thread: Mutex<Option<ThreadId>>,
}

impl Coordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                committed: None,
                commit_seq: 0,
                pinned: false,
                pending: None,
                broken: false,
                closed: false,
                callback: None,
            }),
            condvar: std::sync::Condvar::new(),
            active_callback_thread: Mutex::new(None),
        })
    }

    pub fn set_callback(&self, callback: Option<AcquisitionCallback>) {
        self.state.lock().unwrap().callback = callback;
    }

    pub fn current_seq(&self) -> u64 {
        self.state.lock().unwrap().commit_seq
    }

    pub fn mark_broken(&self) {
        let mut state = self.state.lock().unwrap();
        state.broken = true;
        self.condvar.notify_all();
    }

    pub fn mark_closed(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.condvar.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Commit a freshly fetched, filter-accepted bundle.
    ///
    /// If the coordinator is currently pinned by an open `AccessScope`, the
    /// bundle is stashed as pending and promoted (with its callback
    /// invocation) when the scope is dropped, instead of blocking the
    /// pipeline thread.
    pub fn try_commit(self: &Arc<Self>, candidate: AcquisitionBundle) {
        let mut state = self.state.lock().unwrap();
        if state.closed || state.broken {
            return;
        }
        if state.pinned {
            state.pending = Some(candidate);
            return;
        }
        let callback = state.callback.clone();
        state.committed = Some(Arc::new(candidate));
        state.commit_seq += 1;
        drop(state);
        self.condvar.notify_all();
        self.invoke_callback(callback);
    }

    fn invoke_callback(self: &Arc<Self>, callback: Option<AcquisitionCallback>) {
        let Some(callback) = callback else { return };
        let bundle = { self.state.lock().unwrap().committed.clone() };
        let Some(bundle) = bundle else { return };
        *self.active_callback_thread.lock().unwrap() = Some(std::thread::current().id());
        callback(&bundle);
        *self.active_callback_thread.lock().unwrap() = None;
    }

    /// Block until `mode` is satisfied (or the bound on `timeout` elapses,
    /// or the session closes/breaks), then return a scope pinning the
    /// committed bundle against pipeline replacement.
    pub fn access_data(
        self: &Arc<Self>,
        mode: WaitMode,
        last_seen: u64,
        timeout: Option<Duration>,
    ) -> Result<AccessScope> {
        if self.active_callback_thread.lock().unwrap().as_ref() == Some(&std::thread::current().id()) {
            return Err(HsiError::ReentrantAccess);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let next_acq_baseline = match mode {
            WaitMode::NextAcq => self.state.lock().unwrap().commit_seq,
            _ => last_seen,
        };
        // For `Time`, the `NextAcq`-style baseline isn't known until the
        // sleep actually elapses; captured lazily the first time we notice
        // `after` has passed.
        let mut time_baseline: Option<u64> = None;

        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return Err(HsiError::SessionClosed);
            }
            if state.broken {
                return Err(HsiError::SessionBroken);
            }
            if satisfied(&state, &mode, next_acq_baseline, &mut time_baseline) {
                break;
            }
            let mut wait_for = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return Err(HsiError::Timeout);
                    }
                    d - now
                }
                None => Duration::from_millis(200),
            };
            // Until the `Time` baseline is captured, wake up no later than
            // `after` itself rather than only on the next commit or overall
            // deadline — otherwise a commit that lands before `after` could
            // be mistaken for the one the baseline should exclude.
            if let WaitMode::Time { after } = mode {
                if time_baseline.is_none() {
                    let now = Instant::now();
                    if now < after {
                        wait_for = wait_for.min(after - now);
                    }
                }
            }
            let (guard, result) = self.condvar.wait_timeout(state, wait_for).unwrap();
            state = guard;
            if result.timed_out() && deadline.is_some() && Instant::now() >= deadline.unwrap() {
                if state.closed {
                    return Err(HsiError::SessionClosed);
                }
                if state.broken {
                    return Err(HsiError::SessionBroken);
                }
                if !satisfied(&state, &mode, next_acq_baseline, &mut time_baseline) {
                    return Err(HsiError::Timeout);
                }
                break;
            }
        }

        state.pinned = true;
        let bundle = state.committed.clone().expect("satisfied implies committed is Some");
        let seq = state.commit_seq;
        drop(state);

        Ok(AccessScope {
            coordinator: Arc::clone(self),
            bundle,
            seq,
            observed: AtomicBool::new(false),
            observed_sink: Mutex::new(None),
        })
    }

    fn release_pin(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        state.pinned = false;
        let promoted = state.pending.take().map(|pending| {
            let callback = state.callback.clone();
            state.committed = Some(Arc::new(pending));
            state.commit_seq += 1;
            callback
        });
        drop(state);
        self.condvar.notify_all();
        if let Some(callback) = promoted {
            self.invoke_callback(callback);
        }
    }
}

/// `time_baseline` is threaded through by the caller so the `Time` arm can
/// remember, across repeated calls during one `access_data` wait, the
/// commit sequence observed the instant `after` first elapsed.
fn satisfied(state: &State, mode: &WaitMode, baseline: u64, time_baseline: &mut Option<u64>) -> bool {
    match mode {
        WaitMode::AnyAcq => state.committed.is_some(),
        WaitMode::NewData | WaitMode::NextAcq => state.committed.is_some() && state.commit_seq > baseline,
        WaitMode::Time { after } => {
            if Instant::now() < *after {
                return false;
            }
            let baseline = *time_baseline.get_or_insert(state.commit_seq);
            state.committed.is_some() && state.commit_seq > baseline
        }
    }
}

/// An RAII handle pinning the committed bundle against pipeline
/// replacement. Dropping it releases the pin and, if the pipeline stashed
/// a pending bundle while pinned, promotes it (invoking the acquisition
/// callback).
pub struct AccessScope {
    coordinator: Arc<Coordinator>,
    bundle: Arc<AcquisitionBundle>,
    seq: u64,
    observed: AtomicBool,
    observed_sink: Mutex<Option<Arc<AtomicU64>>>,
}

impl AccessScope {
    /// Registers `sink` to receive this scope's sequence number the first
    /// time [`Self::get_data`] is called, so a caller can track "last
    /// observed" without eagerly marking a never-read bundle as seen.
    pub(crate) fn bind_observed_sink(&self, sink: Arc<AtomicU64>) {
        *self.observed_sink.lock().unwrap() = Some(sink);
    }

    pub fn get_data(&self, symbol: &str) -> Result<&TypedWaveform> {
        if !self.observed.swap(true, Ordering::SeqCst) {
            if let Some(sink) = self.observed_sink.lock().unwrap().as_ref() {
                sink.store(self.seq, Ordering::SeqCst);
            }
        }
        self.bundle
            .get(symbol)
            .ok_or_else(|| HsiError::UnknownSymbol(symbol.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bundle.symbols()
    }

    pub fn bundle(&self) -> &AcquisitionBundle {
        &self.bundle
    }

    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl Drop for AccessScope {
    fn drop(&mut self) {
        self.coordinator.release_pin();
    }
}
