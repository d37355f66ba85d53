//! The public facade: connect to an instrument, pick active symbols, read
//! coherent waveform bundles, and shut everything down cleanly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::bundle::AcquisitionBundle;
use crate::config::Config;
use crate::coordinator::{AccessScope, AcquisitionCallback, Coordinator, WaitMode};
use crate::error::{HsiError, Result};
use crate::filter::{self, FilterFn};
use crate::pipeline::Pipeline;
use crate::protocol::Transport;
use crate::session::{Session, SessionState, ShutdownToken};

/// A connected client streaming waveforms from one instrument.
///
/// Construct with [`Client::connect`]; release resources with
/// [`Client::close`] (also run automatically on drop).
pub struct Client {
    session: Arc<Session>,
    coordinator: Arc<Coordinator>,
    pipeline: Arc<Pipeline>,
    pipeline_handle: std::sync::Mutex<Option<std::thread::JoinHandle<()>>>,
    shutdown: ShutdownToken,
    last_seen_seq: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl Client {
    /// Connect to `transport` under `client_name`, using `config` for the
    /// keep-alive and pipeline tunables.
    pub fn connect(transport: Arc<dyn Transport>, client_name: &str, config: Config) -> Result<Self> {
        let shutdown = ShutdownToken::new();
        let coordinator = Coordinator::new();
        let session = Session::new(Arc::clone(&transport), shutdown.clone());
        session.connect(client_name, &config, Arc::clone(&coordinator))?;

        let pipeline = Pipeline::new(transport, Arc::clone(&coordinator), config, shutdown.clone());
        let pipeline_handle = pipeline.spawn();

        info!(client_name, "connected");
        Ok(Self {
            session,
            coordinator,
            pipeline,
            pipeline_handle: std::sync::Mutex::new(Some(pipeline_handle)),
            shutdown,
            last_seen_seq: Arc::new(AtomicU64::new(0)),
            closed: AtomicBool::new(false),
        })
    }

    /// Restrict the pipeline to the given symbols (case-insensitively
    /// matched against the instrument's available names). `None` tracks
    /// every available symbol.
    pub fn set_active_symbols(&self, symbols: Option<Vec<String>>) {
        self.pipeline.set_active_symbols(symbols);
    }

    pub fn active_symbols(&self) -> Option<Vec<String>> {
        self.pipeline.active_symbols()
    }

    /// Install the acceptance filter the pipeline runs before committing
    /// each candidate acquisition. See [`crate::filter`] for built-ins.
    pub fn set_acq_filter(&self, filter: FilterFn) {
        self.pipeline.set_filter(filter);
    }

    /// Install (or clear) the callback invoked once per committed
    /// acquisition. Never invoked while any `AccessScope` is held, and
    /// never re-entrantly from within itself.
    pub fn set_callback(&self, callback: Option<AcquisitionCallback>) {
        self.coordinator.set_callback(callback);
    }

    /// Block (bounded by `timeout`, if given) until `mode` is satisfied,
    /// then return a scope giving read access to the committed bundle.
    ///
    /// The "last observed" sequence `NewData` waits against only advances
    /// once the caller actually reads the bundle via [`AccessScope::get_data`]
    /// — a scope that's opened and dropped without reading never marks its
    /// bundle as seen.
    ///
    /// Calling this re-entrantly from within the acquisition callback
    /// returns [`HsiError::ReentrantAccess`] instead of deadlocking.
    pub fn access_data(&self, mode: WaitMode, timeout: Option<Duration>) -> Result<AccessScope> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HsiError::SessionClosed);
        }
        let last_seen = self.last_seen_seq.load(Ordering::SeqCst);
        let scope = self.coordinator.access_data(mode, last_seen, timeout)?;
        scope.bind_observed_sink(Arc::clone(&self.last_seen_seq));
        Ok(scope)
    }

    /// Convenience wrapper waiting up to `timeout` for any new acquisition
    /// and returning a clone of the resulting bundle, rather than a scope.
    pub fn wait_for_bundle(&self, timeout: Duration) -> Result<AcquisitionBundle> {
        let deadline = Instant::now() + timeout;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let scope = self.access_data(WaitMode::NewData, Some(remaining))?;
        Ok(scope.bundle().clone())
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Disconnect, stop the pipeline thread, and mark the session closed.
    /// Safe to call more than once; later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.coordinator.mark_closed();
        self.shutdown.signal();
        if let Some(handle) = self.pipeline_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.session.disconnect();
        info!("closed");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Convenience re-export so callers don't need to import [`filter`]
/// separately just to get the default.
pub fn default_filter() -> FilterFn {
    filter::any_acq()
}
