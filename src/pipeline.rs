//! The background thread that repeatedly fetches every active symbol,
//! checks the result for coherence and filter acceptance, and commits it
//! into the [`Coordinator`].

use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use crate::bundle::{AcquisitionBundle, BundleEntry, PreviousHeaders};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{HsiError, Result};
use crate::fetch::{self, FetchedWaveform};
use crate::filter::{self, FilterFn};
use crate::protocol::Transport;
use crate::session::ShutdownToken;
use crate::symbols;

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    coordinator: Arc<Coordinator>,
    config: Config,
    shutdown: ShutdownToken,
    requested_symbols: Mutex<Option<Vec<String>>>,
    filter: Mutex<FilterFn>,
    previous_headers: Mutex<PreviousHeaders>,
}

impl Pipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        coordinator: Arc<Coordinator>,
        config: Config,
        shutdown: ShutdownToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            coordinator,
            config,
            shutdown,
            requested_symbols: Mutex::new(None),
            filter: Mutex::new(filter::any_acq()),
            previous_headers: Mutex::new(PreviousHeaders::new()),
        })
    }

    pub fn set_active_symbols(&self, symbols: Option<Vec<String>>) {
        *self.requested_symbols.lock().unwrap() = symbols;
    }

    pub fn active_symbols(&self) -> Option<Vec<String>> {
        self.requested_symbols.lock().unwrap().clone()
    }

    pub fn set_filter(&self, filter: FilterFn) {
        *self.filter.lock().unwrap() = filter;
    }

    /// Spawn the pipeline loop on a dedicated OS thread.
    pub fn spawn(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        std::thread::spawn(move || pipeline.run())
    }

    fn run(self: Arc<Self>) {
        loop {
            if self.coordinator.is_closed() {
                debug!("pipeline observed closed coordinator, exiting");
                return;
            }

            let available = match self.transport.available_names() {
                Ok(names) => names,
                Err(e) => {
                    warn!(error = %e, "available_names failed");
                    if self.shutdown.sleep(self.config.idle_poll_interval) {
                        return;
                    }
                    continue;
                }
            };
            let requested = self.requested_symbols.lock().unwrap().clone();
            let active = symbols::effective_active_set(&available, requested.as_deref());

            if active.is_empty() {
                trace!("no active symbols, idling");
                if self.shutdown.sleep(self.config.idle_poll_interval) {
                    return;
                }
                continue;
            }

            match self.fetch_coherent_bundle(&active) {
                Ok(candidate) => self.consider_commit(candidate),
                Err(e) => warn!(error = %e, "acquisition fetch failed"),
            }

            if self.shutdown.is_signaled() {
                return;
            }
        }
    }

    fn consider_commit(&self, candidate: AcquisitionBundle) {
        let headers: Vec<_> = candidate.entries().iter().map(|e| e.waveform.header().clone()).collect();
        let previous = self.previous_headers.lock().unwrap().clone();
        let filter = self.filter.lock().unwrap().clone();
        if filter::evaluate(&filter, &previous, &headers) {
            *self.previous_headers.lock().unwrap() = candidate.header_snapshot();
            self.coordinator.try_commit(candidate);
        } else {
            trace!("acquisition rejected by acceptance filter");
        }
    }

    /// Fetch every active symbol and confirm they all belong to the same
    /// acquisition (`trans_id`), retrying up to `coherence_retry_limit`
    /// times if the instrument advanced mid-fetch.
    fn fetch_coherent_bundle(&self, active: &[String]) -> Result<AcquisitionBundle> {
        let mut last_err = None;
        for _ in 0..=self.config.coherence_retry_limit {
            let fetched = if self.config.should_parallelize(active.len()) {
                self.fetch_parallel(active)
            } else {
                self.fetch_sequential(active)
            };
            let fetched = match fetched {
                Ok(f) => f,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            if fetched.is_empty() {
                return Err(HsiError::Protocol("no symbols fetched".to_string()));
            }
            let trans_id = fetched[0].header.trans_id;
            if fetched.iter().all(|f| f.header.trans_id == trans_id) {
                let data_id = fetched[0].header.data_id;
                let entries = fetched
                    .into_iter()
                    .map(|f| BundleEntry {
                        source_name: f.header.source_name.clone(),
                        waveform: f.waveform,
                    })
                    .collect();
                return Ok(AcquisitionBundle::new(trans_id, data_id, entries));
            }
            last_err = Some(HsiError::Protocol(
                "active symbols straddled an acquisition boundary".to_string(),
            ));
        }
        Err(last_err.unwrap_or(HsiError::Protocol("coherence check failed".to_string())))
    }

    fn fetch_sequential(&self, active: &[String]) -> Result<Vec<FetchedWaveform>> {
        active
            .iter()
            .map(|name| {
                fetch::fetch_symbol(self.transport.as_ref(), name, self.config.chunk_size, self.config.prefer_raw)
            })
            .collect()
    }

    fn fetch_parallel(&self, active: &[String]) -> Result<Vec<FetchedWaveform>> {
        let mut all = Vec::with_capacity(active.len());
        for batch in active.chunks(self.config.parallel_workers.max(1)) {
            let mut batch_results = Vec::with_capacity(batch.len());
            std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|name| {
                        scope.spawn(move || {
                            fetch::fetch_symbol(self.transport.as_ref(), name, self.config.chunk_size, self.config.prefer_raw)
                        })
                    })
                    .collect();
                for handle in handles {
                    batch_results.push(handle.join().expect("fetch worker panicked"));
                }
            });
            for result in batch_results {
                all.push(result?);
            }
        }
        Ok(all)
    }
}
