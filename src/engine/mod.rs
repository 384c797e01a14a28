pub mod dedup;
pub mod stream;

use crate::error::{ProbeError, ScanError};
use crate::model::{Config, ProbeEvent};
use crate::probe::Prober;
use crate::range::{AddressRange, Addresses};
use crate::resume::ScanRecord;
use dedup::DedupFilter;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, instrument, warn};

pub use stream::{Canceller, EventStream, Observer, RunReport, StreamContext, StreamState, Subscription};

// Skipping a long run of recorded addresses never blocks the runtime for
// more than this many iterations at a time.
const SKIP_YIELD_EVERY: u64 = 4096;

/// Counters for one engine run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub admitted: u64,
    pub skipped: u64,
    pub invalid_tokens: u64,
}

/// Admits addresses into a bounded set of concurrent probes.
#[derive(Clone)]
pub struct Engine {
    prober: Arc<dyn Prober>,
    record: Arc<ScanRecord>,
    domains: Arc<[String]>,
    parallels: usize,
    timeout: Duration,
}

impl Engine {
    pub fn new(cfg: &Config, prober: Arc<dyn Prober>, record: Arc<ScanRecord>) -> Self {
        Self {
            prober,
            record,
            domains: cfg.domains.clone().into(),
            parallels: cfg.parallels.max(1),
            timeout: cfg.timeout,
        }
    }

    pub fn parallels(&self) -> usize {
        self.parallels
    }

    /// Probes every address the tokens expand to, sending one event per
    /// admitted address in completion order.
    ///
    /// Returns when the tokens are exhausted and every probe has settled,
    /// when `cancel` flips, or when the receiving side goes away. In the
    /// latter two cases outstanding probes are aborted.
    #[instrument(skip_all, fields(prober = self.prober.name(), parallels = self.parallels))]
    pub async fn run(
        &self,
        tokens: BoxStream<'static, Result<String, ScanError>>,
        tx: mpsc::Sender<ProbeEvent>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunStats, ScanError> {
        let mut feed = AddressFeed::new(tokens, DedupFilter::new(self.record.clone()));
        let mut slots: JoinSet<ProbeEvent> = JoinSet::new();
        let mut admitted = 0u64;
        let mut exhausted = false;

        loop {
            if *cancel.borrow() {
                debug!(in_flight = slots.len(), "cancelled; abandoning in-flight probes");
                break;
            }
            if exhausted && slots.is_empty() {
                break;
            }

            let can_admit = !exhausted && slots.len() < self.parallels;
            tokio::select! {
                biased;
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(joined) = slots.join_next(), if !slots.is_empty() => {
                    match joined {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                debug!("event receiver dropped; stopping");
                                break;
                            }
                        }
                        Err(err) if err.is_cancelled() => {}
                        Err(err) => error!(error = %err, "probe task panicked"),
                    }
                }
                next = feed.next(), if can_admit => match next? {
                    Some(addr) => {
                        admitted += 1;
                        debug!(%addr, in_flight = slots.len() + 1, "admitting");
                        slots.spawn(self.attempt(addr));
                    }
                    None => {
                        debug!(admitted, "address source exhausted");
                        exhausted = true;
                    }
                },
            }
        }

        slots.abort_all();
        Ok(RunStats {
            admitted,
            skipped: feed.filter.skipped(),
            invalid_tokens: feed.invalid,
        })
    }

    /// One address-level attempt; the deadline covers every SNI tried. A
    /// panicking prober still settles the address as a failure.
    fn attempt(&self, addr: Ipv4Addr) -> impl std::future::Future<Output = ProbeEvent> + Send + 'static {
        let prober = self.prober.clone();
        let domains = self.domains.clone();
        let deadline = self.timeout;

        async move {
            let started = Instant::now();
            let guarded = AssertUnwindSafe(prober.probe(addr, &domains)).catch_unwind();
            let result = timeout(deadline, guarded).await;
            let elapsed_ms = started.elapsed().as_millis();
            let event = match result {
                Ok(Ok(Ok(domain))) => ProbeEvent::accepted(addr, domain, elapsed_ms),
                Ok(Ok(Err(err))) => ProbeEvent::failed(addr, err, elapsed_ms),
                Ok(Err(payload)) => {
                    let message = panic_message(payload.as_ref());
                    error!(%addr, %message, "prober panicked");
                    ProbeEvent::failed(addr, ProbeError::Internal(message), elapsed_ms)
                }
                Err(_) => ProbeEvent::failed(addr, ProbeError::Timeout, elapsed_ms),
            };
            debug!(%addr, success = event.success, elapsed_ms, "settled");
            event
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic".to_string()
    }
}

/// Pulls tokens, expands them and filters out recorded addresses, one
/// address at a time.
struct AddressFeed {
    tokens: BoxStream<'static, Result<String, ScanError>>,
    current: Option<Addresses>,
    filter: DedupFilter,
    invalid: u64,
}

impl AddressFeed {
    fn new(tokens: BoxStream<'static, Result<String, ScanError>>, filter: DedupFilter) -> Self {
        Self {
            tokens,
            current: None,
            filter,
            invalid: 0,
        }
    }

    async fn next(&mut self) -> Result<Option<Ipv4Addr>, ScanError> {
        loop {
            if let Some(addrs) = self.current.as_mut() {
                let mut skipped = 0u64;
                while let Some(addr) = addrs.next() {
                    if self.filter.admit(addr) {
                        return Ok(Some(addr));
                    }
                    debug!(%addr, "already recorded; skipping");
                    skipped += 1;
                    if skipped % SKIP_YIELD_EVERY == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                self.current = None;
            }

            match self.tokens.next().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(err),
                Some(Ok(token)) => match AddressRange::parse(&token) {
                    Ok(range) => self.current = Some(range.iter()),
                    Err(err) => {
                        self.invalid += 1;
                        warn!(error = %err, "skipping invalid input line");
                    }
                },
            }
        }
    }
}
