//! Push delivery of probe events to a single observer.
//!
//! A stream moves through `Idle -> Started -> Emitting` and ends in exactly
//! one of `Completed`, `Errored` or `Cancelled`. Observer callbacks are
//! awaited one at a time; the next event is not pulled from the engine until
//! the previous `next` call has resolved.

use super::{Engine, RunStats};
use crate::input::InputSource;
use crate::model::ProbeEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Started,
    Emitting,
    Completed,
    Errored,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamContext {
    /// Tokens are being typed at a terminal.
    pub interactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub state: StreamState,
    pub delivered: u64,
    pub stats: RunStats,
}

#[async_trait]
pub trait Observer: Send {
    async fn start(&mut self, _ctx: StreamContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handles one event. The stream waits for the returned future before
    /// delivering the next one; an error ends the run.
    async fn next(&mut self, event: ProbeEvent) -> anyhow::Result<()>;

    async fn complete(&mut self, _report: &RunReport) {}

    async fn error(&mut self, _err: &anyhow::Error) {}
}

/// Engine plus input, ready to be subscribed to once.
pub struct EventStream {
    engine: Engine,
    source: InputSource,
}

impl EventStream {
    pub fn new(engine: Engine, source: InputSource) -> Self {
        Self { engine, source }
    }

    /// Spawns the run and returns a handle to control it.
    pub fn subscribe<O>(self, observer: O) -> Subscription
    where
        O: Observer + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(drive(self, observer, cancel_rx));
        Subscription {
            canceller: Canceller {
                tx: Arc::new(cancel_tx),
            },
            handle,
        }
    }
}

/// Cloneable, synchronous cancel switch. Safe to trip from a signal task.
#[derive(Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct Subscription {
    canceller: Canceller,
    handle: JoinHandle<anyhow::Result<RunReport>>,
}

impl Subscription {
    /// Stops admitting probes, abandons in-flight ones and suppresses any
    /// further `next` and `complete` callbacks.
    pub fn unsubscribe(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Waits for the run to end. Fatal errors are returned after the
    /// observer's `error` callback has seen them.
    pub async fn join(self) -> anyhow::Result<RunReport> {
        // Keep the switch alive until the driver is done; dropping it would
        // read as a cancellation.
        let _canceller = self.canceller;
        self.handle.await?
    }
}

async fn drive<O: Observer>(
    stream: EventStream,
    mut observer: O,
    mut cancel: watch::Receiver<bool>,
) -> anyhow::Result<RunReport> {
    let mut report = RunReport {
        state: StreamState::Idle,
        delivered: 0,
        stats: RunStats::default(),
    };

    if *cancel.borrow() {
        report.state = StreamState::Cancelled;
        return Ok(report);
    }

    let ctx = StreamContext {
        interactive: stream.source.is_interactive(),
    };
    if let Err(err) = observer.start(ctx).await {
        observer.error(&err).await;
        return Err(err);
    }
    report.state = StreamState::Started;

    let EventStream { engine, source } = stream;
    let (tx, mut rx) = mpsc::channel(engine.parallels());
    let producer = {
        let cancel = cancel.clone();
        let tokens = source.into_tokens();
        tokio::spawn(async move { engine.run(tokens, tx, cancel).await })
    };

    loop {
        tokio::select! {
            biased;
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    report.state = StreamState::Cancelled;
                    break;
                }
            }
            event = rx.recv() => match event {
                Some(event) => {
                    report.state = StreamState::Emitting;
                    if let Err(err) = observer.next(event).await {
                        producer.abort();
                        report.state = StreamState::Errored;
                        observer.error(&err).await;
                        return Err(err);
                    }
                    report.delivered += 1;
                    if *cancel.borrow() {
                        report.state = StreamState::Cancelled;
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if report.state == StreamState::Cancelled {
        producer.abort();
        info!(delivered = report.delivered, "run cancelled");
        return Ok(report);
    }

    let outcome = match producer.await {
        Ok(outcome) => outcome.map_err(anyhow::Error::from),
        Err(err) => Err(anyhow::Error::from(err).context("probe engine failed")),
    };
    match outcome {
        Ok(stats) => {
            report.stats = stats;
            report.state = StreamState::Completed;
            debug!(?stats, delivered = report.delivered, "run complete");
            observer.complete(&report).await;
            Ok(report)
        }
        Err(err) => {
            observer.error(&err).await;
            Err(err)
        }
    }
}
