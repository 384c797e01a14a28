use crate::error::ScanError;
use crate::model::ProbeEvent;
use tokio::sync::{mpsc, oneshot};

use super::sink::OutputSink;

/// Handle to the blocking output worker.
///
/// Every emit waits for the worker's acknowledgement, so when it returns the
/// line has been written and flushed.
#[derive(Clone)]
pub struct OutputChannel {
    inner: std::sync::Arc<OutputInner>,
}

struct OutputInner {
    tx: tokio::sync::Mutex<Option<mpsc::Sender<OutputCommand>>>,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

enum OutputCommand {
    Emit(ProbeEvent, oneshot::Sender<anyhow::Result<()>>),
    Notice(String),
}

impl OutputChannel {
    pub fn new(mut sink: OutputSink) -> Self {
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::task::spawn_blocking(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    OutputCommand::Emit(event, ack) => {
                        let _ = ack.send(sink.write_event(&event));
                    }
                    OutputCommand::Notice(text) => {
                        if let Err(err) = sink.write_notice(&text) {
                            tracing::warn!(error = %err, "failed to write notice");
                        }
                    }
                }
            }
            sink.flush();
        });

        Self {
            inner: std::sync::Arc::new(OutputInner {
                tx: tokio::sync::Mutex::new(Some(tx)),
                handle: tokio::sync::Mutex::new(Some(handle)),
            }),
        }
    }

    async fn sender(&self) -> Result<mpsc::Sender<OutputCommand>, ScanError> {
        self.inner
            .tx
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(ScanError::OutputClosed)
    }

    pub async fn emit(&self, event: ProbeEvent) -> anyhow::Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender()
            .await?
            .send(OutputCommand::Emit(event, ack_tx))
            .await
            .map_err(|_| ScanError::OutputClosed)?;
        ack_rx.await.map_err(|_| ScanError::OutputClosed)?
    }

    pub async fn notice(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.sender()
            .await?
            .send(OutputCommand::Notice(text.into()))
            .await
            .map_err(|_| ScanError::OutputClosed)?;
        Ok(())
    }

    /// Drains pending writes and stops the worker.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.inner.tx.lock().await.take();

        if let Some(handle) = self.inner.handle.lock().await.take() {
            handle
                .await
                .map_err(|err| anyhow::anyhow!("failed to join output worker: {err}"))?;
        }

        Ok(())
    }
}
