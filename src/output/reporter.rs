use super::OutputChannel;
use crate::engine::{Observer, RunReport, StreamContext};
use crate::model::ProbeEvent;
use crate::resume::ResumeLog;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{error, info};

/// The stream observer used by the binary: records each outcome in the
/// resume log, then hands it to the output worker.
pub struct Reporter {
    resume: ResumeLog,
    output: OutputChannel,
    accepted: u64,
    failed: u64,
}

impl Reporter {
    pub fn new(resume: ResumeLog, output: OutputChannel) -> Self {
        Self {
            resume,
            output,
            accepted: 0,
            failed: 0,
        }
    }
}

#[async_trait]
impl Observer for Reporter {
    async fn start(&mut self, ctx: StreamContext) -> anyhow::Result<()> {
        if ctx.interactive {
            self.output
                .notice("enter addresses or ranges, one per line (Ctrl-C to stop)")
                .await?;
        }
        Ok(())
    }

    async fn next(&mut self, event: ProbeEvent) -> anyhow::Result<()> {
        self.resume
            .append(event.address, event.outcome())
            .await
            .with_context(|| format!("resume log {}", self.resume.path().display()))?;
        if event.success {
            self.accepted += 1;
        } else {
            self.failed += 1;
        }
        self.output.emit(event).await
    }

    async fn complete(&mut self, report: &RunReport) {
        info!(
            probed = report.delivered,
            accepted = self.accepted,
            failed = self.failed,
            skipped = report.stats.skipped,
            invalid = report.stats.invalid_tokens,
            "scan finished"
        );
    }

    async fn error(&mut self, err: &anyhow::Error) {
        error!(error = %format!("{err:#}"), "scan aborted");
    }
}
