mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use sni_scout::engine::{Engine, EventStream, StreamState};
use sni_scout::input::InputSource;
use sni_scout::output::{OutputChannel, OutputSink, Reporter, StatusStyle};
use sni_scout::probe::TlsProber;
use sni_scout::resume::{ResumeLog, ScanRecord};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = cli.into_config()?;

    let record = Arc::new(ScanRecord::load(&cfg.resume).await);
    let resume = ResumeLog::open(&cfg.resume)
        .await
        .with_context(|| format!("cannot open resume log {}", cfg.resume.display()))?;
    let source = InputSource::resolve(
        cfg.targets.clone(),
        cfg.input.as_deref(),
        InputSource::stdin_available(),
    )
    .await?;

    let style = StatusStyle {
        silent: cfg.silent,
        verbose: cfg.verbose,
        color: std::io::stderr().is_terminal(),
    };
    let sink = OutputSink::new(&cfg.output, style).context("cannot open output destination")?;
    tracing::debug!(
        format = %cfg.output.format,
        destination = ?cfg.output.destination,
        "output ready"
    );
    let output = OutputChannel::new(sink);

    let prober = Arc::new(TlsProber::new(cfg.port)?);
    let engine = Engine::new(&cfg, prober, record);
    let subscription =
        EventStream::new(engine, source).subscribe(Reporter::new(resume, output.clone()));

    let canceller = subscription.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let result = subscription.join().await;
    output.shutdown().await?;
    let report = result?;

    if report.state == StreamState::Cancelled {
        // An interactive stdin read may still be parked on its blocking
        // thread; don't wait for the runtime to reap it.
        std::process::exit(0);
    }
    Ok(())
}
