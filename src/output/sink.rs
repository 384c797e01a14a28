use crate::model::{OutputConfig, OutputFormat, ProbeEvent};
use colored::Colorize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

/// How per-address status lines are shown on the terminal side.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusStyle {
    pub silent: bool,
    pub verbose: bool,
    pub color: bool,
}

/// Formats events on the output worker thread.
///
/// Accepted addresses go to the destination; every event gets a status line
/// on the status writer unless silenced.
pub struct OutputSink {
    format: OutputFormat,
    accepted: BufWriter<Box<dyn Write + Send>>,
    status: BufWriter<Box<dyn Write + Send>>,
    style: StatusStyle,
}

impl OutputSink {
    /// Status lines go to stderr; `style.color` decides colouring rather
    /// than `colored`'s own stdout check.
    pub fn new(cfg: &OutputConfig, style: StatusStyle) -> std::io::Result<Self> {
        colored::control::set_override(style.color);
        let accepted: Box<dyn Write + Send> = match &cfg.destination {
            Some(path) => Box::new(OpenOptions::new().create(true).append(true).open(path)?),
            None => Box::new(std::io::stdout()),
        };
        Ok(Self::with_writers(
            cfg.format,
            accepted,
            Box::new(std::io::stderr()),
            style,
        ))
    }

    pub fn with_writers(
        format: OutputFormat,
        accepted: Box<dyn Write + Send>,
        status: Box<dyn Write + Send>,
        style: StatusStyle,
    ) -> Self {
        Self {
            format,
            accepted: BufWriter::new(accepted),
            status: BufWriter::new(status),
            style,
        }
    }

    pub fn write_event(&mut self, event: &ProbeEvent) -> anyhow::Result<()> {
        if event.success {
            match self.format {
                OutputFormat::Plain => writeln!(self.accepted, "{}", event.address)?,
                OutputFormat::Jsonl => {
                    let line = serde_json::to_string(&event.view())?;
                    writeln!(self.accepted, "{line}")?;
                }
            }
            self.accepted.flush()?;
        }

        if !self.style.silent {
            writeln!(self.status, "{}", status_line(event, self.style))?;
            self.status.flush()?;
        }
        Ok(())
    }

    pub fn write_notice(&mut self, notice: &str) -> anyhow::Result<()> {
        if !self.style.silent {
            writeln!(self.status, "{notice}")?;
            self.status.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) {
        let _ = self.accepted.flush();
        let _ = self.status.flush();
    }
}

pub fn status_line(event: &ProbeEvent, style: StatusStyle) -> String {
    let tag = if event.success { "[OK]  " } else { "[FAIL]" };
    let tag = match (style.color, event.success) {
        (false, _) => tag.to_string(),
        (true, true) => tag.green().bold().to_string(),
        (true, false) => tag.red().to_string(),
    };

    let mut line = format!("{tag} {}", event.address);
    if let Some(domain) = &event.domain {
        line.push_str(&format!(" sni={domain}"));
    }
    line.push_str(&format!(" {}ms", event.elapsed_ms));
    if style.verbose {
        if let Some(reason) = &event.reason {
            line.push_str(&format!(" ({reason})"));
        }
    }
    line
}
