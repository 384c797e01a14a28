use crate::error::ProbeError;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_PARALLELS: usize = 64;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DOMAIN: &str = "example.com";
pub const RESUME_FILE_NAME: &str = "sni-scout.resume";

#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<String>,
    pub input: Option<String>,
    pub resume: PathBuf,
    pub domains: Vec<String>,
    pub parallels: usize,
    pub timeout: Duration,
    pub port: u16,
    pub verbose: bool,
    pub silent: bool,
    pub output: OutputConfig,
}

impl Config {
    /// Defaults suitable for probing `domains`, with the resume log at `resume`.
    pub fn new(domains: Vec<String>, resume: PathBuf) -> Self {
        Self {
            targets: Vec::new(),
            input: None,
            resume,
            domains,
            parallels: DEFAULT_PARALLELS,
            timeout: DEFAULT_TIMEOUT,
            port: DEFAULT_PORT,
            verbose: false,
            silent: false,
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// `None` writes accepted addresses to stdout.
    pub destination: Option<PathBuf>,
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Plain,
    Jsonl,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Outcome tag stored in the resume log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "OK"),
            Outcome::Failure => write!(f, "Failure"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Outcome::Ok),
            "Failure" => Ok(Outcome::Failure),
            other => Err(format!("unknown outcome `{other}`")),
        }
    }
}

/// One settled probe, delivered to stream observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEvent {
    pub address: Ipv4Addr,
    pub success: bool,
    pub reason: Option<ProbeError>,
    /// SNI that completed the handshake, when `success` is set.
    pub domain: Option<String>,
    pub elapsed_ms: u128,
}

impl ProbeEvent {
    pub fn accepted(address: Ipv4Addr, domain: String, elapsed_ms: u128) -> Self {
        Self {
            address,
            success: true,
            reason: None,
            domain: Some(domain),
            elapsed_ms,
        }
    }

    pub fn failed(address: Ipv4Addr, reason: ProbeError, elapsed_ms: u128) -> Self {
        Self {
            address,
            success: false,
            reason: Some(reason),
            domain: None,
            elapsed_ms,
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.success {
            Outcome::Ok
        } else {
            Outcome::Failure
        }
    }

    pub fn view(&self) -> EventView {
        EventView {
            address: self.address.to_string(),
            success: self.success,
            domain: self.domain.clone(),
            reason: self.reason.as_ref().map(|r| r.to_string()),
            reason_kind: self.reason.as_ref().map(|r| r.kind()),
            elapsed_ms: self.elapsed_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Serializable rendering of a [`ProbeEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    pub address: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_kind: Option<&'static str>,
    pub elapsed_ms: u128,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_tags_round_trip_through_text() {
        assert_eq!("OK".parse::<Outcome>().unwrap(), Outcome::Ok);
        assert_eq!("Failure".parse::<Outcome>().unwrap(), Outcome::Failure);
        assert!("ok".parse::<Outcome>().is_err());
        assert_eq!(Outcome::Failure.to_string(), "Failure");
    }

    #[test]
    fn event_view_carries_reason_text() {
        let event = ProbeEvent::failed("10.0.0.1".parse().unwrap(), ProbeError::Timeout, 12);
        let view = event.view();
        assert_eq!(view.address, "10.0.0.1");
        assert_eq!(view.reason.as_deref(), Some("timed out"));
        assert_eq!(view.reason_kind, Some("timeout"));
        assert_eq!(event.outcome(), Outcome::Failure);
    }

    #[test]
    fn aborted_attempt_renders_as_internal() {
        let err = ProbeError::Internal("index out of bounds".into());
        let view = ProbeEvent::failed("10.0.0.9".parse().unwrap(), err, 3).view();
        assert_eq!(view.reason_kind, Some("internal"));
        assert_eq!(view.reason.as_deref(), Some("attempt aborted: index out of bounds"));
        assert_eq!(OutputFormat::Jsonl.to_string(), "jsonl");
    }
}
