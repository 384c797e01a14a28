use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use sni_scout::model::{
    Config, OutputConfig, OutputFormat, DEFAULT_DOMAIN, DEFAULT_PARALLELS, DEFAULT_PORT,
    DEFAULT_TIMEOUT, RESUME_FILE_NAME,
};
use sni_scout::range::AddressRange;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Find IPv4 addresses that complete a TLS handshake for a chosen SNI",
    long_about = None
)]
pub struct Cli {
    /// File with addresses or ranges, one per line (`-` for stdin)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<String>,

    /// Where accepted addresses are written (`-` for stdout)
    #[arg(short = 'o', long = "output", value_name = "DEST", default_value = "-")]
    pub output: String,

    /// Resume log [default: ./sni-scout.resume]
    #[arg(short = 'r', long = "resume", value_name = "FILE")]
    pub resume: Option<PathBuf>,

    /// Number of concurrent probes
    #[arg(short = 'p', long = "parallels", default_value_t = DEFAULT_PARALLELS)]
    pub parallels: usize,

    /// Comma-separated SNI candidates, tried in order
    #[arg(short = 'd', long = "domains", default_value = DEFAULT_DOMAIN)]
    pub domains: String,

    /// Per-address deadline, e.g. 500ms, 5s, 1m
    #[arg(short = 't', long = "timeout", default_value = "5s")]
    pub timeout: String,

    /// TLS port to probe
    #[arg(long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Format of accepted addresses
    #[arg(long = "format", default_value_t = Format::Plain)]
    pub format: Format,

    /// Suppress per-address status lines
    #[arg(short = 's', long = "silent", action = ArgAction::SetTrue, conflicts_with = "verbose")]
    pub silent: bool,

    /// Show failure reasons and debug logs
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Addresses or ranges (a.b.c.d, a.b.c.d/nn, a.b.c.d-e.f.g.h, a.b.c.d-n)
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Format {
    Plain,
    Jsonl,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Plain => write!(f, "plain"),
            Format::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<Config> {
        if self.parallels == 0 {
            anyhow::bail!("parallels must be greater than zero");
        }

        for target in &self.targets {
            AddressRange::parse(target)?;
        }

        let domains: Vec<String> = self
            .domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();
        if domains.is_empty() {
            anyhow::bail!("at least one SNI domain is required");
        }

        let timeout = parse_duration(&self.timeout).unwrap_or_else(|err| {
            tracing::warn!(
                value = %self.timeout,
                error = %err,
                default = ?DEFAULT_TIMEOUT,
                "unparsable timeout; using default"
            );
            DEFAULT_TIMEOUT
        });
        if timeout.is_zero() {
            anyhow::bail!("timeout must be greater than zero");
        }

        let resume = match self.resume {
            Some(path) => path,
            None => std::env::current_dir()
                .context("cannot determine working directory for the resume log")?
                .join(RESUME_FILE_NAME),
        };

        Ok(Config {
            targets: self.targets,
            input: self.input,
            resume,
            domains,
            parallels: self.parallels,
            timeout,
            port: self.port,
            verbose: self.verbose,
            silent: self.silent,
            output: OutputConfig {
                destination: match self.output.as_str() {
                    "-" => None,
                    path => Some(PathBuf::from(path)),
                },
                format: match self.format {
                    Format::Plain => OutputFormat::Plain,
                    Format::Jsonl => OutputFormat::Jsonl,
                },
            },
        })
    }
}

/// `<n>ms`, `<n>s`, `<n>m`, `<n>h`, or a bare number of milliseconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("`{raw}` does not start with a number"))?;

    let secs = |mult: u64| {
        value
            .checked_mul(mult)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("`{raw}` is too large"))
    };
    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        other => Err(format!("unknown unit `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["sni-scout"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("5000").unwrap(), Duration::from_millis(5000));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn bad_timeout_falls_back_to_default() {
        let cfg = parse(&["-t", "whenever", "10.0.0.1"]).into_config().unwrap();
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn invalid_positional_target_is_fatal() {
        let err = parse(&["10.0.0.1", "999.1.1.1"]).into_config().unwrap_err();
        assert!(err.to_string().contains("999.1.1.1"));
    }

    #[test]
    fn splits_domains_and_maps_output() {
        let cfg = parse(&[
            "-d",
            " example.org, ,cdn.example.net ",
            "-o",
            "hits.txt",
            "--format",
            "jsonl",
            "-r",
            "run.resume",
            "10.0.0.0/24",
        ])
        .into_config()
        .unwrap();
        assert_eq!(cfg.domains, vec!["example.org", "cdn.example.net"]);
        assert_eq!(cfg.output.destination, Some(PathBuf::from("hits.txt")));
        assert_eq!(cfg.output.format, OutputFormat::Jsonl);
        assert_eq!(cfg.resume, PathBuf::from("run.resume"));
        assert_eq!(cfg.targets, vec!["10.0.0.0/24"]);
    }

    #[test]
    fn default_resume_lives_in_working_directory() {
        let cfg = parse(&[]).into_config().unwrap();
        assert!(cfg.resume.ends_with(RESUME_FILE_NAME));
        assert!(cfg.output.destination.is_none());
        assert_eq!(cfg.parallels, DEFAULT_PARALLELS);
    }

    #[test]
    fn rejects_zero_parallels_and_empty_domains() {
        assert!(parse(&["-p", "0"]).into_config().is_err());
        assert!(parse(&["-d", " , "]).into_config().is_err());
    }

    #[test]
    fn silent_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["sni-scout", "-s", "-v"]).is_err());
    }
}
