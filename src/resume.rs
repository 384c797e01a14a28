use crate::error::ScanError;
use crate::model::Outcome;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Outcomes recorded by earlier runs, keyed by address.
#[derive(Debug, Default, Clone)]
pub struct ScanRecord {
    entries: HashMap<Ipv4Addr, Outcome>,
}

impl ScanRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path`. A missing file is an empty record; a corrupt one is
    /// logged and also treated as empty.
    pub async fn load(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no resume log yet");
                return Self::default();
            }
            Err(err) => {
                let err = ScanError::ResumeLoad {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                };
                warn!(error = %err, "starting with an empty resume record");
                return Self::default();
            }
        };

        match Self::parse(&text) {
            Ok(record) => {
                debug!(path = %path.display(), entries = record.len(), "loaded resume log");
                record
            }
            Err(reason) => {
                let err = ScanError::ResumeLoad {
                    path: path.to_path_buf(),
                    reason,
                };
                warn!(error = %err, "starting with an empty resume record");
                Self::default()
            }
        }
    }

    /// Parses `address,OUTCOME` lines; later lines override earlier ones.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut entries = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (addr, outcome) = line
                .split_once(',')
                .ok_or_else(|| format!("line {}: missing separator", idx + 1))?;
            let addr: Ipv4Addr = addr
                .trim()
                .parse()
                .map_err(|_| format!("line {}: bad address `{}`", idx + 1, addr.trim()))?;
            let outcome: Outcome = outcome
                .trim()
                .parse()
                .map_err(|err| format!("line {}: {err}", idx + 1))?;
            entries.insert(addr, outcome);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, addr: &Ipv4Addr) -> Option<Outcome> {
        self.entries.get(addr).copied()
    }

    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        self.entries.contains_key(addr)
    }

    pub fn insert(&mut self, addr: Ipv4Addr, outcome: Outcome) {
        self.entries.insert(addr, outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only writer for the resume log.
pub struct ResumeLog {
    path: PathBuf,
    file: File,
}

impl ResumeLog {
    /// Opens `path` for appending. A last line left without its newline is
    /// terminated first so the next record starts on a line of its own.
    pub async fn open(path: &Path) -> Result<Self, ScanError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .await
            .map_err(ScanError::ResumeWrite)?;

        let len = file.metadata().await.map_err(ScanError::ResumeWrite)?.len();
        if len > 0 {
            file.seek(SeekFrom::End(-1))
                .await
                .map_err(ScanError::ResumeWrite)?;
            let last = file.read_u8().await.map_err(ScanError::ResumeWrite)?;
            if last != b'\n' {
                file.write_all(b"\n").await.map_err(ScanError::ResumeWrite)?;
                file.flush().await.map_err(ScanError::ResumeWrite)?;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one record and flushes it before returning.
    pub async fn append(&mut self, addr: Ipv4Addr, outcome: Outcome) -> Result<(), ScanError> {
        let line = format!("{addr},{outcome}\n");
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(ScanError::ResumeWrite)?;
        self.file.flush().await.map_err(ScanError::ResumeWrite)?;
        Ok(())
    }
}
