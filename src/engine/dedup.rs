use crate::resume::ScanRecord;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Decides whether an expanded address should be probed this run.
pub struct DedupFilter {
    record: Arc<ScanRecord>,
    admitted: HashSet<Ipv4Addr>,
    skipped: u64,
}

impl DedupFilter {
    pub fn new(record: Arc<ScanRecord>) -> Self {
        Self {
            record,
            admitted: HashSet::new(),
            skipped: 0,
        }
    }

    /// `false` when a previous run recorded `addr` (either outcome) or it was
    /// already admitted earlier in this run.
    pub fn admit(&mut self, addr: Ipv4Addr) -> bool {
        if self.record.contains(&addr) || !self.admitted.insert(addr) {
            self.skipped += 1;
            return false;
        }
        true
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
