pub mod tls;

use crate::error::ProbeError;
use async_trait::async_trait;
use std::net::Ipv4Addr;

pub use tls::TlsProber;

/// One address-level handshake attempt.
///
/// Implementations try `domains` in order and return the first one whose
/// handshake completed. They are not responsible for the overall deadline;
/// the engine bounds every call and drops the future when it expires.
#[async_trait]
pub trait Prober: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, addr: Ipv4Addr, domains: &[String]) -> Result<String, ProbeError>;
}
