use super::Prober;
use crate::error::ProbeError;
use anyhow::anyhow;
use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::pin::Pin;
use std::sync::OnceLock;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::trace;

/// Completes a TLS handshake against `addr:port`, presenting each candidate
/// domain as SNI until one succeeds.
#[derive(Clone)]
pub struct TlsProber {
    port: u16,
    connector: &'static SslConnector,
}

impl TlsProber {
    pub fn new(port: u16) -> anyhow::Result<Self> {
        Ok(Self {
            port,
            connector: tls_connector()?,
        })
    }

    async fn handshake(&self, target: SocketAddr, domain: &str) -> Result<(), ProbeError> {
        let stream = TcpStream::connect(target)
            .await
            .map_err(|err| ProbeError::Connect(err.to_string()))?;

        let handshake_err = |message: String| ProbeError::Handshake {
            domain: domain.to_string(),
            message,
        };

        let ssl = self
            .connector
            .configure()
            .map_err(|err| handshake_err(err.to_string()))?
            .verify_hostname(false)
            .into_ssl(domain)
            .map_err(|err| handshake_err(err.to_string()))?;
        let mut tls_stream =
            SslStream::new(ssl, stream).map_err(|err| handshake_err(err.to_string()))?;
        Pin::new(&mut tls_stream)
            .connect()
            .await
            .map_err(|err| handshake_err(err.to_string()))?;

        trace!(
            %target,
            sni = domain,
            version = tls_stream.ssl().version_str(),
            "handshake completed"
        );
        Ok(())
    }
}

#[async_trait]
impl Prober for TlsProber {
    fn name(&self) -> &'static str {
        "tls"
    }

    async fn probe(&self, addr: Ipv4Addr, domains: &[String]) -> Result<String, ProbeError> {
        let target = SocketAddr::V4(SocketAddrV4::new(addr, self.port));
        let mut last_err = None;

        for domain in domains {
            match self.handshake(target, domain).await {
                Ok(()) => return Ok(domain.clone()),
                // An unreachable host will not become reachable for the next SNI.
                Err(err @ ProbeError::Connect(_)) => return Err(err),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or_else(|| ProbeError::Handshake {
            domain: String::new(),
            message: "no candidate domains configured".into(),
        }))
    }
}

fn tls_connector() -> anyhow::Result<&'static SslConnector> {
    static CONNECTOR: OnceLock<anyhow::Result<SslConnector>> = OnceLock::new();

    CONNECTOR
        .get_or_init(|| {
            let mut builder = SslConnector::builder(SslMethod::tls()).map_err(|e| anyhow!(e))?;
            // Only handshake completion matters; certificates are never checked.
            builder.set_verify(SslVerifyMode::NONE);
            Ok(builder.build())
        })
        .as_ref()
        .map_err(|err| anyhow!("failed to create TLS connector: {err}"))
}
