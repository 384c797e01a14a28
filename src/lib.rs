//! Finds IPv4 addresses that complete a TLS handshake for a chosen SNI.
//!
//! Input tokens (single addresses, CIDR blocks or dash ranges) are expanded
//! lazily, filtered against a resume log, and probed with bounded
//! concurrency. Outcomes are pushed to an [`engine::Observer`] one at a time.

pub mod engine;
pub mod error;
pub mod input;
pub mod model;
pub mod output;
pub mod probe;
pub mod range;
pub mod resume;

pub use engine::{Engine, EventStream, Observer, Subscription};
pub use error::{ProbeError, ScanError};
pub use model::{Config, Outcome, ProbeEvent};
