pub mod channel;
pub mod reporter;
pub mod sink;

pub use channel::OutputChannel;
pub use reporter::Reporter;
pub use sink::{OutputSink, StatusStyle};
