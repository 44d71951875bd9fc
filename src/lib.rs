// opsdiag - Operational Diagnostics Collection
//
// Gathers command output, API responses, file copies, and service logs
// from a host, scrubs secrets out of everything it touches, and bundles
// the results for support engineers who cannot shell in themselves.

pub mod agent;
pub mod client;
pub mod error;
pub mod filter;
pub mod op;
pub mod product;
pub mod redact;
pub mod runner;

pub use agent::{Agent, AgentConfig, Manifest};
pub use client::ApiClient;
pub use error::CollectError;
pub use op::{Op, Status, StatusCounts};
pub use product::Product;
pub use redact::Redact;
pub use runner::Runner;

/// Version of the opsdiag tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentConfig, Manifest};
    pub use crate::client::ApiClient;
    pub use crate::error::CollectError;
    pub use crate::op::{Op, Status};
    pub use crate::product::Product;
    pub use crate::redact::Redact;
    pub use crate::runner::{
        Command, Copy, Do, DockerLog, HttpGet, JournaldLog, OutputFormat, Runner, Seq, Shell,
    };
}
