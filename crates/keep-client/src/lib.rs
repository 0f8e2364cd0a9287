//! Fan-out client for talking to a set of keepstore services: racing reads
//! (`Get`/`Ask`) and replicated writes (`PutB`/`PutHR`), plus the
//! deterministic probe ordering and directory/transport seams they're built
//! on.

mod client;
mod directory;
mod error;
mod rank;
mod stream;
mod transport;

pub use client::{AskResult, ClientConfig, GetResult, KeepClient, PutResult};
pub use directory::{ServiceDirectory, StaticDirectory};
pub use error::ClientError;
pub use rank::rank;
pub use stream::{AsyncStream, ReaderId};
pub use transport::{GetOutcome, HeadOutcome, HttpTransport, PutOutcome, ServiceTransport};
