pub mod live;
pub mod synthetic;

use aquatrace_core::Reading;
use async_trait::async_trait;
use thiserror::Error;

pub use live::{ChannelOpener, LiveReadingSource, SerialOpener, TcpOpener, parse_line};
pub use synthetic::SyntheticReadingSource;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The channel could not be opened; callers get a degraded reading.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// No complete record arrived within the poll.
    #[error("no new data")]
    NoNewData,
    #[error("malformed record {line:?}: {reason}")]
    Malformed { line: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces one reading per poll.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Returns `None` when nothing new is available yet; callers poll again
    /// on their own schedule. An unavailable source yields a degraded
    /// [`Reading`] with its error flag set rather than `None`.
    async fn acquire(&self) -> Option<Reading>;
}
