//! Network retrieval of headers and frame pixels.
//!
//! [`RetrievalClient`] wraps a [`Transport`] with bounded exponential backoff
//! ([`RetryPolicy`]) and remembers both successes and failures per frame.
//! Header and frame retrieval use independent policies: the header is bounded
//! by time only, frames by time and attempt count.

mod client;
mod error;
mod retry;
mod stats;
mod transport;

pub use client::RetrievalClient;
pub use error::{RetrievalError, RetrievalTarget};
pub use retry::{
    Backoff, ManualClock, RetryClock, RetryPolicy, SystemClock, DEFAULT_FRAME_MAX_ATTEMPTS,
    DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, DEFAULT_TIMEOUT,
};
pub use stats::{RetrievalStats, RetrievalStatsSnapshot};
pub use transport::{Header, RawFrame, Transport, TransportError};
