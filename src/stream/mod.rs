//! The pull-based stream driver.
//!
//! - [`ReadStream`] - Lifecycle state machine that yields [`StreamEvent`]s
//! - [`Chunks`] - Adapter that yields only the data chunks
//! - [`memory_stream`] / [`file_stream`] - One-line constructors

mod driver;
mod event;

pub use driver::{Chunks, ReadStream, file_stream, memory_stream};
pub use event::{StreamEvent, StreamState};
