//! poolstream
//!
//! File-style readable byte streams served from a shared buffer pool.
//!
//! `poolstream` emulates the lifecycle of a file read stream over any
//! data source: open lazily, announce readiness, deliver zero-copy
//! chunks, end, close. All reads are served out of a shared append-only
//! buffer pool with optimistic reservations, so short reads cost a
//! reconciliation instead of an allocation. It is designed as a small,
//! composable primitive for:
//!
//! - feeding in-memory data to consumers that expect a file stream
//! - form uploads and fixtures built from string literals
//! - byte-range reads over files or readers
//!
//! The crate intentionally:
//! - does NOT buffer ahead or apply backpressure; every chunk is pulled
//! - does NOT watch, write, or manage files beyond open/read/close
//! - does NOT retry failed reads
//!
//! It only does one thing: **pull bytes → yield pooled chunks**
//!
//! # Sync
//!
//! ```
//! use poolstream::{StreamError, StreamEvent, StreamOptions, memory_stream};
//!
//! fn main() -> Result<(), StreamError> {
//!     let stream = memory_stream("success", StreamOptions::ranged(2, 4)?)?;
//!
//!     for event in stream {
//!         if let StreamEvent::Data(chunk) = event? {
//!             assert_eq!(&chunk[..], b"cce");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Async (feature = "async-io")
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use poolstream::{StreamEvent, StreamOptions, stream_async};
//! use futures_io::AsyncRead;
//!
//! async fn demo<R: AsyncRead + Unpin>(reader: R) -> Result<(), poolstream::StreamError> {
//!     let mut stream = stream_async(reader, StreamOptions::default())?;
//!
//!     while let Some(event) = stream.next().await {
//!         if let StreamEvent::Data(chunk) = event? {
//!             println!("chunk {} bytes", chunk.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod pool;
mod source;
mod stream;

mod window; // internal (range accounting)

#[cfg(feature = "async-io")]
mod async_stream;

//
// Public surface (intentionally tiny)
//

pub use config::{
    DEFAULT_FLAGS, DEFAULT_HIGH_WATER_MARK, DEFAULT_MODE, DEFAULT_PATH, StreamOptions,
};
pub use error::StreamError;
pub use pool::{BufferPool, MIN_POOL_SPACE, PoolStats, Reservation};
pub use source::{FileSource, MemoryHandle, MemorySource, ReaderSource, Source};
pub use stream::{Chunks, ReadStream, StreamEvent, StreamState, file_stream, memory_stream};

#[cfg(feature = "async-io")]
pub use async_stream::{AsyncReadStream, AsyncReaderSource, AsyncSource, stream_async};
