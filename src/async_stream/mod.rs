//! Async streaming support.
//!
//! This module provides the asynchronous counterpart of the pull-based
//! driver: the same lifecycle, events, and pooled reads, driven through a
//! poll-based source trait. It builds on `futures-core` and `futures-io`,
//! making it runtime-agnostic and compatible with tokio, async-std, smol,
//! and other async runtimes.
//!
//! - [`AsyncSource`] - Poll-based open/read/close primitives
//! - [`AsyncReadStream`] - Event stream over an [`AsyncSource`]
//! - [`AsyncReaderSource`] - Adapter for any `futures-io` reader
//! - [`stream_async`] - One-line constructor over an async reader
//!
//! This module requires the `async-io` feature to be enabled.

mod stream;

pub use stream::{AsyncReadStream, AsyncReaderSource, AsyncSource, stream_async};
