//! Core stream driver - ReadStream and Chunks.
//!
//! This module implements the synchronous pull API. It provides two main
//! types:
//!
//! - [`ReadStream`] - Drives a [`Source`] through its lifecycle, yielding
//!   events on demand
//! - [`Chunks`] - Iterator adapter that yields only the data chunks
//!
//! # Example
//!
//! ```
//! use poolstream::{StreamEvent, StreamOptions, memory_stream};
//!
//! let stream = memory_stream("success", StreamOptions::default())?;
//!
//! let mut data = Vec::new();
//! for event in stream {
//!     if let StreamEvent::Data(chunk) = event? {
//!         data.extend_from_slice(&chunk);
//!     }
//! }
//! assert_eq!(data, b"success");
//! # Ok::<(), poolstream::StreamError>(())
//! ```

use std::mem;
use std::path::PathBuf;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::config::StreamOptions;
use crate::error::StreamError;
use crate::pool::BufferPool;
use crate::source::{FileSource, MemorySource, Source};
use crate::stream::event::{StreamEvent, StreamState};
use crate::window::RangeWindow;

/// Lifecycle phase of a stream, carrying the handle where one exists.
///
/// Holding the handle inside the phase makes illegal combinations, such
/// as a readable stream without a handle, unrepresentable.
enum Phase<H> {
    Unopened,
    Opened { handle: H },
    Ready { handle: H },
    Ended { handle: Option<H> },
    Errored { handle: Option<H> },
    Destroyed,
}

/// A pull-based read stream over a [`Source`].
///
/// `ReadStream` emulates the lifecycle of a file read stream: it opens its
/// source lazily on the first pull, announces readiness, serves data in
/// pool-backed zero-copy chunks, reports the end of the configured range
/// or of the source, and releases the handle. Each call to
/// [`next_event`](ReadStream::next_event), or each step of the
/// [`Iterator`] implementation, performs at most one read.
///
/// Reads are served from a shared [`BufferPool`]; streams constructed with
/// [`ReadStream::new`] use the process-wide pool, and
/// [`ReadStream::with_pool`] injects a different one.
///
/// # Example
///
/// ```
/// use poolstream::{MemorySource, ReadStream, StreamEvent, StreamOptions};
///
/// // Bytes 2..=4 of "success"
/// let source = MemorySource::new("success");
/// let stream = ReadStream::new(source, StreamOptions::ranged(2, 4)?)?;
///
/// let chunks: Vec<_> = stream.chunks().collect::<Result<_, _>>()?;
/// assert_eq!(&chunks[0][..], b"cce");
/// # Ok::<(), poolstream::StreamError>(())
/// ```
pub struct ReadStream<S: Source> {
    source: S,
    phase: Phase<S::Handle>,
    options: StreamOptions,
    window: RangeWindow,
    pool: BufferPool,
    destroy_requested: bool,
    closed: bool,
}

impl<S: Source> ReadStream<S> {
    /// Creates a stream over `source` using the process-wide buffer pool.
    ///
    /// The source is not opened until the first pull.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRange`] if the options carry an
    /// inverted byte range.
    pub fn new(source: S, options: StreamOptions) -> Result<Self, StreamError> {
        Self::with_pool(source, options, BufferPool::global())
    }

    /// Creates a stream that reserves from the given pool instead of the
    /// process-wide one.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRange`] if the options carry an
    /// inverted byte range.
    pub fn with_pool(
        source: S,
        options: StreamOptions,
        pool: BufferPool,
    ) -> Result<Self, StreamError> {
        options.validate()?;
        let window = RangeWindow::new(options.start(), options.end());
        Ok(Self {
            source,
            phase: Phase::Unopened,
            window,
            options,
            pool,
            destroy_requested: false,
            closed: false,
        })
    }

    /// Creates a stream over an already-opened handle.
    ///
    /// The open primitive is skipped and no [`StreamEvent::Open`] is
    /// emitted; the first pull announces readiness directly. The stream
    /// still closes the handle on destruction.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRange`] if the options carry an
    /// inverted byte range.
    pub fn from_handle(
        source: S,
        handle: S::Handle,
        options: StreamOptions,
    ) -> Result<Self, StreamError> {
        let mut stream = Self::new(source, options)?;
        stream.phase = Phase::Opened { handle };
        Ok(stream)
    }

    /// Advances the stream one step and returns the resulting event.
    ///
    /// Returns `None` once the stream is destroyed. A stream configured
    /// with auto-close disabled also returns `None` while it idles after
    /// its end or error event; calling [`destroy`](ReadStream::destroy)
    /// lets iteration resume to deliver the close event.
    pub fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        match mem::replace(&mut self.phase, Phase::Destroyed) {
            Phase::Destroyed => None,
            Phase::Unopened => Some(self.open_source()),
            Phase::Opened { handle } => {
                self.phase = Phase::Ready { handle };
                Some(Ok(StreamEvent::Ready))
            }
            Phase::Ready { handle } => {
                if self.destroy_requested {
                    Some(self.close_handle(Some(handle)))
                } else {
                    Some(self.pull(handle))
                }
            }
            Phase::Ended { handle } => {
                if self.options.auto_close() || self.destroy_requested {
                    Some(self.close_handle(handle))
                } else {
                    self.phase = Phase::Ended { handle };
                    None
                }
            }
            Phase::Errored { handle } => {
                if self.options.auto_close() || self.destroy_requested {
                    Some(self.close_handle(handle))
                } else {
                    self.phase = Phase::Errored { handle };
                    None
                }
            }
        }
    }

    /// Requests destruction of the stream.
    ///
    /// Destruction is deferred past any lifecycle step already owed: a
    /// stream destroyed before its first pull still opens its source, so
    /// that the handle can be released properly, and then closes without
    /// delivering data. Pull events until `None` to observe the close.
    ///
    /// Calling this more than once has no further effect.
    pub fn destroy(&mut self) {
        if !self.destroy_requested && !matches!(self.phase, Phase::Destroyed) {
            trace!("destroy requested for {}", self.options.path());
            self.destroy_requested = true;
        }
    }

    /// Alias for [`destroy`](ReadStream::destroy): closing a read stream
    /// tears it down.
    pub fn close(&mut self) {
        self.destroy();
    }

    /// Consumes the stream, yielding only its data chunks.
    pub fn chunks(self) -> Chunks<S> {
        Chunks { stream: self }
    }

    /// Total bytes delivered so far.
    pub fn bytes_read(&self) -> u64 {
        self.window.bytes_read()
    }

    /// The stream's path label.
    pub fn path(&self) -> &str {
        self.options.path()
    }

    /// The options the stream was built with.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        match &self.phase {
            Phase::Unopened => StreamState::Unopened,
            Phase::Opened { .. } => StreamState::Opened,
            Phase::Ready { .. } => StreamState::Ready,
            Phase::Ended { .. } => StreamState::Ended,
            Phase::Errored { .. } => StreamState::Errored,
            Phase::Destroyed => StreamState::Destroyed,
        }
    }

    /// Whether the source has not been opened yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Unopened)
    }

    /// Whether destruction completed. Stays true even when the close
    /// primitive failed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the stream was destroyed or has destruction pending.
    pub fn is_destroyed(&self) -> bool {
        self.destroy_requested || matches!(self.phase, Phase::Destroyed)
    }

    /// The open handle, while the stream holds one.
    pub fn handle(&self) -> Option<&S::Handle> {
        match &self.phase {
            Phase::Opened { handle } | Phase::Ready { handle } => Some(handle),
            Phase::Ended { handle } | Phase::Errored { handle } => handle.as_ref(),
            Phase::Unopened | Phase::Destroyed => None,
        }
    }

    fn open_source(&mut self) -> Result<StreamEvent, StreamError> {
        match self.source.open(self.options.flags(), self.options.mode()) {
            Ok(handle) => {
                debug!("opened {}", self.options.path());
                self.phase = Phase::Opened { handle };
                Ok(StreamEvent::Open)
            }
            Err(err) => {
                debug!("open failed for {}: {}", self.options.path(), err);
                self.phase = Phase::Errored { handle: None };
                Err(StreamError::Open(err))
            }
        }
    }

    /// Performs one pooled read.
    fn pull(&mut self, mut handle: S::Handle) -> Result<StreamEvent, StreamError> {
        let want = self.window.clip(self.options.high_water_mark());
        if want == 0 {
            trace!("range exhausted after {} bytes", self.window.bytes_read());
            self.phase = Phase::Ended {
                handle: Some(handle),
            };
            return Ok(StreamEvent::End);
        }

        let mut reservation = self.pool.reserve(want, self.options.high_water_mark());
        let position = self.window.position();
        // Issue the next position before the read resolves
        self.window.advance(reservation.len());

        match self.source.read(&mut handle, reservation.as_mut(), position) {
            Ok(filled) => {
                let chunk = self.pool.reconcile(reservation, filled);
                if chunk.is_empty() {
                    trace!("source exhausted after {} bytes", self.window.bytes_read());
                    self.phase = Phase::Ended {
                        handle: Some(handle),
                    };
                    Ok(StreamEvent::End)
                } else {
                    self.window.record(chunk.len());
                    self.phase = Phase::Ready { handle };
                    Ok(StreamEvent::Data(chunk))
                }
            }
            Err(err) => {
                // Hand the untouched reservation back before surfacing
                // the error
                self.pool.reconcile(reservation, 0);
                self.phase = Phase::Errored {
                    handle: Some(handle),
                };
                Err(StreamError::Read(err))
            }
        }
    }

    /// Releases the handle and marks the stream closed. The phase was
    /// already set to destroyed by the caller.
    fn close_handle(&mut self, handle: Option<S::Handle>) -> Result<StreamEvent, StreamError> {
        self.closed = true;
        let result = match handle {
            Some(handle) => self.source.close(handle),
            // Open never produced a handle; nothing to release
            None => Ok(()),
        };
        match result {
            Ok(()) => {
                debug!("closed {}", self.options.path());
                Ok(StreamEvent::Close)
            }
            Err(err) => Err(StreamError::Close(err)),
        }
    }
}

impl<S: Source> Iterator for ReadStream<S> {
    type Item = Result<StreamEvent, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

/// An iterator over a stream's data chunks.
///
/// Lifecycle events are consumed silently; errors are passed through.
///
/// # Example
///
/// ```
/// use poolstream::{StreamOptions, memory_stream};
///
/// let stream = memory_stream("success", StreamOptions::default())?;
/// let chunks: Vec<_> = stream.chunks().collect::<Result<_, _>>()?;
///
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(&chunks[0][..], b"success");
/// # Ok::<(), poolstream::StreamError>(())
/// ```
pub struct Chunks<S: Source> {
    stream: ReadStream<S>,
}

impl<S: Source> Chunks<S> {
    /// Returns the underlying event stream.
    pub fn into_inner(self) -> ReadStream<S> {
        self.stream
    }
}

impl<S: Source> Iterator for Chunks<S> {
    type Item = Result<Bytes, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stream.next_event()? {
                Ok(StreamEvent::Data(chunk)) => return Some(Ok(chunk)),
                Ok(_) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Creates a stream that serves the given bytes as if read from a file.
///
/// # Errors
///
/// Returns [`StreamError::InvalidRange`] if the options carry an inverted
/// byte range.
///
/// # Example
///
/// ```
/// use poolstream::{StreamOptions, memory_stream};
///
/// let stream = memory_stream("form data", StreamOptions::default())?;
/// assert_eq!(stream.path(), "no-this-file.txt");
/// # Ok::<(), poolstream::StreamError>(())
/// ```
pub fn memory_stream(
    data: impl Into<Bytes>,
    options: StreamOptions,
) -> Result<ReadStream<MemorySource>, StreamError> {
    ReadStream::new(MemorySource::new(data), options)
}

/// Creates a stream over the file at `path`.
///
/// The stream's path label defaults to `path` unless the options set one.
///
/// # Errors
///
/// Returns [`StreamError::InvalidRange`] if the options carry an inverted
/// byte range. Opening happens lazily, so a missing file surfaces as a
/// [`StreamError::Open`] on the first pull.
///
/// # Example
///
/// ```ignore
/// use poolstream::{StreamOptions, file_stream};
///
/// let stream = file_stream("data.bin", StreamOptions::default())?;
/// for chunk in stream.chunks() {
///     println!("{} bytes", chunk?.len());
/// }
/// # Ok::<(), poolstream::StreamError>(())
/// ```
pub fn file_stream(
    path: impl Into<PathBuf>,
    options: StreamOptions,
) -> Result<ReadStream<FileSource>, StreamError> {
    let path = path.into();
    let options = options.fill_path(path.to_string_lossy());
    ReadStream::new(FileSource::new(path), options)
}
