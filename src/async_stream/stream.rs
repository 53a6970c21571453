//! Async stream driver.
//!
//! This module mirrors the synchronous driver on top of a poll-based
//! source. The lifecycle, the event grammar, and the pooled-read
//! reconciliation are identical; the difference is that open, read, and
//! close may complete across any number of polls, and a read left in
//! flight keeps its pool reservation alive until it resolves.
//!
//! # Example
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
//!             println!("chunk: {} bytes", chunk.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_io::AsyncRead;
use pin_project_lite::pin_project;
use tracing::{debug, trace};

use crate::config::StreamOptions;
use crate::error::StreamError;
use crate::pool::{BufferPool, Reservation};
use crate::source::{MemoryHandle, MemorySource, Source};
use crate::stream::StreamEvent;
use crate::window::RangeWindow;

/// Poll-based open/read/close primitives behind an async stream.
///
/// The contract matches [`Source`] with each primitive split across
/// polls: the stream calls the same method with the same arguments until
/// it returns ready. A read returning `Ok(0)` signals end of data, and
/// explicit positions follow the same issued-in-order rule as the
/// synchronous trait.
pub trait AsyncSource {
    /// State produced by a completed open, threaded through reads and
    /// released after close.
    type Handle;

    /// Attempts to open the source with the configured flags and mode.
    fn poll_open(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        flags: &str,
        mode: u32,
    ) -> Poll<io::Result<Self::Handle>>;

    /// Attempts to read into `buf`, at `pos` if given.
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        handle: &mut Self::Handle,
        buf: &mut [u8],
        pos: Option<u64>,
    ) -> Poll<io::Result<usize>>;

    /// Attempts to release the handle.
    fn poll_close(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        handle: &mut Self::Handle,
    ) -> Poll<io::Result<()>>;
}

impl MemorySource {
    /// Burns one configured pending hop, arranging an immediate re-poll.
    fn defer(&mut self, cx: &mut Context<'_>) -> bool {
        if self.hop_countdown > 0 {
            self.hop_countdown -= 1;
            cx.waker().wake_by_ref();
            true
        } else {
            self.hop_countdown = self.pending_hops;
            false
        }
    }
}

/// In-memory bytes behind the async trait.
///
/// Completions are immediate unless the source was configured with
/// [`with_pending_hops`](MemorySource::with_pending_hops), in which case
/// each primitive reports pending that many times first, the way a real
/// event-loop source would complete on a later turn.
impl AsyncSource for MemorySource {
    type Handle = MemoryHandle;

    fn poll_open(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        flags: &str,
        mode: u32,
    ) -> Poll<io::Result<MemoryHandle>> {
        let this = self.get_mut();
        if this.defer(cx) {
            return Poll::Pending;
        }
        Poll::Ready(Source::open(this, flags, mode))
    }

    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        handle: &mut MemoryHandle,
        buf: &mut [u8],
        pos: Option<u64>,
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.defer(cx) {
            return Poll::Pending;
        }
        Poll::Ready(Ok(handle.read_at(buf, pos)))
    }

    fn poll_close(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        _handle: &mut MemoryHandle,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.defer(cx) {
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }
}

/// Adapts any [`futures_io::AsyncRead`] value into an async source.
///
/// The reader is handed over on open, so the source can be opened once.
/// Plain readers cannot seek; a configured `start` offset is rejected at
/// read time, while an `end` bound still works.
#[derive(Debug)]
pub struct AsyncReaderSource<R> {
    reader: Option<R>,
}

impl<R> AsyncReaderSource<R> {
    /// Wraps a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncSource for AsyncReaderSource<R> {
    type Handle = R;

    fn poll_open(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _flags: &str,
        _mode: u32,
    ) -> Poll<io::Result<R>> {
        Poll::Ready(
            self.get_mut()
                .reader
                .take()
                .ok_or_else(|| io::Error::other("reader already consumed by a previous open")),
        )
    }

    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        handle: &mut R,
        buf: &mut [u8],
        pos: Option<u64>,
    ) -> Poll<io::Result<usize>> {
        if pos.is_some() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "positioned reads require a seekable source",
            )));
        }
        Pin::new(handle).poll_read(cx, buf)
    }

    fn poll_close(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _handle: &mut R,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Lifecycle phase with the handle and any in-flight read state.
enum AsyncPhase<H> {
    Unopened,
    Opening,
    Opened {
        handle: H,
    },
    Ready {
        handle: H,
    },
    Reading {
        handle: H,
        reservation: Reservation,
        position: Option<u64>,
    },
    Closing {
        handle: H,
    },
    Ended {
        handle: Option<H>,
    },
    Errored {
        handle: Option<H>,
    },
    Destroyed,
}

pin_project! {
    /// An async pull-based read stream over an [`AsyncSource`].
    ///
    /// Yields the same event grammar as the synchronous driver. A pool
    /// reservation made for an in-flight read is held across pending
    /// polls and reconciled when the read resolves, even when the stream
    /// is destroyed in the meantime: destruction waits for the in-flight
    /// primitive, discards any data it produced, and then closes.
    ///
    /// Dropping the stream without polling it to completion skips the
    /// close primitive; the handle itself is still dropped.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures_util::StreamExt;
    /// use poolstream::{AsyncReadStream, MemorySource, StreamEvent, StreamOptions};
    ///
    /// # async fn demo() -> Result<(), poolstream::StreamError> {
    /// let source = MemorySource::new("success");
    /// let mut stream = AsyncReadStream::new(source, StreamOptions::default())?;
    ///
    /// while let Some(event) = stream.next().await {
    ///     println!("{:?}", event?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub struct AsyncReadStream<S>
    where
        S: AsyncSource,
    {
        #[pin]
        source: S,
        phase: AsyncPhase<S::Handle>,
        options: StreamOptions,
        window: RangeWindow,
        pool: BufferPool,
        destroy_requested: bool,
        closed: bool,
    }
}

impl<S: AsyncSource> AsyncReadStream<S> {
    /// Creates an async stream over `source` using the process-wide
    /// buffer pool.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRange`] if the options carry an
    /// inverted byte range.
    pub fn new(source: S, options: StreamOptions) -> Result<Self, StreamError> {
        Self::with_pool(source, options, BufferPool::global())
    }

    /// Creates an async stream that reserves from the given pool.
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
            phase: AsyncPhase::Unopened,
            options,
            window,
            pool,
            destroy_requested: false,
            closed: false,
        })
    }

    /// Creates an async stream over an already-opened handle. The open
    /// primitive is skipped and no [`StreamEvent::Open`] is emitted.
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
        stream.phase = AsyncPhase::Opened { handle };
        Ok(stream)
    }

    /// Requests destruction of the stream.
    ///
    /// As with the synchronous driver, destruction is deferred past any
    /// step already owed: an unopened stream still opens first, and an
    /// in-flight read runs to completion with its result discarded. Keep
    /// polling to observe the close event.
    pub fn destroy(self: Pin<&mut Self>) {
        let this = self.project();
        if !*this.destroy_requested && !matches!(*this.phase, AsyncPhase::Destroyed) {
            trace!("destroy requested for {}", this.options.path());
            *this.destroy_requested = true;
        }
    }

    /// Total bytes delivered so far. Data discarded by a destroy is not
    /// counted.
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

    /// Whether the open primitive has not been started yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, AsyncPhase::Unopened)
    }

    /// Whether destruction completed. Stays true even when the close
    /// primitive failed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the stream was destroyed or has destruction pending.
    pub fn is_destroyed(&self) -> bool {
        self.destroy_requested || matches!(self.phase, AsyncPhase::Destroyed)
    }
}

impl<S: AsyncSource> Stream for AsyncReadStream<S> {
    type Item = Result<StreamEvent, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match mem::replace(this.phase, AsyncPhase::Destroyed) {
                AsyncPhase::Destroyed => return Poll::Ready(None),

                AsyncPhase::Unopened => {
                    *this.phase = AsyncPhase::Opening;
                }

                AsyncPhase::Opening => {
                    let poll = this
                        .source
                        .as_mut()
                        .poll_open(cx, this.options.flags(), this.options.mode());
                    match poll {
                        Poll::Pending => {
                            *this.phase = AsyncPhase::Opening;
                            return Poll::Pending;
                        }
                        Poll::Ready(Ok(handle)) => {
                            debug!("opened {}", this.options.path());
                            *this.phase = AsyncPhase::Opened { handle };
                            return Poll::Ready(Some(Ok(StreamEvent::Open)));
                        }
                        Poll::Ready(Err(err)) => {
                            debug!("open failed for {}: {}", this.options.path(), err);
                            *this.phase = AsyncPhase::Errored { handle: None };
                            return Poll::Ready(Some(Err(StreamError::Open(err))));
                        }
                    }
                }

                AsyncPhase::Opened { handle } => {
                    *this.phase = AsyncPhase::Ready { handle };
                    return Poll::Ready(Some(Ok(StreamEvent::Ready)));
                }

                AsyncPhase::Ready { handle } => {
                    if *this.destroy_requested {
                        *this.phase = AsyncPhase::Closing { handle };
                        continue;
                    }
                    let want = this.window.clip(this.options.high_water_mark());
                    if want == 0 {
                        trace!("range exhausted after {} bytes", this.window.bytes_read());
                        *this.phase = AsyncPhase::Ended {
                            handle: Some(handle),
                        };
                        return Poll::Ready(Some(Ok(StreamEvent::End)));
                    }
                    let reservation = this.pool.reserve(want, this.options.high_water_mark());
                    let position = this.window.position();
                    // Issue the next position before the read resolves
                    this.window.advance(reservation.len());
                    *this.phase = AsyncPhase::Reading {
                        handle,
                        reservation,
                        position,
                    };
                }

                AsyncPhase::Reading {
                    mut handle,
                    mut reservation,
                    position,
                } => {
                    let poll =
                        this.source
                            .as_mut()
                            .poll_read(cx, &mut handle, reservation.as_mut(), position);
                    match poll {
                        Poll::Pending => {
                            *this.phase = AsyncPhase::Reading {
                                handle,
                                reservation,
                                position,
                            };
                            return Poll::Pending;
                        }
                        Poll::Ready(Ok(filled)) => {
                            let chunk = this.pool.reconcile(reservation, filled);
                            if *this.destroy_requested {
                                // The read outlived a destroy; drop its
                                // data and move on to the close
                                trace!("discarding {} bytes read during destruction", chunk.len());
                                *this.phase = AsyncPhase::Closing { handle };
                                continue;
                            }
                            if chunk.is_empty() {
                                trace!("source exhausted after {} bytes", this.window.bytes_read());
                                *this.phase = AsyncPhase::Ended {
                                    handle: Some(handle),
                                };
                                return Poll::Ready(Some(Ok(StreamEvent::End)));
                            }
                            this.window.record(chunk.len());
                            *this.phase = AsyncPhase::Ready { handle };
                            return Poll::Ready(Some(Ok(StreamEvent::Data(chunk))));
                        }
                        Poll::Ready(Err(err)) => {
                            // Hand the untouched reservation back before
                            // surfacing the error
                            this.pool.reconcile(reservation, 0);
                            *this.phase = AsyncPhase::Errored {
                                handle: Some(handle),
                            };
                            return Poll::Ready(Some(Err(StreamError::Read(err))));
                        }
                    }
                }

                AsyncPhase::Ended { handle } => {
                    if this.options.auto_close() || *this.destroy_requested {
                        match handle {
                            Some(handle) => *this.phase = AsyncPhase::Closing { handle },
                            None => {
                                *this.closed = true;
                                return Poll::Ready(Some(Ok(StreamEvent::Close)));
                            }
                        }
                    } else {
                        // Idles until destroyed explicitly
                        *this.phase = AsyncPhase::Ended { handle };
                        return Poll::Ready(None);
                    }
                }

                AsyncPhase::Errored { handle } => {
                    if this.options.auto_close() || *this.destroy_requested {
                        match handle {
                            Some(handle) => *this.phase = AsyncPhase::Closing { handle },
                            None => {
                                *this.closed = true;
                                return Poll::Ready(Some(Ok(StreamEvent::Close)));
                            }
                        }
                    } else {
                        *this.phase = AsyncPhase::Errored { handle };
                        return Poll::Ready(None);
                    }
                }

                AsyncPhase::Closing { mut handle } => {
                    match this.source.as_mut().poll_close(cx, &mut handle) {
                        Poll::Pending => {
                            *this.phase = AsyncPhase::Closing { handle };
                            return Poll::Pending;
                        }
                        Poll::Ready(result) => {
                            *this.closed = true;
                            drop(handle);
                            return Poll::Ready(Some(match result {
                                Ok(()) => {
                                    debug!("closed {}", this.options.path());
                                    Ok(StreamEvent::Close)
                                }
                                Err(err) => Err(StreamError::Close(err)),
                            }));
                        }
                    }
                }
            }
        }
    }
}

/// Creates an async stream over any `futures-io` reader.
///
/// # Runtime Compatibility
///
/// For tokio readers, use `tokio_util::compat` to bridge the traits:
///
/// ```ignore
/// use tokio_util::compat::TokioAsyncReadCompatExt;
/// use poolstream::{StreamOptions, stream_async};
///
/// let file = tokio::fs::File::open("data.bin").await?;
/// let stream = stream_async(file.compat(), StreamOptions::default())?;
/// ```
///
/// # Errors
///
/// Returns [`StreamError::InvalidRange`] if the options carry an inverted
/// byte range. A configured `start` offset fails at read time because
/// plain readers cannot seek.
pub fn stream_async<R: AsyncRead + Unpin>(
    reader: R,
    options: StreamOptions,
) -> Result<AsyncReadStream<AsyncReaderSource<R>>, StreamError> {
    AsyncReadStream::new(AsyncReaderSource::new(reader), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_async_event_grammar() {
        let stream = AsyncReadStream::with_pool(
            MemorySource::new("success"),
            StreamOptions::default(),
            BufferPool::new(),
        )
        .unwrap();

        let events: Vec<_> = stream.map(Result::unwrap).collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Open,
                StreamEvent::Ready,
                StreamEvent::Data(Bytes::from_static(b"success")),
                StreamEvent::End,
                StreamEvent::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_pending_hops_do_not_change_the_grammar() {
        let source = MemorySource::new("success").with_pending_hops(3);
        let stream =
            AsyncReadStream::with_pool(source, StreamOptions::default(), BufferPool::new())
                .unwrap();

        let events: Vec<_> = stream.map(Result::unwrap).collect().await;
        assert_eq!(events.len(), 5, "open, ready, data, end, close");
        assert_eq!(
            events[2],
            StreamEvent::Data(Bytes::from_static(b"success"))
        );
    }

    #[tokio::test]
    async fn test_async_range_is_inclusive() {
        let source = MemorySource::new("success").with_pending_hops(1);
        let options = StreamOptions::ranged(2, 4).unwrap();
        let stream = AsyncReadStream::with_pool(source, options, BufferPool::new()).unwrap();

        let chunks: Vec<_> = stream
            .filter_map(|event| async { event.unwrap().into_data() })
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0][..], b"cce");
    }

    #[tokio::test]
    async fn test_async_reader_adapter() {
        let data: &[u8] = b"read through futures-io";
        let stream = stream_async(data, StreamOptions::default()).unwrap();

        let mut collected = Vec::new();
        let mut stream = std::pin::pin!(stream);
        while let Some(event) = stream.next().await {
            if let StreamEvent::Data(chunk) = event.unwrap() {
                collected.extend_from_slice(&chunk);
            }
        }
        assert_eq!(collected, data);
    }
}
