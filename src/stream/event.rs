//! Stream lifecycle events and states.

use bytes::Bytes;

/// An observable event in a stream's life.
///
/// Events follow a fixed grammar: `Open` (skipped when the stream was
/// given a pre-opened handle), then `Ready`, then any number of `Data`
/// events, then `End`, then `Close` once the handle is released. An error
/// may take the place of any event; `Close` still follows it when the
/// stream auto-closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The open primitive completed and the stream holds a handle.
    Open,

    /// The stream now serves pulls.
    Ready,

    /// The next chunk of source data, in order, as a zero-copy view into
    /// a pooled slab.
    Data(Bytes),

    /// No more data will be delivered: the configured range or the source
    /// itself is exhausted.
    End,

    /// Destruction completed and the stream is marked closed. Emitted even
    /// when the stream never held a handle; suppressed in favor of
    /// [`StreamError::Close`](crate::StreamError::Close) when the close
    /// primitive fails.
    Close,
}

impl StreamEvent {
    /// Returns the chunk if this is a data event.
    pub fn into_data(self) -> Option<Bytes> {
        match self {
            StreamEvent::Data(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Whether this is a data event.
    pub fn is_data(&self) -> bool {
        matches!(self, StreamEvent::Data(_))
    }
}

/// Coarse lifecycle state of a stream.
///
/// Transitions only move forward: `Unopened` to `Opened` to `Ready`, then
/// to `Ended` or `Errored`, and finally to `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed; the source has not been opened yet.
    Unopened,
    /// The source is open; readiness has not been announced yet.
    Opened,
    /// Accepting pulls.
    Ready,
    /// End of data was reached; the handle is not yet released.
    Ended,
    /// An error was reported; the handle is not yet released.
    Errored,
    /// Fully torn down; no further events.
    Destroyed,
}
