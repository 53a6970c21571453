//! Configuration for stream behavior.
//!
//! This module provides the options that shape a read stream:
//!
//! - [`StreamOptions`] - Controls the byte range, chunk sizing, and lifecycle
//!
//! # Example
//!
//! ```
//! use poolstream::StreamOptions;
//!
//! // Read bytes 2..=4 of the source
//! let options = StreamOptions::ranged(2, 4)?;
//!
//! // Builder pattern
//! let options = StreamOptions::default()
//!     .with_high_water_mark(4096)
//!     .with_auto_close(false);
//!
//! # Ok::<(), poolstream::StreamError>(())
//! ```

use crate::error::StreamError;

/// Default high-water mark: the per-read reservation ceiling (64 KiB).
pub const DEFAULT_HIGH_WATER_MARK: usize = 64 * 1024;

/// Default open flags (read-only).
pub const DEFAULT_FLAGS: &str = "r";

/// Default open mode (rw-rw-rw-, subject to the platform umask).
pub const DEFAULT_MODE: u32 = 0o666;

/// Default path label reported for streams without a real backing file.
pub const DEFAULT_PATH: &str = "no-this-file.txt";

/// Options accepted by stream constructors.
///
/// `StreamOptions` mirrors the option surface of a file read stream: open
/// flags and mode for the source, an optional inclusive byte range, the
/// high-water mark that caps each read, and whether the stream closes its
/// handle automatically after ending or erroring.
///
/// # Range semantics
///
/// `start` and `end` are inclusive byte offsets. `start` alone reads from
/// that offset to the end of the source; `end` alone caps the total bytes
/// delivered. Both bounds may point past the end of the source, in which
/// case the stream simply ends early.
///
/// # Example
///
/// ```
/// use poolstream::StreamOptions;
///
/// // Use default options
/// let options = StreamOptions::default();
///
/// // Validated range constructor
/// let options = StreamOptions::ranged(0, 1023)?;
///
/// // Builder pattern
/// let options = StreamOptions::default()
///     .with_start(128)
///     .with_high_water_mark(8192);
/// # Ok::<(), poolstream::StreamError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamOptions {
    /// Open flags passed to the source.
    flags: String,

    /// Open mode passed to the source.
    mode: u32,

    /// Inclusive first byte offset to read, if bounded below.
    start: Option<u64>,

    /// Inclusive last byte offset to read, if bounded above.
    end: Option<u64>,

    /// Whether the handle is closed automatically after end or error.
    auto_close: bool,

    /// Upper bound on the size of each read, in bytes.
    high_water_mark: usize,

    /// Path label reported by the stream, if customized.
    path: Option<String>,
}

impl StreamOptions {
    /// Creates options bounded to the inclusive byte range `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRange`] if `start > end`.
    ///
    /// # Example
    ///
    /// ```
    /// use poolstream::StreamOptions;
    ///
    /// let options = StreamOptions::ranged(2, 4)?;
    /// assert_eq!(options.start(), Some(2));
    /// assert_eq!(options.end(), Some(4));
    ///
    /// assert!(StreamOptions::ranged(4, 2).is_err());
    /// # Ok::<(), poolstream::StreamError>(())
    /// ```
    pub fn ranged(start: u64, end: u64) -> Result<Self, StreamError> {
        let options = Self::default().with_start(start).with_end(end);
        options.validate()?;
        Ok(options)
    }

    /// Sets the open flags passed to the source. Defaults to `"r"`.
    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    /// Sets the open mode passed to the source. Defaults to `0o666`.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the inclusive first byte offset to read.
    ///
    /// Note: This does not validate the options. Use [`StreamOptions::validate`]
    /// to check that the range is well-formed.
    ///
    /// # Example
    ///
    /// ```
    /// use poolstream::StreamOptions;
    ///
    /// let options = StreamOptions::default().with_start(128);
    /// assert_eq!(options.start(), Some(128));
    /// ```
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the inclusive last byte offset to read.
    ///
    /// Note: This does not validate the options. Use [`StreamOptions::validate`]
    /// to check that the range is well-formed.
    ///
    /// # Example
    ///
    /// ```
    /// use poolstream::StreamOptions;
    ///
    /// let options = StreamOptions::default().with_end(4);
    /// assert_eq!(options.end(), Some(4));
    /// ```
    pub fn with_end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets whether the stream closes its handle after ending or erroring.
    /// Defaults to `true`.
    ///
    /// With auto-close disabled the stream idles after its end-of-data or
    /// error event until [`destroy`](crate::ReadStream::destroy) is called.
    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    /// Sets the high-water mark: the largest read the stream will request.
    /// Defaults to [`DEFAULT_HIGH_WATER_MARK`].
    ///
    /// A zero high-water mark produces a stream that ends without
    /// delivering any data.
    ///
    /// # Example
    ///
    /// ```
    /// use poolstream::StreamOptions;
    ///
    /// let options = StreamOptions::default().with_high_water_mark(4096);
    /// assert_eq!(options.high_water_mark(), 4096);
    /// ```
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    /// Sets the path label reported by the stream.
    ///
    /// The label is metadata only; it does not affect which bytes are read.
    /// Defaults to [`DEFAULT_PATH`].
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Returns the open flags.
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Returns the open mode.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Returns the inclusive first byte offset, if bounded below.
    pub fn start(&self) -> Option<u64> {
        self.start
    }

    /// Returns the inclusive last byte offset, if bounded above.
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Returns whether the stream closes its handle after end or error.
    pub fn auto_close(&self) -> bool {
        self.auto_close
    }

    /// Returns the high-water mark.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Returns the path label.
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_PATH)
    }

    /// Validates the current options.
    ///
    /// Returns an error if the byte range is inverted.
    ///
    /// # Example
    ///
    /// ```
    /// use poolstream::StreamOptions;
    ///
    /// let options = StreamOptions::default().with_start(9).with_end(3);
    /// assert!(options.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), StreamError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(StreamError::InvalidRange { start, end });
            }
        }
        Ok(())
    }

    /// Fills in the path label if the caller did not customize it.
    pub(crate) fn fill_path(mut self, path: impl Into<String>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            flags: DEFAULT_FLAGS.to_string(),
            mode: DEFAULT_MODE,
            start: None,
            end: None,
            auto_close: true,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            path: None,
        }
    }
}
