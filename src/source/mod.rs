//! Data sources that back a read stream.
//!
//! A [`Source`] supplies the three primitives a stream drives: open, read,
//! and close. The crate ships three implementations:
//!
//! - [`MemorySource`] - serves a byte string held in memory
//! - [`FileSource`] - serves a file on disk through [`std::fs`]
//! - [`ReaderSource`] - adapts any [`std::io::Read`] value
//!
//! Custom sources only need to implement the trait; the stream supplies
//! pooled buffers and drives the lifecycle.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use bytes::Bytes;

/// The open/read/close primitives behind a read stream.
///
/// `open` produces a [`Handle`](Source::Handle) that subsequent reads
/// operate on, which keeps a single source usable for several independent
/// streams. A read returning `Ok(0)` signals end of data.
///
/// When the stream was configured with a `start` offset it passes an
/// explicit position to every read; positions are issued in order, each
/// one advanced by the previous read's requested length before that read
/// completes. Sources driven this way should fill the buffer fully except
/// at end of data, the way positioned file reads do. With no `start`
/// configured, `pos` is `None` and the source reads at its own cursor.
pub trait Source {
    /// State produced by a successful open, threaded through reads and
    /// consumed by close.
    type Handle;

    /// Opens the source with the configured flags and mode.
    fn open(&mut self, flags: &str, mode: u32) -> io::Result<Self::Handle>;

    /// Reads into `buf`, at `pos` if given, returning the byte count.
    fn read(
        &mut self,
        handle: &mut Self::Handle,
        buf: &mut [u8],
        pos: Option<u64>,
    ) -> io::Result<usize>;

    /// Releases the handle.
    fn close(&mut self, handle: Self::Handle) -> io::Result<()>;
}

/// A source serving bytes held in memory.
///
/// Opening is infallible and cheap: the handle shares the underlying
/// allocation with the source, so every stream gets an independent cursor
/// over the same bytes.
///
/// # Example
///
/// ```
/// use poolstream::{MemorySource, Source};
///
/// let mut source = MemorySource::new("success");
/// let mut handle = source.open("r", 0o666)?;
///
/// let mut buf = [0u8; 4];
/// let n = source.read(&mut handle, &mut buf, None)?;
/// assert_eq!(&buf[..n], b"succ");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    #[cfg(feature = "async-io")]
    pub(crate) pending_hops: u32,
    #[cfg(feature = "async-io")]
    pub(crate) hop_countdown: u32,
}

impl MemorySource {
    /// Creates a source over the given bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            #[cfg(feature = "async-io")]
            pending_hops: 0,
            #[cfg(feature = "async-io")]
            hop_countdown: 0,
        }
    }

    /// Length of the backing bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the backing bytes are empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Makes every asynchronous primitive report pending `hops` times
    /// before completing, mimicking a source whose completions arrive on
    /// later event-loop turns.
    ///
    /// Useful for exercising overlapped reads deterministically. Has no
    /// effect on the synchronous [`Source`] implementation.
    #[cfg(feature = "async-io")]
    pub fn with_pending_hops(mut self, hops: u32) -> Self {
        self.pending_hops = hops;
        self.hop_countdown = hops;
        self
    }
}

impl From<&str> for MemorySource {
    fn from(data: &str) -> Self {
        Self::new(data.as_bytes().to_vec())
    }
}

impl From<String> for MemorySource {
    fn from(data: String) -> Self {
        Self::new(data.into_bytes())
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for MemorySource {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

/// Cursor state for one opened [`MemorySource`].
#[derive(Debug)]
pub struct MemoryHandle {
    data: Bytes,
    cursor: u64,
}

impl MemoryHandle {
    /// Copies bytes at `pos` (or the internal cursor) into `buf`.
    pub(crate) fn read_at(&mut self, buf: &mut [u8], pos: Option<u64>) -> usize {
        let position = pos.unwrap_or(self.cursor);
        if position >= self.data.len() as u64 {
            return 0;
        }
        let start = position as usize;
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        self.cursor = position + count as u64;
        count
    }
}

impl Source for MemorySource {
    type Handle = MemoryHandle;

    fn open(&mut self, _flags: &str, _mode: u32) -> io::Result<MemoryHandle> {
        Ok(MemoryHandle {
            data: self.data.clone(),
            cursor: 0,
        })
    }

    fn read(
        &mut self,
        handle: &mut MemoryHandle,
        buf: &mut [u8],
        pos: Option<u64>,
    ) -> io::Result<usize> {
        Ok(handle.read_at(buf, pos))
    }

    fn close(&mut self, handle: MemoryHandle) -> io::Result<()> {
        drop(handle);
        Ok(())
    }
}

/// A source serving a file on disk.
///
/// Only the `"r"` flag is supported; the mode is ignored because opening
/// for read never creates the file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this source opens.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Source for FileSource {
    type Handle = File;

    fn open(&mut self, flags: &str, _mode: u32) -> io::Result<File> {
        if flags != "r" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported open flags {:?}, only \"r\" is available", flags),
            ));
        }
        File::open(&self.path)
    }

    fn read(&mut self, handle: &mut File, buf: &mut [u8], pos: Option<u64>) -> io::Result<usize> {
        if let Some(pos) = pos {
            handle.seek(SeekFrom::Start(pos))?;
        }
        handle.read(buf)
    }

    fn close(&mut self, handle: File) -> io::Result<()> {
        drop(handle);
        Ok(())
    }
}

/// Adapts any [`std::io::Read`] value into a source.
///
/// The reader is handed over to the stream on open, so the source can be
/// opened once. Plain readers cannot seek, which has two consequences: a
/// configured `start` offset is rejected at read time, and an `end` bound
/// still works because it only caps the delivered byte count.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: Option<R>,
}

impl<R> ReaderSource<R> {
    /// Wraps a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl<R: Read> Source for ReaderSource<R> {
    type Handle = R;

    fn open(&mut self, _flags: &str, _mode: u32) -> io::Result<R> {
        self.reader
            .take()
            .ok_or_else(|| io::Error::other("reader already consumed by a previous open"))
    }

    fn read(&mut self, handle: &mut R, buf: &mut [u8], pos: Option<u64>) -> io::Result<usize> {
        if pos.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "positioned reads require a seekable source",
            ));
        }
        handle.read(buf)
    }

    fn close(&mut self, handle: R) -> io::Result<()> {
        drop(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_memory_sequential_reads_move_cursor() {
        let mut source = MemorySource::new("abcdef");
        let mut handle = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut handle, &mut buf, None).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(source.read(&mut handle, &mut buf, None).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(source.read(&mut handle, &mut buf, None).unwrap(), 0);
    }

    #[test]
    fn test_memory_positioned_read() {
        let mut source = MemorySource::new("abcdef");
        let mut handle = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(source.read(&mut handle, &mut buf, Some(2)).unwrap(), 3);
        assert_eq!(&buf, b"cde");
    }

    #[test]
    fn test_memory_position_past_end_reads_nothing() {
        let mut source = MemorySource::new("abc");
        let mut handle = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut handle, &mut buf, Some(3)).unwrap(), 0);
        assert_eq!(source.read(&mut handle, &mut buf, Some(1000)).unwrap(), 0);
    }

    #[test]
    fn test_memory_handles_have_independent_cursors() {
        let mut source = MemorySource::new("abcdef");
        let mut first = source.open("r", 0o666).unwrap();
        let mut second = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 3];
        source.read(&mut first, &mut buf, None).unwrap();
        assert_eq!(source.read(&mut second, &mut buf, None).unwrap(), 3);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn test_file_source_round_trip() {
        let path = temp_file(b"file contents");
        let mut source = FileSource::new(&path);
        let mut handle = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 32];
        let n = source.read(&mut handle, &mut buf, None).unwrap();
        assert_eq!(&buf[..n], b"file contents");

        source.close(handle).unwrap();
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_file_source_positioned_read() {
        let path = temp_file(b"0123456789");
        let mut source = FileSource::new(&path);
        let mut handle = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 4];
        let n = source.read(&mut handle, &mut buf, Some(6)).unwrap();
        assert_eq!(&buf[..n], b"6789");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_file_source_rejects_write_flags() {
        let mut source = FileSource::new("whatever.txt");
        let err = source.open("w", 0o666).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_reader_source_opens_once() {
        let mut source = ReaderSource::new(Cursor::new(b"data".to_vec()));
        let handle = source.open("r", 0o666).unwrap();
        assert!(source.open("r", 0o666).is_err());
        source.close(handle).unwrap();
    }

    #[test]
    fn test_reader_source_rejects_positions() {
        let mut source = ReaderSource::new(Cursor::new(b"data".to_vec()));
        let mut handle = source.open("r", 0o666).unwrap();

        let mut buf = [0u8; 4];
        let err = source.read(&mut handle, &mut buf, Some(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        assert_eq!(source.read(&mut handle, &mut buf, None).unwrap(), 4);
    }

    fn temp_file(content: &[u8]) -> PathBuf {
        use std::sync::atomic::{AtomicU32, Ordering};
        static SEQ: AtomicU32 = AtomicU32::new(0);

        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "poolstream-source-{}-{}.tmp",
            std::process::id(),
            seq
        ));
        std::fs::write(&path, content).unwrap();
        path
    }
}
