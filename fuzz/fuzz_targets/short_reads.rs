#![no_main]

use std::io;

use libfuzzer_sys::fuzz_target;
use poolstream::{BufferPool, MIN_POOL_SPACE, ReadStream, Source, StreamEvent, StreamOptions};

/// Serves its bytes at most `caps[i]` bytes per read, cycling through the
/// scripted caps.
struct CappedSource {
    data: Vec<u8>,
    caps: Vec<u8>,
    next: usize,
}

struct CappedHandle {
    data: Vec<u8>,
    cursor: usize,
}

impl Source for CappedSource {
    type Handle = CappedHandle;

    fn open(&mut self, _flags: &str, _mode: u32) -> io::Result<CappedHandle> {
        Ok(CappedHandle {
            data: self.data.clone(),
            cursor: 0,
        })
    }

    fn read(
        &mut self,
        handle: &mut CappedHandle,
        buf: &mut [u8],
        _pos: Option<u64>,
    ) -> io::Result<usize> {
        // Always at least one byte, so the stream ends only at end of data
        let cap = if self.caps.is_empty() {
            usize::MAX
        } else {
            usize::from(self.caps[self.next % self.caps.len()]).max(1)
        };
        self.next += 1;

        if handle.cursor >= handle.data.len() {
            return Ok(0);
        }
        let count = buf.len().min(handle.data.len() - handle.cursor).min(cap);
        buf[..count].copy_from_slice(&handle.data[handle.cursor..handle.cursor + count]);
        handle.cursor += count;
        Ok(count)
    }

    fn close(&mut self, handle: CappedHandle) -> io::Result<()> {
        drop(handle);
        Ok(())
    }
}

fuzz_target!(|input: (Vec<u8>, Vec<u8>, Vec<u8>, u8)| {
    let (a_data, b_data, caps, hwm) = input;
    let hwm = usize::from(hwm).max(1);
    let options = StreamOptions::default().with_high_water_mark(hwm);
    let pool = BufferPool::new();

    let a_source = CappedSource {
        data: a_data.clone(),
        caps: caps.clone(),
        next: 0,
    };
    let b_source = CappedSource {
        data: b_data.clone(),
        caps,
        next: 0,
    };
    let mut a = ReadStream::with_pool(a_source, options.clone(), pool.clone()).unwrap();
    let mut b = ReadStream::with_pool(b_source, options, pool.clone()).unwrap();

    let mut got_a = Vec::new();
    let mut got_b = Vec::new();
    let mut done_a = false;
    let mut done_b = false;

    // Alternate the two streams so their reservations interleave within
    // the shared pool
    while !done_a || !done_b {
        if !done_a {
            match a.next_event() {
                Some(event) => {
                    if let StreamEvent::Data(chunk) = event.unwrap() {
                        got_a.extend_from_slice(&chunk);
                    }
                }
                None => done_a = true,
            }
        }
        if !done_b {
            match b.next_event() {
                Some(event) => {
                    if let StreamEvent::Data(chunk) = event.unwrap() {
                        got_b.extend_from_slice(&chunk);
                    }
                }
                None => done_b = true,
            }
        }
    }

    // Verify: capped reads never lose or alias bytes
    assert_eq!(got_a, a_data);
    assert_eq!(got_b, b_data);

    // Verify: pool accounting stays consistent
    let stats = pool.stats();
    assert!(stats.fragments_reused <= stats.fragments_retired);
    assert!(stats.bytes_discarded <= MIN_POOL_SPACE as u64 * stats.reservations);
});
