#![no_main]

use libfuzzer_sys::fuzz_target;
use poolstream::{BufferPool, MemorySource, ReadStream, StreamOptions};

fuzz_target!(|input: (Vec<u8>, Option<u16>, Option<u16>, u8)| {
    let (data, start, end, hwm) = input;
    // Small watermarks force many pulls per stream
    let hwm = usize::from(hwm);

    let mut options = StreamOptions::default().with_high_water_mark(hwm);
    if let Some(start) = start {
        options = options.with_start(u64::from(start));
    }
    if let Some(end) = end {
        options = options.with_end(u64::from(end));
    }

    let source = MemorySource::new(data.clone());
    let stream = match ReadStream::with_pool(source, options, BufferPool::new()) {
        Ok(stream) => stream,
        // Inverted ranges are rejected at construction; nothing to check
        Err(_) => return,
    };

    let mut delivered = Vec::new();
    for chunk in stream.chunks() {
        let chunk = chunk.unwrap();

        // Verify: chunks are never empty and never exceed the watermark
        assert!(!chunk.is_empty());
        assert!(chunk.len() <= hwm);

        delivered.extend_from_slice(&chunk);
    }

    // Verify: delivered bytes equal the configured slice of the source
    let len = data.len() as u64;
    let expected = if hwm == 0 {
        Vec::new()
    } else {
        let begin = start.map_or(0, u64::from).min(len) as usize;
        let stop = end.map_or(len, |end| u64::from(end).saturating_add(1).min(len)) as usize;
        data[begin..stop.max(begin)].to_vec()
    };
    assert_eq!(delivered, expected);
});
