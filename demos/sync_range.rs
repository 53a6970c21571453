//! Ranged file streaming with a small watermark.
//!
//! Run with:
//!     cargo run --example sync_range

use poolstream::{StreamOptions, file_stream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Stage a small file to stream from
    let path = std::env::temp_dir().join("poolstream-demo.txt");
    std::fs::write(&path, b"the quick brown fox jumps over the lazy dog")?;

    // Bytes 4..=18 ("quick brown fox"), four bytes at a time
    let options = StreamOptions::ranged(4, 18)?.with_high_water_mark(4);
    let stream = file_stream(&path, options)?;

    let mut collected = Vec::new();
    for chunk in stream.chunks() {
        let chunk = chunk?;
        println!("chunk: {:?}", chunk);
        collected.extend_from_slice(&chunk);
    }

    println!("\ncollected: {}", String::from_utf8_lossy(&collected));

    std::fs::remove_file(&path)?;
    Ok(())
}
