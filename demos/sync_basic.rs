//! Basic synchronous streaming example.
//!
//! Run with:
//!     cargo run --example sync_basic

use poolstream::{StreamEvent, StreamOptions, memory_stream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data = "some form data held in memory";
    let stream = memory_stream(data, StreamOptions::default())?;

    println!("Streaming {} bytes...\n", data.len());

    let mut chunk_count = 0;
    let mut total_bytes = 0;

    for event in stream {
        match event? {
            StreamEvent::Open => println!("open"),
            StreamEvent::Ready => println!("ready"),
            StreamEvent::Data(chunk) => {
                chunk_count += 1;
                total_bytes += chunk.len();
                println!("data: {:?} ({} bytes)", chunk, chunk.len());
            }
            StreamEvent::End => println!("end"),
            StreamEvent::Close => println!("close"),
        }
    }

    println!("\nTotal: {} chunks, {} bytes", chunk_count, total_bytes);
    Ok(())
}
