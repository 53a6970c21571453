//! Async streaming with deferred completions.
//!
//! Run with:
//!     cargo run --example async_events

use futures_util::StreamExt;
use poolstream::{AsyncReadStream, MemorySource, StreamEvent, StreamOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Completions arrive one event-loop turn late, like a real file would
    let source = MemorySource::new("success").with_pending_hops(1);
    let options = StreamOptions::ranged(2, 4)?;
    let stream = AsyncReadStream::new(source, options)?;
    let mut stream = std::pin::pin!(stream);

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Data(chunk) => println!("data: {:?}", chunk),
            event => println!("{:?}", event),
        }
    }

    Ok(())
}
