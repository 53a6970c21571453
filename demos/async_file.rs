//! Async file streaming through the tokio compatibility bridge.
//!
//! Run with:
//!     cargo run --example async_file

use futures_util::StreamExt;
use poolstream::{StreamEvent, StreamOptions, stream_async};
use tokio_util::compat::TokioAsyncReadCompatExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Stage a file to stream from
    let path = std::env::temp_dir().join("poolstream-async-demo.bin");
    tokio::fs::write(&path, vec![7u8; 200 * 1024]).await?;

    let file = tokio::fs::File::open(&path).await?;
    let stream = stream_async(file.compat(), StreamOptions::default())?;
    let mut stream = std::pin::pin!(stream);

    let mut chunk_count = 0;
    let mut total_bytes = 0;

    while let Some(event) = stream.next().await {
        if let StreamEvent::Data(chunk) = event? {
            chunk_count += 1;
            total_bytes += chunk.len();
            println!("chunk {}: {} bytes", chunk_count, chunk.len());
        }
    }

    println!("\nTotal: {} chunks, {} bytes", chunk_count, total_bytes);

    tokio::fs::remove_file(&path).await?;
    Ok(())
}
