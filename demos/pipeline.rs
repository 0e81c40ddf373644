//! Pipelined requests against a tiny in-process file service.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=framelink=debug cargo run --example pipeline
//! ```
//!
//! Pass `host port` to talk to a real service instead of the built-in one.

use std::time::Duration;

use framelink::protocol::FrameBuffer;
use framelink::{Client, Request, Response};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Answer requests in arrival order with canned bodies.
async fn serve_files(listener: TcpListener) -> std::io::Result<()> {
    let (mut stream, _) = listener.accept().await?;
    let mut buffer = FrameBuffer::new();
    let mut chunk = vec![0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }

        let frames = buffer
            .push(&chunk[..n])
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        for frame in frames {
            let request: Value = serde_json::from_slice(frame.payload())?;
            let body = match request["meta"]["path"].as_str() {
                Some("/files") => json!(["notes.txt", "mr-robot.mkv", "rust.pdf"]),
                Some("/search") => json!({ "query": request["body"]["query"], "hits": 1 }),
                _ => json!("not found"),
            };
            let payload = serde_json::to_vec(&json!({ "status": 0, "body": body }))?;

            stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
            stream.write_all(&payload).await?;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framelink=info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (host, port) = match args.as_slice() {
        [host, port] => (host.clone(), port.parse::<u16>()?),
        _ => {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let port = listener.local_addr()?.port();
            tokio::spawn(async move {
                if let Err(e) = serve_files(listener).await {
                    tracing::error!(error = %e, "Demo server failed");
                }
            });
            ("127.0.0.1".to_string(), port)
        }
    };

    let client = Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .connect(&host, port)
        .await?;

    // Both requests are on the wire before either answer comes back.
    let files = client.send(&Request::get("/files"))?;
    let search = client.send(&Request::get("/search").body(json!({ "query": "mr" })))?;

    let files: Response = serde_json::from_value(files.await?)?;
    let search: Response = serde_json::from_value(search.await?)?;
    println!("files  [{}]: {}", files.status, files.body);
    println!("search [{}]: {}", search.status, search.body);

    let stats = client.stats();
    println!(
        "sent {} frames, received {}",
        stats.frames_sent(),
        stats.frames_received()
    );

    client.close().await;
    Ok(())
}
