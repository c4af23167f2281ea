// Simple RTMP Publisher Example
//
// Connects to an ingest server, runs the publish handshake and streams
// synthetic audio/video until Ctrl+C. Status events are printed as they
// arrive, the way a front end would show them.
//
// Usage:
//   cargo run --example simple_publisher -- rtmp://localhost/live/mystream
//   cargo run --example simple_publisher -- rtmps://ingest.example.com/app/key?token=abc

use std::env;
use std::sync::Arc;
use log::info;
use rtmp_publish::{ChannelSink, ClientConfig, Result, RtmpClient};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <rtmp-url>", args[0]);
        eprintln!("Example:");
        eprintln!("  {} rtmp://localhost/live/mystream", args[0]);
        std::process::exit(1);
    }
    let url = &args[1];

    let config = ClientConfig::builder()
        .chunk_size(4096)
        .build()?;

    let (sink, mut events) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{}", event);
        }
    });

    let (client, task) = RtmpClient::spawn(config, Arc::new(sink))?;

    client.connect(url.as_str()).await?;
    let snapshot = client.snapshot().await?;
    if !snapshot.state.can_publish() {
        eprintln!("Session ended in state {}", snapshot.state);
        client.shutdown().await?;
        let _ = task.await;
        std::process::exit(1);
    }

    client.start_publishing().await?;
    info!("Publishing on stream {}. Press Ctrl+C to stop", snapshot.stream_id);
    tokio::signal::ctrl_c().await?;

    info!("Stopping...");
    client.stop_publishing().await?;
    client.disconnect().await?;
    client.shutdown().await?;
    let _ = task.await;

    drop(client);
    let _ = printer.await;
    Ok(())
}
