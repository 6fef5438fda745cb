//! Minimal telemetry viewer
//!
//! Run with: cargo run --example viewer [ADDR]
//!
//! Connects to ws://ADDR/ws (default 127.0.0.1:8899) and prints every
//! sample it receives.

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8899".to_string())
        .replace("localhost", "127.0.0.1");
    let url = format!("ws://{}/ws", addr);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("viewer=info".parse()?),
        )
        .init();

    let (mut ws, _) = connect_async(url.as_str()).await?;
    tracing::info!(url = %url, "Connected");

    loop {
        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => println!("got {}", text),
                Some(Ok(Message::Binary(data))) => println!("got {} bytes", data.len()),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "Relay closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Connection error");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                ws.close(None).await.ok();
                break;
            }
        }
    }

    Ok(())
}
