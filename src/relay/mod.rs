//! Carbon ingest relay.
//!
//! Accepts plaintext carbon connections, rewrites each line into
//! labelled-graphite form and streams the result to the backend's carbon
//! ingest port over one upstream connection per client. Writes are
//! buffered and flushed opportunistically; backpressure from the backend
//! stalls the reader through the buffered writer.

pub mod line;

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::RelayConfig;

const READ_BUF_SIZE: usize = 64 * 1024;
const WRITE_BUF_SIZE: usize = 64 * 1024;
/// Flush once less than this much buffer space remains.
const FLUSH_HEADROOM: usize = 8 * 1024;

/// Bind and serve until the token is cancelled.
pub async fn run(config: RelayConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.listen).await?;
    tracing::info!(addr = %config.listen, upstream = %config.carbon_addr, "carbon relay listening");
    serve(listener, config.carbon_addr, shutdown).await
}

/// Accept loop over an already-bound listener. Waits for open connections
/// to drain after cancellation.
pub async fn serve(
    listener: TcpListener,
    carbon_addr: String,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((conn, peer)) => {
                        let carbon_addr = carbon_addr.clone();
                        tracker.spawn(async move {
                            if let Err(err) = relay_connection(conn, &carbon_addr).await {
                                tracing::error!(peer = %peer, error = %err, "relay connection failed");
                            }
                        });
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "accept failed");
                    }
                }
            }
        }
    }

    tracker.close();
    tracker.wait().await;
    Ok(())
}

async fn relay_connection(conn: TcpStream, carbon_addr: &str) -> io::Result<()> {
    let upstream = TcpStream::connect(carbon_addr).await?;

    let mut reader = BufReader::with_capacity(READ_BUF_SIZE, conn);
    let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, upstream);

    let mut raw = Vec::with_capacity(1024);
    let mut rewritten = Vec::with_capacity(1024);
    loop {
        raw.clear();
        // A zero read is a clean close: carbon relays drop the connection
        // after each batch.
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        if raw.is_empty() {
            continue;
        }

        rewritten.clear();
        if !line::convert_line(&raw, &mut rewritten) {
            tracing::debug!(line = %String::from_utf8_lossy(&raw), "ignoring invalid carbon line");
            continue;
        }

        writer.write_all(&rewritten).await?;
        if writer.buffer().len() > WRITE_BUF_SIZE - FLUSH_HEADROOM {
            writer.flush().await?;
        }
    }

    writer.flush().await?;
    Ok(())
}
