//! Lifecycle tests
//!
//! Close propagation across tasks: a closed sink closes every registered
//! handle — interrupting reads parked on live-but-silent connections, not
//! just pending reconnects — and empties the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use journalwire_core::frame::{FrameHeader, SYNC_IDX_LEN};
use journalwire_core::MemIndexedJournal;
use journalwire_sink::{Sink, SinkConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

fn test_config() -> SinkConfig {
    SinkConfig {
        min_buffer_size: 1024,
        reconnect_delay: Duration::from_millis(10),
    }
}

/// An address nothing listens on.
async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A source that accepts, reads the resume request, optionally replies,
/// then goes silent with the socket held open.
async fn silent_source(reply: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 8];
        stream.read_exact(&mut request).await.unwrap();
        if !reply.is_empty() {
            stream.write_all(&reply).await.unwrap();
        }
        // not a single frame more; hold the connection until the sink
        // hangs up
        let mut scratch = [0u8; 1];
        let _ = stream.read(&mut scratch).await;
    });
    addr
}

#[tokio::test]
async fn test_advance_on_a_closed_sink_reports_idle() {
    let journal = Arc::new(MemIndexedJournal::new(64));
    let sink = Sink::indexed(journal, dead_addr().await, test_config());
    let mut tailer = sink.create_tailer().unwrap();

    sink.close();
    assert!(!tailer.advance().await.unwrap());
}

#[tokio::test]
async fn test_close_unblocks_the_reconnect_loop() {
    let journal = Arc::new(MemIndexedJournal::new(64));
    let sink = Arc::new(Sink::indexed(journal, dead_addr().await, test_config()));
    let mut tailer = sink.create_tailer().unwrap();

    let closer = sink.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        closer.close();
    });

    // the advance is stuck retrying the dead address until close() fires
    // the shared signal
    let advanced = timeout(Duration::from_secs(5), tailer.advance())
        .await
        .expect("reconnect loop did not observe close")
        .unwrap();
    assert!(!advanced);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn test_close_interrupts_a_read_blocked_on_a_silent_connection() {
    // the handle connects and parks in a socket read: the source is live
    // but never sends a frame, so no data or EOF will ever wake it
    let addr = silent_source(Vec::new()).await;
    let journal = Arc::new(MemIndexedJournal::new(64));
    let sink = Arc::new(Sink::indexed(journal, addr, test_config()));
    let mut tailer = sink.create_tailer().unwrap();

    let closer = sink.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        closer.close();
    });

    let advanced = timeout(Duration::from_secs(5), tailer.advance())
        .await
        .expect("blocked read did not observe close")
        .unwrap();
    assert!(!advanced);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn test_close_interrupts_a_blocked_memory_advance() {
    // the source confirms the start position, then goes quiet
    let reply = FrameHeader {
        size: SYNC_IDX_LEN,
        index: -1,
    }
    .to_bytes()
    .to_vec();
    let addr = silent_source(reply).await;
    let sink = Arc::new(Sink::memory(addr, test_config()));
    let mut tailer = sink.create_tailer().unwrap();

    assert!(timeout(Duration::from_secs(5), tailer.to_start())
        .await
        .expect("positioning stalled")
        .unwrap());

    let closer = sink.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        closer.close();
    });

    // connected and idle: the advance is parked waiting for a frame that
    // never comes until close() interrupts it
    let advanced = timeout(Duration::from_secs(5), tailer.advance())
        .await
        .expect("blocked read did not observe close")
        .unwrap();
    assert!(!advanced);
}

#[tokio::test]
async fn test_close_unblocks_a_memory_seek() {
    let sink = Arc::new(Sink::memory(dead_addr().await, test_config()));
    let mut tailer = sink.create_tailer().unwrap();

    let closer = sink.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        closer.close();
    });

    let positioned = timeout(Duration::from_secs(5), tailer.to_end())
        .await
        .expect("reconnect loop did not observe close")
        .unwrap();
    assert!(!positioned);
}

#[tokio::test]
async fn test_handle_close_deregisters() {
    let sink = Sink::memory(dead_addr().await, test_config());
    let mut a = sink.create_tailer().unwrap();
    let _b = sink.create_excerpt().unwrap();
    assert_eq!(sink.live_handles(), 2);

    a.close();
    assert_eq!(sink.live_handles(), 1);

    // closing again is harmless
    a.close();
    assert_eq!(sink.live_handles(), 1);
}

#[tokio::test]
async fn test_sink_close_empties_the_registry() {
    let sink = Sink::memory(dead_addr().await, test_config());
    let _a = sink.create_tailer().unwrap();
    let _b = sink.create_tailer().unwrap();
    assert_eq!(sink.live_handles(), 2);

    sink.close();
    assert_eq!(sink.live_handles(), 0);

    sink.close();
    assert_eq!(sink.live_handles(), 0);
}
