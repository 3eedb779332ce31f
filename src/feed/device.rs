use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use crate::config::FeedConfig;
use crate::feed::generator::SyntheticSource;
use crate::scope::ScopeError;

/// Packets buffered per session before a slow reader starts losing them.
const BACKLOG: usize = 64;

/// Pseudo device: frames a synthetic batch every interval and streams it to
/// every connected TCP session.
pub struct DeviceServer {
    listener: TcpListener,
    source: SyntheticSource,
    interval: Duration,
}
impl DeviceServer {
    pub async fn bind(config: &FeedConfig) -> Result<Self, ScopeError> {
        config.validate()?;
        let listener = TcpListener::bind(config.device_addr()).await?;
        Ok(Self {
            listener,
            source: SyntheticSource::from_config(config),
            interval: config.interval(),
        })
    }
    pub fn local_addr(&self) -> Result<SocketAddr, ScopeError> {
        Ok(self.listener.local_addr()?)
    }
    /// Runs until the listener or the packet source fails.
    pub async fn run(self) -> Result<(), ScopeError> {
        log::info!("device streaming on tcp://{}", self.local_addr()?);
        let (tx, _) = broadcast::channel(BACKLOG);
        let mut producer = tokio::spawn(produce(tx.clone(), self.source, self.interval));
        let result = tokio::select! {
            result = accept_loop(&self.listener, &tx) => result,
            joined = &mut producer => match joined {
                Ok(result) => result,
                Err(e) => Err(ScopeError::Packet(format!("packet source stopped: {e}"))),
            },
        };
        producer.abort();
        result
    }
}
async fn produce(
    tx: broadcast::Sender<Arc<Vec<u8>>>,
    mut source: SyntheticSource,
    interval: Duration,
) -> Result<(), ScopeError> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let packet = source.next_packet()?;
        // No sessions yet is fine; the packet is simply not sent.
        tx.send(Arc::new(packet)).ok();
    }
}
async fn accept_loop(
    listener: &TcpListener,
    tx: &broadcast::Sender<Arc<Vec<u8>>>,
) -> Result<(), ScopeError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("device session opened by {peer}");
        let rx = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = stream_packets(stream, rx).await {
                log::warn!("device session {peer}: {e}");
            }
            log::info!("device session {peer} closed");
        });
    }
}
async fn stream_packets(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<Arc<Vec<u8>>>,
) -> Result<(), ScopeError> {
    loop {
        match rx.recv().await {
            Ok(packet) => stream.write_all(&packet).await?,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                log::warn!("session fell behind, {missed} packets skipped");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
