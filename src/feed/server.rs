use std::net::SocketAddr;
use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use crate::config::FeedConfig;
use crate::feed::receiver::receive_forever;
use crate::feed::store::BatchStore;
use crate::scope::ScopeError;

/// Parses the requested batch count. Fractional counts are rounded.
pub fn parse_count(text: &str) -> Option<usize> {
    let value: f64 = text.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.round() as usize)
}

/// Pseudo data center: stores the packets a device streams to it and
/// answers each connection's single request with the newest batches.
pub struct FeedServer {
    listener: TcpListener,
    store: Arc<RwLock<BatchStore>>,
    device_addr: String,
    channels: usize,
}
impl FeedServer {
    pub async fn bind(config: &FeedConfig) -> Result<Self, ScopeError> {
        config.validate()?;
        let store = BatchStore::from_config(config)?;
        let listener = TcpListener::bind(config.addr()).await?;
        Ok(Self {
            listener,
            store: Arc::new(RwLock::new(store)),
            device_addr: config.device_addr(),
            channels: config.channels,
        })
    }
    pub fn local_addr(&self) -> Result<SocketAddr, ScopeError> {
        Ok(self.listener.local_addr()?)
    }
    pub fn store(&self) -> Arc<RwLock<BatchStore>> {
        Arc::clone(&self.store)
    }
    /// Runs until the listener fails.
    pub async fn run(self) -> Result<(), ScopeError> {
        let addr = self.local_addr()?;
        log::info!("feed listening on ws://{addr}/");
        let store = Arc::clone(&self.store);
        let (device_addr, channels) = (self.device_addr, self.channels);
        let receiver =
            tokio::spawn(async move { receive_forever(device_addr, channels, &store).await });
        let result = accept_loop(&self.listener, &self.store).await;
        receiver.abort();
        result
    }
}
async fn accept_loop(
    listener: &TcpListener,
    store: &Arc<RwLock<BatchStore>>,
) -> Result<(), ScopeError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        log::debug!("new connection from {peer}");
        let store = Arc::clone(store);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, store).await {
                log::error!("connection {peer}: {e}");
            }
        });
    }
}
async fn handle_connection(
    stream: TcpStream,
    store: Arc<RwLock<BatchStore>>,
) -> Result<(), ScopeError> {
    let mut ws = accept_async(stream).await?;
    while let Some(message) = ws.next().await {
        let text = match message? {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => return Ok(()),
            _ => continue,
        };
        match parse_count(&text) {
            Some(count) => {
                let json = store.read().await.latest(count).to_json()?;
                log::debug!("sending latest {count} batches ({} bytes)", json.len());
                ws.send(Message::Text(json.into())).await?;
            }
            None => log::error!("invalid batch count {text:?}, closing"),
        }
        break;
    }
    // The client may already be gone.
    ws.close(None).await.ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_parse_leniently() {
        assert_eq!(parse_count("100"), Some(100));
        assert_eq!(parse_count(" 99.6\n"), Some(100));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("NaN"), None);
        assert_eq!(parse_count("lots"), None);
    }

    #[tokio::test]
    async fn bind_rejects_invalid_config() {
        let config = FeedConfig {
            channels: 0,
            ..FeedConfig::default()
        };
        assert!(matches!(FeedServer::bind(&config).await, Err(ScopeError::Config(_))));
    }
}
