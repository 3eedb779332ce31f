use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use crate::config::ScopeConfig;
use crate::scope::ScopeError;

/// Something that answers "give me the latest `sample_count` samples" with a
/// raw payload. Each call is an independent request.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, sample_count: u64) -> impl Future<Output = Result<String, ScopeError>> + Send;
}

/// Opens a fresh WebSocket connection per request.
#[derive(Clone, Debug)]
pub struct WebSocketTransport {
    url: String,
    timeout: Option<Duration>,
}
impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
        }
    }
    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(config.access_url()).with_timeout(config.request_timeout())
    }
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
    async fn exchange(&self, sample_count: u64) -> Result<String, ScopeError> {
        let (mut ws, _) = connect_async(self.url.as_str()).await?;
        log::debug!("connection established, requesting {sample_count} samples");
        ws.send(Message::Text(sample_count.to_string().into())).await?;
        while let Some(message) = ws.next().await {
            let text = match message? {
                Message::Text(text) => text.to_string(),
                Message::Binary(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ScopeError::MalformedPayload(format!("binary response is not UTF-8: {e}"))
                })?,
                Message::Close(_) => break,
                _ => continue,
            };
            // The response is all we wanted; a failed close does not matter.
            ws.close(None).await.ok();
            return Ok(text);
        }
        Err(ScopeError::Connection(
            "connection closed before a response arrived".into(),
        ))
    }
}
impl Transport for WebSocketTransport {
    fn fetch(&self, sample_count: u64) -> impl Future<Output = Result<String, ScopeError>> + Send {
        async move {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.exchange(sample_count))
                    .await
                    .map_err(|_| ScopeError::Connection(format!("no response within {limit:?}")))?,
                None => self.exchange(sample_count).await,
            }
        }
    }
}

/// One scripted answer of a [`ManualTransport`].
#[derive(Clone, Debug)]
pub enum Scripted {
    Payload(String),
    Delayed(Duration, String),
    Fail(String),
}
#[derive(Default)]
struct ManualState {
    script: VecDeque<Scripted>,
    fallback: Option<String>,
    requests: Vec<u64>,
}
/// In-memory transport useful for tests and deterministic playback.
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct ManualTransport {
    state: Arc<Mutex<ManualState>>,
}
impl ManualTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        let state = ManualState {
            script: script.into_iter().collect(),
            ..ManualState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
    /// Answers every request (after the script runs out) with `payload`.
    pub fn repeating(payload: impl Into<String>) -> Self {
        let transport = Self::default();
        transport.lock().fallback = Some(payload.into());
        transport
    }
    pub fn then_repeat(self, payload: impl Into<String>) -> Self {
        self.lock().fallback = Some(payload.into());
        self
    }
    /// Sample counts of all requests made so far.
    pub fn requests(&self) -> Vec<u64> {
        self.lock().requests.clone()
    }
    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
impl Transport for ManualTransport {
    fn fetch(&self, sample_count: u64) -> impl Future<Output = Result<String, ScopeError>> + Send {
        let next = {
            let mut state = self.lock();
            state.requests.push(sample_count);
            let scripted = state.script.pop_front();
            scripted.or_else(|| state.fallback.clone().map(Scripted::Payload))
        };
        async move {
            match next {
                Some(Scripted::Payload(payload)) => Ok(payload),
                Some(Scripted::Delayed(delay, payload)) => {
                    tokio::time::sleep(delay).await;
                    Ok(payload)
                }
                Some(Scripted::Fail(reason)) => Err(ScopeError::Connection(reason)),
                None => Err(ScopeError::Connection("script exhausted".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_transport_plays_script_then_repeats() {
        let transport = ManualTransport::new([
            Scripted::Fail("refused".into()),
            Scripted::Payload("first".into()),
        ])
        .then_repeat("again");
        assert!(transport.fetch(1).await.unwrap_err().is_connection());
        assert_eq!(transport.fetch(2).await.unwrap(), "first");
        assert_eq!(transport.fetch(3).await.unwrap(), "again");
        assert_eq!(transport.requests(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connection_error() {
        // Port 1 on loopback is not listening.
        let transport = WebSocketTransport::new("ws://127.0.0.1:1/")
            .with_timeout(Some(Duration::from_secs(2)));
        let err = transport.fetch(100).await.unwrap_err();
        assert!(err.is_connection(), "{err}");
    }

    #[tokio::test]
    async fn silent_endpoint_times_out_as_a_connection_error() {
        // Accepts TCP but never answers the WebSocket handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });
        let transport = WebSocketTransport::new(format!("ws://{addr}/"))
            .with_timeout(Some(Duration::from_millis(200)));
        let err = transport.fetch(100).await.unwrap_err();
        assert!(err.is_connection(), "{err}");
        assert!(err.to_string().contains("no response within"), "{err}");
        silent.abort();
    }
}
