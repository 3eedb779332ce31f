use thiserror::Error;
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("frame buffer is empty; nothing to draw")]
    EmptyBuffer,
    #[error("display period must be a positive number of seconds, got {0}")]
    InvalidDisplayPeriod(f64),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to render: {0}")]
    Render(String),
    #[error("corrupt device packet: {0}")]
    Packet(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
impl ScopeError {
    /// Connection failures are retried on the next tick; everything else is a
    /// problem with the data itself.
    pub fn is_connection(&self) -> bool {
        matches!(self, ScopeError::Connection(_))
    }
}
impl From<serde_json::Error> for ScopeError {
    fn from(value: serde_json::Error) -> Self {
        ScopeError::MalformedPayload(value.to_string())
    }
}
impl From<tokio_tungstenite::tungstenite::Error> for ScopeError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        ScopeError::Connection(value.to_string())
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Render(format!("{value:?}"))
    }
}
impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Render(value.to_string())
    }
}
