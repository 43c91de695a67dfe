use tokio_tungstenite::tungstenite;

/// Errors raised by the realtime client.
///
/// Only [`ClientError::InvalidOrigin`] ever reaches a caller directly. The
/// other variants are logged by the subscription task and then reported
/// through `on_disconnect`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid origin (expected http:// or https://): {0}")]
    InvalidOrigin(String),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),
    #[error("websocket send failed: {0}")]
    Send(Box<tungstenite::Error>),
    #[error("websocket receive failed: {0}")]
    Receive(Box<tungstenite::Error>),
    #[error("room handler panicked while handling an event")]
    HandlerPanicked,
}
