//! # Status connection transport.
//!
//! [`Connector`] opens one [`Connection`] per target; [`WsConnector`] does so
//! over websockets at `<ws_base>/ws/<phone>`. The registry only sees the
//! traits, so tests substitute in-memory connections.
//!
//! A connection yields [`Inbound`] items until it reports `Closed` or `Failed`:
//! ```text
//! Text frame     ─► Inbound::Text(json)
//! Close frame    ─► Inbound::Closed(code)          (1005 if the frame has no code)
//! Stream end     ─► Inbound::Closed(1006)
//! I/O error      ─► Inbound::Failed(ConnectError::Stream)
//! Ping/Pong      ─► skipped (answered by tungstenite)
//! ```

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::protocol::{CloseFrame, Message},
};
use tracing::debug;

use crate::error::ConnectError;
use crate::model::CallTarget;
use crate::policies::CloseCode;

/// Close code reported for a close frame without a status code.
const NO_STATUS: CloseCode = CloseCode(1005);

/// One item read from a status connection.
#[derive(Debug)]
pub enum Inbound {
    /// A text frame (expected to hold a push message).
    Text(String),
    /// The peer closed the connection, or the stream ended.
    Closed(CloseCode),
    /// The connection broke.
    Failed(ConnectError),
}

/// A live status connection.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Reads the next item. After `Closed` or `Failed` the connection is done.
    async fn next(&mut self) -> Inbound;

    /// Closes the connection with `code`. Best effort.
    async fn close(&mut self, code: CloseCode);
}

/// Opens status connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a connection for `target`.
    async fn open(&self, target: &CallTarget) -> Result<Box<dyn Connection>, ConnectError>;
}

/// Websocket connector for `<ws_base>/ws/<phone>`.
#[derive(Clone, Debug)]
pub struct WsConnector {
    base: String,
}

impl WsConnector {
    /// Creates a connector for the given base address (`ws://host:port`).
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Endpoint for a target.
    pub fn url_for(&self, target: &CallTarget) -> String {
        format!("{}/ws/{}", self.base.trim_end_matches('/'), target.phone_number)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, target: &CallTarget) -> Result<Box<dyn Connection>, ConnectError> {
        let url = self.url_for(target);
        debug!(target_id = %target.id, url = %url, "opening status connection");

        let (ws, _resp) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectError::Open(format!("{url}: {e}")))?;
        Ok(Box::new(WsConnection { ws }))
    }
}

/// Websocket-backed [`Connection`].
pub struct WsConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next(&mut self) -> Inbound {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Inbound::Text(text),
                    Err(e) => {
                        return Inbound::Failed(ConnectError::Decode(format!(
                            "binary frame is not utf-8: {e}"
                        )));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map_or(NO_STATUS, |f| CloseCode(u16::from(f.code)));
                    return Inbound::Closed(code);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Inbound::Failed(ConnectError::Stream(e.to_string())),
                None => return Inbound::Closed(CloseCode::ABNORMAL),
            }
        }
    }

    async fn close(&mut self, code: CloseCode) {
        let frame = CloseFrame {
            code: code.as_u16().into(),
            reason: "client disconnect".into(),
        };
        if let Err(e) = self.ws.send(Message::Close(Some(frame))).await {
            debug!(error = %e, "close frame not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_phone_number_path() {
        let c = WsConnector::new("ws://127.0.0.1:8000/");
        let t = CallTarget::new("1", "+15550001", "Ada");
        assert_eq!(c.url_for(&t), "ws://127.0.0.1:8000/ws/+15550001");
    }
}
