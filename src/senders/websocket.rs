//! The WebSocket upstream sender (§4.5.1): relays fan-out frames to a
//! single remote endpoint as binary messages.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::Connector;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, WebSocketSenderError};
use crate::fanout::Inbox;
use crate::sender::Sender;

pub struct WebSocketSender {
    uri: String,
    verify_tls: bool,
    inbox: Inbox,
}

impl WebSocketSender {
    pub fn new(uri: String, verify_tls: bool, inbox: Inbox) -> Self {
        WebSocketSender {
            uri,
            verify_tls,
            inbox,
        }
    }

    fn connector(&self) -> Result<Option<Connector>, WebSocketSenderError> {
        if self.verify_tls {
            return Ok(None);
        }
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        Ok(Some(Connector::NativeTls(tls)))
    }
}

#[async_trait]
impl Sender for WebSocketSender {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        let connector = self.connector().map_err(Error::WebSocketSender)?;
        let (stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
            &self.uri,
            None,
            false,
            connector,
        )
        .await
        .map_err(WebSocketSenderError::WebSocket)?;
        log::info!("websocket sender connected to {}", self.uri);

        let (mut write, mut read) = stream.split();

        let read_task = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(msg) => log::debug!("websocket sender received inbound message: {msg:?}"),
                    Err(e) => {
                        log::warn!("websocket sender read error: {e}");
                        break;
                    }
                }
            }
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.close().await;
                    read_task.abort();
                    return Ok(());
                }
                frame = self.inbox.recv() => {
                    match frame {
                        Some(bytes) => {
                            if let Err(e) = write.send(Message::Binary(bytes)).await {
                                log::warn!("websocket sender write error: {e}");
                                read_task.abort();
                                return Err(WebSocketSenderError::WebSocket(e).into());
                            }
                        }
                        None => {
                            log::info!("websocket sender received end-of-stream, closing");
                            let _ = write.close().await;
                            read_task.abort();
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
