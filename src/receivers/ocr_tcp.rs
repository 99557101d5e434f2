//! The OCR-over-TCP receiver (§4.3.1): a length-framed JSON stream,
//! accepting any number of simultaneous clients, all driving the same
//! fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, ErrorKind};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::Error;
use crate::fanout::FanOut;
use crate::idle::IdleSuppressor;
use crate::ocr::OcrPayload;
use crate::receiver::Receiver;

/// Resync threshold: a declared frame length above this is treated as a
/// misaligned stream rather than a real payload (§4.3.1).
const MAX_PAYLOAD_LEN: u32 = 1000;

pub struct OcrTcpReceiver {
    port: u16,
    fanout: Arc<FanOut>,
    idle: Arc<Mutex<IdleSuppressor>>,
}

impl OcrTcpReceiver {
    pub fn new(port: u16, fanout: FanOut) -> Self {
        OcrTcpReceiver {
            port,
            fanout: Arc::new(fanout),
            idle: Arc::new(Mutex::new(IdleSuppressor::new())),
        }
    }
}

#[async_trait]
impl Receiver for OcrTcpReceiver {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(crate::error::OcrTcpError::Io)?;
        log::info!("OCR TCP receiver listening on port {}", self.port);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("OCR TCP receiver cancelled");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(crate::error::OcrTcpError::Io)?;
                    log::debug!("OCR TCP client connected: {peer}");
                    let fanout = Arc::clone(&self.fanout);
                    let idle = Arc::clone(&self.idle);
                    let child_cancel = cancel.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, fanout, idle, child_cancel).await;
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    fanout: Arc<FanOut>,
    idle: Arc<Mutex<IdleSuppressor>>,
    cancel: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = read_frame(&mut stream) => frame,
        };

        let payload = match payload {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                log::warn!("OCR TCP read error, dropping connection: {e}");
                return;
            }
        };

        match OcrPayload::parse(&payload) {
            Ok(observation) => {
                let snapshot = codec::from_ocr(&observation);
                let fingerprint = codec::fingerprint(&snapshot);
                let suppress = idle.lock().await.should_suppress(fingerprint);
                if !suppress {
                    fanout.publish(codec::encode(&snapshot).to_vec()).await;
                }
            }
            Err(e) => log::error!("malformed OCR JSON payload, dropping frame: {e}"),
        }
    }
}

/// Reads one logical frame, transparently resyncing past any declared
/// length above `MAX_PAYLOAD_LEN` (§4.3.1 steps 1-3). Returns `Ok(None)` on
/// a clean connection close.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let length = u32::from_le_bytes(len_buf);

        if length > MAX_PAYLOAD_LEN {
            log::warn!("OCR TCP resync: declared length {length} exceeds {MAX_PAYLOAD_LEN}, draining");
            loop {
                let mut chunk = [0u8; MAX_PAYLOAD_LEN as usize];
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(None);
                }
                if n < chunk.len() {
                    break;
                }
            }
            continue;
        }

        let mut payload = vec![0u8; length as usize];
        stream.read_exact(&mut payload).await?;
        return Ok(Some(payload));
    }
}
