//! Configuration shapes and factories (§4.6, supplemental): plain
//! `serde::Deserialize` data mirroring the original YAML layout, plus the
//! two factories that turn it into live receivers/senders. Parsing the YAML
//! itself is left to the excluded CLI entry point; this module only
//! constructs objects from already-deserialized values.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fanout::{FanOut, Mailbox};
use crate::receiver::Receiver;
use crate::receivers::capture_replay::CaptureReplayReceiver;
use crate::receivers::file_replay::FileReplayReceiver;
use crate::receivers::ocr_tcp::OcrTcpReceiver;
use crate::sender::Sender;
use crate::senders::capture_file::CaptureFileSender;
use crate::senders::websocket::WebSocketSender;

#[derive(Debug, Clone, Deserialize)]
pub struct OcrServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HardwareLinkConfig {
    pub compact: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalFileReplayConfig {
    pub filename: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacketCaptureConfig {
    pub filename: PathBuf,
    pub dst_host: IpAddr,
    pub length: usize,
}

/// Mirrors the original system's `ReceiverConfig`: exactly one of these
/// fields is expected to be populated.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReceiverConfig {
    pub ocr_server: Option<OcrServerConfig>,
    pub edlink: Option<HardwareLinkConfig>,
    pub local_file: Option<LocalFileReplayConfig>,
    pub packet_capture: Option<PacketCaptureConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSenderConfig {
    pub uri: String,
    #[serde(default)]
    pub no_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureFileSenderConfig {
    pub filename: PathBuf,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SendersConfig {
    #[serde(default)]
    pub websockets: Vec<WebSocketSenderConfig>,
    pub local_file: Option<CaptureFileSenderConfig>,
}

/// Builds the one receiver named by `cfg`, wiring it to `mailboxes`.
///
/// Mirrors the original system's `get_receiver` dispatch, but returns a
/// descriptive [`ConfigError`] instead of exiting the process — that
/// forcible-exit behavior belongs to the excluded CLI entry point.
pub fn build_receiver(
    cfg: &ReceiverConfig,
    mailboxes: Vec<Mailbox>,
) -> Result<Box<dyn Receiver>, ConfigError> {
    let fanout = FanOut::new(mailboxes);

    if let Some(ocr) = &cfg.ocr_server {
        return Ok(Box::new(OcrTcpReceiver::new(ocr.port, fanout)));
    }
    if cfg.edlink.is_some() {
        // The hardware-link receiver is generic over the `HardwareLink`
        // trait, which this factory has no way to supply a concrete
        // implementation for (the link device is provided by the caller,
        // not by configuration). Callers needing hardware-link input
        // construct `HardwareLinkReceiver` directly.
        return Err(ConfigError::MissingField {
            field: "edlink",
            context: "build_receiver (construct HardwareLinkReceiver directly instead)",
        });
    }
    if let Some(local_file) = &cfg.local_file {
        return Ok(Box::new(FileReplayReceiver::new(
            local_file.filename.clone(),
            fanout,
        )));
    }
    if let Some(capture) = &cfg.packet_capture {
        return Ok(Box::new(CaptureReplayReceiver::new(
            capture.filename.clone(),
            capture.dst_host,
            capture.length,
            fanout,
        )));
    }
    Err(ConfigError::NoReceiverSpecified)
}

/// Builds every sender named by `cfg`: zero or more WebSocket senders and an
/// optional capture-file sender, each paired with a freshly-created mailbox
/// the caller hands to [`FanOut`]. Errors if the resulting list is empty.
pub fn build_senders(
    cfg: &SendersConfig,
) -> Result<(Vec<Box<dyn Sender>>, Vec<Mailbox>), ConfigError> {
    let mut senders: Vec<Box<dyn Sender>> = Vec::new();
    let mut mailboxes = Vec::new();

    for ws in &cfg.websockets {
        let (mailbox, inbox) = crate::fanout::mailbox(crate::fanout::DEFAULT_MAILBOX_CAPACITY);
        mailboxes.push(mailbox);
        senders.push(Box::new(WebSocketSender::new(ws.uri.clone(), !ws.no_verify, inbox)));
    }

    if let Some(local_file) = &cfg.local_file {
        let (mailbox, inbox) = crate::fanout::mailbox(crate::fanout::DEFAULT_MAILBOX_CAPACITY);
        mailboxes.push(mailbox);
        senders.push(Box::new(CaptureFileSender::new(
            local_file.filename.clone(),
            local_file.overwrite,
            inbox,
        )));
    }

    if senders.is_empty() {
        return Err(ConfigError::NoSendersSpecified);
    }
    Ok((senders, mailboxes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_receiver_variant_is_an_error() {
        let cfg = ReceiverConfig::default();
        let err = build_receiver(&cfg, vec![]).unwrap_err();
        assert_eq!(err, ConfigError::NoReceiverSpecified);
    }

    #[test]
    fn ocr_server_variant_builds_a_receiver() {
        let cfg = ReceiverConfig {
            ocr_server: Some(OcrServerConfig { port: 3338 }),
            ..Default::default()
        };
        assert!(build_receiver(&cfg, vec![]).is_ok());
    }

    #[test]
    fn empty_senders_config_is_an_error() {
        let cfg = SendersConfig::default();
        let err = build_senders(&cfg).unwrap_err();
        assert_eq!(err, ConfigError::NoSendersSpecified);
    }
}
