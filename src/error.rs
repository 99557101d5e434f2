//! Crate-wide error taxonomy.
//!
//! Dispositions follow the error table in the specification: most variants
//! here are either logged-and-recovered at the call site (they never
//! actually reach a caller as an `Err`) or they end exactly one task
//! (a receiver or a single sender), never the whole process.

use thiserror::Error;

/// Errors raised while reducing observations into [`crate::gymmem::GymMemory`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReducerError {
    /// `playstate` did not match any of the cases the state machine knows
    /// about. Per the specification this is a definite error, not a silent
    /// fall-through, and fails the owning receiver task.
    #[error("unexpected playstate {0}")]
    UnexpectedPlaystate(u8),
}

/// Errors raised while decoding a legacy (v1/v2) or canonical (v3) wire
/// frame read back from a capture file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short to decode a version {version} frame: need {expected} bytes, have {actual}")]
    ShortBuffer {
        version: u8,
        expected: usize,
        actual: usize,
    },
    #[error("unrecognized frame version {0}")]
    UnknownVersion(u8),
}

/// Errors specific to the OCR-over-TCP receiver.
#[derive(Debug, Error)]
pub enum OcrTcpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("payload was not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Errors specific to the hardware-link receiver.
#[derive(Debug, Error)]
pub enum HardwareLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compact-protocol header/footer XOR check failed: header={header:#06x} footer={footer:#06x}")]
    InvalidHeaderXor { header: u16, footer: u16 },
    #[error(transparent)]
    Reducer(#[from] ReducerError),
}

/// Errors specific to capture (pcap-derived) replay.
#[derive(Debug, Error)]
pub enum CaptureReplayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket frame too short to contain a complete header")]
    TruncatedFrame,
}

/// Errors specific to gzip file replay.
#[derive(Debug, Error)]
pub enum FileReplayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors specific to the WebSocket sender.
#[derive(Debug, Error)]
pub enum WebSocketSenderError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),
}

/// Errors specific to the gzip capture-file sender.
#[derive(Debug, Error)]
pub enum CaptureFileSenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path} already exists and overwrite was not requested")]
    FileExistsNoOverwrite { path: String },
}

/// Errors raised while building a receiver or sender from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no receiver variant was populated in configuration")]
    NoReceiverSpecified,
    #[error("no sender variant was populated in configuration")]
    NoSendersSpecified,
    #[error("{field} must be specified for {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },
}

/// The top-level crate error, used by orchestration code that must treat
/// every subsystem's failure uniformly (e.g. `tokio::try_join!`).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reducer(#[from] ReducerError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    OcrTcp(#[from] OcrTcpError),
    #[error(transparent)]
    HardwareLink(#[from] HardwareLinkError),
    #[error(transparent)]
    CaptureReplay(#[from] CaptureReplayError),
    #[error(transparent)]
    FileReplay(#[from] FileReplayError),
    #[error(transparent)]
    WebSocketSender(#[from] WebSocketSenderError),
    #[error(transparent)]
    CaptureFileSender(#[from] CaptureFileSenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
