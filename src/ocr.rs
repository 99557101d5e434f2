//! The OCR JSON payload shape (§6, "OCR JSON payload (input)").
//!
//! Every field is optional and, when present, almost always a decimal
//! string rather than a JSON number — this mirrors the original OCR
//! client's wire format, which this crate does not control. Normalization
//! into a [`crate::codec::Snapshot`] happens in [`crate::codec::from_ocr`];
//! this module only owns the shape and the (infallible) JSON decode.

use serde::Deserialize;

/// Decoded OCR observation. Field names match the wire JSON exactly, with
/// the single-letter piece-stat fields kept uppercase to match `T,J,Z,O,S,L,I`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrPayload {
    pub gameid: Option<String>,
    pub preview: Option<String>,
    pub lines: Option<String>,
    pub level: Option<String>,
    pub score: Option<String>,
    pub field: Option<String>,
    pub time: Option<f64>,
    #[serde(rename = "T")]
    pub t: Option<String>,
    #[serde(rename = "J")]
    pub j: Option<String>,
    #[serde(rename = "Z")]
    pub z: Option<String>,
    #[serde(rename = "O")]
    pub o: Option<String>,
    #[serde(rename = "S")]
    pub s: Option<String>,
    #[serde(rename = "L")]
    pub l: Option<String>,
    #[serde(rename = "I")]
    pub i: Option<String>,
}

impl OcrPayload {
    /// Parses a raw JSON byte slice into an `OcrPayload`. Unknown fields
    /// are ignored; malformed JSON is the caller's problem to log and
    /// discard per §7 (`MalformedJson`).
    pub fn parse(bytes: &[u8]) -> serde_json::Result<OcrPayload> {
        serde_json::from_slice(bytes)
    }
}
