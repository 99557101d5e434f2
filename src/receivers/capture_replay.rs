//! Packet-capture replay (§4.3.3): extracts WebSocket payloads addressed to
//! a configured host from a pcap file, demasks them per RFC 6455, and
//! replays the matching ones into the fan-out.

use std::net::IpAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use etherparse::{SlicedPacket, TransportSlice};
use pcap_parser::data::{get_packetdata, PacketData};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Linktype, LegacyPcapReader, PcapBlockOwned, PcapError};
use tokio_util::sync::CancellationToken;

use crate::error::{CaptureReplayError, Error};
use crate::fanout::FanOut;
use crate::receiver::Receiver;

pub struct CaptureReplayReceiver {
    path: PathBuf,
    dst_host: IpAddr,
    payload_len: usize,
    fanout: FanOut,
}

impl CaptureReplayReceiver {
    pub fn new(path: PathBuf, dst_host: IpAddr, payload_len: usize, fanout: FanOut) -> Self {
        CaptureReplayReceiver {
            path,
            dst_host,
            payload_len,
            fanout,
        }
    }
}

/// A RFC 6455 WebSocket frame, demasked. Length extensions use the
/// corrected 8-byte width for the 127 marker (the original system reads
/// only 4, a known deviation we do not reproduce — see the module's
/// expanded design notes).
struct WebSocketFrame {
    payload_len: u64,
    data: Vec<u8>,
}

impl WebSocketFrame {
    fn parse(blob: &[u8]) -> Result<WebSocketFrame, CaptureReplayError> {
        if blob.len() < 2 {
            return Err(CaptureReplayError::TruncatedFrame);
        }
        let second_byte = blob[1];
        let masked = second_byte & 0b1000_0000 != 0;
        let mut len = (second_byte & 0b0111_1111) as u64;
        let mut cursor = 2usize;

        if len == 126 {
            let bytes = blob
                .get(cursor..cursor + 2)
                .ok_or(CaptureReplayError::TruncatedFrame)?;
            len = u16::from_be_bytes([bytes[0], bytes[1]]) as u64;
            cursor += 2;
        } else if len == 127 {
            let bytes = blob
                .get(cursor..cursor + 8)
                .ok_or(CaptureReplayError::TruncatedFrame)?;
            len = u64::from_be_bytes(bytes.try_into().unwrap());
            cursor += 8;
        }

        let data = if masked {
            let key = blob
                .get(cursor..cursor + 4)
                .ok_or(CaptureReplayError::TruncatedFrame)?
                .to_vec();
            cursor += 4;
            let payload = blob.get(cursor..).ok_or(CaptureReplayError::TruncatedFrame)?;
            payload
                .iter()
                .enumerate()
                .map(|(i, b)| b ^ key[i % 4])
                .collect()
        } else {
            blob.get(cursor..)
                .ok_or(CaptureReplayError::TruncatedFrame)?
                .to_vec()
        };

        Ok(WebSocketFrame {
            payload_len: len,
            data,
        })
    }
}

/// Reads `path`, returning the demasked data of every WebSocket frame
/// addressed to `dst_host` whose declared inner length equals
/// `payload_len`. Blocking; meant to run on a worker thread.
fn extract_payloads(
    path: &std::path::Path,
    dst_host: IpAddr,
    payload_len: usize,
) -> Result<Vec<Vec<u8>>, CaptureReplayError> {
    let file = std::fs::File::open(path)?;
    let mut reader = LegacyPcapReader::new(65536, file).map_err(|e| {
        CaptureReplayError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    })?;

    let mut linktype = Linktype::ETHERNET;
    let mut out = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(header) => linktype = header.network,
                    PcapBlockOwned::Legacy(packet) => {
                        if let Some(PacketData::L2(raw)) =
                            get_packetdata(packet.data, linktype, packet.caplen as usize)
                        {
                            if let Some(bytes) = extract_one(raw, dst_host, payload_len) {
                                out.push(bytes);
                            }
                        }
                    }
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(|e| {
                    CaptureReplayError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    ))
                })?;
            }
            Err(e) => {
                return Err(CaptureReplayError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                )))
            }
        }
    }
    Ok(out)
}

fn extract_one(raw: &[u8], dst_host: IpAddr, payload_len: usize) -> Option<Vec<u8>> {
    let sliced = SlicedPacket::from_ethernet(raw).ok()?;
    let dst_matches = sliced.ip.as_ref().is_some_and(|ip| match ip {
        etherparse::InternetSlice::Ipv4(header, _) => {
            IpAddr::V4(header.destination_addr()) == dst_host
        }
        etherparse::InternetSlice::Ipv6(header, _) => {
            IpAddr::V6(header.destination_addr()) == dst_host
        }
    });
    if !dst_matches {
        return None;
    }
    let TransportSlice::Tcp(_) = sliced.transport? else {
        return None;
    };
    if sliced.payload.is_empty() {
        return None;
    }
    let frame = WebSocketFrame::parse(sliced.payload).ok()?;
    if frame.payload_len as usize == payload_len {
        Some(frame.data)
    } else {
        None
    }
}

#[async_trait]
impl Receiver for CaptureReplayReceiver {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        let path = self.path.clone();
        let dst_host = self.dst_host;
        let payload_len = self.payload_len;
        let frames = tokio::task::spawn_blocking(move || extract_payloads(&path, dst_host, payload_len))
            .await
            .expect("capture replay worker thread panicked")?;

        log::info!("capture replay: {} matching frames loaded from {:?}", frames.len(), self.path);

        for frame in frames {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = self.fanout.publish(frame) => {}
            }
        }
        self.fanout.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masked_frame(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
        let mut out = vec![0x82u8]; // FIN + binary opcode
        let masked_bit = 0b1000_0000u8;
        if payload.len() < 126 {
            out.push(masked_bit | payload.len() as u8);
        } else if payload.len() <= 0xFFFF {
            out.push(masked_bit | 126);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        } else {
            out.push(masked_bit | 127);
            out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        }
        out.extend_from_slice(&key);
        for (i, b) in payload.iter().enumerate() {
            out.push(b ^ key[i % 4]);
        }
        out
    }

    #[test]
    fn demasks_a_short_frame() {
        let payload = b"hello";
        let blob = masked_frame(payload, [0xAA, 0xBB, 0xCC, 0xDD]);
        let frame = WebSocketFrame::parse(&blob).unwrap();
        assert_eq!(frame.data, payload.to_vec());
        assert_eq!(frame.payload_len, payload.len() as u64);
    }

    #[test]
    fn reads_extended_127_length_with_corrected_eight_byte_width() {
        let payload = vec![7u8; 200];
        let blob = masked_frame(&payload, [1, 2, 3, 4]);
        // Force the 127 marker even though 200 fits in 126's 2-byte form,
        // to exercise the 8-byte length path directly.
        let mut forced = vec![0x82u8, 0b1111_1111];
        forced.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        forced.extend_from_slice(&[1, 2, 3, 4]);
        for (i, b) in payload.iter().enumerate() {
            forced.push(b ^ [1, 2, 3, 4][i % 4]);
        }
        let frame = WebSocketFrame::parse(&forced).unwrap();
        assert_eq!(frame.payload_len, 200);
        assert_eq!(frame.data, payload);
        let _ = blob;
    }

    #[test]
    fn truncated_frame_is_an_error() {
        assert!(matches!(
            WebSocketFrame::parse(&[0x82]),
            Err(CaptureReplayError::TruncatedFrame)
        ));
    }
}
