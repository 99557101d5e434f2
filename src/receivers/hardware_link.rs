//! The hardware-link receiver (§4.3.2): a tight poll loop against a
//! synchronous FIFO, in either the standard or compact protocol.
//!
//! The link itself is an external, strictly-blocking library (excluded from
//! this crate's scope); [`HardwareLink`] is the narrow trait this receiver
//! needs from it, and every call runs on a worker thread via
//! `spawn_blocking` so the cooperative event loop never stalls on it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{Error, HardwareLinkError};
use crate::fanout::FanOut;
use crate::gymmem::GymMemory;
use crate::hardware::{
    self, CompactEnvelope, CompactFrame, HardwareFrame, CMD_COMPACT, CMD_STANDARD,
    COMPACT_RESPONSE_LEN, STANDARD_RESPONSE_LEN,
};
use crate::idle::IdleSuppressor;
use crate::receiver::Receiver;

/// A blocking command/response FIFO, as the external hardware-link library
/// provides it. Every method may block the calling thread.
pub trait HardwareLink: Send + Sync + 'static {
    fn write(&self, bytes: &[u8]) -> std::io::Result<()>;
    fn read(&self, len: usize) -> std::io::Result<Vec<u8>>;
}

/// Which wire protocol to poll with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Standard,
    Compact,
}

pub struct HardwareLinkReceiver<L: HardwareLink> {
    link: Arc<L>,
    protocol: Protocol,
    fanout: Arc<FanOut>,
    gym: GymMemory,
    idle: IdleSuppressor,
    last_frame_counter: Option<u16>,
}

impl<L: HardwareLink> HardwareLinkReceiver<L> {
    pub fn new(link: L, protocol: Protocol, fanout: FanOut) -> Self {
        HardwareLinkReceiver {
            link: Arc::new(link),
            protocol,
            fanout: Arc::new(fanout),
            gym: GymMemory::new(),
            idle: IdleSuppressor::new(),
            last_frame_counter: None,
        }
    }

    /// Performs one command/response round trip on a worker thread.
    async fn poll(&self) -> std::io::Result<Vec<u8>> {
        let link = Arc::clone(&self.link);
        let (cmd, len) = match self.protocol {
            Protocol::Standard => (CMD_STANDARD, STANDARD_RESPONSE_LEN),
            Protocol::Compact => (CMD_COMPACT, COMPACT_RESPONSE_LEN),
        };
        tokio::task::spawn_blocking(move || {
            link.write(&[cmd])?;
            link.read(len)
        })
        .await
        .expect("hardware-link worker thread panicked")
    }

    fn note_frame_counter(&mut self, observed: u16) {
        if let Some(last) = self.last_frame_counter {
            if let Some((from, to)) = hardware::dropped_frame_range(last, observed) {
                log::warn!("hardware link dropped frames {from}..={to}");
            }
        }
        self.last_frame_counter = Some(observed);
    }

    fn publish_current(&mut self) -> Result<bool, Error> {
        let snapshot = codec::from_gym(&self.gym);
        let fingerprint = codec::fingerprint(&snapshot);
        if self.idle.should_suppress(fingerprint) {
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl<L: HardwareLink> Receiver for HardwareLinkReceiver<L> {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        log::info!("hardware link receiver polling via {:?}", self.protocol);
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                response = self.poll() => response.map_err(HardwareLinkError::Io)?,
            };

            let publish = match self.protocol {
                Protocol::Standard => {
                    let mut buf = [0u8; STANDARD_RESPONSE_LEN];
                    if response.len() != STANDARD_RESPONSE_LEN {
                        log::warn!(
                            "hardware link: short standard response ({} bytes), dropping",
                            response.len()
                        );
                        continue;
                    }
                    buf.copy_from_slice(&response);
                    let frame = HardwareFrame::parse(&buf);
                    self.note_frame_counter(frame.frame_counter);
                    self.gym.apply_hardware(&frame)?;
                    self.publish_current()?
                }
                Protocol::Compact => {
                    let mut buf = [0u8; COMPACT_RESPONSE_LEN];
                    if response.len() != COMPACT_RESPONSE_LEN {
                        log::warn!(
                            "hardware link: short compact response ({} bytes), dropping",
                            response.len()
                        );
                        continue;
                    }
                    buf.copy_from_slice(&response);
                    let envelope = match CompactEnvelope::parse(&buf) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            log::warn!("hardware link: invalid compact frame, skipping: {e}");
                            continue;
                        }
                    };
                    self.note_frame_counter(envelope.frame_counter);
                    match envelope.frame {
                        CompactFrame::StateUpdate(state) => {
                            self.gym.apply_compact_state(
                                envelope.frame_counter,
                                envelope.playstate,
                                &state,
                            )?;
                            self.publish_current()?
                        }
                        CompactFrame::FieldUpdate(update) => {
                            self.gym
                                .apply_playfield_chunk(update.vram_row, &update.chunk);
                            false
                        }
                    }
                }
            };

            if publish {
                let snapshot = codec::from_gym(&self.gym);
                let bytes = codec::encode(&snapshot).to_vec();
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = self.fanout.publish(bytes) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::mailbox;
    use std::sync::Mutex as StdMutex;

    /// A scripted link: replays a fixed sequence of responses, one per
    /// `read` call, ignoring the command byte written.
    struct ScriptedLink {
        responses: StdMutex<std::collections::VecDeque<Vec<u8>>>,
    }

    impl ScriptedLink {
        fn new(responses: Vec<Vec<u8>>) -> Self {
            ScriptedLink {
                responses: StdMutex::new(responses.into_iter().collect()),
            }
        }
    }

    impl HardwareLink for ScriptedLink {
        fn write(&self, _bytes: &[u8]) -> std::io::Result<()> {
            Ok(())
        }

        fn read(&self, _len: usize) -> std::io::Result<Vec<u8>> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "exhausted"))
        }
    }

    fn standard_frame(frame_counter: u16, game_mode: u8, playstate: u8) -> Vec<u8> {
        let mut buf = vec![0u8; STANDARD_RESPONSE_LEN];
        buf[0] = game_mode;
        buf[1] = playstate;
        buf[18..20].copy_from_slice(&frame_counter.to_le_bytes());
        buf
    }

    #[tokio::test]
    async fn standard_poll_publishes_a_frame() {
        let link = ScriptedLink::new(vec![standard_frame(1, 4, 1)]);
        let (m, mut inbox) = mailbox(4);
        let fanout = FanOut::new(vec![m]);
        let mut receiver = HardwareLinkReceiver::new(link, Protocol::Standard, fanout);

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let _ = receiver.run(run_cancel).await;
        });

        let frame = inbox.recv().await;
        assert!(frame.is_some());
        assert_eq!(frame.unwrap().len(), 73);

        cancel.cancel();
        let _ = handle.await;
    }
}
