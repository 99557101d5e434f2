//! The gzip capture-file sender (§4.5.2): appends length-prefixed frames to
//! disk, buffering in memory and flushing periodically.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio_util::sync::CancellationToken;

use crate::error::{CaptureFileSenderError, Error};
use crate::fanout::Inbox;
use crate::sender::Sender;

/// Flush the buffered gzip writer to disk after this many frames.
const FLUSH_EVERY: usize = 500;

pub struct CaptureFileSender {
    path: PathBuf,
    overwrite: bool,
    inbox: Inbox,
}

impl CaptureFileSender {
    pub fn new(path: PathBuf, overwrite: bool, inbox: Inbox) -> Self {
        CaptureFileSender {
            path,
            overwrite,
            inbox,
        }
    }

    fn open(&self) -> Result<GzEncoder<std::fs::File>, CaptureFileSenderError> {
        if self.path.exists() && !self.overwrite {
            return Err(CaptureFileSenderError::FileExistsNoOverwrite {
                path: self.path.display().to_string(),
            });
        }
        let file = std::fs::File::create(&self.path)?;
        Ok(GzEncoder::new(file, Compression::default()))
    }
}

#[async_trait]
impl Sender for CaptureFileSender {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        let mut writer = self.open().map_err(Error::CaptureFileSender)?;
        log::info!("capture file sender writing to {:?}", self.path);

        let mut since_flush = 0usize;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    writer.flush().map_err(CaptureFileSenderError::Io)?;
                    return Ok(());
                }
                frame = self.inbox.recv() => {
                    match frame {
                        Some(bytes) => {
                            writer
                                .write_all(&(bytes.len() as u32).to_le_bytes())
                                .map_err(CaptureFileSenderError::Io)?;
                            writer.write_all(&bytes).map_err(CaptureFileSenderError::Io)?;
                            since_flush += 1;
                            if since_flush >= FLUSH_EVERY {
                                writer.flush().map_err(CaptureFileSenderError::Io)?;
                                since_flush = 0;
                            }
                        }
                        None => {
                            log::info!("capture file sender received end-of-stream, flushing");
                            writer.flush().map_err(CaptureFileSenderError::Io)?;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{mailbox, FanOut};
    use std::io::Read;

    #[tokio::test]
    async fn refuses_to_overwrite_existing_file_by_default() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ntc_bridge_capfile_test_{}.gz", std::process::id()));
        std::fs::write(&path, b"existing").unwrap();

        let (_m, inbox) = mailbox(4);
        let sender = CaptureFileSender::new(path.clone(), false, inbox);
        let err = sender.open().unwrap_err();
        assert!(matches!(err, CaptureFileSenderError::FileExistsNoOverwrite { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn writes_length_prefixed_frames_and_closes_on_sentinel() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ntc_bridge_capfile_test2_{}.gz", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let (m, inbox) = mailbox(4);
        let fanout = FanOut::new(vec![m]);
        let mut sender = CaptureFileSender::new(path.clone(), false, inbox);
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move { sender.run(run_cancel).await });

        fanout.publish(vec![1, 2, 3]).await;
        fanout.close().await;
        handle.await.unwrap().unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(file);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data).unwrap();
        assert_eq!(&data[0..4], &3u32.to_le_bytes());
        assert_eq!(&data[4..7], &[1, 2, 3]);

        let _ = std::fs::remove_file(&path);
    }
}
