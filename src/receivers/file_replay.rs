//! The file-replay receiver (§4.3.4): reads a gzip capture of concatenated,
//! self-delimited frames and republishes them at full speed.

use std::io::Read;
use std::path::PathBuf;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{Error, FileReplayError};
use crate::fanout::FanOut;
use crate::receiver::Receiver;

pub struct FileReplayReceiver {
    path: PathBuf,
    fanout: FanOut,
}

impl FileReplayReceiver {
    pub fn new(path: PathBuf, fanout: FanOut) -> Self {
        FileReplayReceiver { path, fanout }
    }
}

/// Reads every length-determined frame out of `bytes`, blocking; runs on a
/// worker thread since gzip decompression of a large capture is not
/// suspend-friendly.
fn read_all_frames(path: PathBuf) -> Result<Vec<Vec<u8>>, FileReplayError> {
    let file = std::fs::File::open(&path)?;
    let mut decoder = GzDecoder::new(file);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;

    let mut frames = Vec::new();
    let mut cursor = 0usize;
    while cursor < data.len() {
        let header = data[cursor];
        let version = header >> 5;
        let len = codec::frame_len(version)
            .ok_or(crate::error::CodecError::UnknownVersion(version))?;
        if cursor + len > data.len() {
            return Err(crate::error::CodecError::ShortBuffer {
                version,
                expected: len,
                actual: data.len() - cursor,
            }
            .into());
        }
        frames.push(data[cursor..cursor + len].to_vec());
        cursor += len;
    }
    Ok(frames)
}

#[async_trait]
impl Receiver for FileReplayReceiver {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        let path = self.path.clone();
        let frames = tokio::task::spawn_blocking(move || read_all_frames(path))
            .await
            .expect("file replay worker thread panicked")?;

        log::info!("file replay: {} frames loaded from {:?}", frames.len(), self.path);

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
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gz(path: &std::path::Path, frames: &[Vec<u8>]) {
        let file = std::fs::File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        for frame in frames {
            encoder.write_all(frame).unwrap();
        }
        encoder.finish().unwrap();
    }

    #[test]
    fn reads_back_concatenated_v3_frames() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ntc_bridge_replay_test_{}.gz", std::process::id()));

        let mut frame_a = vec![0u8; 73];
        frame_a[0] = 3 << 5; // version 3
        let mut frame_b = frame_a.clone();
        frame_b[1] = 7;
        write_gz(&path, &[frame_a.clone(), frame_b.clone()]);

        let frames = read_all_frames(path.clone()).unwrap();
        assert_eq!(frames, vec![frame_a, frame_b]);

        let _ = std::fs::remove_file(&path);
    }
}
