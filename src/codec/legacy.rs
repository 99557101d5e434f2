//! Decode-only support for the two frame formats this system produced
//! before settling on the 73-byte v3 layout (§4.1, "Supplemental:
//! predecessor frame versions"). Nothing in this crate ever *encodes* v1 or
//! v2; they exist so file-replay (§4.3.4) can still read older captures.
//!
//! Both predecessors pack `elapsed_ms`, `score`, `lines`, `level`, and
//! `preview` into one contiguous bitstream the way v3 does, just with
//! narrower field widths; stats are independent plain bytes rather than
//! hybrid 10-bit packing. Byte 0 is a standalone header byte and `game_id`
//! is a standalone big-endian `u16` in both, exactly as in v3.

use super::bits::BitReader;
use super::{sentinel, Snapshot};
use crate::error::CodecError;

const V1_LEN: usize = 71;
const V2_LEN: usize = 72;

/// Decodes a legacy (`version` is `1` or `2`) frame into a [`Snapshot`].
/// Any other version is [`CodecError::UnknownVersion`]; a buffer shorter
/// than the version's fixed length is [`CodecError::ShortBuffer`].
pub fn decode(version: u8, buf: &[u8]) -> Result<Snapshot, CodecError> {
    match version {
        1 => decode_fixed(buf, V1_LEN, false),
        2 => decode_fixed(buf, V2_LEN, true),
        other => Err(CodecError::UnknownVersion(other)),
    }
}

fn decode_fixed(buf: &[u8], expected_len: usize, has_das_byte: bool) -> Result<Snapshot, CodecError> {
    if buf.len() < expected_len {
        return Err(CodecError::ShortBuffer {
            version: if has_das_byte { 2 } else { 1 },
            expected: expected_len,
            actual: buf.len(),
        });
    }

    let game_id = u16::from_be_bytes([buf[1], buf[2]]);

    // The packed scalar word: elapsed_ms(28) + score(21) + lines(9) +
    // level(6) + preview(3) = 67 bits, byte-padded to 9 bytes.
    let packed_start = 3;
    let packed_len = 9;
    let mut r = BitReader::new(&buf[packed_start..packed_start + packed_len]);
    let elapsed_ms = r.read(28);
    let score = r.read(21);
    let lines = r.read(9) as u16;
    let level = r.read(6) as u8;
    let preview = r.read(3) as u8;

    let mut cursor = packed_start + packed_len;

    let (instant_das, cur_piece_das, cur_piece) = if has_das_byte {
        let byte = buf[cursor];
        cursor += 1;
        let das = byte >> 3;
        let piece = byte & 0b111;
        (das, das, piece)
    } else {
        (sentinel(5) as u8, sentinel(5) as u8, sentinel(3) as u8)
    };

    let mut stats = [0u16; 7];
    for stat in stats.iter_mut() {
        *stat = buf[cursor] as u16;
        cursor += 1;
    }

    let mut compressed_playfield = [0u8; 50];
    compressed_playfield.copy_from_slice(&buf[cursor..cursor + 50]);

    Ok(Snapshot {
        game_id,
        elapsed_ms,
        lines,
        level,
        score,
        instant_das,
        preview,
        cur_piece_das,
        cur_piece,
        stats,
        compressed_playfield,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_v1(game_id: u16, elapsed_ms: u32, score: u32, lines: u16, level: u8, preview: u8) -> Vec<u8> {
        let mut buf = vec![0u8; V1_LEN];
        buf[0] = 1 << 5; // version=1 in top 3 bits
        buf[1..3].copy_from_slice(&game_id.to_be_bytes());

        let mut w = super::super::bits::BitWriter::with_capacity(9);
        w.push(elapsed_ms, 28);
        w.push(score, 21);
        w.push(lines as u32, 9);
        w.push(level as u32, 6);
        w.push(preview as u32, 3);
        let packed = w.finish();
        buf[3..3 + packed.len()].copy_from_slice(&packed);
        buf
    }

    #[test]
    fn decodes_v1_scalars() {
        let buf = build_v1(0x1234, 9999, 500_000 & 0x1F_FFFF, 42, 18, 5);
        let snapshot = decode(1, &buf).unwrap();
        assert_eq!(snapshot.game_id, 0x1234);
        assert_eq!(snapshot.elapsed_ms, 9999);
        assert_eq!(snapshot.lines, 42);
        assert_eq!(snapshot.level, 18);
        assert_eq!(snapshot.preview, 5);
        assert_eq!(snapshot.instant_das, sentinel(5) as u8);
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = vec![0u8; 10];
        assert_eq!(
            decode(1, &buf),
            Err(CodecError::ShortBuffer {
                version: 1,
                expected: V1_LEN,
                actual: 10,
            })
        );
    }

    #[test]
    fn rejects_unknown_version() {
        assert_eq!(decode(9, &[0u8; 100]), Err(CodecError::UnknownVersion(9)));
    }

    #[test]
    fn v2_decodes_das_and_cur_piece_byte() {
        let mut buf = build_v1(1, 0, 0, 0, 0, 0);
        buf.insert(12, 0b10101_011); // das=0b10101, cur_piece=0b011
        buf.resize(V2_LEN, 0);
        let snapshot = decode(2, &buf).unwrap();
        assert_eq!(snapshot.instant_das, 0b10101);
        assert_eq!(snapshot.cur_piece_das, 0b10101);
        assert_eq!(snapshot.cur_piece, 0b011);
    }
}
