//! Raw hardware-link memory-dump layouts (§4.3.2, §6).
//!
//! Two wire shapes exist: the "standard" 0xED-byte (237-byte) full memory
//! dump, and the "compact" 0x40-byte (64-byte) protocol that trades a
//! smaller per-poll payload for splitting the playfield across several
//! chunked updates. Both are read with `byteorder`, matching this crate's
//! lineage.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::HardwareLinkError;

/// Byte length of a standard-protocol response.
pub const STANDARD_RESPONSE_LEN: usize = 0xED;
/// Byte length of a compact-protocol response.
pub const COMPACT_RESPONSE_LEN: usize = 0x40;

/// Command byte that requests a standard-protocol response.
pub const CMD_STANDARD: u8 = 0x42;
/// Command byte that requests a compact-protocol response.
pub const CMD_COMPACT: u8 = 0x43;

/// A fully-populated raw memory dump, laid out exactly as the cartridge
/// flasher returns it for the standard protocol:
///
/// ```text
/// offset  size  field
/// 0       1     game_mode
/// 1       1     playstate
/// 2       1     row_y
/// 3       4     completed_row[0..4]
/// 7       2     lines (hybrid BCD: hi, lo)
/// 9       1     level
/// 10      4     score[0..4] (little-endian)
/// 14      1     next_piece
/// 15      1     current_piece
/// 16      1     tetrimino_x
/// 17      1     tetrimino_y
/// 18      2     frame_counter (little-endian)
/// 20      1     autorepeat_x
/// 21      14    stats (hybrid BCD pairs: T,J,Z,O,S,L,I)
/// 35      200   playfield
/// 235     2     footer (unchecked for the standard protocol)
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HardwareFrame {
    pub game_mode: u8,
    pub playstate: u8,
    pub row_y: u8,
    pub completed_row: [u8; 4],
    pub lines_hi: u8,
    pub lines_lo: u8,
    pub level: u8,
    pub score: [u8; 4],
    pub next_piece: u8,
    pub current_piece: u8,
    pub tetrimino_x: i32,
    pub tetrimino_y: i32,
    pub frame_counter: u16,
    pub autorepeat_x: u8,
    pub stats: [u8; 14],
    pub playfield: [u8; 200],
}

impl HardwareFrame {
    /// Parses a full `STANDARD_RESPONSE_LEN`-byte standard-protocol
    /// response.
    pub fn parse(buf: &[u8; STANDARD_RESPONSE_LEN]) -> HardwareFrame {
        let mut completed_row = [0u8; 4];
        completed_row.copy_from_slice(&buf[3..7]);
        let mut score = [0u8; 4];
        score.copy_from_slice(&buf[10..14]);
        let mut stats = [0u8; 14];
        stats.copy_from_slice(&buf[21..35]);
        let mut playfield = [0u8; 200];
        playfield.copy_from_slice(&buf[35..235]);

        HardwareFrame {
            game_mode: buf[0],
            playstate: buf[1],
            row_y: buf[2],
            completed_row,
            lines_hi: buf[7],
            lines_lo: buf[8],
            level: buf[9],
            score,
            next_piece: buf[14],
            current_piece: buf[15],
            tetrimino_x: buf[16] as i32,
            tetrimino_y: buf[17] as i32,
            frame_counter: LittleEndian::read_u16(&buf[18..20]),
            autorepeat_x: buf[20],
            stats,
            playfield,
        }
    }
}

/// The 32-byte "data blob" of a compact-protocol `STATE_UPDATE` frame: the
/// same scalar fields as [`HardwareFrame`], minus the playfield (which
/// arrives separately via `FIELD_UPDATE` chunks) and the envelope fields
/// already consumed by [`CompactEnvelope`].
#[derive(Clone, Debug, PartialEq)]
pub struct CompactStateUpdate {
    pub game_mode: u8,
    pub row_y: u8,
    pub lines_hi: u8,
    pub lines_lo: u8,
    pub level: u8,
    pub score: [u8; 4],
    pub next_piece: u8,
    pub current_piece: u8,
    pub tetrimino_x: i32,
    pub tetrimino_y: i32,
    pub autorepeat_x: u8,
    pub completed_row: [u8; 4],
    pub stats: [u8; 14],
}

impl CompactStateUpdate {
    fn parse(blob: &[u8; 32]) -> CompactStateUpdate {
        let mut score = [0u8; 4];
        score.copy_from_slice(&blob[5..9]);
        let mut completed_row = [0u8; 4];
        completed_row.copy_from_slice(&blob[13..17]);
        let mut stats = [0u8; 14];
        stats.copy_from_slice(&blob[18..32]);

        CompactStateUpdate {
            game_mode: blob[0],
            row_y: blob[1],
            lines_hi: blob[2],
            lines_lo: blob[3],
            level: blob[4],
            score,
            next_piece: blob[9],
            current_piece: blob[10],
            tetrimino_x: blob[11] as i32,
            tetrimino_y: blob[12] as i32,
            autorepeat_x: blob[17],
            completed_row,
            stats,
        }
    }
}

/// A chunk of the playfield covering cells `[vram_row * 40, vram_row * 40 + 40)`.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactFieldUpdate {
    pub vram_row: u8,
    pub chunk: [u8; 40],
}

impl CompactFieldUpdate {
    fn parse(vram_row: u8, blob: &[u8]) -> CompactFieldUpdate {
        let mut chunk = [0u8; 40];
        chunk.copy_from_slice(&blob[..40]);
        CompactFieldUpdate { vram_row, chunk }
    }
}

/// The two compact-protocol frame shapes, discriminated by the type byte
/// at offset 8.
#[derive(Clone, Debug, PartialEq)]
pub enum CompactFrame {
    StateUpdate(CompactStateUpdate),
    FieldUpdate(CompactFieldUpdate),
}

const COMPACT_TYPE_STATE_UPDATE: u8 = 0xD0;
const COMPACT_TYPE_FIELD_UPDATE: u8 = 0xD1;
const COMPACT_TYPE_OFFSET: usize = 8;

/// An envelope-validated compact-protocol frame: header/footer XOR check
/// passed, frame counter extracted, body dispatched by type byte.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactEnvelope {
    pub frame_counter: u16,
    pub playstate: u8,
    pub frame: CompactFrame,
}

impl CompactEnvelope {
    /// Parses a full `COMPACT_RESPONSE_LEN`-byte compact-protocol response.
    ///
    /// Returns [`HardwareLinkError::InvalidHeaderXor`] if `header XOR
    /// footer != 0xFFFF`, per §4.3.2.
    pub fn parse(buf: &[u8; COMPACT_RESPONSE_LEN]) -> Result<CompactEnvelope, HardwareLinkError> {
        let header = LittleEndian::read_u16(&buf[0..2]);
        let footer = LittleEndian::read_u16(&buf[COMPACT_RESPONSE_LEN - 2..]);
        if header ^ footer != 0xFFFF {
            return Err(HardwareLinkError::InvalidHeaderXor { header, footer });
        }

        let frame_counter = LittleEndian::read_u16(&buf[2..4]);
        let playstate = buf[4];
        let frame = match buf[COMPACT_TYPE_OFFSET] {
            COMPACT_TYPE_FIELD_UPDATE => {
                let vram_row = buf[COMPACT_TYPE_OFFSET + 1];
                CompactFrame::FieldUpdate(CompactFieldUpdate::parse(
                    vram_row,
                    &buf[COMPACT_TYPE_OFFSET + 2..COMPACT_TYPE_OFFSET + 42],
                ))
            }
            // STATE_UPDATE (0xD0) is the default, matching the original
            // protocol's permissiveness toward unrecognized type bytes.
            _ => {
                let mut blob = [0u8; 32];
                blob.copy_from_slice(&buf[COMPACT_TYPE_OFFSET + 1..COMPACT_TYPE_OFFSET + 33]);
                CompactFrame::StateUpdate(CompactStateUpdate::parse(&blob))
            }
        };

        Ok(CompactEnvelope {
            frame_counter,
            playstate,
            frame,
        })
    }
}

/// Computes the expected next frame counter and, if `observed` skipped
/// ahead, the inclusive range of dropped frame numbers (§4.3.2, §8
/// scenario S4).
pub fn dropped_frame_range(last: u16, observed: u16) -> Option<(u16, u16)> {
    let expected = last.wrapping_add(1);
    if observed == expected {
        None
    } else {
        Some((expected, observed.wrapping_sub(1)))
    }
}
