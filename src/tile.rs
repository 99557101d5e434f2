//! Tile codes, piece-orientation tables, and the handful of small closed
//! code spaces shared by the [`crate::gymmem`] reducer and the
//! [`crate::codec`] playfield compressor.

/// Raw NES tile id written into VRAM for an empty cell.
pub const BLANK_TILE: u8 = 0xEF;

/// Maps a raw NES tile id to its 2-bit wire display code.
///
/// Any tile id outside the four known codes (garbage, unmapped nametable
/// bytes, etc.) is treated as "filled" (`1`), matching the original
/// `defaultdict(lambda: 1)` behavior.
pub fn tile_to_display(tile: u8) -> u8 {
    match tile {
        0x7B => 1,
        0x7C => 3,
        0x7D => 2,
        0xEF => 0,
        _ => 1,
    }
}

/// Piece-and-orientation code, `0..=0x12` (19 values): the NES Tetris
/// `currentPiece`/`nextPiece` RAM value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceOrientation(pub u8);

impl PieceOrientation {
    pub const MAX: u8 = 0x12;

    pub fn is_valid(self) -> bool {
        self.0 <= Self::MAX
    }
}

/// The raw tile id painted for each cell of a given piece-orientation, used
/// by [`crate::gymmem::GymMemory::overlay_piece`].
pub const PIECE_ORIENTATION_TO_TILE_ID: [u8; 19] = [
    0x7B, 0x7B, 0x7B, 0x7B, // T up, right, down (spawn), left
    0x7D, 0x7D, 0x7D, 0x7D, // J left, up, right, down (spawn)
    0x7C, 0x7C, // Z horizontal (spawn), vertical
    0x7B, // O (spawn)
    0x7D, 0x7D, // S horizontal (spawn), vertical
    0x7C, 0x7C, 0x7C, 0x7C, // L right, down (spawn), left, up
    0x7B, 0x7B, // I vertical, horizontal (spawn)
];

/// `(dx, dy)` cell offsets relative to `(tetrimino_x, tetrimino_y)` for each
/// of the 19 piece-orientation codes.
pub const ORIENTATION_TABLE: [[(i32, i32); 4]; 19] = [
    [(-1, 0), (0, 0), (1, 0), (0, -1)], // T up
    [(0, -1), (0, 0), (1, 0), (0, 1)],  // T right
    [(-1, 0), (0, 0), (1, 0), (0, 1)],  // T down (spawn)
    [(0, -1), (-1, 0), (0, 0), (0, 1)], // T left
    [(0, -1), (0, 0), (-1, 1), (0, 1)], // J left
    [(-1, -1), (-1, 0), (0, 0), (1, 0)], // J up
    [(0, -1), (1, -1), (0, 0), (0, 1)], // J right
    [(-1, 0), (0, 0), (1, 0), (1, 1)],  // J down (spawn)
    [(-1, 0), (0, 0), (0, 1), (1, 1)],  // Z horizontal (spawn)
    [(1, -1), (0, 0), (1, 0), (0, 1)],  // Z vertical
    [(-1, 0), (0, 0), (-1, 1), (0, 1)], // O (spawn)
    [(0, 0), (1, 0), (-1, 1), (0, 1)],  // S horizontal (spawn)
    [(0, -1), (0, 0), (1, 0), (1, 1)],  // S vertical
    [(0, -1), (0, 0), (0, 1), (1, 1)],  // L right
    [(-1, 0), (0, 0), (1, 0), (-1, 1)], // L down (spawn)
    [(-1, -1), (0, -1), (0, 0), (0, 1)], // L left
    [(1, -1), (-1, 0), (0, 0), (1, 0)], // L up
    [(0, -2), (0, -1), (0, 0), (0, 1)], // I vertical
    [(-2, 0), (-1, 0), (0, 0), (1, 0)], // I horizontal (spawn)
];

/// Maps an OCR preview-piece letter to its 3-bit wire code. `T,J,Z,O,S,L,I`
/// in that order, `0..=6`.
pub fn piece_letter_to_value(letter: &str) -> Option<u8> {
    match letter {
        "T" => Some(0),
        "J" => Some(1),
        "Z" => Some(2),
        "O" => Some(3),
        "S" => Some(4),
        "L" => Some(5),
        "I" => Some(6),
        _ => None,
    }
}
