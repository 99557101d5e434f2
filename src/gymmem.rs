//! The `GymMemory` reducer (component C2): folds successive raw hardware
//! observations into a persistent game-state record and reconstructs the
//! displayable playfield across the animation states that obscure it
//! (piece-drop overlay, line-clear flash).

use std::time::Instant;

use crate::error::ReducerError;
use crate::hardware::HardwareFrame;
use crate::ocr::OcrPayload;
use crate::tile::{self, PieceOrientation, BLANK_TILE, ORIENTATION_TABLE, PIECE_ORIENTATION_TO_TILE_ID};

/// Row-y-indexed symmetric column ranges blanked by `overlay_lineclear`,
/// centered on the column 4/5 boundary.
const LINECLEAR_RANGES: [(std::ops::Range<usize>, std::ops::Range<usize>); 5] = [
    (4..5, 5..6),
    (3..5, 5..7),
    (2..5, 5..8),
    (1..5, 5..9),
    (0..5, 5..10),
];

/// Converts a hybrid-BCD byte pair into its decimal value: `hi * 100 + (lo
/// >> 4) * 10 + (lo & 0x0F)`. Digits above 9 in either nibble are taken at
/// face value, matching the original firmware's lack of validation.
fn hybrid_bcd(hi: u8, lo: u8) -> u32 {
    hi as u32 * 100 + (lo >> 4) as u32 * 10 + (lo & 0x0F) as u32
}

/// Inverse of [`hybrid_bcd`]: re-encodes a decimal value (already parsed
/// from an OCR string) into the byte pair `apply_ocr` stores it as.
fn to_hybrid_bcd(value: u32) -> (u8, u8) {
    let hi = (value / 100) as u8;
    let rem = value % 100;
    let lo = (((rem / 10) as u8) << 4) | (rem % 10) as u8;
    (hi, lo)
}

/// Parses an OCR decimal-string field, falling back to `0` (rather than the
/// wire-level sentinel — `GymMemory` is an accumulating state record, not a
/// wire payload) when absent or unparseable.
fn parse_ocr_decimal(value: Option<&str>) -> u32 {
    value
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Persistent, in-place-mutated game-state record. One instance per
/// receiver for the receiver's lifetime.
pub struct GymMemory {
    created_at: Instant,

    pub game_id: u16,
    /// Milliseconds since this `GymMemory` was created.
    pub time: u32,

    pub game_mode: u8,
    pub playstate: u8,
    pub row_y: u8,
    pub frame_counter: u16,
    pub completed_rows: [u8; 4],

    pub level: u8,
    pub next_piece: u8,
    pub current_piece: u8,
    pub tetrimino_x: i32,
    pub tetrimino_y: i32,
    pub autorepeat_x: u8,
    /// Auto-repeat-x latched at the moment the current piece spawned
    /// (`playstate == 8`).
    pub spawn_autorepeat_x: u8,

    lines_hi: u8,
    lines_lo: u8,
    score_bytes: [u8; 4],
    /// Hybrid-BCD byte pairs in `T, J, Z, O, S, L, I` order.
    stats_bytes: [u8; 14],

    /// The last-decoded raw playfield, used as the source for the
    /// piece-overlay strategies. Distinct from `playfield`, which is what
    /// gets published.
    playfield_buffer: [u8; 200],
    /// The currently displayable playfield (raw NES tile ids).
    pub playfield: [u8; 200],
}

impl Default for GymMemory {
    fn default() -> Self {
        GymMemory {
            created_at: Instant::now(),
            game_id: 0,
            time: 0,
            game_mode: 0,
            playstate: 0,
            row_y: 0,
            frame_counter: 0,
            completed_rows: [0; 4],
            level: 0,
            next_piece: 0,
            current_piece: 0,
            tetrimino_x: 0,
            tetrimino_y: 0,
            autorepeat_x: 0,
            spawn_autorepeat_x: 0,
            lines_hi: 0,
            lines_lo: 0,
            score_bytes: [0; 4],
            stats_bytes: [0; 14],
            playfield_buffer: [BLANK_TILE; 200],
            playfield: [BLANK_TILE; 200],
        }
    }
}

impl GymMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> u16 {
        hybrid_bcd(self.lines_hi, self.lines_lo) as u16
    }

    /// Little-endian concatenation of the four score bytes; callers mask to
    /// the wire width (24 bits) themselves.
    pub fn score(&self) -> u32 {
        u32::from_le_bytes(self.score_bytes)
    }

    fn stat(&self, index: usize) -> u16 {
        hybrid_bcd(self.stats_bytes[index * 2], self.stats_bytes[index * 2 + 1]) as u16
    }

    pub fn stats_t(&self) -> u16 {
        self.stat(0)
    }
    pub fn stats_j(&self) -> u16 {
        self.stat(1)
    }
    pub fn stats_z(&self) -> u16 {
        self.stat(2)
    }
    pub fn stats_o(&self) -> u16 {
        self.stat(3)
    }
    pub fn stats_s(&self) -> u16 {
        self.stat(4)
    }
    pub fn stats_l(&self) -> u16 {
        self.stat(5)
    }
    pub fn stats_i(&self) -> u16 {
        self.stat(6)
    }

    /// Applies one raw hardware observation, per §4.2's hardware apply
    /// protocol. Fails only if `playstate` is outside the set of cases the
    /// state machine knows about.
    pub fn apply_hardware(&mut self, frame: &HardwareFrame) -> Result<(), ReducerError> {
        let previous_game_mode = self.game_mode;

        self.time = self.created_at.elapsed().as_millis() as u32;
        self.game_mode = frame.game_mode;
        self.playstate = frame.playstate;
        self.row_y = frame.row_y;
        self.completed_rows = frame.completed_row;
        self.lines_hi = frame.lines_hi;
        self.lines_lo = frame.lines_lo;
        self.level = frame.level;
        self.score_bytes = frame.score;
        self.next_piece = frame.next_piece;
        self.current_piece = frame.current_piece;
        self.tetrimino_x = frame.tetrimino_x;
        self.tetrimino_y = frame.tetrimino_y;
        self.frame_counter = frame.frame_counter;
        self.autorepeat_x = frame.autorepeat_x;
        self.stats_bytes = frame.stats;
        self.playfield_buffer = frame.playfield;

        self.after_scalar_update(previous_game_mode)
    }

    /// Applies one compact-protocol `STATE_UPDATE` body (§4.3.2): the same
    /// scalar fields as `apply_hardware`, carried over a 32-byte blob
    /// rather than the full 237-byte dump, with `playfield_buffer` left
    /// untouched (it is maintained by `apply_playfield_chunk` instead).
    pub fn apply_compact_state(
        &mut self,
        frame_counter: u16,
        playstate: u8,
        state: &crate::hardware::CompactStateUpdate,
    ) -> Result<(), ReducerError> {
        let previous_game_mode = self.game_mode;

        self.time = self.created_at.elapsed().as_millis() as u32;
        self.game_mode = state.game_mode;
        self.playstate = playstate;
        self.row_y = state.row_y;
        self.completed_rows = state.completed_row;
        self.lines_hi = state.lines_hi;
        self.lines_lo = state.lines_lo;
        self.level = state.level;
        self.score_bytes = state.score;
        self.next_piece = state.next_piece;
        self.current_piece = state.current_piece;
        self.tetrimino_x = state.tetrimino_x;
        self.tetrimino_y = state.tetrimino_y;
        self.frame_counter = frame_counter;
        self.autorepeat_x = state.autorepeat_x;
        self.stats_bytes = state.stats;

        self.after_scalar_update(previous_game_mode)
    }

    /// Shared tail of `apply_hardware`/`apply_compact_state`: the
    /// spawn-latch, game-id/mode-4 transition, and playstate-keyed
    /// display-field dispatch (§4.2 steps 3-5).
    fn after_scalar_update(&mut self, previous_game_mode: u8) -> Result<(), ReducerError> {
        if self.playstate == 8 {
            self.spawn_autorepeat_x = self.autorepeat_x;
        }

        if self.game_mode == 4 && previous_game_mode != 4 {
            self.playfield = [BLANK_TILE; 200];
            self.game_id = self.game_id.wrapping_add(1);
        }

        match self.playstate {
            1 | 8 | 2 | 5 | 6 | 7 => {
                self.playfield = self.playfield_buffer;
                self.overlay_piece();
            }
            4 => self.overlay_lineclear(),
            0 | 3 | 10 => {}
            other => return Err(ReducerError::UnexpectedPlaystate(other)),
        }

        Ok(())
    }

    /// Writes a chunk of the buffered playfield received from a
    /// compact-protocol `FIELD_UPDATE` frame (§4.3.2).
    pub fn apply_playfield_chunk(&mut self, vram_row: u8, chunk: &[u8; 40]) {
        let base = vram_row as usize * 40;
        if base + 40 <= self.playfield_buffer.len() {
            self.playfield_buffer[base..base + 40].copy_from_slice(chunk);
        }
    }

    /// Applies one raw OCR observation, mirroring `apply_hardware`'s shape
    /// for a source that reports scalars directly rather than through the
    /// hardware memory-dump layout. The OCR-over-TCP receiver (§4.3.1)
    /// normally builds a `Snapshot` straight from the payload via
    /// `codec::from_ocr` instead of routing through here; this entry point
    /// exists for callers that want OCR observations folded into the same
    /// persistent record hardware observations use.
    pub fn apply_ocr(&mut self, payload: &OcrPayload) {
        self.time = self.created_at.elapsed().as_millis() as u32;

        let previous_game_mode = self.game_mode;
        self.game_id = parse_ocr_decimal(payload.gameid.as_deref()) as u16;
        self.level = parse_ocr_decimal(payload.level.as_deref()) as u8;
        let (lines_hi, lines_lo) = to_hybrid_bcd(parse_ocr_decimal(payload.lines.as_deref()));
        self.lines_hi = lines_hi;
        self.lines_lo = lines_lo;
        self.score_bytes = parse_ocr_decimal(payload.score.as_deref()).to_le_bytes();

        for (i, field) in [
            payload.t.as_deref(),
            payload.j.as_deref(),
            payload.z.as_deref(),
            payload.o.as_deref(),
            payload.s.as_deref(),
            payload.l.as_deref(),
            payload.i.as_deref(),
        ]
        .into_iter()
        .enumerate()
        {
            let (hi, lo) = to_hybrid_bcd(parse_ocr_decimal(field));
            self.stats_bytes[i * 2] = hi;
            self.stats_bytes[i * 2 + 1] = lo;
        }

        self.next_piece = payload
            .preview
            .as_deref()
            .and_then(tile::piece_letter_to_value)
            .unwrap_or(self.next_piece);

        if let Some(field) = &payload.field {
            if field.len() == 200 && field.bytes().all(|b| b.is_ascii_digit()) {
                // `playfield` stores raw tile ids everywhere else in this
                // struct; map each OCR display digit back to a
                // representative raw id so `compress_raw_playfield` (which
                // re-applies `tile_to_display`) round-trips correctly.
                for (dst, src) in self.playfield.iter_mut().zip(field.bytes()) {
                    *dst = match src - b'0' {
                        0 => BLANK_TILE,
                        2 => 0x7D,
                        3 => 0x7C,
                        _ => 0x7B,
                    };
                }
            }
        }

        // OCR observations carry no explicit game-mode signal; treat any
        // gameid reset as the same mode-4 transition hardware frames use.
        if self.game_id != 0 && previous_game_mode != 4 {
            self.game_mode = 4;
        }
    }

    /// Paints the current piece's four cells onto `playfield` from the
    /// 19-entry orientation table. Out-of-range orientations are logged and
    /// ignored, matching the original firmware's tolerance for the
    /// transient orientation codes seen during piece-spawn animation.
    fn overlay_piece(&mut self) {
        let orientation = PieceOrientation(self.current_piece);
        if !orientation.is_valid() {
            log::debug!("current_piece {} outside orientation table, skipping overlay", self.current_piece);
            return;
        }
        let offsets = ORIENTATION_TABLE[orientation.0 as usize];
        let tile_id = PIECE_ORIENTATION_TO_TILE_ID[orientation.0 as usize];
        for (dx, dy) in offsets {
            let x = self.tetrimino_x + dx;
            let y = self.tetrimino_y + dy;
            let idx = y * 10 + x;
            if (0..200).contains(&idx) {
                self.playfield[idx as usize] = tile_id;
            }
        }
    }

    /// Blanks the symmetric column ranges for each completed row, gated on
    /// the line-clear animation's frame phase (§4.2).
    fn overlay_lineclear(&mut self) {
        if self.frame_counter & 3 != 0 || self.row_y > 4 {
            return;
        }
        let (left, right) = &LINECLEAR_RANGES[self.row_y as usize];
        for &row_value in &self.completed_rows {
            if row_value == 0 {
                continue;
            }
            let row = row_value as usize;
            for col in left.clone().chain(right.clone()) {
                let idx = row * 10 + col;
                if idx < 200 {
                    self.playfield[idx] = BLANK_TILE;
                }
            }
        }
    }

    /// Returns the raw tile id painted for the current piece's
    /// orientation, if valid. Exposed for diagnostics and tests; the
    /// reducer itself uses [`GymMemory::overlay_piece`] directly.
    pub fn current_piece_tile(&self) -> Option<u8> {
        tile::PIECE_ORIENTATION_TO_TILE_ID
            .get(self.current_piece as usize)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_frame() -> HardwareFrame {
        HardwareFrame {
            game_mode: 4,
            playstate: 1,
            row_y: 0,
            completed_row: [0; 4],
            lines_hi: 0,
            lines_lo: 0,
            level: 0,
            score: [0; 4],
            next_piece: 0,
            current_piece: 2, // T down (spawn)
            tetrimino_x: 4,
            tetrimino_y: 0,
            frame_counter: 0,
            autorepeat_x: 0,
            stats: [0; 14],
            playfield: [BLANK_TILE; 200],
        }
    }

    #[test]
    fn game_id_increments_on_transition_into_mode_4() {
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.game_mode = 0;
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.game_id, 0);

        frame.game_mode = 4;
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.game_id, 1);

        // Staying in mode 4 does not increment further.
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.game_id, 1);
    }

    #[test]
    fn spawn_autorepeat_x_latches_only_on_playstate_8() {
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.playstate = 8;
        frame.autorepeat_x = 7;
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.spawn_autorepeat_x, 7);

        frame.playstate = 1;
        frame.autorepeat_x = 99;
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.spawn_autorepeat_x, 7);
    }

    #[test]
    fn unexpected_playstate_is_an_error() {
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.playstate = 42;
        assert_eq!(
            gym.apply_hardware(&frame),
            Err(ReducerError::UnexpectedPlaystate(42))
        );
    }

    #[test]
    fn no_op_playstates_leave_playfield_untouched() {
        let mut gym = GymMemory::new();
        gym.playfield = [0x11; 200];
        let mut frame = base_frame();
        frame.playstate = 3;
        gym.apply_hardware(&frame).unwrap();
        assert!(gym.playfield.iter().all(|&c| c == 0x11));
    }

    #[test]
    fn piece_overlay_writes_expected_cells() {
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.tetrimino_x = 4;
        frame.tetrimino_y = 1;
        frame.current_piece = 2; // T down (spawn): (-1,0),(0,0),(1,0),(0,1)
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.playfield[1 * 10 + 3], 0x7B);
        assert_eq!(gym.playfield[1 * 10 + 4], 0x7B);
        assert_eq!(gym.playfield[1 * 10 + 5], 0x7B);
        assert_eq!(gym.playfield[2 * 10 + 4], 0x7B);
    }

    #[test]
    fn piece_overlay_writes_a_cell_whose_x_offset_is_individually_negative() {
        // tetrimino_x=0 with a (-1, 0) offset yields x=-1, but the combined
        // index (tetrimino_y+dy)*10 + (tetrimino_x+dx) can still land in
        // [0, 200) by wrapping into the row above; the spec bounds-checks
        // only the combined index, not dx/dy individually.
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.tetrimino_x = 0;
        frame.tetrimino_y = 1;
        frame.current_piece = 2; // T down (spawn): (-1,0),(0,0),(1,0),(0,1)
        gym.apply_hardware(&frame).unwrap();
        // (-1, 0) offset -> idx = 1*10 + (0-1) = 9, i.e. row 0 col 9.
        assert_eq!(gym.playfield[9], 0x7B);
    }

    #[test]
    fn piece_overlay_never_writes_outside_bounds_for_extreme_positions() {
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.tetrimino_x = -100;
        frame.tetrimino_y = -100;
        frame.current_piece = 2;
        gym.apply_hardware(&frame).unwrap();
        // No panic, and no spurious writes anywhere in range.
        assert!(gym.playfield.iter().all(|&c| c == BLANK_TILE));

        frame.tetrimino_x = 1000;
        frame.tetrimino_y = 1000;
        gym.apply_hardware(&frame).unwrap();
        assert!(gym.playfield.iter().all(|&c| c == BLANK_TILE));
    }

    #[test]
    fn line_clear_overlay_matches_scenario_s5() {
        let mut gym = GymMemory::new();
        gym.playfield = [0x7Bu8; 200];
        let mut frame = base_frame();
        frame.playstate = 4;
        frame.row_y = 2;
        frame.frame_counter = 8; // divisible by 4
        frame.completed_row = [0x03, 0, 0, 0];
        gym.apply_hardware(&frame).unwrap();
        for col in 2..8 {
            assert_eq!(gym.playfield[3 * 10 + col], BLANK_TILE, "col {col}");
        }
        assert_eq!(gym.playfield[3 * 10 + 1], 0x7B);
        assert_eq!(gym.playfield[3 * 10 + 8], 0x7B);
    }

    #[test]
    fn line_clear_overlay_is_gated_by_frame_counter_phase() {
        let mut gym = GymMemory::new();
        gym.playfield = [0x7Bu8; 200];
        let mut frame = base_frame();
        frame.playstate = 4;
        frame.row_y = 2;
        frame.frame_counter = 9; // not divisible by 4
        frame.completed_row = [0x03, 0, 0, 0];
        gym.apply_hardware(&frame).unwrap();
        assert!(gym.playfield.iter().all(|&c| c == 0x7B));
    }

    #[test]
    fn hybrid_bcd_matches_spec_formula() {
        assert_eq!(hybrid_bcd(0x01, 0x23), 123);
        assert_eq!(hybrid_bcd(0, 0), 0);
    }

    #[test]
    fn score_is_little_endian_four_bytes() {
        let mut gym = GymMemory::new();
        let mut frame = base_frame();
        frame.score = [0x78, 0x56, 0x34, 0x12];
        gym.apply_hardware(&frame).unwrap();
        assert_eq!(gym.score(), 0x1234_5678);
    }

    #[test]
    fn apply_ocr_populates_scalars() {
        let mut gym = GymMemory::new();
        let payload = OcrPayload {
            gameid: Some("7".to_string()),
            lines: Some("123".to_string()),
            level: Some("9".to_string()),
            score: Some("456700".to_string()),
            t: Some("5".to_string()),
            ..OcrPayload::default()
        };
        gym.apply_ocr(&payload);
        assert_eq!(gym.game_id, 7);
        assert_eq!(gym.lines(), 123);
        assert_eq!(gym.level, 9);
        assert_eq!(gym.score(), 456700);
        assert_eq!(gym.stats_t(), 5);
    }

    #[test]
    fn apply_ocr_missing_fields_default_to_zero() {
        let mut gym = GymMemory::new();
        gym.apply_ocr(&OcrPayload::default());
        assert_eq!(gym.game_id, 0);
        assert_eq!(gym.lines(), 0);
        assert_eq!(gym.score(), 0);
    }

    #[test]
    fn apply_compact_state_shares_the_playstate_dispatch() {
        use crate::hardware::CompactStateUpdate;

        let mut gym = GymMemory::new();
        gym.apply_playfield_chunk(0, &[0x7B; 40]);
        let state = CompactStateUpdate {
            game_mode: 4,
            row_y: 0,
            lines_hi: 0,
            lines_lo: 0,
            level: 5,
            score: [0; 4],
            next_piece: 1,
            current_piece: 2,
            tetrimino_x: 4,
            tetrimino_y: 1,
            autorepeat_x: 0,
            completed_row: [0; 4],
            stats: [0; 14],
        };
        gym.apply_compact_state(10, 1, &state).unwrap();
        assert_eq!(gym.game_id, 1);
        assert_eq!(gym.level, 5);
        assert_eq!(gym.playfield[0], 0x7B);
    }
}
