//! Binpack training-data stream decoder.
//!
//! A binpack file is a sequence of framed blocks: an 8-byte header (ASCII
//! `BINP` plus a little-endian u32 payload length) followed by the payload.
//! A block holds entries; each entry starts with a fixed-size *stem* encoding
//! a full position, its best move, score, game ply/result and fifty-move
//! counter, optionally followed by a bit-packed *movetext* continuation of
//! variable-length moves and score deltas.
//!
//! The file is memory-mapped and decoded in place. Every decoded move is
//! verified against the live position with the standard legality check; any
//! violation is fatal to the stream.

pub mod loader;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::{Board, METADATA_LENGTH};
use crate::defs::{color_bits, type_of, PROMOTION_RANKS, BLACK, KING, KNIGHT, PAWN, QUEEN, ROOK};
use crate::errors::{EngineError, EngineResult};
use crate::movegen;
use crate::mv::Move;
use crate::zobrist::ZOBRIST;

pub const BINPACK_MAGIC: &[u8; 4] = b"BINP";

/// Score sentinel marking an entry the producer wants dropped.
const ENTRY_SKIPPED: i16 = 32002;

/// One decoded training position with its continuation move.
#[derive(Clone)]
pub struct TrainingDataEntry {
    pub position: Board,
    pub mv: Move,
    /// Score in centipawns from the side to move's perspective.
    pub score: i16,
    /// Game result from the side to move's perspective (-1, 0, 1).
    pub result: i16,
}

/// Streaming decoder over one worker's stripe of a binpack file.
///
/// Worker `w` of `n` consumes blocks whose index is congruent to `w` mod `n`,
/// skipping foreign blocks via the header length field.
pub struct BinpackStream {
    mmap: Mmap,
    drop_probability: f32,
    rng: StdRng,
    num_workers: usize,

    /// Offset of the next unread block header.
    file_offset: usize,
    block_num: usize,
    entry_num: u64,

    /// Current block payload location and decode cursor.
    block_start: usize,
    block_size: usize,
    byte_index: usize,
    bits_remaining: u32,

    plies_remaining: u16,
    entry: TrainingDataEntry,
}

impl BinpackStream {
    /// Open a stream over the file at `path`.
    ///
    /// `drop_probability` is the chance an entry is sampled away instead of
    /// surfaced; `worker_id`/`num_workers` select this stream's block stripe.
    pub fn new<P: AsRef<Path>>(
        path: P,
        drop_probability: f32,
        worker_id: usize,
        num_workers: usize,
    ) -> EngineResult<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| EngineError::Stream(format!("could not open binpack file: {}", e)))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| EngineError::Stream(format!("could not map binpack file: {}", e)))?;

        let mut stream = BinpackStream {
            mmap,
            drop_probability,
            rng: StdRng::from_entropy(),
            num_workers,
            file_offset: 0,
            block_num: 0,
            entry_num: 0,
            block_start: 0,
            block_size: 0,
            byte_index: 0,
            bits_remaining: 8,
            plies_remaining: 0,
            entry: TrainingDataEntry {
                position: Board::empty(),
                mv: Move::NULL,
                score: 0,
                result: 0,
            },
        };

        stream.advance_blocks(worker_id + 1)?;
        Ok(stream)
    }

    /// Decode the next entry, honoring skip sentinels and drop sampling.
    ///
    /// Returns `None` when this worker's stripe is exhausted.
    pub fn next_entry(&mut self) -> EngineResult<Option<&TrainingDataEntry>> {
        loop {
            self.entry_num += 1;
            if self.plies_remaining > 0 {
                self.read_movetext_entry()?;
            } else if !self.read_stem()? {
                return Ok(None);
            }

            if self.entry.score == ENTRY_SKIPPED {
                continue;
            }
            if self.drop_probability > 0.0 && self.rng.gen::<f32>() < self.drop_probability {
                continue;
            }
            return Ok(Some(&self.entry));
        }
    }

    /// Entries decoded so far, skipped ones included.
    pub fn entries_read(&self) -> u64 {
        self.entry_num
    }

    fn at_eof(&self) -> bool {
        self.file_offset >= self.mmap.len()
    }

    fn data_available(&self) -> bool {
        self.byte_index < self.block_size
    }

    /// Read and validate one block header, returning the payload length.
    fn read_block_header(&mut self) -> EngineResult<usize> {
        if self.file_offset + 8 > self.mmap.len() {
            return Err(EngineError::Stream("unexpected end of file".into()));
        }
        let header = &self.mmap[self.file_offset..self.file_offset + 8];
        if &header[0..4] != BINPACK_MAGIC {
            return Err(EngineError::Stream("invalid binpack file or block".into()));
        }
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        self.file_offset += 8;
        Ok(size)
    }

    /// Skip `num_blocks - 1` foreign blocks and load the one after.
    ///
    /// Returns false once the file runs out of blocks for this stripe.
    fn advance_blocks(&mut self, num_blocks: usize) -> EngineResult<bool> {
        self.block_num += num_blocks;

        for _ in 0..num_blocks - 1 {
            if self.at_eof() {
                return Ok(false);
            }
            let size = self.read_block_header()?;
            self.file_offset += size;
        }

        if self.at_eof() {
            return Ok(false);
        }
        let size = self.read_block_header()?;
        if self.file_offset + size > self.mmap.len() {
            return Err(EngineError::Stream("truncated block".into()));
        }

        self.block_start = self.file_offset;
        self.block_size = size;
        self.file_offset += size;
        self.byte_index = 0;
        self.bits_remaining = 8;
        self.plies_remaining = 0;

        Ok(true)
    }

    /// Copy `N` bytes out of the current block and advance the cursor.
    fn take_bytes<const N: usize>(&mut self) -> EngineResult<[u8; N]> {
        if self.byte_index + N > self.block_size {
            return Err(EngineError::Stream("unexpected end of block".into()));
        }
        let start = self.block_start + self.byte_index;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.mmap[start..start + N]);
        self.byte_index += N;
        Ok(buf)
    }

    fn read_u16_be(&mut self) -> EngineResult<u16> {
        Ok(u16::from_be_bytes(self.take_bytes::<2>()?))
    }

    /// Decode a stem: a complete position, best move, score, ply/result and
    /// fifty-move counter, plus the length of the following movetext.
    ///
    /// Returns false when no block remains for this worker.
    fn read_stem(&mut self) -> EngineResult<bool> {
        // advance to the next whole byte after any movetext bits
        if self.bits_remaining < 8 {
            self.bits_remaining = 8;
            self.byte_index += 1;
        }

        if !self.data_available() {
            let stripe = self.num_workers;
            if !self.advance_blocks(stripe)? {
                return Ok(false);
            }
        }

        let mut position = Board::empty();
        let mut metadata: u64 = 0;
        let mut black_to_move = false;

        // occupancy, rank 8 in the first byte down to rank 1 in the last
        let occupied = u64::from_be_bytes(self.take_bytes::<8>()?);
        let nibble_bytes = self.take_bytes::<16>()?;

        // one 4-bit piece code per occupied square, lsb-first in ascending
        // square order
        let mut remaining = occupied;
        let mut i = 0usize;
        while remaining != 0 {
            let index = remaining.trailing_zeros() as usize;
            remaining &= remaining - 1;

            let byte = nibble_bytes[i / 2];
            let nibble = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
            i += 1;

            match nibble {
                0..=11 => {
                    let c = (nibble % 2) as usize;
                    let piece_type = (nibble / 2 + 1) as u32;

                    position.squares[index] = color_bits(c) + piece_type;
                    position.pieces[c][piece_type as usize] |= 1u64 << index;
                    metadata ^= ZOBRIST.pieces[c][piece_type as usize][index];
                }
                12 => {
                    // a pawn that just double-advanced; the en-passant square
                    // sits one square behind it, side inferred from board half
                    let c = (index >> 5) & 1;
                    if !(24..40).contains(&index) {
                        return Err(EngineError::Stream(
                            "double-advanced pawn outside ranks 4 and 5".into(),
                        ));
                    }
                    let ep_square = index - 8 + 16 * c;
                    metadata |= (ep_square as u64) << 6;

                    position.squares[index] = color_bits(c) + PAWN;
                    position.pieces[c][PAWN as usize] |= 1u64 << index;
                    metadata ^= ZOBRIST.pieces[c][PAWN as usize][index];
                }
                13 | 14 => {
                    // rook still carrying a castling right, queenside on file a
                    let c = ((nibble - 1) % 2) as usize;
                    if index % 8 == 0 {
                        metadata |= 0b0100u64 << (12 + c);
                        metadata ^= ZOBRIST.queenside_castling[c];
                    } else {
                        metadata |= 0b0001u64 << (12 + c);
                        metadata ^= ZOBRIST.kingside_castling[c];
                    }

                    position.squares[index] = color_bits(c) + ROOK;
                    position.pieces[c][ROOK as usize] |= 1u64 << index;
                    metadata ^= ZOBRIST.pieces[c][ROOK as usize][index];
                }
                15 => {
                    // the side-to-move king nibble doubles as the black-to-move marker
                    black_to_move = true;
                    metadata ^= ZOBRIST.turn;

                    position.squares[index] = BLACK + KING;
                    position.pieces[1][KING as usize] |= 1u64 << index;
                    metadata ^= ZOBRIST.pieces[1][KING as usize][index];
                }
                _ => return Err(EngineError::Stream("unrecognised piece nibble".into())),
            }
        }

        position.update_occupancies();

        if position.pieces[0][KING as usize].count_ones() != 1
            || position.pieces[1][KING as usize].count_ones() != 1
        {
            return Err(EngineError::Stream(
                "stem position must have exactly one king per color".into(),
            ));
        }

        // packed best move: kind | from | to | promotion piece
        let compressed_move = self.read_u16_be()?;
        let start_square = ((compressed_move >> 8) & 0b111111) as u32;
        let mut target_square = ((compressed_move >> 2) & 0b111111) as u32;

        let flags = match compressed_move >> 14 {
            1 => Move::PROMOTION_FLAG | ((compressed_move as u32 & 0b11) + KNIGHT),
            2 => {
                // the wire stores the rook square; translate to the king's landing square
                if target_square < start_square {
                    target_square = start_square - 2;
                } else {
                    target_square = start_square + 2;
                }
                Move::CASTLE_FLAG
            }
            3 => Move::EN_PASSANT_FLAG,
            _ => 0,
        };
        let mv = Move::new(start_square, target_square, flags);

        let score = unsigned_to_signed(self.read_u16_be()?);

        let ply_and_result = self.read_u16_be()?;
        let mut ply = ply_and_result & 0x3FFF;
        // halfmove parity must agree with the side to move
        if black_to_move && ply % 2 == 0 {
            ply += 1;
        }
        position.halfmove_number = ply as u32;
        let result = unsigned_to_signed(ply_and_result >> 14);

        let fifty_counter = self.read_u16_be()?;
        metadata |= (fifty_counter & 0b111111) as u64;

        position.metadata[ply as usize % METADATA_LENGTH] = metadata;

        self.entry.position = position;
        self.entry.mv = mv;
        self.entry.score = score;
        self.entry.result = result;

        if !movegen::is_legal(&mut self.entry.position, &mut self.entry.mv, false) {
            return Err(EngineError::IllegalMove(format!(
                "stem move {} is not legal in {}",
                self.entry.mv.as_long_algebraic(),
                self.entry.position.as_fen()
            )));
        }

        self.plies_remaining = self.read_u16_be()?;
        Ok(true)
    }

    /// Advance the entry one ply: apply the previous move, then decode the
    /// next move and score delta from the bit stream.
    fn read_movetext_entry(&mut self) -> EngineResult<()> {
        self.plies_remaining -= 1;

        let mut mv = self.entry.mv;
        movegen::make_move(&mut self.entry.position, &mut mv);

        self.entry.mv = self.read_vle_move()?;
        let delta = unsigned_to_signed(self.read_vle_int()?);
        self.entry.score = (-(self.entry.score as i32) + delta as i32) as i16;
        self.entry.result = -self.entry.result;
        Ok(())
    }

    /// Variable-length unsigned integer: 5-bit blocks, high bit continues,
    /// payloads concatenated lsb-first.
    fn read_vle_int(&mut self) -> EngineResult<u16> {
        let mut value: u16 = 0;
        let mut offset = 0;
        loop {
            let block = self.read_bits(5)? as u16;
            if offset >= 16 {
                return Err(EngineError::Stream("oversized varint".into()));
            }
            value |= (block & 0b1111) << offset;
            if block >> 4 == 0 {
                break;
            }
            offset += 4;
        }
        Ok(value)
    }

    /// Variable-length move: an index selecting the moving piece among the
    /// friendly pieces, then an index into its pseudo-legal destinations
    /// (widened for promotions, en passant and castling).
    fn read_vle_move(&mut self) -> EngineResult<Move> {
        let c = self.entry.position.side_index();
        let friendly = self.entry.position.occupancy[c];

        let num_pieces = friendly.count_ones();
        if num_pieces == 0 {
            return Err(EngineError::Stream("no pieces for side to move".into()));
        }
        let piece_id = self.read_bits(bit_width(num_pieces - 1))?;
        let start_square = index_of_nth_set_bit(friendly, piece_id as usize)?;

        let mut destinations = movegen::pseudo_moves(&self.entry.position, start_square);
        let piece_type = type_of(self.entry.position.squares[start_square]);

        let (target_square, flags) = match piece_type {
            PAWN => {
                if destinations & PROMOTION_RANKS != 0 {
                    // four promotion choices per destination
                    let num_moves = 4 * destinations.count_ones();
                    let move_id = self.read_bits(bit_width(num_moves - 1))? as u32;
                    let target =
                        index_of_nth_set_bit(destinations, (move_id / 4) as usize)?;
                    (
                        target as u32,
                        Move::PROMOTION_FLAG | (move_id % 4 + KNIGHT),
                    )
                } else {
                    let ep_square = self.entry.position.en_passant_square();

                    // an en-passant capture that would expose the king along
                    // the fifth rank is not counted as a destination
                    if ep_square != 0 && (1u64 << ep_square) & destinations != 0 {
                        let mut ep_move = Move::new(
                            start_square as u32,
                            ep_square,
                            Move::EN_PASSANT_FLAG,
                        );
                        if !movegen::is_legal(&mut self.entry.position, &mut ep_move, true) {
                            destinations &= !(1u64 << ep_square);
                        }
                    }

                    let num_moves = destinations.count_ones();
                    if num_moves == 0 {
                        return Err(EngineError::Stream("pawn has no destinations".into()));
                    }
                    let move_id = self.read_bits(bit_width(num_moves - 1))?;
                    let target = index_of_nth_set_bit(destinations, move_id as usize)? as u32;
                    let flags = if ep_square != 0 && target == ep_square {
                        Move::EN_PASSANT_FLAG
                    } else {
                        0
                    };
                    (target, flags)
                }
            }
            KING => {
                let num_castlings = self.entry.position.has_kingside_castling_rights(c) as u32
                    + self.entry.position.has_queenside_castling_rights(c) as u32;
                let num_moves = destinations.count_ones();
                if num_moves + num_castlings == 0 {
                    return Err(EngineError::Stream("king has no destinations".into()));
                }
                let move_id =
                    self.read_bits(bit_width(num_moves + num_castlings - 1))? as u32;

                if move_id >= num_moves {
                    // indices past the normal destinations select a castling;
                    // with both rights live, the first is queenside
                    let castle_id = move_id - num_moves;
                    let target = if castle_id != 0
                        || !self.entry.position.has_queenside_castling_rights(c)
                    {
                        start_square as u32 + 2
                    } else {
                        start_square as u32 - 2
                    };
                    (target, Move::CASTLE_FLAG)
                } else {
                    (
                        index_of_nth_set_bit(destinations, move_id as usize)? as u32,
                        0,
                    )
                }
            }
            KNIGHT..=QUEEN => {
                let num_moves = destinations.count_ones();
                if num_moves == 0 {
                    return Err(EngineError::Stream("piece has no destinations".into()));
                }
                let move_id = self.read_bits(bit_width(num_moves - 1))?;
                (
                    index_of_nth_set_bit(destinations, move_id as usize)? as u32,
                    0,
                )
            }
            _ => {
                return Err(EngineError::Stream(
                    "no piece at move start square".into(),
                ))
            }
        };

        let mut mv = Move::new(start_square as u32, target_square, flags);
        if !movegen::is_legal(&mut self.entry.position, &mut mv, false) {
            return Err(EngineError::IllegalMove(format!(
                "movetext move {} is not legal in {}",
                mv.as_long_algebraic(),
                self.entry.position.as_fen()
            )));
        }
        Ok(mv)
    }

    /// Read up to 8 bits, most significant first, crossing a byte boundary
    /// when needed.
    fn read_bits(&mut self, num_bits: u32) -> EngineResult<u8> {
        if num_bits == 0 {
            return Ok(0);
        }
        debug_assert!(num_bits <= 8);

        if self.bits_remaining == 8 && !self.data_available() {
            return Err(EngineError::Stream("not enough bits left".into()));
        }

        let byte = self.mmap[self.block_start + self.byte_index] << (8 - self.bits_remaining);
        let mut bits = byte >> (8 - num_bits);

        if num_bits > self.bits_remaining {
            if self.byte_index + 1 >= self.block_size {
                return Err(EngineError::Stream("not enough bits left".into()));
            }
            let spill_count = num_bits - self.bits_remaining;
            bits |= self.mmap[self.block_start + self.byte_index + 1] >> (8 - spill_count);

            self.bits_remaining += 8;
            self.byte_index += 1;
        }

        self.bits_remaining -= num_bits;
        if self.bits_remaining == 0 {
            self.byte_index += 1;
            self.bits_remaining = 8;
        }
        Ok(bits)
    }
}

/// Bits needed to address `x + 1` values.
#[inline]
fn bit_width(x: u32) -> u32 {
    32 - x.leading_zeros()
}

/// Decode the zig-zag style sign encoding: sign bit in the lsb, magnitude
/// bits complemented for negative values.
fn unsigned_to_signed(val: u16) -> i16 {
    let val = val.rotate_right(1);
    let val = if val & 0x8000 != 0 { val ^ 0x7FFF } else { val };
    val as i16
}

/// Index of the `n`-th (0-based) set bit, in ascending square order.
fn index_of_nth_set_bit(mut val: u64, n: usize) -> EngineResult<usize> {
    for _ in 0..n {
        val &= val.wrapping_sub(1);
    }
    if val == 0 {
        return Err(EngineError::Stream(
            "bit index past the end of the set".into(),
        ));
    }
    Ok(val.trailing_zeros() as usize)
}
