//! Precomputed attack tables.
//!
//! Leaper attacks (pawn/knight/king) are fixed masks per square. Sliding
//! attacks use eight directional ray tables: the squares strictly beyond a
//! square in one direction, up to the board edge. The nearest blocker on a
//! ray is its least significant bit for the rising directions (N, NE, E, NW)
//! and the most significant bit for the falling ones (S, SE, SW, W); the
//! attacked squares are then `ray(sq) ^ ray(blocker)`.
//!
//! Each ray table has 65 entries: index 64 is empty, so the `trailing_zeros`
//! sentinel of an empty blocker set resolves to an empty ray without a branch.

use crate::defs::Bitboard;

pub const NORTH: usize = 0;
pub const NORTH_EAST: usize = 1;
pub const EAST: usize = 2;
pub const SOUTH_EAST: usize = 3;
pub const SOUTH: usize = 4;
pub const SOUTH_WEST: usize = 5;
pub const WEST: usize = 6;
pub const NORTH_WEST: usize = 7;

pub const DIRECTION_COUNT: usize = 8;

/// (file delta, rank delta) per direction, same order as the constants above.
const DIRECTION_OFFSETS: [(i8, i8); DIRECTION_COUNT] = [
    (0, 1),   // N
    (1, 1),   // NE
    (1, 0),   // E
    (1, -1),  // SE
    (0, -1),  // S
    (-1, -1), // SW
    (-1, 0),  // W
    (-1, 1),  // NW
];

pub const DIAGONAL_DIRECTIONS: [usize; 4] = [NORTH_EAST, SOUTH_EAST, SOUTH_WEST, NORTH_WEST];
pub const STRAIGHT_DIRECTIONS: [usize; 4] = [NORTH, EAST, SOUTH, WEST];

/// The nearest blocker sits at the lsb of these rays, at the msb of the rest.
#[inline]
pub fn is_rising(direction: usize) -> bool {
    matches!(direction, NORTH | NORTH_EAST | EAST | NORTH_WEST)
}

pub struct AttackTables {
    pub knight: [Bitboard; 64],
    pub king: [Bitboard; 64],
    pub pawn_attacks: [[Bitboard; 64]; 2], // [0] White, [1] Black
    /// rays[direction][square]; entry 64 of every direction is empty.
    pub rays: [[Bitboard; 65]; DIRECTION_COUNT],
    /// Union of the four diagonal rays per square (quick reachability filter).
    pub diagonal_rays: [Bitboard; 64],
    /// Union of the four orthogonal rays per square.
    pub straight_rays: [Bitboard; 64],
}

lazy_static::lazy_static! {
    pub static ref TABLES: AttackTables = get_attack_tables();
}

pub fn get_attack_tables() -> AttackTables {
    let mut tables = AttackTables {
        knight: [0; 64],
        king: [0; 64],
        pawn_attacks: [[0; 64]; 2],
        rays: [[0; 65]; DIRECTION_COUNT],
        diagonal_rays: [0; 64],
        straight_rays: [0; 64],
    };

    for sq in 0..64usize {
        let f = (sq % 8) as i8;
        let r = (sq / 8) as i8;

        for (df, dr) in [(-2, -1), (-2, 1), (-1, -2), (-1, 2), (1, -2), (1, 2), (2, -1), (2, 1)] {
            let nf = f + df;
            let nr = r + dr;
            if (0..8).contains(&nf) && (0..8).contains(&nr) {
                tables.knight[sq] |= 1u64 << (nr * 8 + nf);
            }
        }

        for df in -1..=1 {
            for dr in -1..=1 {
                if df == 0 && dr == 0 {
                    continue;
                }
                let nf = f + df;
                let nr = r + dr;
                if (0..8).contains(&nf) && (0..8).contains(&nr) {
                    tables.king[sq] |= 1u64 << (nr * 8 + nf);
                }
            }
        }

        // pawn attack masks are the two forward diagonals, no pushes
        if r < 7 {
            if f > 0 {
                tables.pawn_attacks[0][sq] |= 1u64 << (sq + 7);
            }
            if f < 7 {
                tables.pawn_attacks[0][sq] |= 1u64 << (sq + 9);
            }
        }
        if r > 0 {
            if f > 0 {
                tables.pawn_attacks[1][sq] |= 1u64 << (sq - 9);
            }
            if f < 7 {
                tables.pawn_attacks[1][sq] |= 1u64 << (sq - 7);
            }
        }

        for (direction, (df, dr)) in DIRECTION_OFFSETS.iter().enumerate() {
            let mut nf = f + df;
            let mut nr = r + dr;
            while (0..8).contains(&nf) && (0..8).contains(&nr) {
                tables.rays[direction][sq] |= 1u64 << (nr * 8 + nf);
                nf += df;
                nr += dr;
            }
        }

        for direction in DIAGONAL_DIRECTIONS {
            tables.diagonal_rays[sq] |= tables.rays[direction][sq];
        }
        for direction in STRAIGHT_DIRECTIONS {
            tables.straight_rays[sq] |= tables.rays[direction][sq];
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::algebraic_to_square;

    fn bb(squares: &[&str]) -> Bitboard {
        squares
            .iter()
            .map(|s| 1u64 << algebraic_to_square(s).unwrap())
            .fold(0, |acc, b| acc | b)
    }

    #[test]
    fn test_knight_masks() {
        let a1 = algebraic_to_square("a1").unwrap() as usize;
        assert_eq!(TABLES.knight[a1], bb(&["b3", "c2"]));
        let d4 = algebraic_to_square("d4").unwrap() as usize;
        assert_eq!(
            TABLES.knight[d4],
            bb(&["b3", "b5", "c2", "c6", "e2", "e6", "f3", "f5"])
        );
    }

    #[test]
    fn test_pawn_masks() {
        let e4 = algebraic_to_square("e4").unwrap() as usize;
        assert_eq!(TABLES.pawn_attacks[0][e4], bb(&["d5", "f5"]));
        assert_eq!(TABLES.pawn_attacks[1][e4], bb(&["d3", "f3"]));
        let a2 = algebraic_to_square("a2").unwrap() as usize;
        assert_eq!(TABLES.pawn_attacks[0][a2], bb(&["b3"]));
        // masks on the last rank stay empty
        let e8 = algebraic_to_square("e8").unwrap() as usize;
        assert_eq!(TABLES.pawn_attacks[0][e8], 0);
    }

    #[test]
    fn test_rays() {
        let d4 = algebraic_to_square("d4").unwrap() as usize;
        assert_eq!(TABLES.rays[NORTH][d4], bb(&["d5", "d6", "d7", "d8"]));
        assert_eq!(TABLES.rays[SOUTH_WEST][d4], bb(&["c3", "b2", "a1"]));
        assert_eq!(TABLES.rays[EAST][d4], bb(&["e4", "f4", "g4", "h4"]));
        // the no-blocker sentinel entry is empty in every direction
        for direction in 0..DIRECTION_COUNT {
            assert_eq!(TABLES.rays[direction][64], 0);
        }
    }

    #[test]
    fn test_ray_unions() {
        for sq in 0..64 {
            let diag: Bitboard = DIAGONAL_DIRECTIONS
                .iter()
                .map(|&d| TABLES.rays[d][sq])
                .fold(0, |a, b| a | b);
            let straight: Bitboard = STRAIGHT_DIRECTIONS
                .iter()
                .map(|&d| TABLES.rays[d][sq])
                .fold(0, |a, b| a | b);
            assert_eq!(TABLES.diagonal_rays[sq], diag);
            assert_eq!(TABLES.straight_rays[sq], straight);
        }
    }
}
