//! Perft verification against published node counts.
//!
//! Depths are kept shallow enough for a debug-build test run; the full-depth
//! counts are behind `#[ignore]` (run with `cargo test --release -- --ignored`).

use kestrel_chess::board::STARTING_FEN;
use kestrel_chess::perft::perft_nodes;

struct PerftCase {
    fen: &'static str,
    expected_nodes: &'static [u64],
}

const CASES: &[PerftCase] = &[
    PerftCase {
        fen: STARTING_FEN,
        expected_nodes: &[20, 400, 8_902, 197_281],
    },
    // "kiwipete": castling, en passant and promotion interplay
    PerftCase {
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        expected_nodes: &[48, 2_039, 97_862],
    },
    // en-passant discovered-check trap position
    PerftCase {
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        expected_nodes: &[14, 191, 2_812, 43_238],
    },
    // promotion-heavy middlegame
    PerftCase {
        fen: "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
        expected_nodes: &[6, 264, 9_467],
    },
    PerftCase {
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        expected_nodes: &[44, 1_486, 62_379],
    },
    PerftCase {
        fen: "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        expected_nodes: &[46, 2_079, 89_890],
    },
];

#[test]
fn perft_shallow_suite() {
    for case in CASES {
        for (i, &expected) in case.expected_nodes.iter().enumerate() {
            let depth = i as u32 + 1;
            let nodes = perft_nodes(case.fen, depth).unwrap();
            assert_eq!(
                nodes, expected,
                "perft({}) mismatch for {}",
                depth, case.fen
            );
        }
    }
}

#[test]
#[ignore] // slow: run in release builds
fn perft_starting_depth_5() {
    assert_eq!(perft_nodes(STARTING_FEN, 5).unwrap(), 4_865_609);
}

#[test]
#[ignore] // slow: run in release builds
fn perft_starting_depth_6() {
    assert_eq!(perft_nodes(STARTING_FEN, 6).unwrap(), 119_060_324);
}

#[test]
#[ignore] // slow: run in release builds
fn perft_deep_suite() {
    let deep: &[(&str, u32, u64)] = &[
        (
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            4,
            4_085_603,
        ),
        ("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 5, 674_624),
        (
            "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
            4,
            422_333,
        ),
        (
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            4,
            2_103_487,
        ),
    ];
    for &(fen, depth, expected) in deep {
        assert_eq!(perft_nodes(fen, depth).unwrap(), expected, "{}", fen);
    }
}
