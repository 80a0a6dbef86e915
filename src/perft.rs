//! Perft: exhaustive move-path counting for move generator verification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::board::Board;
use crate::errors::EngineResult;
use crate::movegen;
use crate::mv::MoveList;

/// Cleared to abort a running perft; polled at recursion boundaries.
pub static SEARCH_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Count leaf nodes `depth` plies below the current position.
///
/// Recurses over pseudo-legal moves; the make-move gate filters the illegal
/// ones. Returns a partial count if `SEARCH_ACTIVE` is cleared mid-search.
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    if !SEARCH_ACTIVE.load(Ordering::Relaxed) {
        return 0;
    }

    let mut list = MoveList::new();
    movegen::generate_pseudo_legal_moves(board, &mut list);

    let mut nodes = 0;
    for i in 0..list.count {
        let mut mv = list.moves[i];
        if movegen::make_move(board, &mut mv) {
            nodes += perft(board, depth - 1);
            movegen::unmake_move(board, &mv);
        }
    }
    nodes
}

/// Total node count for a position, without the per-move printout.
pub fn perft_nodes(fen: &str, depth: u32) -> EngineResult<u64> {
    let mut board = Board::from_fen(fen)?;
    SEARCH_ACTIVE.store(true, Ordering::Relaxed);
    let nodes = perft(&mut board, depth);
    SEARCH_ACTIVE.store(false, Ordering::Relaxed);
    Ok(nodes)
}

/// Run perft with a per-root-move breakdown printed to stdout.
pub fn perft_report(fen: &str, depth: u32) -> EngineResult<u64> {
    println!("Running perft:\n - Starting FEN: {}\n - Depth: {}\nMoves:", fen, depth);

    let mut board = Board::from_fen(fen)?;
    SEARCH_ACTIVE.store(true, Ordering::Relaxed);

    let start = Instant::now();
    let mut total = 0;

    for mut mv in movegen::generate_legal_moves(&mut board) {
        print!(" - {}: ", mv.as_long_algebraic());

        movegen::make_move(&mut board, &mut mv);
        let nodes = perft(&mut board, depth - 1);
        movegen::unmake_move(&mut board, &mv);

        println!("{}", nodes);
        total += nodes;
    }

    SEARCH_ACTIVE.store(false, Ordering::Relaxed);

    println!(
        "Done!\n - Total: {}\n - Time: {}ms",
        total,
        start.elapsed().as_millis()
    );
    Ok(total)
}

/// Abort any running perft after the given duration.
pub fn set_timeout(duration: Duration) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        SEARCH_ACTIVE.store(false, Ordering::Relaxed);
    })
}
