//! Perft harness: count move-generation nodes for a position.
//!
//! Usage: cargo run --release --bin perft -- [--fen "<fen>"] [--depth N] [--timeout MS]

use std::time::Duration;

use anyhow::Result;
use kestrel_chess::board::STARTING_FEN;
use kestrel_chess::perft;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut fen = STARTING_FEN.to_string();
    let mut depth: u32 = 5;
    let mut timeout_ms: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--fen" | "-f" => {
                i += 1;
                fen = args[i].clone();
            }
            "--depth" | "-d" => {
                i += 1;
                depth = args[i].parse()?;
            }
            "--timeout" | "-t" => {
                i += 1;
                timeout_ms = Some(args[i].parse()?);
            }
            "--help" | "-h" => {
                println!("Usage: perft [OPTIONS]");
                println!("  --fen FEN     Position to search (default: starting position)");
                println!("  --depth N     Search depth in plies (default: 5)");
                println!("  --timeout MS  Abort after this many milliseconds");
                return Ok(());
            }
            other => {
                anyhow::bail!("unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let timeout = timeout_ms.map(|ms| perft::set_timeout(Duration::from_millis(ms)));
    perft::perft_report(&fen, depth)?;
    if let Some(handle) = timeout {
        handle.join().ok();
    }

    Ok(())
}
