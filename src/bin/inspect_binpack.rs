//! Dump entries from a binpack training-data file.
//!
//! Usage: cargo run --release --bin inspect_binpack -- --file data.binpack [--limit N]

use anyhow::Result;
use kestrel_chess::binpack::BinpackStream;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut file = String::new();
    let mut limit: u64 = 10;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--file" | "-f" => {
                i += 1;
                file = args[i].clone();
            }
            "--limit" | "-n" => {
                i += 1;
                limit = args[i].parse()?;
            }
            "--help" | "-h" => {
                println!("Usage: inspect_binpack [OPTIONS]");
                println!("  --file PATH  Binpack file to read");
                println!("  --limit N    Entries to print (default: 10)");
                return Ok(());
            }
            other => {
                anyhow::bail!("unknown argument: {}", other);
            }
        }
        i += 1;
    }

    if file.is_empty() {
        anyhow::bail!("--file is required");
    }

    let mut stream = BinpackStream::new(&file, 0.0, 0, 1)?;
    let mut shown = 0u64;

    while shown < limit {
        match stream.next_entry()? {
            Some(entry) => {
                println!(
                    "{:4} fen {:<72} move {:6} score {:6} result {:2} ply {}",
                    shown,
                    entry.position.as_fen(),
                    entry.mv.as_long_algebraic(),
                    entry.score,
                    entry.result,
                    entry.position.halfmove_number
                );
                shown += 1;
            }
            None => break,
        }
    }

    println!("{} entries shown ({} decoded)", shown, stream.entries_read());
    Ok(())
}
