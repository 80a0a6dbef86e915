//! Kestrel demo driver.
//!
//! A minimal line-oriented loop for poking at the engine: feed it moves in
//! long algebraic notation, load positions, and print the board, legal moves
//! or the PGN of the game so far.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use kestrel_chess::game::Game;

fn main() -> Result<()> {
    let mut game = Game::new();

    println!("Kestrel position engine");
    println!("Commands: <lan move> | position <uci position args> | fen <6 fields> | moves | board | pgn | quit");
    print!("> ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();

        if input.is_empty() {
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        match input.split_whitespace().next() {
            Some("quit") => break,
            Some("board") => print!("{}", game.board.as_pretty_string()),
            Some("moves") => {
                let lans: Vec<String> = game
                    .get_legal_moves()
                    .iter()
                    .map(|m| m.as_long_algebraic())
                    .collect();
                println!("{} legal: {}", lans.len(), lans.join(" "));
            }
            Some("pgn") => print!("{}", game.as_pgn(&BTreeMap::new())),
            Some("position") => match Game::from_uci_string(input) {
                Ok(loaded) => {
                    game = loaded;
                    println!("ok: {}", game.as_fen());
                }
                Err(e) => println!("{}", e),
            },
            Some("fen") => match Game::from_fen(input.trim_start_matches("fen").trim()) {
                Ok(loaded) => {
                    game = loaded;
                    println!("ok: {}", game.as_fen());
                }
                Err(e) => println!("{}", e),
            },
            _ => {
                if game.input_move_lan(input) {
                    println!(
                        "{} -> {}",
                        game.game_moves_in_algebraic.last().map(String::as_str).unwrap_or(""),
                        game.as_fen()
                    );
                    if game.get_legal_moves().is_empty() {
                        println!("game over");
                        print!("{}", game.as_pgn(&BTreeMap::new()));
                    }
                } else {
                    println!("not a legal move: {}", input);
                }
            }
        }

        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}
