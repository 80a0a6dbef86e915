//! Game layer: a board plus played-move history, SAN/PGN emission and a
//! cached legal-move list that doubles as the game-over signal.
//!
//! The legal-move cache is empty when the game is over, either because the
//! side to move has no legal moves (mate or stalemate) or because a draw rule
//! has fired. Hosts drive the game through `input_move` and read the cache.

use std::collections::BTreeMap;

use crate::board::{Board, STARTING_FEN};
use crate::defs::{square_to_algebraic, type_of, PAWN};
use crate::errors::{EngineError, EngineResult};
use crate::movegen;
use crate::mv::Move;

pub struct Game {
    pub board: Board,
    /// All moves played so far.
    pub game_moves: Vec<Move>,
    /// The same moves in standard algebraic notation.
    pub game_moves_in_algebraic: Vec<String>,
    /// The FEN the game was initialized from.
    pub beginning_fen: String,
    current_legal_moves: Vec<Move>,
}

impl Game {
    pub fn new() -> Self {
        Game::from_fen(STARTING_FEN).expect("starting position FEN is valid")
    }

    pub fn from_fen(fen: &str) -> EngineResult<Self> {
        let board = Board::from_fen(fen)?;
        let mut game = Game {
            board,
            game_moves: Vec::new(),
            game_moves_in_algebraic: Vec::new(),
            beginning_fen: fen.trim().to_string(),
            current_legal_moves: Vec::new(),
        };
        game.refresh_legal_moves();
        Ok(game)
    }

    /// Load a position from a UCI position string:
    /// `position (startpos | fen <six fields>) [moves <m1> <m2> ...]`.
    ///
    /// Every listed move must be legal against the running position. Parsing
    /// builds a fresh game and publishes only on success.
    pub fn from_uci_string(uci_string: &str) -> EngineResult<Self> {
        let words: Vec<&str> = uci_string.split_whitespace().collect();

        if words.first() != Some(&"position") {
            return Err(EngineError::Parse(
                "UCI position string should begin with \"position\"".into(),
            ));
        }

        let mut i;
        let mut game = match words.get(1) {
            Some(&"startpos") => {
                i = 2;
                Game::new()
            }
            Some(&"fen") if words.len() >= 8 => {
                let fen = words[2..8].join(" ");
                i = 8;
                Game::from_fen(&fen)?
            }
            _ => {
                return Err(EngineError::Parse(
                    "UCI position string does not contain valid startpos/fen info".into(),
                ))
            }
        };

        if i < words.len() {
            if words[i] != "moves" {
                return Err(EngineError::Parse(format!(
                    "expected \"moves\", got {:?}",
                    words[i]
                )));
            }
            i += 1;

            for &lan in &words[i..] {
                let mv = Move::from_long_algebraic(&game.board, lan)?;
                if !game.input_move(mv) {
                    return Err(EngineError::IllegalMove(format!(
                        "{} is not legal in {}",
                        lan,
                        game.board.as_fen()
                    )));
                }
            }
        }

        Ok(game)
    }

    pub fn white_to_move(&self) -> bool {
        self.board.white_to_move()
    }

    /// Legal moves of the current position; empty means the game is over.
    pub fn get_legal_moves(&self) -> &[Move] {
        &self.current_legal_moves
    }

    /// True if the move is among the current legal moves.
    pub fn is_legal(&self, mv: Move) -> bool {
        self.current_legal_moves.contains(&mv)
    }

    /// True if the side to move is in check.
    pub fn in_check(&self) -> bool {
        movegen::king_attacked(&self.board, self.board.side_index())
    }

    /// Play the move if it is legal; records SAN before the position changes.
    pub fn input_move(&mut self, mv: Move) -> bool {
        // take the generated twin so the legality cache carries over
        let mut mv = match self.current_legal_moves.iter().find(|m| **m == mv) {
            Some(m) => *m,
            None => return false,
        };

        if mv.is_castling() {
            let san = if mv.target_square() < mv.start_square() {
                "O-O-O"
            } else {
                "O-O"
            };
            self.game_moves.push(mv);
            movegen::make_move(&mut self.board, &mut mv);
            self.refresh_legal_moves();
            let san = format!("{}{}", san, self.check_suffix());
            self.game_moves_in_algebraic.push(san);
            return true;
        }

        let mut algebraic = String::new();
        let moving_piece = mv.moving_piece(&self.board);
        let is_capture =
            self.board.squares[mv.target_square() as usize] != 0 || mv.is_en_passant();

        if type_of(moving_piece) == PAWN {
            // pawn moves carry no piece letter; captures name the start file
            if is_capture {
                algebraic.push(square_to_algebraic(mv.start_square()).as_bytes()[0] as char);
            }
        } else {
            let identifiers = [' ', ' ', 'N', 'B', 'R', 'Q', 'K'];
            algebraic.push(identifiers[type_of(moving_piece) as usize]);

            // disambiguate among same-type pieces that can reach the same target
            let ambiguous_starts: Vec<u32> = self
                .current_legal_moves
                .iter()
                .filter(|other| {
                    other.moving_piece(&self.board) == moving_piece
                        && other.target_square() == mv.target_square()
                        && other.start_square() != mv.start_square()
                })
                .map(|other| other.start_square())
                .collect();

            if !ambiguous_starts.is_empty() {
                let file = mv.start_square() & 0b111;
                let rank = mv.start_square() >> 3;
                let start_algebraic = square_to_algebraic(mv.start_square());

                if !ambiguous_starts.iter().any(|s| s & 0b111 == file) {
                    algebraic.push(start_algebraic.as_bytes()[0] as char);
                } else if !ambiguous_starts.iter().any(|s| s >> 3 == rank) {
                    algebraic.push(start_algebraic.as_bytes()[1] as char);
                } else {
                    algebraic += &start_algebraic;
                }
            }
        }

        if is_capture {
            algebraic.push('x');
        }
        algebraic += &square_to_algebraic(mv.target_square());

        if mv.is_promotion() {
            let identifiers = [' ', ' ', 'N', 'B', 'R', 'Q'];
            algebraic.push('=');
            algebraic.push(identifiers[mv.promoted_to() as usize]);
        }

        self.game_moves.push(mv);
        movegen::make_move(&mut self.board, &mut mv);
        self.refresh_legal_moves();

        algebraic += &self.check_suffix();
        self.game_moves_in_algebraic.push(algebraic);
        true
    }

    /// Parse and play a move in long algebraic notation.
    pub fn input_move_lan(&mut self, long_algebraic: &str) -> bool {
        match Move::from_long_algebraic(&self.board, long_algebraic) {
            Ok(mv) => self.input_move(mv),
            Err(_) => false,
        }
    }

    pub fn as_fen(&self) -> String {
        self.board.as_fen()
    }

    /// The game in Portable Game Notation with the seven-tag roster.
    ///
    /// Caller-supplied headers override the defaults; any extra headers are
    /// emitted after the roster in sorted order. Date defaults to the PGN
    /// unknown-date token.
    pub fn as_pgn(&self, headers: &BTreeMap<String, String>) -> String {
        let mut headers = headers.clone();
        let mut pgn = String::new();

        let mut tag = |pgn: &mut String, name: &str, default: String| {
            let value = headers.remove(name).unwrap_or(default);
            *pgn += &format!("[{} \"{}\"]\n", name, value);
        };

        tag(&mut pgn, "Event", "??".into());
        tag(&mut pgn, "Date", "????.??.??".into());
        tag(&mut pgn, "White", "??".into());
        tag(&mut pgn, "Black", "??".into());

        let game_over = self.current_legal_moves.is_empty();
        tag(
            &mut pgn,
            "Termination",
            if game_over { "Normal" } else { "Forfeit" }.into(),
        );

        let result = headers.remove("Result").unwrap_or_else(|| {
            if game_over && !self.in_check() {
                "1/2-1/2".into()
            } else if self.white_to_move() {
                "0-1".into()
            } else {
                "1-0".into()
            }
        });
        pgn += &format!("[Result \"{}\"]\n", result);

        if self.beginning_fen != STARTING_FEN {
            pgn += "[SetUp \"1\"]\n";
            pgn += &format!("[FEN \"{}\"]\n", self.beginning_fen);
        } else {
            pgn += "[SetUp \"0\"]\n";
        }
        headers.remove("SetUp");
        headers.remove("FEN");

        for (name, value) in &headers {
            pgn += &format!("[{} \"{}\"]\n", name, value);
        }

        pgn.push('\n');

        for (i, san) in self.game_moves_in_algebraic.iter().enumerate() {
            if i % 2 == 0 {
                pgn += &format!("{}. ", i / 2 + 1);
            }
            pgn += san;
            pgn.push(' ');
        }
        pgn += &result;
        pgn += "\n\n";

        pgn
    }

    fn check_suffix(&self) -> &'static str {
        if self.in_check() {
            if self.current_legal_moves.is_empty() {
                "#"
            } else {
                "+"
            }
        } else {
            ""
        }
    }

    /// Regenerate the legal-move cache; a fired draw rule empties it.
    fn refresh_legal_moves(&mut self) {
        if movegen::is_draw_by_fifty_move_rule(&self.board)
            || movegen::is_draw_by_repetition(&self.board)
            || movegen::is_draw_by_insufficient_material(&self.board)
        {
            self.current_legal_moves = Vec::new();
        } else {
            self.current_legal_moves = movegen::generate_legal_moves(&mut self.board);
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_moves_and_fens() {
        let mut game = Game::new();
        assert!(game.input_move_lan("e2e4"));
        assert_eq!(
            game.as_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert!(game.input_move_lan("e7e5"));
        assert_eq!(
            game.as_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );
        assert_eq!(game.game_moves_in_algebraic, vec!["e4", "e5"]);
    }

    #[test]
    fn test_illegal_input_rejected() {
        let mut game = Game::new();
        assert!(!game.input_move_lan("e2e5"));
        assert!(!game.input_move_lan("e7e5"));
        assert!(!game.input_move_lan("zz99"));
        assert!(game.game_moves.is_empty());
    }

    #[test]
    fn test_castling_san_and_rights() {
        let mut game = Game::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert!(game.input_move_lan("e1g1"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "O-O");
        assert!(!game.board.has_kingside_castling_rights(0));
        assert!(!game.board.has_queenside_castling_rights(0));
        assert!(game.input_move_lan("e8c8"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "O-O-O");
    }

    #[test]
    fn test_san_capture_and_pawn_capture() {
        let mut game = Game::new();
        game.input_move_lan("e2e4");
        game.input_move_lan("d7d5");
        assert!(game.input_move_lan("e4d5"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "exd5");
        game.input_move_lan("d8d5");
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "Qxd5");
    }

    #[test]
    fn test_san_disambiguation_by_file() {
        // two knights on b1 and f3 can both reach d2
        let mut game = Game::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        assert!(game.input_move_lan("f3d2"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "Nfd2");
    }

    #[test]
    fn test_san_disambiguation_by_rank() {
        // rooks on a1 and a5 can both reach a3
        let mut game = Game::from_fen("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1").unwrap();
        assert!(game.input_move_lan("a1a3"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "R1a3");
    }

    #[test]
    fn test_back_rank_mate_san_and_empty_moves() {
        let mut game = Game::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        assert!(game.input_move_lan("a1a8"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "Ra8#");
        assert!(game.get_legal_moves().is_empty());
        assert!(game.in_check());
    }

    #[test]
    fn test_check_suffix() {
        let mut game = Game::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        assert!(game.input_move_lan("a1a8"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "Ra8+");
    }

    #[test]
    fn test_promotion_san() {
        let mut game = Game::from_fen("8/P4k2/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(game.input_move_lan("a7a8q"));
        assert_eq!(game.game_moves_in_algebraic.last().unwrap(), "a8=Q");
    }

    #[test]
    fn test_fifty_move_draw_empties_moves() {
        let game = Game::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 50 90").unwrap();
        assert!(game.get_legal_moves().is_empty());
        assert!(!game.in_check());
    }

    #[test]
    fn test_repetition_draw_empties_moves() {
        let mut game = Game::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        for _ in 0..2 {
            for lan in ["a1b1", "e8d8", "b1a1", "d8e8"] {
                assert!(game.input_move_lan(lan));
            }
        }
        assert!(game.get_legal_moves().is_empty());
    }

    #[test]
    fn test_uci_position_string() {
        let game =
            Game::from_uci_string("position startpos moves e2e4 e7e5 g1f3").unwrap();
        assert_eq!(
            game.as_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 1 2"
        );

        let game = Game::from_uci_string(
            "position fen r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1 moves e1g1",
        )
        .unwrap();
        assert!(!game.board.has_kingside_castling_rights(0));

        assert!(Game::from_uci_string("position startpos moves e2e5").is_err());
        assert!(Game::from_uci_string("startpos").is_err());
        assert!(Game::from_uci_string("position startpos e2e4").is_err());
    }

    #[test]
    fn test_pgn_output() {
        let mut game = Game::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        game.input_move_lan("a1a8");

        let mut headers = BTreeMap::new();
        headers.insert("Event".to_string(), "Test Match".to_string());
        headers.insert("White".to_string(), "Engine".to_string());
        let pgn = game.as_pgn(&headers);

        assert!(pgn.contains("[Event \"Test Match\"]"));
        assert!(pgn.contains("[White \"Engine\"]"));
        assert!(pgn.contains("[Black \"??\"]"));
        assert!(pgn.contains("[Termination \"Normal\"]"));
        assert!(pgn.contains("[Result \"1-0\"]"));
        assert!(pgn.contains("[SetUp \"1\"]"));
        assert!(pgn.contains("[FEN \"6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1\"]"));
        assert!(pgn.contains("1. Ra8# 1-0"));
    }

    #[test]
    fn test_pgn_startpos_has_no_fen_header() {
        let mut game = Game::new();
        game.input_move_lan("e2e4");
        let pgn = game.as_pgn(&BTreeMap::new());
        assert!(pgn.contains("[SetUp \"0\"]"));
        assert!(!pgn.contains("[FEN"));
        assert!(pgn.contains("[Date \"????.??.??\"]"));
        assert!(pgn.contains("1. e4 "));
    }
}
