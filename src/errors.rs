//! Error types for the position engine and training-data decoder.

use thiserror::Error;

/// Errors surfaced by the engine's parsing and streaming layers.
///
/// Move generation itself never errors: pseudo-legal moves that fail the
/// legality gate are rolled back silently inside make-move.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed FEN, UCI position string, long-algebraic move or square text.
    #[error("parse error: {0}")]
    Parse(String),

    /// A move that is not legal in the position it was applied to
    /// (UCI move lists, training-stream movetext).
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// A malformed or truncated binpack stream.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
