use std::fmt;

use crate::geometry::Square;

/// Why a proposed move was rejected by [`crate::movegen::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalMoveReason {
    NoPieceAtSquare,
    WrongColorToMove,
    DoubleOccupancy,
    TargetNotEmpty,
    TargetOccupiedByFriendly,
    CaptureTargetEmpty,
    SplitTargetsNotDistinct,
    SplitRatioOutOfRange,
    MergeSourcesNotSameIdentity,
    MergeSourcesNotDistinct,
    NotSuperposed,
    CastlingRightRevoked,
    CastlingPathNotClear,
    CastlingRookMissing,
    EnPassantTargetMismatch,
    PromotionKindInvalid,
    NotAMoveForThisPieceKind,
}

impl fmt::Display for IllegalMoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NoPieceAtSquare => "no piece with that identity at the source square",
            Self::WrongColorToMove => "it is not that color's turn to move",
            Self::DoubleOccupancy => "move would place two different pieces certainly on one square",
            Self::TargetNotEmpty => "target square is not certainly empty",
            Self::TargetOccupiedByFriendly => "target square holds a piece of the same color",
            Self::CaptureTargetEmpty => "capture target holds no mass belonging to the opposing color",
            Self::SplitTargetsNotDistinct => "split targets must be two distinct squares",
            Self::SplitRatioOutOfRange => "split ratio must lie strictly between 0 and 1",
            Self::MergeSourcesNotSameIdentity => "merge sources do not belong to the same piece",
            Self::MergeSourcesNotDistinct => "merge sources must be two distinct squares",
            Self::NotSuperposed => "piece has only one branch, nothing to merge",
            Self::CastlingRightRevoked => "castling right for that side has already been lost",
            Self::CastlingPathNotClear => "a square between king and rook is not certainly empty",
            Self::CastlingRookMissing => "the castling rook is not certainly present at its corner",
            Self::EnPassantTargetMismatch => "there is no en-passant target on that square",
            Self::PromotionKindInvalid => "promotion target must be queen, rook, bishop or knight",
            Self::NotAMoveForThisPieceKind => "that move shape is not reachable by this piece kind",
        };
        f.write_str(msg)
    }
}

/// Errors raised by engine operations whose precondition was violated.
///
/// `RequiresMeasurement` and turn-loss are deliberately not variants here —
/// they are expected outcomes, not failures, and are surfaced through
/// [`crate::movegen::Validation`] and [`crate::executor::ExecutionOutcome`]
/// instead.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    InvalidState(String),
    IllegalMove(IllegalMoveReason),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::IllegalMove(reason) => write!(f, "illegal move: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn illegal(reason: IllegalMoveReason) -> Self {
        Self::IllegalMove(reason)
    }
}

/// A square referenced by an error message, kept separate from the enum
/// above since most `InvalidState` causes are not square-specific.
pub fn invalid_square(square: Square) -> EngineError {
    EngineError::invalid_state(format!("square {square} is off the board or malformed"))
}
