//! The exhaustive move sum type callers submit to the executor ([`Move`]),
//! and the move-record sum type the executor/history emits in the wire
//! schema ([`MoveRecord`]).

use serde::{Deserialize, Serialize};

use crate::board::PieceId;
use crate::geometry::Square;
use crate::pieces::{PieceKind, Side};

/// A caller-proposed move, already classified by kind. Movegen tells
/// `Normal` and `Capture` apart by whether the target currently holds any
/// mass belonging to the opposing color; the executor re-checks this at
/// move time since that classification can change between generation and
/// submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Move {
    Normal {
        piece_id: PieceId,
        from: Square,
        to: Square,
    },
    Capture {
        piece_id: PieceId,
        from: Square,
        to: Square,
    },
    Split {
        piece_id: PieceId,
        from: Square,
        to1: Square,
        to2: Square,
        ratio: Option<f64>,
    },
    Merge {
        piece_id: PieceId,
        from1: Square,
        from2: Square,
        to: Square,
    },
    Castling {
        piece_id: PieceId,
        side: Side,
    },
    EnPassant {
        piece_id: PieceId,
        from: Square,
        to: Square,
    },
    Promotion {
        piece_id: PieceId,
        from: Square,
        to: Square,
        promote_to: PieceKind,
    },
}

impl Move {
    pub fn piece_id(&self) -> PieceId {
        match *self {
            Move::Normal { piece_id, .. }
            | Move::Capture { piece_id, .. }
            | Move::Split { piece_id, .. }
            | Move::Merge { piece_id, .. }
            | Move::Castling { piece_id, .. }
            | Move::EnPassant { piece_id, .. }
            | Move::Promotion { piece_id, .. } => piece_id,
        }
    }
}

/// The historical record of an applied move, the wire schema verbatim.
/// Unlike [`Move`], a record reports what actually happened: a submitted
/// `Move::Capture` whose target measured away is recorded here as
/// `Normal`, never as `Capture` with no `captured_piece_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum MoveRecord {
    Normal {
        piece_id: PieceId,
        from: Square,
        to: Square,
    },
    Capture {
        piece_id: PieceId,
        from: Square,
        to: Square,
        captured_piece_id: PieceId,
    },
    Split {
        piece_id: PieceId,
        from: Square,
        to1: Square,
        to2: Square,
        probability: f64,
    },
    Merge {
        piece_id: PieceId,
        from1: Square,
        from2: Square,
        to: Square,
    },
    Castling {
        piece_id: PieceId,
        from: Square,
        to: Square,
        rook_from: Square,
        rook_to: Square,
        side: Side,
    },
    EnPassant {
        piece_id: PieceId,
        from: Square,
        to: Square,
        captured_pawn_square: Square,
        captured_piece_id: PieceId,
    },
    Promotion {
        piece_id: PieceId,
        from: Square,
        to: Square,
        promote_to: PieceKind,
        captured_piece_id: Option<PieceId>,
    },
}
