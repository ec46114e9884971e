//! A rules engine for a probabilistic quantum chess variant: pieces occupy
//! a probability distribution over squares rather than a single square,
//! moves can split or merge that distribution, and measurement collapses
//! it back to certainty, cascading through any entangled pieces.
//!
//! [`game::GameController`] is the entry point most callers want: it owns
//! the position timeline and turns a proposed [`moves::Move`] into an
//! applied [`moves::MoveRecord`] via [`movegen::validate`] and
//! [`executor::execute`].

pub mod board;
pub mod config;
pub mod error;
pub mod executor;
pub mod game;
pub mod geometry;
pub mod movegen;
pub mod moves;
pub mod notation;
pub mod pieces;
pub mod quantum;

pub use board::{Entanglement, Piece, PieceId, Snapshot};
pub use config::EngineConfig;
pub use error::{EngineError, IllegalMoveReason};
pub use game::{GameController, GameStatus};
pub use geometry::{RandomSource, SeededRandomSource, Square};
pub use moves::{Move, MoveRecord};
pub use pieces::{Color, PieceKind};
