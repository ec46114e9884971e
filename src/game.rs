//! The game controller: owns the snapshot timeline and move-record
//! history, and drives selection/apply/undo/goto. Keeps the same split of
//! committed past from the live position as a conventional move-history
//! tracker, but trades a `future`/redo queue for index-addressed `goto`
//! navigation.

use crate::board::Snapshot;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::execute;
use crate::geometry::{RandomSource, Square};
use crate::movegen::generate_legal_moves;
use crate::moves::{Move, MoveRecord};
use crate::pieces::{Color, PieceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Active,
    Draw,
    WhiteWins,
    BlackWins,
}

/// The squares and legal-move list cached by the most recent
/// `select_square`, cleared on every apply/undo/goto.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub square: Square,
    pub moves: Vec<Move>,
}

pub struct GameController {
    timeline: Vec<Snapshot>,
    records: Vec<MoveRecord>,
    current_index: usize,
    selection: Option<Selection>,
    status: GameStatus,
    cfg: EngineConfig,
}

fn piece_at(color: Color, kind: PieceKind, square: &str) -> (PieceKind, Color, Square) {
    (kind, color, Square::from_algebraic(square).expect("well-formed starting-position square"))
}

/// The standard chess starting position, every piece certain at its
/// classical home square, no entanglements, full castling rights.
fn standard_starting_snapshot() -> Snapshot {
    let mut board = Snapshot::empty(Color::White);
    let back_rank = [
        PieceKind::Rook,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Queen,
        PieceKind::King,
        PieceKind::Bishop,
        PieceKind::Knight,
        PieceKind::Rook,
    ];
    let files = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

    let mut placements = Vec::with_capacity(32);
    for (file, kind) in files.iter().zip(back_rank.iter()) {
        placements.push(piece_at(Color::White, *kind, &format!("{file}1")));
        placements.push(piece_at(Color::Black, *kind, &format!("{file}8")));
    }
    for file in files {
        placements.push(piece_at(Color::White, PieceKind::Pawn, &format!("{file}2")));
        placements.push(piece_at(Color::Black, PieceKind::Pawn, &format!("{file}7")));
    }

    for (kind, color, square) in placements {
        let mut distribution = crate::board::Distribution::new();
        distribution.insert(square, 1.0);
        let (next, _id) = board.with_added_piece(kind, color, distribution);
        board = next;
    }
    board
}

fn evaluate_status(snapshot: &Snapshot, cfg: &EngineConfig) -> GameStatus {
    let white = snapshot.king_total_probability(Color::White);
    let black = snapshot.king_total_probability(Color::Black);
    let eps = cfg.probability_epsilon;
    match (white <= eps, black <= eps) {
        (true, true) => GameStatus::Draw,
        (true, false) => GameStatus::BlackWins,
        (false, true) => GameStatus::WhiteWins,
        (false, false) => GameStatus::Active,
    }
}

impl GameController {
    pub fn new_game() -> Self {
        Self::from_snapshot(standard_starting_snapshot(), EngineConfig::default())
    }

    pub fn from_snapshot(snapshot: Snapshot, cfg: EngineConfig) -> Self {
        let status = evaluate_status(&snapshot, &cfg);
        Self {
            timeline: vec![snapshot],
            records: Vec::new(),
            current_index: 0,
            selection: None,
            status,
            cfg,
        }
    }

    pub fn current(&self) -> &Snapshot {
        &self.timeline[self.current_index]
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.records
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn last_index(&self) -> usize {
        self.timeline.len() - 1
    }

    fn at_latest(&self) -> bool {
        self.current_index == self.last_index()
    }

    /// Caches the legal moves for the piece at `square`, or clears the
    /// selection if it is empty, holds no piece of the active color, is
    /// the already-selected square (toggle off), or the timeline is not
    /// at its latest position.
    pub fn select_square(&mut self, square: Square) {
        if !self.at_latest() {
            self.selection = None;
            return;
        }
        if self.selection.as_ref().is_some_and(|s| s.square == square) {
            self.selection = None;
            return;
        }
        let snapshot = self.current();
        let candidate = snapshot.all_pieces_at(square).into_iter().find(|p| p.color == snapshot.active_color);
        self.selection = candidate.map(|piece| Selection {
            square,
            moves: generate_legal_moves(snapshot, piece.id, square, &self.cfg),
        });
    }

    /// Runs the executor on `mv`, appends the resulting snapshot and
    /// record, and advances the timeline. Only valid at the latest
    /// position; a failed move leaves the timeline untouched.
    pub fn apply_move(&mut self, mv: &Move, rng: &mut dyn RandomSource) -> Result<MoveRecord, EngineError> {
        if !self.at_latest() {
            return Err(EngineError::invalid_state("apply_move is only valid at the latest position"));
        }
        let outcome = execute(self.current(), mv, rng, &self.cfg)?;
        self.status = evaluate_status(&outcome.snapshot, &self.cfg);
        self.timeline.push(outcome.snapshot);
        self.records.push(outcome.record.clone());
        self.current_index += 1;
        self.selection = None;
        Ok(outcome.record)
    }

    /// Drops the last move-record and snapshot, only valid at the latest
    /// position with at least one move played.
    pub fn undo(&mut self) -> bool {
        if !self.at_latest() || self.timeline.len() <= 1 {
            return false;
        }
        self.timeline.pop();
        self.records.pop();
        self.current_index -= 1;
        self.selection = None;
        self.status = evaluate_status(self.current(), &self.cfg);
        true
    }

    /// Moves `current_index` without mutating the timeline; selection is
    /// cleared and stays disallowed until `goto(last_index())`.
    pub fn goto(&mut self, index: usize) -> bool {
        if index > self.last_index() {
            return false;
        }
        self.current_index = index;
        self.selection = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FixedRandomSource;

    #[test]
    fn new_game_has_thirty_two_pieces_and_active_status() {
        let game = GameController::new_game();
        assert_eq!(game.current().pieces().count(), 32);
        assert_eq!(game.status(), GameStatus::Active);
    }

    #[test]
    fn select_square_caches_moves_for_a_friendly_piece_and_toggles_off() {
        let mut game = GameController::new_game();
        let e2 = Square::from_algebraic("e2").unwrap();
        game.select_square(e2);
        assert!(game.selection().is_some());
        game.select_square(e2);
        assert!(game.selection().is_none());
    }

    #[test]
    fn apply_move_advances_timeline_and_undo_restores_it() {
        let mut game = GameController::new_game();
        let e2 = Square::from_algebraic("e2").unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        let piece_id = game.current().all_pieces_at(e2).into_iter().next().unwrap().id;
        let mv = Move::Normal { piece_id, from: e2, to: e4 };
        let mut rng = FixedRandomSource(0.0);
        game.apply_move(&mv, &mut rng).unwrap();
        assert_eq!(game.last_index(), 1);
        assert_eq!(game.history().len(), 1);
        assert!(game.undo());
        assert_eq!(game.last_index(), 0);
        assert!(game.history().is_empty());
    }

    #[test]
    fn apply_move_off_the_latest_snapshot_is_rejected() {
        let mut game = GameController::new_game();
        let e2 = Square::from_algebraic("e2").unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        let piece_id = game.current().all_pieces_at(e2).into_iter().next().unwrap().id;
        let mv = Move::Normal { piece_id, from: e2, to: e4 };
        let mut rng = FixedRandomSource(0.0);
        game.apply_move(&mv, &mut rng).unwrap();
        assert!(game.goto(0));
        assert!(game.apply_move(&mv, &mut rng).is_err());
    }

    #[test]
    fn king_total_mass_zero_for_both_colors_is_a_draw() {
        let board = Snapshot::empty(Color::White);
        let cfg = EngineConfig::default();
        let status = evaluate_status(&board, &cfg);
        assert_eq!(status, GameStatus::Draw);
    }
}
