//! Legal-move generation and submitted-move validation.
//!
//! Occupancy certainty is treated asymmetrically on purpose. A ray, a pawn
//! capture, or a split/merge target is only *hard-blocked* by another
//! piece's full certainty (mass exactly 1) at that square: that is the one
//! case no entanglement could ever resolve away. Partial, superposed
//! occupancy never blocks generation or validation here — it is exactly
//! the condition [`crate::executor`] resolves by building an entanglement
//! through [`crate::quantum`], collapsing deterministically back to the
//! certain-blocker case when every configuration turns out blocked. See
//! DESIGN.md for the fuller argument.

use crate::board::{PieceId, Snapshot};
use crate::config::EngineConfig;
use crate::error::IllegalMoveReason;
use crate::geometry::{path_between, Square};
use crate::moves::Move;
use crate::pieces::{pawn_advance_targets, pawn_capture_targets, rules_for, targets, Color, PieceKind, Side, PROMOTION_KINDS};

/// The outcome of validating a proposed [`Move`] against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validation {
    Legal,
    /// The mover (or a source square named by the move) is superposed;
    /// the caller must measure at the given square before the move can
    /// proceed.
    RequiresMeasurement(Square),
    Illegal(IllegalMoveReason),
}

fn certain_occupant(snapshot: &Snapshot, square: Square) -> Option<Color> {
    snapshot.piece_at(square).map(|p| p.color)
}

fn has_enemy_mass(snapshot: &Snapshot, square: Square, mover_color: Color) -> bool {
    snapshot
        .all_pieces_at(square)
        .iter()
        .any(|p| p.color == mover_color.opponent())
}

fn is_fully_clear(snapshot: &Snapshot, square: Square, cfg: &EngineConfig) -> bool {
    snapshot.is_certainly_empty(square, cfg.probability_epsilon)
}

/// Every square geometrically reachable by `kind`/`color` from `at` that
/// this module offers as a move candidate: sliders stop their ray at the
/// first certainly-occupied square (capturing it if it's an enemy), and
/// otherwise walk through any partially-occupied square rather than
/// treating it as a wall.
fn reachable_candidates(
    snapshot: &Snapshot,
    kind: PieceKind,
    color: Color,
    at: Square,
) -> Vec<(Square, bool /* is_capture */)> {
    let rules = rules_for(kind);
    let mut out = Vec::new();
    for &(df, dr) in rules.directions() {
        let mut cursor = at;
        loop {
            let Some(next) = cursor.offset(df, dr) else { break };
            match certain_occupant(snapshot, next) {
                Some(occupant_color) if occupant_color == color => break,
                Some(_enemy) => {
                    out.push((next, true));
                    break;
                }
                None => {
                    if has_enemy_mass(snapshot, next, color) {
                        out.push((next, true));
                    } else if snapshot.occupancy_probability(next) <= 0.0 {
                        out.push((next, false));
                    }
                    // partial friendly-only occupancy: no candidate here,
                    // but the ray is not a certain wall, so keep walking.
                }
            }
            cursor = next;
            if !rules.is_slider() {
                break;
            }
        }
    }
    out
}

/// Whether `dst` is among `kind`'s geometric targets from `src`, occupancy
/// ignored — used to validate split/merge targets, which are not
/// classified as normal-or-capture.
fn is_geometric_target(kind: PieceKind, src: Square, dst: Square) -> bool {
    targets(kind, src).contains(&dst)
}

/// Every square `kind` reaches from `at` that is not certainly occupied by
/// either color: sliders stop each ray at, and do not offer, the first
/// certainly-occupied square, the same wall `reachable_candidates` treats
/// a certain piece as. Used by split and (for non-pawns) merge candidate
/// generation, where only a certainly-empty target is ever offered.
fn empty_geometric_targets(snapshot: &Snapshot, kind: PieceKind, at: Square) -> Vec<Square> {
    let rules = rules_for(kind);
    let mut out = Vec::new();
    for &(df, dr) in rules.directions() {
        let mut cursor = at;
        loop {
            let Some(next) = cursor.offset(df, dr) else { break };
            if certain_occupant(snapshot, next).is_some() {
                break;
            }
            out.push(next);
            cursor = next;
            if !rules.is_slider() {
                break;
            }
        }
    }
    out
}

/// Every square a superposed branch at `at` could merge into: `at` itself
/// (merging the other branch onto this one in place), plus every
/// certainly-empty square reachable from it in one pure-movement hop.
fn mergeable_targets(snapshot: &Snapshot, kind: PieceKind, color: Color, at: Square) -> Vec<Square> {
    let mut out = vec![at];
    match kind {
        PieceKind::Pawn => out.extend(
            pawn_advance_targets(color, at)
                .into_iter()
                .chain(pawn_capture_targets(color, at))
                .filter(|&sq| certain_occupant(snapshot, sq).is_none()),
        ),
        _ => out.extend(empty_geometric_targets(snapshot, kind, at)),
    }
    out
}

fn castling_available(snapshot: &Snapshot, color: Color, side: Side, cfg: &EngineConfig) -> bool {
    if !snapshot.castling.get(color, side) {
        return false;
    }
    let king_home = crate::pieces::castling_king_home(color);
    let rook_home = crate::pieces::castling_rook_home(color, side);
    let king_certain = snapshot
        .piece_at(king_home)
        .is_some_and(|p| p.kind == PieceKind::King && p.color == color);
    let rook_certain = snapshot
        .piece_at(rook_home)
        .is_some_and(|p| p.kind == PieceKind::Rook && p.color == color);
    if !king_certain || !rook_certain {
        return false;
    }
    path_between(king_home, rook_home)
        .into_iter()
        .all(|sq| is_fully_clear(snapshot, sq, cfg))
}

/// Every legal move candidate for `id`, treating `from` as the branch of
/// its distribution to move from (a superposed piece may have more than
/// one; callers generate once per occupied square they care about).
pub fn generate_legal_moves(snapshot: &Snapshot, id: PieceId, from: Square, cfg: &EngineConfig) -> Vec<Move> {
    let Some(piece) = snapshot.piece(id) else {
        return Vec::new();
    };
    if piece.mass_at(from) <= 0.0 {
        return Vec::new();
    }
    let color = piece.color;
    let kind = piece.kind;
    let mut moves = Vec::new();

    match kind {
        PieceKind::Pawn => {
            let promotion_rank = color.promotion_rank();
            for to in pawn_advance_targets(color, from) {
                // Pawns have no blocker-entanglement path: the square they
                // advance into, and any square they step over, must be
                // fully unoccupied (not merely uncertain).
                let intermediate_clear = path_between(from, to)
                    .iter()
                    .all(|&sq| snapshot.occupancy_probability(sq) <= 0.0);
                if !intermediate_clear || snapshot.occupancy_probability(to) > 0.0 {
                    continue;
                }
                if to.rank() == promotion_rank {
                    for &promote_to in &PROMOTION_KINDS {
                        moves.push(Move::Promotion { piece_id: id, from, to, promote_to });
                    }
                } else {
                    moves.push(Move::Normal { piece_id: id, from, to });
                }
            }
            for to in pawn_capture_targets(color, from) {
                if has_enemy_mass(snapshot, to, color) {
                    if to.rank() == promotion_rank {
                        for &promote_to in &PROMOTION_KINDS {
                            moves.push(Move::Promotion { piece_id: id, from, to, promote_to });
                        }
                    } else {
                        moves.push(Move::Capture { piece_id: id, from, to });
                    }
                }
                if let Some(ep) = snapshot.en_passant {
                    if ep.capture_square == to {
                        moves.push(Move::EnPassant { piece_id: id, from, to });
                    }
                }
            }
        }
        PieceKind::King => {
            for (to, is_capture) in reachable_candidates(snapshot, kind, color, from) {
                if is_capture {
                    moves.push(Move::Capture { piece_id: id, from, to });
                } else {
                    moves.push(Move::Normal { piece_id: id, from, to });
                }
            }
            if from == crate::pieces::castling_king_home(color) {
                for side in [Side::Kingside, Side::Queenside] {
                    if castling_available(snapshot, color, side, cfg) {
                        moves.push(Move::Castling { piece_id: id, side });
                    }
                }
            }
        }
        _ => {
            for (to, is_capture) in reachable_candidates(snapshot, kind, color, from) {
                if is_capture {
                    moves.push(Move::Capture { piece_id: id, from, to });
                } else {
                    moves.push(Move::Normal { piece_id: id, from, to });
                }
            }
        }
    }

    // Split candidates: any two distinct geometric targets not certainly
    // occupied by either color. For sliders the ray to each target must
    // be passable: a certain occupant anywhere along it, friendly or
    // enemy, is a hard wall, so targets beyond it are never offered.
    let open_targets: Vec<Square> = match kind {
        PieceKind::Pawn => pawn_advance_targets(color, from)
            .into_iter()
            .chain(pawn_capture_targets(color, from))
            .filter(|&sq| certain_occupant(snapshot, sq).is_none())
            .collect(),
        _ => empty_geometric_targets(snapshot, kind, from),
    };
    for i in 0..open_targets.len() {
        for j in (i + 1)..open_targets.len() {
            moves.push(Move::Split {
                piece_id: id,
                from,
                to1: open_targets[i],
                to2: open_targets[j],
                ratio: None,
            });
        }
    }

    // Merge candidates: only meaningful when the piece holds more than one
    // branch. `to` ranges over every square reachable by pure movement
    // from BOTH source branches (each existing branch square counts as
    // reachable from itself), filtered to certain emptiness, not just the
    // two existing branch squares.
    if piece.is_superposed() {
        let branches: Vec<Square> = piece.distribution.keys().copied().collect();
        for i in 0..branches.len() {
            for j in 0..branches.len() {
                if i == j {
                    continue;
                }
                let reach_i = mergeable_targets(snapshot, kind, color, branches[i]);
                let reach_j = mergeable_targets(snapshot, kind, color, branches[j]);
                for &to in &reach_i {
                    if reach_j.contains(&to) {
                        moves.push(Move::Merge {
                            piece_id: id,
                            from1: branches[i],
                            from2: branches[j],
                            to,
                        });
                    }
                }
            }
        }
    }

    moves
}

/// Validate a caller-submitted move shape and certainty against `snapshot`,
/// without mutating anything or touching blockers — blocker resolution is
/// [`crate::executor`]'s job.
pub fn validate(snapshot: &Snapshot, mv: &Move, cfg: &EngineConfig) -> Validation {
    let id = mv.piece_id();
    let Some(piece) = snapshot.piece(id) else {
        return Validation::Illegal(IllegalMoveReason::NoPieceAtSquare);
    };
    let color = piece.color;
    if color != snapshot.active_color {
        return Validation::Illegal(IllegalMoveReason::WrongColorToMove);
    }

    match *mv {
        Move::Normal { from, to, .. } => {
            if piece.mass_at(from) <= 0.0 {
                return Validation::Illegal(IllegalMoveReason::NoPieceAtSquare);
            }
            if !is_geometric_target(piece.kind, from, to) {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if let Some(occupant) = certain_occupant(snapshot, to) {
                return Validation::Illegal(if occupant == color {
                    IllegalMoveReason::TargetOccupiedByFriendly
                } else {
                    IllegalMoveReason::DoubleOccupancy
                });
            }
            require_certain(piece.mass_at(from), from)
        }
        Move::Capture { from, to, .. } => {
            if piece.mass_at(from) <= 0.0 {
                return Validation::Illegal(IllegalMoveReason::NoPieceAtSquare);
            }
            if !is_geometric_target(piece.kind, from, to) {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if !has_enemy_mass(snapshot, to, color) {
                return Validation::Illegal(IllegalMoveReason::CaptureTargetEmpty);
            }
            if certain_occupant(snapshot, to) == Some(color) {
                return Validation::Illegal(IllegalMoveReason::TargetOccupiedByFriendly);
            }
            require_certain(piece.mass_at(from), from)
        }
        Move::Split { from, to1, to2, ratio, .. } => {
            if to1 == to2 {
                return Validation::Illegal(IllegalMoveReason::SplitTargetsNotDistinct);
            }
            if let Some(r) = ratio {
                if !(r > 0.0 && r < 1.0) {
                    return Validation::Illegal(IllegalMoveReason::SplitRatioOutOfRange);
                }
            }
            if !is_geometric_target(piece.kind, from, to1) || !is_geometric_target(piece.kind, from, to2) {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            for target in [to1, to2] {
                if certain_occupant(snapshot, target).is_some() {
                    return Validation::Illegal(IllegalMoveReason::TargetNotEmpty);
                }
            }
            require_certain(piece.mass_at(from), from)
        }
        Move::Merge { from1, from2, to, .. } => {
            if from1 == from2 {
                return Validation::Illegal(IllegalMoveReason::MergeSourcesNotDistinct);
            }
            if !piece.is_superposed() {
                return Validation::Illegal(IllegalMoveReason::NotSuperposed);
            }
            if piece.mass_at(from1) <= 0.0 || piece.mass_at(from2) <= 0.0 {
                return Validation::Illegal(IllegalMoveReason::MergeSourcesNotSameIdentity);
            }
            let reaches = |src: Square| src == to || is_geometric_target(piece.kind, src, to);
            if !reaches(from1) || !reaches(from2) {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if let Some(occupant) = certain_occupant(snapshot, to) {
                if to != from1 && to != from2 {
                    return Validation::Illegal(if occupant == color {
                        IllegalMoveReason::TargetOccupiedByFriendly
                    } else {
                        IllegalMoveReason::DoubleOccupancy
                    });
                }
            }
            Validation::Legal
        }
        Move::Castling { side, .. } => {
            if piece.kind != PieceKind::King {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            let home = crate::pieces::castling_king_home(color);
            if piece.mass_at(home) <= 0.0 {
                return Validation::Illegal(IllegalMoveReason::NoPieceAtSquare);
            }
            if !snapshot.castling.get(color, side) {
                return Validation::Illegal(IllegalMoveReason::CastlingRightRevoked);
            }
            let rook_home = crate::pieces::castling_rook_home(color, side);
            let rook_present = snapshot
                .piece_at(rook_home)
                .is_some_and(|p| p.kind == PieceKind::Rook && p.color == color);
            if !rook_present {
                return Validation::Illegal(IllegalMoveReason::CastlingRookMissing);
            }
            let path_clear = path_between(home, rook_home)
                .into_iter()
                .all(|sq| is_fully_clear(snapshot, sq, cfg));
            if !path_clear {
                return Validation::Illegal(IllegalMoveReason::CastlingPathNotClear);
            }
            require_certain(piece.mass_at(home), home)
        }
        Move::EnPassant { from, to, .. } => {
            if piece.kind != PieceKind::Pawn {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if piece.mass_at(from) <= 0.0 {
                return Validation::Illegal(IllegalMoveReason::NoPieceAtSquare);
            }
            let Some(ep) = snapshot.en_passant else {
                return Validation::Illegal(IllegalMoveReason::EnPassantTargetMismatch);
            };
            if ep.capture_square != to || !pawn_capture_targets(color, from).contains(&to) {
                return Validation::Illegal(IllegalMoveReason::EnPassantTargetMismatch);
            }
            require_certain(piece.mass_at(from), from)
        }
        Move::Promotion { from, to, promote_to, .. } => {
            if piece.kind != PieceKind::Pawn {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if !promote_to.is_valid_promotion() {
                return Validation::Illegal(IllegalMoveReason::PromotionKindInvalid);
            }
            if to.rank() != color.promotion_rank() {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if piece.mass_at(from) <= 0.0 {
                return Validation::Illegal(IllegalMoveReason::NoPieceAtSquare);
            }
            let is_capture_shape = pawn_capture_targets(color, from).contains(&to);
            let is_advance_shape = pawn_advance_targets(color, from).contains(&to);
            if !is_capture_shape && !is_advance_shape {
                return Validation::Illegal(IllegalMoveReason::NotAMoveForThisPieceKind);
            }
            if is_capture_shape && !has_enemy_mass(snapshot, to, color) {
                return Validation::Illegal(IllegalMoveReason::CaptureTargetEmpty);
            }
            if is_advance_shape && !is_capture_shape && certain_occupant(snapshot, to).is_some() {
                return Validation::Illegal(IllegalMoveReason::TargetNotEmpty);
            }
            require_certain(piece.mass_at(from), from)
        }
    }
}

fn require_certain(mass: f64, square: Square) -> Validation {
    if (mass - 1.0).abs() <= 1e-9 {
        Validation::Legal
    } else {
        Validation::RequiresMeasurement(square)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Distribution;
    use crate::pieces::Color;

    fn singleton(square: Square) -> Distribution {
        let mut d = Distribution::new();
        d.insert(square, 1.0);
        d
    }

    #[test]
    fn rook_offers_normal_moves_along_a_clear_rank() {
        let cfg = EngineConfig::default();
        let d4 = Square::from_algebraic("d4").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton(d4));
        let moves = generate_legal_moves(&board, id, d4, &cfg);
        let h4 = Square::from_algebraic("h4").unwrap();
        assert!(moves.iter().any(|m| matches!(m, Move::Normal { to, .. } if *to == h4)));
    }

    #[test]
    fn rook_stops_at_a_certain_friendly_piece() {
        let cfg = EngineConfig::default();
        let d4 = Square::from_algebraic("d4").unwrap();
        let d6 = Square::from_algebraic("d6").unwrap();
        let d8 = Square::from_algebraic("d8").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton(d4));
        let (board, _friend) = board.with_added_piece(PieceKind::Pawn, Color::White, singleton(d6));
        let moves = generate_legal_moves(&board, id, d4, &cfg);
        assert!(!moves.iter().any(|m| matches!(m, Move::Normal { to, .. } if *to == d6)));
        assert!(!moves.iter().any(|m| matches!(m, Move::Normal { to, .. } | Move::Capture { to, .. } if *to == d8)));
    }

    #[test]
    fn rook_captures_a_certain_enemy_and_does_not_pass_through() {
        let cfg = EngineConfig::default();
        let d4 = Square::from_algebraic("d4").unwrap();
        let d6 = Square::from_algebraic("d6").unwrap();
        let d8 = Square::from_algebraic("d8").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton(d4));
        let (board, _enemy) = board.with_added_piece(PieceKind::Pawn, Color::Black, singleton(d6));
        let moves = generate_legal_moves(&board, id, d4, &cfg);
        assert!(moves.iter().any(|m| matches!(m, Move::Capture { to, .. } if *to == d6)));
        assert!(!moves.iter().any(|m| matches!(m, Move::Normal { to, .. } if *to == d8)));
    }

    #[test]
    fn split_through_a_certain_blocker_still_validates_as_legal() {
        // The executor, not the validator, is responsible for resolving
        // a blocked ray into an entanglement.
        let cfg = EngineConfig::default();
        let d1 = Square::from_algebraic("d1").unwrap();
        let d2 = Square::from_algebraic("d2").unwrap();
        let d3 = Square::from_algebraic("d3").unwrap();
        let f3 = Square::from_algebraic("f3").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Queen, Color::White, singleton(d1));
        let (board, _blocker) = board.with_added_piece(PieceKind::Pawn, Color::White, singleton(d2));
        let mv = Move::Split { piece_id: id, from: d1, to1: d3, to2: f3, ratio: None };
        assert_eq!(validate(&board, &mv, &cfg), Validation::Legal);
    }

    #[test]
    fn capture_with_no_enemy_mass_is_illegal() {
        let cfg = EngineConfig::default();
        let d4 = Square::from_algebraic("d4").unwrap();
        let d6 = Square::from_algebraic("d6").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton(d4));
        let mv = Move::Capture { piece_id: id, from: d4, to: d6 };
        assert_eq!(
            validate(&board, &mv, &cfg),
            Validation::Illegal(IllegalMoveReason::CaptureTargetEmpty)
        );
    }

    #[test]
    fn superposed_source_requires_measurement_before_normal_move() {
        let cfg = EngineConfig::default();
        let d4 = Square::from_algebraic("d4").unwrap();
        let e5 = Square::from_algebraic("e5").unwrap();
        let mut dist = Distribution::new();
        dist.insert(d4, 0.4);
        dist.insert(e5, 0.6);
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Bishop, Color::White, dist);
        let h8 = Square::from_algebraic("h8").unwrap();
        let mv = Move::Normal { piece_id: id, from: d4, to: h8 };
        assert_eq!(validate(&board, &mv, &cfg), Validation::RequiresMeasurement(d4));
    }

    #[test]
    fn pawn_double_step_is_excluded_when_the_intermediate_square_is_occupied() {
        let cfg = EngineConfig::default();
        let e2 = Square::from_algebraic("e2").unwrap();
        let e3 = Square::from_algebraic("e3").unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Pawn, Color::White, singleton(e2));
        let (board, _blocker) = board.with_added_piece(PieceKind::Knight, Color::Black, singleton(e3));
        let moves = generate_legal_moves(&board, id, e2, &cfg);
        assert!(!moves.iter().any(|m| matches!(m, Move::Normal { to, .. } if *to == e4)));
        // The single-square advance itself is blocked too, since e3 is the
        // target, not merely an intermediate square.
        assert!(!moves.iter().any(|m| matches!(m, Move::Normal { to, .. } if *to == e3)));
    }

    #[test]
    fn castling_is_unavailable_when_a_square_between_king_and_rook_is_occupied() {
        let cfg = EngineConfig::default();
        let e1 = Square::from_algebraic("e1").unwrap();
        let h1 = Square::from_algebraic("h1").unwrap();
        let f1 = Square::from_algebraic("f1").unwrap();
        let (board, king) = Snapshot::empty(Color::White).with_added_piece(PieceKind::King, Color::White, singleton(e1));
        let (board, _rook) = board.with_added_piece(PieceKind::Rook, Color::White, singleton(h1));
        let moves = generate_legal_moves(&board, king, e1, &cfg);
        assert!(moves.iter().any(|m| matches!(m, Move::Castling { side: Side::Kingside, .. })));

        let (blocked, _bishop) = board.with_added_piece(PieceKind::Bishop, Color::White, singleton(f1));
        let moves = generate_legal_moves(&blocked, king, e1, &cfg);
        assert!(!moves.iter().any(|m| matches!(m, Move::Castling { side: Side::Kingside, .. })));
    }

    #[test]
    fn castling_is_unavailable_once_the_right_is_revoked() {
        let cfg = EngineConfig::default();
        let e1 = Square::from_algebraic("e1").unwrap();
        let h1 = Square::from_algebraic("h1").unwrap();
        let (board, king) = Snapshot::empty(Color::White).with_added_piece(PieceKind::King, Color::White, singleton(e1));
        let (board, _rook) = board.with_added_piece(PieceKind::Rook, Color::White, singleton(h1));
        let board = board.with_castling_right(Color::White, Side::Kingside, false);
        let moves = generate_legal_moves(&board, king, e1, &cfg);
        assert!(!moves.iter().any(|m| matches!(m, Move::Castling { side: Side::Kingside, .. })));
    }
}
