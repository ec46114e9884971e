//! Applies a validated [`Move`] to a [`Snapshot`], producing the next
//! snapshot and the [`MoveRecord`] that actually happened. This is where
//! forced pre-move measurement, blocker-entanglement construction, capture
//! resolution, and castling/en-passant/promotion bookkeeping all meet;
//! [`crate::movegen`] only checks shape and certainty, never blockers or
//! turn consequences.

use crate::board::{Distribution, EnPassant, Entanglement, Piece, PieceId, Snapshot};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geometry::{path_between, total_mass, RandomSource, Square};
use crate::movegen::{validate, Validation};
use crate::moves::{Move, MoveRecord};
use crate::pieces::{
    castling_king_home, castling_king_target, castling_rook_home, castling_rook_target, Color, PieceKind, Side,
};
use crate::quantum::{build_merge_entanglement, build_move_entanglement, build_split_entanglement, marginalize, measure_piece, merge_distribution, split_distribution};

/// The result of applying one move: the next snapshot, the record it was
/// filed under, and whether the mover's own forced measurement collapsed
/// it away from the square it was attempting to move from (a turn is
/// still spent, but nothing was displaced).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub snapshot: Snapshot,
    pub record: MoveRecord,
    pub turn_lost: bool,
}

fn singleton(square: Square) -> Distribution {
    let mut d = Distribution::new();
    d.insert(square, 1.0);
    d
}

/// Every other piece with any mass on `path`, deduplicated by identity.
fn path_blockers<'a>(snapshot: &'a Snapshot, mover: PieceId, path: &[Square]) -> Vec<&'a Piece> {
    let mut out: Vec<&Piece> = Vec::new();
    for &square in path {
        for piece in snapshot.all_pieces_at(square) {
            if piece.id != mover && !out.iter().any(|p| p.id == piece.id) {
                out.push(piece);
            }
        }
    }
    out
}

/// Writes an entanglement's marginals back onto every member and registers
/// it, replacing whatever entanglement (if any) previously touched those
/// identities.
fn apply_entanglement(snapshot: &Snapshot, entanglement: Entanglement) -> Snapshot {
    let mut board = snapshot.clone();
    for &id in &entanglement.piece_ids {
        let marginal = marginalize(&entanglement.joint, id);
        board = board.with_distribution(id, marginal);
    }
    for &id in &entanglement.piece_ids {
        board = board.with_entanglement_replaced(id, None);
    }
    let anchor = entanglement.piece_ids[0];
    board.with_entanglement_replaced(anchor, Some(entanglement))
}

/// If the mover is already certain at `at`, a no-op. Otherwise performs the
/// forced pre-move measurement required before a superposed piece can act,
/// returning whether it confirmed present there.
fn ensure_certain(
    snapshot: &Snapshot,
    id: PieceId,
    at: Square,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<(Snapshot, bool), EngineError> {
    let piece = snapshot
        .piece(id)
        .ok_or_else(|| EngineError::invalid_state("executing a move for a piece not on the board"))?;
    if (piece.mass_at(at) - 1.0).abs() <= cfg.probability_epsilon {
        return Ok((snapshot.clone(), true));
    }
    let (board, result) = measure_piece(snapshot, id, at, rng, cfg)?;
    Ok((board, result.outcome))
}

/// Revokes castling rights on the mover's own departure — whether a king or
/// rook leaves its home square, never the target of a degraded capture.
fn update_rights_on_departure(board: Snapshot, kind: PieceKind, color: Color, from: Square) -> Snapshot {
    match kind {
        PieceKind::King => board
            .with_castling_right(color, Side::Kingside, false)
            .with_castling_right(color, Side::Queenside, false),
        PieceKind::Rook => {
            if from == castling_rook_home(color, Side::Kingside) {
                board.with_castling_right(color, Side::Kingside, false)
            } else if from == castling_rook_home(color, Side::Queenside) {
                board.with_castling_right(color, Side::Queenside, false)
            } else {
                board
            }
        }
        _ => board,
    }
}

/// A rook actually captured on its home square revokes the right,
/// regardless of what captured it.
fn update_rights_on_capture(board: Snapshot, kind: PieceKind, color: Color, at: Square) -> Snapshot {
    if kind != PieceKind::Rook {
        return board;
    }
    if at == castling_rook_home(color, Side::Kingside) {
        board.with_castling_right(color, Side::Kingside, false)
    } else if at == castling_rook_home(color, Side::Queenside) {
        board.with_castling_right(color, Side::Queenside, false)
    } else {
        board
    }
}

/// A move that would couple two pre-existing, disjoint entanglements
/// together has undefined merged semantics and is rejected rather than
/// silently combined.
fn check_no_foreign_entanglement(snapshot: &Snapshot, members: &[PieceId]) -> Result<(), EngineError> {
    for &id in members {
        if let Some(existing) = snapshot.entanglement_for(id) {
            if existing.piece_ids.iter().any(|m| !members.contains(m)) {
                return Err(EngineError::invalid_state(
                    "move would couple two existing entanglements into one; merged semantics are undefined",
                ));
            }
        }
    }
    Ok(())
}

/// Resolves a capture attempt once a defender has been found at `to`,
/// returning the updated board and the defender's id if anything was
/// actually taken.
///
/// A king is never captured by a coin-flip measurement: every capture
/// landing on an occupied king square permanently strips that branch's
/// probability mass from the king's own distribution, weakening its total
/// existence without forcing a decision about where it "really" stands.
/// Every other piece kind goes through the usual measure-then-remove path,
/// degrading to no capture at all if the target measures away.
fn resolve_capture(
    snapshot: Snapshot,
    defender_id: PieceId,
    defender_mass: f64,
    defender_kind: PieceKind,
    defender_color: Color,
    to: Square,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<(Snapshot, Option<PieceId>), EngineError> {
    let mut board = snapshot;
    if defender_kind == PieceKind::King {
        let mut king_dist = board.piece(defender_id).unwrap().distribution.clone();
        king_dist.shift_remove(&to);
        if total_mass(&king_dist) <= cfg.probability_epsilon {
            board = board.without_piece(defender_id);
        } else {
            board = board.with_distribution(defender_id, king_dist);
        }
        return Ok((board, Some(defender_id)));
    }

    let confirmed = if (defender_mass - 1.0).abs() <= cfg.probability_epsilon {
        true
    } else {
        let (after, result) = measure_piece(&board, defender_id, to, rng, cfg)?;
        board = after;
        result.outcome
    };
    if !confirmed {
        return Ok((board, None));
    }
    board = board.without_piece(defender_id);
    board = update_rights_on_capture(board, defender_kind, defender_color, to);
    Ok((board, Some(defender_id)))
}

fn finish(board: Snapshot, record: MoveRecord, turn_lost: bool, new_en_passant: Option<EnPassant>, resets_clock: bool) -> ExecutionOutcome {
    let mut board = board.with_en_passant(new_en_passant);
    let next_clock = if resets_clock { 0 } else { board.halfmove_clock + 1 };
    board = board.with_halfmove_clock(next_clock);
    board = board.with_turn_switched();
    ExecutionOutcome { snapshot: board, record, turn_lost }
}

/// A "stayed put" outcome: the mover's own pre-move measurement, or a
/// defender's pre-capture measurement, came back the wrong way. The turn
/// is still spent.
fn stalled(board: Snapshot, mover_id: PieceId, from: Square, resets_clock: bool) -> ExecutionOutcome {
    let record = MoveRecord::Normal { piece_id: mover_id, from, to: from };
    finish(board, record, true, None, resets_clock)
}

/// Validates `mv` against `snapshot`, then applies it.
pub fn execute(
    snapshot: &Snapshot,
    mv: &Move,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<ExecutionOutcome, EngineError> {
    match validate(snapshot, mv, cfg) {
        Validation::Illegal(reason) => return Err(EngineError::illegal(reason)),
        Validation::Legal | Validation::RequiresMeasurement(_) => {}
    }
    tracing::debug!(?mv, "execute");
    match *mv {
        Move::Normal { piece_id, from, to } => execute_normal_or_capture(snapshot, piece_id, from, to, false, rng, cfg),
        Move::Capture { piece_id, from, to } => execute_normal_or_capture(snapshot, piece_id, from, to, true, rng, cfg),
        Move::Split { piece_id, from, to1, to2, ratio } => execute_split(snapshot, piece_id, from, to1, to2, ratio, rng, cfg),
        Move::Merge { piece_id, from1, from2, to } => execute_merge(snapshot, piece_id, from1, from2, to, cfg),
        Move::Castling { piece_id, side } => execute_castling(snapshot, piece_id, side),
        Move::EnPassant { piece_id, from, to } => execute_en_passant(snapshot, piece_id, from, to, rng, cfg),
        Move::Promotion { piece_id, from, to, promote_to } => execute_promotion(snapshot, piece_id, from, to, promote_to, rng, cfg),
    }
}

fn execute_normal_or_capture(
    snapshot: &Snapshot,
    mover_id: PieceId,
    from: Square,
    to: Square,
    is_capture_attempt: bool,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<ExecutionOutcome, EngineError> {
    let (mut board, confirmed) = ensure_certain(snapshot, mover_id, from, rng, cfg)?;
    if !confirmed {
        let actual = board
            .piece(mover_id)
            .and_then(Piece::certain_square)
            .ok_or_else(|| EngineError::invalid_state("mover vanished after forced measurement"))?;
        let record = MoveRecord::Normal { piece_id: mover_id, from, to: actual };
        return Ok(finish(board, record, true, None, false));
    }

    let mover_kind = board.piece(mover_id).unwrap().kind;
    let mover_color = board.piece(mover_id).unwrap().color;
    board = update_rights_on_departure(board, mover_kind, mover_color, from);

    // A pawn's diagonal capture shape is only legal as a capture: if the
    // target turns out vacant the move stalls. Every other piece's capture
    // targets are also reachable quietly, so a vacant target just degrades
    // the move to Normal rather than stalling it.
    let pawn_diagonal = mover_kind == PieceKind::Pawn && from.file() != to.file();
    let mut captured_id = None;
    if is_capture_attempt {
        let defender = board
            .all_pieces_at(to)
            .into_iter()
            .find(|p| p.color != mover_color)
            .map(|p| (p.id, p.mass_at(to), p.kind, p.color));
        let mut captured = false;
        if let Some((defender_id, defender_mass, defender_kind, defender_color)) = defender {
            let (after, outcome) = resolve_capture(board, defender_id, defender_mass, defender_kind, defender_color, to, rng, cfg)?;
            board = after;
            if outcome.is_some() {
                captured_id = outcome;
                captured = true;
            }
        }
        if !captured && pawn_diagonal {
            return Ok(stalled(board, mover_id, from, true));
        }
    }

    let path = path_between(from, to);
    let blockers = path_blockers(&board, mover_id, &path);
    if blockers.is_empty() {
        board = board.with_distribution(mover_id, singleton(to));
    } else {
        let members: Vec<PieceId> = std::iter::once(mover_id).chain(blockers.iter().map(|p| p.id)).collect();
        check_no_foreign_entanglement(&board, &members)?;
        let entanglement = build_move_entanglement(mover_id, from, to, &path, &blockers, cfg)?;
        board = apply_entanglement(&board, entanglement);
    }

    let landed_at_target = board.piece(mover_id).and_then(Piece::certain_square) == Some(to);
    let double_step = mover_kind == PieceKind::Pawn && landed_at_target && to.rank().abs_diff(from.rank()) == 2;
    let new_en_passant = if double_step {
        path_between(from, to).first().map(|&mid| EnPassant {
            capture_square: mid,
            passed_pawn_square: to,
            passed_pawn_id: mover_id,
        })
    } else {
        None
    };

    let record = match captured_id {
        Some(captured) => MoveRecord::Capture { piece_id: mover_id, from, to, captured_piece_id: captured },
        None => MoveRecord::Normal { piece_id: mover_id, from, to },
    };
    Ok(finish(board, record, false, new_en_passant, captured_id.is_some() || mover_kind == PieceKind::Pawn))
}

fn execute_split(
    snapshot: &Snapshot,
    mover_id: PieceId,
    from: Square,
    to1: Square,
    to2: Square,
    ratio: Option<f64>,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<ExecutionOutcome, EngineError> {
    let (mut board, confirmed) = ensure_certain(snapshot, mover_id, from, rng, cfg)?;
    if !confirmed {
        let actual = board
            .piece(mover_id)
            .and_then(Piece::certain_square)
            .ok_or_else(|| EngineError::invalid_state("mover vanished after forced measurement"))?;
        let record = MoveRecord::Normal { piece_id: mover_id, from, to: actual };
        return Ok(finish(board, record, true, None, false));
    }

    let mover_kind = board.piece(mover_id).unwrap().kind;
    let mover_color = board.piece(mover_id).unwrap().color;
    board = update_rights_on_departure(board, mover_kind, mover_color, from);
    let ratio = ratio.unwrap_or(cfg.default_split_ratio);
    let path1 = path_between(from, to1);
    let path2 = path_between(from, to2);
    let mut blockers = path_blockers(&board, mover_id, &path1);
    for candidate in path_blockers(&board, mover_id, &path2) {
        if !blockers.iter().any(|p| p.id == candidate.id) {
            blockers.push(candidate);
        }
    }

    if blockers.is_empty() {
        let piece = board.piece(mover_id).unwrap();
        let dist = split_distribution(piece, to1, to2, ratio)?;
        board = board.with_distribution(mover_id, dist);
    } else {
        let members: Vec<PieceId> = std::iter::once(mover_id).chain(blockers.iter().map(|p| p.id)).collect();
        check_no_foreign_entanglement(&board, &members)?;
        let entanglement = build_split_entanglement(mover_id, from, &path1, to1, &path2, to2, &blockers, ratio, cfg)?;
        board = apply_entanglement(&board, entanglement);
    }

    let record = MoveRecord::Split { piece_id: mover_id, from, to1, to2, probability: ratio };
    Ok(finish(board, record, false, None, mover_kind == PieceKind::Pawn))
}

fn execute_merge(
    snapshot: &Snapshot,
    mover_id: PieceId,
    from1: Square,
    from2: Square,
    to: Square,
    cfg: &EngineConfig,
) -> Result<ExecutionOutcome, EngineError> {
    let piece = snapshot
        .piece(mover_id)
        .ok_or_else(|| EngineError::invalid_state("merging a piece not on the board"))?
        .clone();
    let mut board = snapshot.clone();
    board = update_rights_on_departure(board, piece.kind, piece.color, from1);
    board = update_rights_on_departure(board, piece.kind, piece.color, from2);
    let p1 = piece.mass_at(from1);
    let p2 = piece.mass_at(from2);
    let path1 = path_between(from1, to);
    let path2 = path_between(from2, to);
    let mut blockers = path_blockers(&board, mover_id, &path1);
    for candidate in path_blockers(&board, mover_id, &path2) {
        if !blockers.iter().any(|p| p.id == candidate.id) {
            blockers.push(candidate);
        }
    }

    if blockers.is_empty() {
        let dist = merge_distribution(&piece, from1, from2, to)?;
        board = board.with_distribution(mover_id, dist);
    } else {
        let members: Vec<PieceId> = std::iter::once(mover_id).chain(blockers.iter().map(|p| p.id)).collect();
        check_no_foreign_entanglement(&board, &members)?;
        let entanglement = build_merge_entanglement(mover_id, from1, &path1, from2, &path2, to, &blockers, p1, p2, cfg)?;
        board = apply_entanglement(&board, entanglement);
    }

    let record = MoveRecord::Merge { piece_id: mover_id, from1, from2, to };
    Ok(finish(board, record, false, None, piece.kind == PieceKind::Pawn))
}

fn execute_castling(snapshot: &Snapshot, king_id: PieceId, side: Side) -> Result<ExecutionOutcome, EngineError> {
    let king = snapshot
        .piece(king_id)
        .ok_or_else(|| EngineError::invalid_state("castling with a king not on the board"))?;
    let color = king.color;
    let king_home = castling_king_home(color);
    let king_target = castling_king_target(color, side);
    let rook_home = castling_rook_home(color, side);
    let rook_target = castling_rook_target(color, side);
    let rook_id = snapshot
        .piece_at(rook_home)
        .ok_or_else(|| EngineError::invalid_state("castling rook is not certainly present"))?
        .id;

    let mut board = snapshot.clone();
    board = board.with_distribution(king_id, singleton(king_target));
    board = board.with_distribution(rook_id, singleton(rook_target));
    board = board.with_castling_right(color, Side::Kingside, false);
    board = board.with_castling_right(color, Side::Queenside, false);

    let record = MoveRecord::Castling {
        piece_id: king_id,
        from: king_home,
        to: king_target,
        rook_from: rook_home,
        rook_to: rook_target,
        side,
    };
    Ok(finish(board, record, false, None, false))
}

fn execute_en_passant(
    snapshot: &Snapshot,
    mover_id: PieceId,
    from: Square,
    to: Square,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<ExecutionOutcome, EngineError> {
    let (mut board, confirmed) = ensure_certain(snapshot, mover_id, from, rng, cfg)?;
    if !confirmed {
        let actual = board
            .piece(mover_id)
            .and_then(Piece::certain_square)
            .ok_or_else(|| EngineError::invalid_state("mover vanished after forced measurement"))?;
        let record = MoveRecord::Normal { piece_id: mover_id, from, to: actual };
        return Ok(finish(board, record, true, None, false));
    }

    let ep = board
        .en_passant
        .ok_or_else(|| EngineError::invalid_state("no en-passant target is currently open"))?;

    let passed_mass = board
        .piece(ep.passed_pawn_id)
        .map(|p| p.mass_at(ep.passed_pawn_square))
        .unwrap_or(0.0);
    let captured = if (passed_mass - 1.0).abs() <= cfg.probability_epsilon {
        true
    } else {
        let (after, result) = measure_piece(&board, ep.passed_pawn_id, ep.passed_pawn_square, rng, cfg)?;
        board = after;
        result.outcome
    };

    if !captured {
        return Ok(stalled(board, mover_id, from, true));
    }

    board = board.without_piece(ep.passed_pawn_id);
    board = board.with_distribution(mover_id, singleton(to));
    let record = MoveRecord::EnPassant {
        piece_id: mover_id,
        from,
        to,
        captured_pawn_square: ep.passed_pawn_square,
        captured_piece_id: ep.passed_pawn_id,
    };
    Ok(finish(board, record, false, None, true))
}

fn execute_promotion(
    snapshot: &Snapshot,
    mover_id: PieceId,
    from: Square,
    to: Square,
    promote_to: PieceKind,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<ExecutionOutcome, EngineError> {
    let (mut board, confirmed) = ensure_certain(snapshot, mover_id, from, rng, cfg)?;
    if !confirmed {
        let actual = board
            .piece(mover_id)
            .and_then(Piece::certain_square)
            .ok_or_else(|| EngineError::invalid_state("mover vanished after forced measurement"))?;
        let record = MoveRecord::Normal { piece_id: mover_id, from, to: actual };
        return Ok(finish(board, record, true, None, false));
    }

    let mover_color = board.piece(mover_id).unwrap().color;
    // A promoting pawn's diagonal move is only legal as a capture: if the
    // target turns out vacant, it cannot occupy that square quietly and
    // the move stalls instead.
    let is_capture_shape = from.file() != to.file();
    let mut captured_id = None;
    if is_capture_shape {
        let defender = board
            .all_pieces_at(to)
            .into_iter()
            .find(|p| p.color != mover_color)
            .map(|p| (p.id, p.mass_at(to), p.kind, p.color));
        let Some((defender_id, defender_mass, defender_kind, defender_color)) = defender else {
            return Ok(stalled(board, mover_id, from, true));
        };
        let (after, outcome) = resolve_capture(board, defender_id, defender_mass, defender_kind, defender_color, to, rng, cfg)?;
        board = after;
        let Some(captured) = outcome else {
            return Ok(stalled(board, mover_id, from, true));
        };
        captured_id = Some(captured);
    }

    board = board.with_distribution(mover_id, singleton(to));
    board = board.with_kind_changed(mover_id, promote_to);
    let record = MoveRecord::Promotion { piece_id: mover_id, from, to, promote_to, captured_piece_id: captured_id };
    Ok(finish(board, record, false, None, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Distribution;
    use crate::geometry::FixedRandomSource;
    use crate::pieces::{Color, PieceKind, Side};

    fn singleton_dist(square: Square) -> Distribution {
        let mut d = Distribution::new();
        d.insert(square, 1.0);
        d
    }

    #[test]
    fn classical_normal_move_with_clear_path() {
        let cfg = EngineConfig::default();
        let d1 = Square::from_algebraic("d1").unwrap();
        let d4 = Square::from_algebraic("d4").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton_dist(d1));
        let mv = Move::Normal { piece_id: id, from: d1, to: d4 };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();
        assert_eq!(outcome.snapshot.piece(id).unwrap().certain_square(), Some(d4));
        assert!(!outcome.turn_lost);
        assert_eq!(outcome.snapshot.active_color, Color::Black);
    }

    #[test]
    fn split_through_certain_blocker_collapses_to_the_clear_branch() {
        let cfg = EngineConfig::default();
        let d1 = Square::from_algebraic("d1").unwrap();
        let d2 = Square::from_algebraic("d2").unwrap();
        let d3 = Square::from_algebraic("d3").unwrap();
        let f3 = Square::from_algebraic("f3").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Queen, Color::White, singleton_dist(d1));
        let (board, _blocker) = board.with_added_piece(PieceKind::Pawn, Color::White, singleton_dist(d2));
        let mv = Move::Split { piece_id: id, from: d1, to1: d3, to2: f3, ratio: None };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();
        assert_eq!(outcome.snapshot.piece(id).unwrap().certain_square(), Some(f3));
        assert!(outcome.snapshot.entanglements.is_empty());
    }

    #[test]
    fn capture_against_a_certain_defender_removes_it() {
        let cfg = EngineConfig::default();
        let d4 = Square::from_algebraic("d4").unwrap();
        let d6 = Square::from_algebraic("d6").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton_dist(d4));
        let (board, enemy) = board.with_added_piece(PieceKind::Pawn, Color::Black, singleton_dist(d6));
        let mv = Move::Capture { piece_id: id, from: d4, to: d6 };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();
        assert!(outcome.snapshot.piece(enemy).is_none());
        assert_eq!(outcome.snapshot.piece(id).unwrap().certain_square(), Some(d6));
        match outcome.record {
            MoveRecord::Capture { captured_piece_id, .. } => assert_eq!(captured_piece_id, enemy),
            other => panic!("expected Capture record, got {other:?}"),
        }
    }

    #[test]
    fn pawn_double_step_opens_an_en_passant_target() {
        let cfg = EngineConfig::default();
        let e2 = Square::from_algebraic("e2").unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        let e3 = Square::from_algebraic("e3").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Pawn, Color::White, singleton_dist(e2));
        let mv = Move::Normal { piece_id: id, from: e2, to: e4 };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();
        let ep = outcome.snapshot.en_passant.unwrap();
        assert_eq!(ep.capture_square, e3);
        assert_eq!(ep.passed_pawn_square, e4);
    }

    #[test]
    fn capture_against_a_superposed_king_strips_only_that_branch() {
        let cfg = EngineConfig::default();
        let a1 = Square::from_algebraic("a1").unwrap();
        let d1 = Square::from_algebraic("d1").unwrap();
        let e1 = Square::from_algebraic("e1").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Rook, Color::White, singleton_dist(a1));
        let mut king_dist = Distribution::new();
        king_dist.insert(d1, 0.4);
        king_dist.insert(e1, 0.6);
        let (board, king) = board.with_added_piece(PieceKind::King, Color::Black, king_dist);
        let mv = Move::Capture { piece_id: id, from: a1, to: d1 };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();
        let remaining = outcome.snapshot.piece(king).unwrap();
        assert!((remaining.mass_at(d1)).abs() < 1e-9);
        assert!((remaining.mass_at(e1) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn promotion_replaces_kind_in_place() {
        let cfg = EngineConfig::default();
        let e7 = Square::from_algebraic("e7").unwrap();
        let e8 = Square::from_algebraic("e8").unwrap();
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(PieceKind::Pawn, Color::White, singleton_dist(e7));
        let mv = Move::Promotion { piece_id: id, from: e7, to: e8, promote_to: PieceKind::Queen };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();
        let piece = outcome.snapshot.piece(id).unwrap();
        assert_eq!(piece.kind, PieceKind::Queen);
        assert_eq!(piece.certain_square(), Some(e8));
    }

    #[test]
    fn castling_places_king_and_rook_and_revokes_both_rights() {
        let cfg = EngineConfig::default();
        let e1 = Square::from_algebraic("e1").unwrap();
        let h1 = Square::from_algebraic("h1").unwrap();
        let g1 = Square::from_algebraic("g1").unwrap();
        let f1 = Square::from_algebraic("f1").unwrap();
        let (board, king) = Snapshot::empty(Color::White).with_added_piece(PieceKind::King, Color::White, singleton_dist(e1));
        let (board, rook) = board.with_added_piece(PieceKind::Rook, Color::White, singleton_dist(h1));
        let mv = Move::Castling { piece_id: king, side: Side::Kingside };
        let mut rng = FixedRandomSource(0.0);
        let outcome = execute(&board, &mv, &mut rng, &cfg).unwrap();

        assert_eq!(outcome.snapshot.piece(king).unwrap().certain_square(), Some(g1));
        assert_eq!(outcome.snapshot.piece(rook).unwrap().certain_square(), Some(f1));
        assert!(!outcome.snapshot.castling.get(Color::White, Side::Kingside));
        assert!(!outcome.snapshot.castling.get(Color::White, Side::Queenside));
        match outcome.record {
            MoveRecord::Castling { side, .. } => assert_eq!(side, Side::Kingside),
            other => panic!("expected Castling record, got {other:?}"),
        }
    }
}
