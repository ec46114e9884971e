//! Split, merge, measurement, marginalization and cascading collapse —
//! the classical-probability stand-ins for the Quantum Chess paper's
//! unitaries. Every function here is a pure transform:
//! given a snapshot (or a piece/distribution slice of one) it returns a
//! new value, never mutating its argument.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use crate::board::{Distribution, Entanglement, JointKey, Piece, PieceId, Snapshot};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geometry::{sample, RandomSource, Square};

/// The outcome of observing a piece at a specific square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    pub probability_before: f64,
    pub outcome: bool,
    pub collapsed_to: Square,
}

/// Split a certain piece's distribution into two branches. Does not touch
/// blockers; callers who discover a blocker on either ray build an
/// entanglement with [`build_split_entanglement`] instead.
pub fn split_distribution(
    piece: &Piece,
    to1: Square,
    to2: Square,
    ratio: f64,
) -> Result<Distribution, EngineError> {
    if piece.certain_square().is_none() {
        return Err(EngineError::invalid_state(
            "split requires the piece to be certain at its source",
        ));
    }
    if to1 == to2 {
        return Err(EngineError::invalid_state("split targets must be distinct"));
    }
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(EngineError::invalid_state(
            "split ratio must lie strictly between 0 and 1",
        ));
    }
    let mut dist = Distribution::new();
    dist.insert(to1, ratio);
    dist.insert(to2, 1.0 - ratio);
    tracing::debug!(piece = %piece.id, %to1, %to2, ratio, "split");
    Ok(dist)
}

/// Merge two of a superposed piece's branches into one target, preserving
/// any other branches the piece currently holds.
pub fn merge_distribution(
    piece: &Piece,
    from1: Square,
    from2: Square,
    to: Square,
) -> Result<Distribution, EngineError> {
    if from1 == from2 {
        return Err(EngineError::invalid_state("merge sources must be distinct"));
    }
    let p1 = piece.mass_at(from1);
    let p2 = piece.mass_at(from2);
    if p1 <= 0.0 || p2 <= 0.0 {
        return Err(EngineError::invalid_state(
            "merge sources must both hold nonzero mass",
        ));
    }
    let mut dist = piece.distribution.clone();
    dist.shift_remove(&from1);
    dist.shift_remove(&from2);
    *dist.entry(to).or_insert(0.0) += p1 + p2;
    tracing::debug!(piece = %piece.id, %from1, %from2, %to, "merge");
    Ok(dist)
}

/// Observe `distribution` at `question`, collapsing it to a singleton.
/// Measuring a square with zero mass is a precondition violation, not a
/// valid (if unlucky) outcome: the engine refuses to report an
/// impossible observation rather than silently returning `outcome: false`.
pub fn measure_distribution(
    distribution: &Distribution,
    question: Square,
    rng: &mut dyn RandomSource,
) -> Result<MeasurementResult, EngineError> {
    let probability_before = distribution.get(&question).copied().unwrap_or(0.0);
    if probability_before <= 0.0 {
        return Err(EngineError::invalid_state(format!(
            "cannot measure square {question}: it has zero probability mass"
        )));
    }
    if (probability_before - 1.0).abs() <= 1e-9 {
        return Ok(MeasurementResult {
            probability_before,
            outcome: true,
            collapsed_to: question,
        });
    }
    let collapsed_to = sample(distribution, rng);
    Ok(MeasurementResult {
        probability_before,
        outcome: collapsed_to == question,
        collapsed_to,
    })
}

/// Measure `id` at `question`, writing the collapsed singleton back and, if
/// the piece was entangled, propagating the cascade through every other
/// member. Returns the new snapshot and the raw measurement result.
pub fn measure_piece(
    snapshot: &Snapshot,
    id: PieceId,
    question: Square,
    rng: &mut dyn RandomSource,
    cfg: &EngineConfig,
) -> Result<(Snapshot, MeasurementResult), EngineError> {
    let piece = snapshot
        .piece(id)
        .ok_or_else(|| EngineError::invalid_state("measuring a piece that is not on the board"))?;
    let result = measure_distribution(&piece.distribution, question, rng)?;
    let mut singleton = Distribution::new();
    singleton.insert(result.collapsed_to, 1.0);
    let was_entangled = snapshot.entanglement_for(id).is_some();
    let mut board = snapshot.with_distribution(id, singleton);
    tracing::trace!(piece = %id, %question, outcome = result.outcome, "measure");
    if was_entangled {
        board = cascade_collapse(&board, id, cfg)?;
    }
    Ok((board, result))
}

/// The per-square probability a piece identity has within a joint
/// distribution — the sum of every entry that assigns it to that square.
pub fn marginalize(joint: &IndexMap<JointKey, f64>, id: PieceId) -> Distribution {
    let mut out = Distribution::new();
    for (key, &p) in joint {
        if let Some(square) = key.square_of(id) {
            *out.entry(square).or_insert(0.0) += p;
        }
    }
    out
}

fn normalize_joint(joint: &mut IndexMap<JointKey, f64>, epsilon: f64) -> Result<(), EngineError> {
    let total: f64 = joint.values().sum();
    if total.abs() <= epsilon {
        return Err(EngineError::invalid_state(
            "cannot normalize a joint distribution with zero total mass",
        ));
    }
    for value in joint.values_mut() {
        *value /= total;
    }
    joint.retain(|_, p| *p > epsilon);
    Ok(())
}

/// Propagate a just-collapsed piece's certainty through every entanglement
/// it touches, and transitively through any member that becomes newly
/// certain as a result. Implemented as an iterative worklist, not
/// recursion, so termination is structural rather than relying on the
/// call stack.
pub fn cascade_collapse(
    snapshot: &Snapshot,
    start: PieceId,
    cfg: &EngineConfig,
) -> Result<Snapshot, EngineError> {
    let mut board = snapshot.clone();
    let mut queue: VecDeque<PieceId> = VecDeque::from([start]);
    let mut queued: HashSet<PieceId> = HashSet::from([start]);

    while let Some(id) = queue.pop_front() {
        let Some(square) = board.piece(id).and_then(Piece::certain_square) else {
            continue;
        };
        let Some(entanglement) = board.entanglement_for(id).cloned() else {
            continue;
        };

        let mut filtered: IndexMap<JointKey, f64> = entanglement
            .joint
            .iter()
            .filter(|(key, _)| key.square_of(id) == Some(square))
            .map(|(key, &p)| (key.clone(), p))
            .collect();
        if filtered.is_empty() {
            return Err(EngineError::invalid_state(
                "cascading collapse retained no joint entries: the observed outcome was impossible",
            ));
        }
        normalize_joint(&mut filtered, cfg.probability_epsilon)?;

        tracing::debug!(
            piece = %id, %square, remaining = filtered.len(),
            "cascade collapse"
        );

        for &member in &entanglement.piece_ids {
            let marginal = marginalize(&filtered, member);
            if marginal.values().sum::<f64>() <= cfg.probability_epsilon {
                board = board.without_piece(member);
                continue;
            }
            let newly_certain = marginal.len() == 1;
            board = board.with_distribution(member, marginal);
            if newly_certain && queued.insert(member) {
                queue.push_back(member);
            }
        }

        if filtered.len() == 1 {
            board = board.with_entanglement_replaced(id, None);
        } else {
            board = board.with_entanglement_replaced(
                id,
                Some(Entanglement {
                    piece_ids: entanglement.piece_ids.clone(),
                    joint: filtered,
                    description: entanglement.description.clone(),
                }),
            );
        }
    }

    Ok(board)
}

/// One blocker's distribution, flattened to `(identity, square, mass)`
/// triples so the cartesian product below doesn't need to re-borrow the
/// originating [`Piece`].
fn cartesian_blocker_configs(blockers: &[&Piece]) -> Vec<Vec<(PieceId, Square, f64)>> {
    let mut configs: Vec<Vec<(PieceId, Square, f64)>> = vec![Vec::new()];
    for blocker in blockers {
        let mut next = Vec::with_capacity(configs.len() * blocker.distribution.len());
        for prefix in &configs {
            for (&square, &mass) in &blocker.distribution {
                let mut extended = prefix.clone();
                extended.push((blocker.id, square, mass));
                next.push(extended);
            }
        }
        configs = next;
    }
    configs
}

fn check_enumeration_bound(blockers: &[&Piece], cfg: &EngineConfig) -> Result<(), EngineError> {
    let product: usize = blockers
        .iter()
        .try_fold(1usize, |acc, b| acc.checked_mul(b.distribution.len()))
        .ok_or_else(|| EngineError::invalid_state("blocker enumeration overflowed"))?;
    if product > cfg.max_blocker_enumeration {
        return Err(EngineError::invalid_state(format!(
            "blocker enumeration of {product} configurations exceeds the configured bound of {}",
            cfg.max_blocker_enumeration
        )));
    }
    Ok(())
}

fn push_entry(
    joint: &mut IndexMap<JointKey, f64>,
    mover: PieceId,
    mover_square: Square,
    combo: &[(PieceId, Square, f64)],
    weight: f64,
) {
    let mut assignment = Vec::with_capacity(combo.len() + 1);
    assignment.push((mover, mover_square));
    assignment.extend(combo.iter().map(|&(id, sq, _)| (id, sq)));
    let key = JointKey::new(assignment);
    *joint.entry(key).or_insert(0.0) += weight;
}

/// Build the entanglement created when a classical move's path carries one
/// or more superposed blockers: for every joint configuration of the
/// blockers' current squares, the mover reaches `target` unless some
/// blocker in that configuration sits on `path`, in which case it stays at
/// `source`.
pub fn build_move_entanglement(
    mover: PieceId,
    source: Square,
    target: Square,
    path: &[Square],
    blockers: &[&Piece],
    cfg: &EngineConfig,
) -> Result<Entanglement, EngineError> {
    check_enumeration_bound(blockers, cfg)?;
    let mut joint = IndexMap::new();
    for combo in cartesian_blocker_configs(blockers) {
        let weight: f64 = combo.iter().map(|&(_, _, p)| p).product();
        let blocked = combo.iter().any(|&(_, sq, _)| path.contains(&sq));
        let mover_square = if blocked { source } else { target };
        push_entry(&mut joint, mover, mover_square, &combo, weight);
    }
    normalize_joint(&mut joint, cfg.probability_epsilon)?;
    let mut piece_ids = vec![mover];
    piece_ids.extend(blockers.iter().map(|b| b.id));
    tracing::debug!(piece = %mover, %source, %target, entries = joint.len(), "blocker entanglement");
    Ok(Entanglement {
        piece_ids,
        joint,
        description: format!("{mover} moving {source}->{target} through a superposed path"),
    })
}

/// Build the entanglement created when a split's two rays carry blockers,
/// for every configuration of the blockers relevant to either ray:
/// - neither ray blocked: the piece still splits, `r`/`1-r` across `to1`/`to2`;
/// - exactly one ray blocked: the piece goes to the other, unblocked target;
/// - both blocked: the piece stays at `source`.
#[allow(clippy::too_many_arguments)]
pub fn build_split_entanglement(
    mover: PieceId,
    source: Square,
    path1: &[Square],
    to1: Square,
    path2: &[Square],
    to2: Square,
    blockers: &[&Piece],
    ratio: f64,
    cfg: &EngineConfig,
) -> Result<Entanglement, EngineError> {
    check_enumeration_bound(blockers, cfg)?;
    let mut joint = IndexMap::new();
    for combo in cartesian_blocker_configs(blockers) {
        let weight: f64 = combo.iter().map(|&(_, _, p)| p).product();
        let blocked1 = combo.iter().any(|&(_, sq, _)| path1.contains(&sq));
        let blocked2 = combo.iter().any(|&(_, sq, _)| path2.contains(&sq));
        match (blocked1, blocked2) {
            (false, false) => {
                push_entry(&mut joint, mover, to1, &combo, weight * ratio);
                push_entry(&mut joint, mover, to2, &combo, weight * (1.0 - ratio));
            }
            (true, false) => push_entry(&mut joint, mover, to2, &combo, weight),
            (false, true) => push_entry(&mut joint, mover, to1, &combo, weight),
            (true, true) => push_entry(&mut joint, mover, source, &combo, weight),
        }
    }
    normalize_joint(&mut joint, cfg.probability_epsilon)?;
    let mut piece_ids = vec![mover];
    piece_ids.extend(blockers.iter().map(|b| b.id));
    tracing::debug!(piece = %mover, %source, %to1, %to2, entries = joint.len(), "split entanglement");
    Ok(Entanglement {
        piece_ids,
        joint,
        description: format!("{mover} splitting {source}->{{{to1},{to2}}} through a superposed path"),
    })
}

/// Build the entanglement created when a merge's two rays carry blockers —
/// the dual of [`build_split_entanglement`]: a blocked ray leaves the
/// corresponding half of the piece's mass stranded at its source square
/// instead of joining `to`.
#[allow(clippy::too_many_arguments)]
pub fn build_merge_entanglement(
    mover: PieceId,
    from1: Square,
    path1: &[Square],
    from2: Square,
    path2: &[Square],
    to: Square,
    blockers: &[&Piece],
    p1: f64,
    p2: f64,
    cfg: &EngineConfig,
) -> Result<Entanglement, EngineError> {
    check_enumeration_bound(blockers, cfg)?;
    let mut joint = IndexMap::new();
    for combo in cartesian_blocker_configs(blockers) {
        let weight: f64 = combo.iter().map(|&(_, _, p)| p).product();
        let blocked1 = combo.iter().any(|&(_, sq, _)| path1.contains(&sq));
        let blocked2 = combo.iter().any(|&(_, sq, _)| path2.contains(&sq));
        match (blocked1, blocked2) {
            (false, false) => push_entry(&mut joint, mover, to, &combo, weight * (p1 + p2)),
            (true, false) => {
                push_entry(&mut joint, mover, from1, &combo, weight * p1);
                push_entry(&mut joint, mover, to, &combo, weight * p2);
            }
            (false, true) => {
                push_entry(&mut joint, mover, to, &combo, weight * p1);
                push_entry(&mut joint, mover, from2, &combo, weight * p2);
            }
            (true, true) => {
                push_entry(&mut joint, mover, from1, &combo, weight * p1);
                push_entry(&mut joint, mover, from2, &combo, weight * p2);
            }
        }
    }
    normalize_joint(&mut joint, cfg.probability_epsilon)?;
    let mut piece_ids = vec![mover];
    piece_ids.extend(blockers.iter().map(|b| b.id));
    tracing::debug!(piece = %mover, %from1, %from2, %to, entries = joint.len(), "merge entanglement");
    Ok(Entanglement {
        piece_ids,
        joint,
        description: format!("{mover} merging {{{from1},{from2}}}->{to} through a superposed path"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PieceId;
    use crate::geometry::FixedRandomSource;
    use crate::pieces::{Color, PieceKind};

    fn piece(id: u64, kind: PieceKind, entries: &[(u8, f64)]) -> Piece {
        let mut distribution = Distribution::new();
        for &(sq, p) in entries {
            distribution.insert(Square::new(sq), p);
        }
        Piece {
            id: PieceId::test_id(id),
            kind,
            color: Color::White,
            distribution,
        }
    }

    #[test]
    fn split_produces_ratio_and_complement() {
        let queen = piece(1, PieceKind::Queen, &[(3, 1.0)]);
        let dist = split_distribution(&queen, Square::new(27), Square::new(43), 0.5).unwrap();
        assert_eq!(dist.get(&Square::new(27)), Some(&0.5));
        assert_eq!(dist.get(&Square::new(43)), Some(&0.5));
    }

    #[test]
    fn split_rejects_uncertain_source() {
        let queen = piece(1, PieceKind::Queen, &[(3, 0.5), (4, 0.5)]);
        assert!(split_distribution(&queen, Square::new(27), Square::new(43), 0.5).is_err());
    }

    #[test]
    fn split_then_merge_restores_the_original_distribution_r1() {
        let bishop = piece(20, PieceKind::Bishop, &[(5, 1.0)]);
        let split = split_distribution(&bishop, Square::new(19), Square::new(33), 0.5).unwrap();

        let mut branched = bishop.clone();
        branched.distribution = split;
        let merged = merge_distribution(&branched, Square::new(19), Square::new(33), Square::new(5)).unwrap();

        assert_eq!(merged.len(), 1);
        assert!((merged.get(&Square::new(5)).copied().unwrap_or(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn merge_sums_chosen_branches_and_keeps_others() {
        let knight = piece(2, PieceKind::Knight, &[(10, 0.3), (11, 0.3), (12, 0.4)]);
        let dist = merge_distribution(&knight, Square::new(10), Square::new(11), Square::new(20)).unwrap();
        assert_eq!(dist.get(&Square::new(20)), Some(&0.6));
        assert_eq!(dist.get(&Square::new(12)), Some(&0.4));
        assert_eq!(dist.get(&Square::new(10)), None);
    }

    #[test]
    fn measuring_zero_mass_square_is_rejected() {
        let dist = piece(3, PieceKind::Bishop, &[(5, 0.4), (6, 0.6)]).distribution;
        let mut rng = FixedRandomSource(0.1);
        assert!(measure_distribution(&dist, Square::new(7), &mut rng).is_err());
    }

    #[test]
    fn measuring_certain_square_returns_probability_one() {
        let dist = piece(4, PieceKind::Rook, &[(0, 1.0)]).distribution;
        let mut rng = FixedRandomSource(0.9);
        let result = measure_distribution(&dist, Square::new(0), &mut rng).unwrap();
        assert!(result.outcome);
        assert_eq!(result.probability_before, 1.0);
    }

    #[test]
    fn measuring_superposed_square_samples_and_collapses() {
        let dist = piece(5, PieceKind::Rook, &[(0, 0.3), (7, 0.7)]).distribution;
        let mut low = FixedRandomSource(0.1);
        let low_result = measure_distribution(&dist, Square::new(0), &mut low).unwrap();
        assert!(low_result.outcome);
        assert_eq!(low_result.collapsed_to, Square::new(0));

        let mut high = FixedRandomSource(0.9);
        let high_result = measure_distribution(&dist, Square::new(0), &mut high).unwrap();
        assert!(!high_result.outcome);
        assert_eq!(high_result.collapsed_to, Square::new(7));
    }

    #[test]
    fn marginal_matches_joint_sum_per_square_p3() {
        let a = PieceId::test_id(10);
        let b = PieceId::test_id(11);
        let mut joint = IndexMap::new();
        joint.insert(
            JointKey::new(vec![(a, Square::new(28)), (b, Square::new(35))]),
            0.6,
        );
        joint.insert(
            JointKey::new(vec![(a, Square::new(12)), (b, Square::new(35))]),
            0.4,
        );
        let marginal_a = marginalize(&joint, a);
        assert!((marginal_a.get(&Square::new(28)).unwrap() - 0.6).abs() < 1e-9);
        assert!((marginal_a.get(&Square::new(12)).unwrap() - 0.4).abs() < 1e-9);
        let marginal_b = marginalize(&joint, b);
        assert_eq!(marginal_b.len(), 1);
        assert!((marginal_b.get(&Square::new(35)).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn build_move_entanglement_sums_to_one_p2() {
        let blocker = piece(6, PieceKind::Pawn, &[(11, 0.4), (19, 0.6)]);
        let cfg = EngineConfig::default();
        let path = [Square::new(11)];
        let ent = build_move_entanglement(
            PieceId::test_id(7),
            Square::new(3),
            Square::new(35),
            &path,
            &[&blocker],
            &cfg,
        )
        .unwrap();
        let total: f64 = ent.joint.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_entry_joint_blocker_collapses_trivially() {
        let blocker = piece(8, PieceKind::Pawn, &[(11, 1.0)]);
        let cfg = EngineConfig::default();
        let path = [Square::new(11)];
        let ent = build_move_entanglement(
            PieceId::test_id(9),
            Square::new(3),
            Square::new(35),
            &path,
            &[&blocker],
            &cfg,
        )
        .unwrap();
        assert_eq!(ent.joint.len(), 1);
    }
}
