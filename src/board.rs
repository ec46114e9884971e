//! The board snapshot: pieces, their distributions, castling rights,
//! en-passant target, and the entanglement registry. Every mutator here
//! deep-clones and returns a new snapshot; history navigation ([`crate::game`])
//! relies on prior snapshots staying untouched.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::geometry::{total_mass, Square};
use crate::pieces::{Color, PieceKind, Side};

/// A stable identity for a piece, generational so a captured-then-recycled
/// table slot is never confused with the piece that used to live there.
/// Formatted zero-padded so lexicographic string order matches numeric
/// order — required for the canonical joint-state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceId(u64);

impl PieceId {
    #[inline]
    pub(crate) fn pack(slot: u32, generation: u32) -> Self {
        PieceId(((generation as u64) << 32) | slot as u64)
    }

    /// A `PieceId` built directly from a raw value, for tests that need a
    /// handful of distinct, stable identities without going through
    /// [`Snapshot::with_added_piece`].
    #[cfg(test)]
    pub(crate) fn test_id(raw: u64) -> Self {
        PieceId(raw)
    }

    #[inline]
    pub fn slot(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:020}", self.0)
    }
}

impl std::str::FromStr for PieceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PieceId(s.parse()?))
    }
}

/// A piece's per-square probability distribution. Entries sum to 1 within
/// epsilon, and a square with zero probability is simply absent.
pub type Distribution = IndexMap<Square, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub kind: PieceKind,
    pub color: Color,
    pub distribution: Distribution,
}

impl Piece {
    pub fn is_superposed(&self) -> bool {
        self.distribution.len() > 1
    }

    /// The square this piece occupies with certainty, if any.
    pub fn certain_square(&self) -> Option<Square> {
        if self.distribution.len() == 1 {
            self.distribution.keys().next().copied()
        } else {
            None
        }
    }

    pub fn mass_at(&self, square: Square) -> f64 {
        self.distribution.get(&square).copied().unwrap_or(0.0)
    }

    pub fn total_mass(&self) -> f64 {
        total_mass(&self.distribution)
    }
}

/// An ordered `(identity, square)` pair list, sorted by identity, naming
/// exactly the pieces participating in one joint-state entry's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JointKey(Vec<(PieceId, Square)>);

impl Serialize for JointKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical_string())
    }
}

impl<'de> Deserialize<'de> for JointKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        JointKey::parse(&text).ok_or_else(|| serde::de::Error::custom("malformed joint-state key"))
    }
}

impl JointKey {
    /// Builds a key from `(id, square)` pairs, sorting by identity so two
    /// equivalent assignments always produce the same key.
    pub fn new(mut assignment: Vec<(PieceId, Square)>) -> Self {
        assignment.sort_by_key(|&(id, _)| id);
        JointKey(assignment)
    }

    pub fn square_of(&self, id: PieceId) -> Option<Square> {
        self.0
            .iter()
            .find(|&&(pid, _)| pid == id)
            .map(|&(_, sq)| sq)
    }

    pub fn pairs(&self) -> &[(PieceId, Square)] {
        &self.0
    }

    /// Canonical string form: `"id1:sq1,id2:sq2,..."`, identities already
    /// sorted, so lexicographic order is the order they appear in.
    pub fn canonical_string(&self) -> String {
        self.0
            .iter()
            .map(|(id, sq)| format!("{id}:{}", sq.index()))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(JointKey(Vec::new()));
        }
        let mut pairs = Vec::new();
        for entry in text.split(',') {
            let (id_str, sq_str) = entry.split_once(':')?;
            let id: PieceId = id_str.parse().ok()?;
            let sq = Square::try_new(sq_str.parse().ok()?)?;
            pairs.push((id, sq));
        }
        Some(JointKey(pairs))
    }
}

/// A joint distribution coupling two or more pieces' positions. A piece
/// identity appears in at most one entanglement at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entanglement {
    pub piece_ids: Vec<PieceId>,
    #[serde(rename = "jointStates")]
    pub joint: IndexMap<JointKey, f64>,
    pub description: String,
}

impl Entanglement {
    pub fn involves(&self, id: PieceId) -> bool {
        self.piece_ids.contains(&id)
    }

    pub fn total_mass(&self) -> f64 {
        self.joint.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastlingRightsForColor {
    pub kingside: bool,
    pub queenside: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white: CastlingRightsForColor,
    pub black: CastlingRightsForColor,
}

impl CastlingRights {
    pub fn full() -> Self {
        Self {
            white: CastlingRightsForColor { kingside: true, queenside: true },
            black: CastlingRightsForColor { kingside: true, queenside: true },
        }
    }

    pub fn get(&self, color: Color, side: Side) -> bool {
        let for_color = match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        };
        match side {
            Side::Kingside => for_color.kingside,
            Side::Queenside => for_color.queenside,
        }
    }

    pub fn set(&mut self, color: Color, side: Side, value: bool) {
        let for_color = match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        match side {
            Side::Kingside => for_color.kingside = value,
            Side::Queenside => for_color.queenside = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnPassant {
    pub capture_square: Square,
    pub passed_pawn_square: Square,
    pub passed_pawn_id: PieceId,
}

/// {pieces, active-color, castling-rights, en-passant, halfmove-clock,
/// fullmove-number, entanglements}.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pieces: IndexMap<PieceId, Piece>,
    pub active_color: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<EnPassant>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub entanglements: Vec<Entanglement>,
    next_slot: u32,
}

impl Snapshot {
    pub fn empty(active_color: Color) -> Self {
        Self {
            pieces: IndexMap::new(),
            active_color,
            castling: CastlingRights::full(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            entanglements: Vec::new(),
            next_slot: 0,
        }
    }

    // -- read queries --------------------------------------------------

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(&id)
    }

    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.values()
    }

    pub fn pieces_by_color(&self, color: Color) -> impl Iterator<Item = &Piece> {
        self.pieces.values().filter(move |p| p.color == color)
    }

    pub fn pieces_by_kind_color(&self, kind: PieceKind, color: Color) -> impl Iterator<Item = &Piece> {
        self.pieces
            .values()
            .filter(move |p| p.kind == kind && p.color == color)
    }

    /// The single piece certainly occupying `square` (mass exactly 1), if any.
    pub fn piece_at(&self, square: Square) -> Option<&Piece> {
        self.pieces
            .values()
            .find(|p| p.certain_square() == Some(square))
    }

    /// Every piece with any nonzero mass at `square`.
    pub fn all_pieces_at(&self, square: Square) -> Vec<&Piece> {
        self.pieces
            .values()
            .filter(|p| p.mass_at(square) > 0.0)
            .collect()
    }

    /// Total probability mass of any piece occupying `square`.
    pub fn occupancy_probability(&self, square: Square) -> f64 {
        self.pieces.values().map(|p| p.mass_at(square)).sum()
    }

    pub fn is_certainly_empty(&self, square: Square, epsilon: f64) -> bool {
        self.occupancy_probability(square) <= epsilon
    }

    pub fn king_total_probability(&self, color: Color) -> f64 {
        self.pieces_by_kind_color(PieceKind::King, color)
            .map(Piece::total_mass)
            .sum()
    }

    pub fn entanglement_for(&self, id: PieceId) -> Option<&Entanglement> {
        self.entanglements.iter().find(|e| e.involves(id))
    }

    // -- focused mutators (each deep-clones and returns a new snapshot) -

    pub fn with_distribution(&self, id: PieceId, distribution: Distribution) -> Self {
        let mut next = self.clone();
        if let Some(piece) = next.pieces.get_mut(&id) {
            piece.distribution = distribution;
        }
        next
    }

    pub fn without_piece(&self, id: PieceId) -> Self {
        let mut next = self.clone();
        next.pieces.shift_remove(&id);
        next.entanglements.retain(|e| !e.involves(id));
        next
    }

    pub fn with_added_piece(&self, kind: PieceKind, color: Color, distribution: Distribution) -> (Self, PieceId) {
        let mut next = self.clone();
        let slot = next.next_slot;
        next.next_slot += 1;
        let id = PieceId::pack(slot, 0);
        next.pieces.insert(
            id,
            Piece { id, kind, color, distribution },
        );
        (next, id)
    }

    pub fn with_turn_switched(&self) -> Self {
        let mut next = self.clone();
        let returning_to_white = next.active_color == Color::Black;
        next.active_color = next.active_color.opponent();
        if returning_to_white {
            next.fullmove_number += 1;
        }
        next
    }

    pub fn with_castling_right(&self, color: Color, side: Side, value: bool) -> Self {
        let mut next = self.clone();
        next.castling.set(color, side, value);
        next
    }

    pub fn with_en_passant(&self, en_passant: Option<EnPassant>) -> Self {
        let mut next = self.clone();
        next.en_passant = en_passant;
        next
    }

    pub fn with_entanglement_replaced(&self, id: PieceId, replacement: Option<Entanglement>) -> Self {
        let mut next = self.clone();
        next.entanglements.retain(|e| !e.involves(id));
        if let Some(e) = replacement {
            next.entanglements.push(e);
        }
        next
    }

    pub fn with_halfmove_clock(&self, value: u32) -> Self {
        let mut next = self.clone();
        next.halfmove_clock = value;
        next
    }

    /// Changes a piece's kind in place, its identity and distribution
    /// untouched — used by promotion, which transforms a live piece rather
    /// than capturing and replacing it.
    pub fn with_kind_changed(&self, id: PieceId, kind: PieceKind) -> Self {
        let mut next = self.clone();
        if let Some(piece) = next.pieces.get_mut(&id) {
            piece.kind = kind;
        }
        next
    }

    /// The slot that will be assigned to the next piece added, exposed for
    /// the wire format so a round trip does not reuse an identity.
    pub fn next_slot(&self) -> u32 {
        self.next_slot
    }

    /// Reassembles a snapshot from its raw parts. Used only by
    /// [`crate::notation`] to deserialize a snapshot without going through
    /// [`Self::with_added_piece`], which would assign fresh identities.
    pub(crate) fn from_raw_parts(
        pieces: IndexMap<PieceId, Piece>,
        active_color: Color,
        castling: CastlingRights,
        en_passant: Option<EnPassant>,
        halfmove_clock: u32,
        fullmove_number: u32,
        entanglements: Vec<Entanglement>,
        next_slot: u32,
    ) -> Self {
        Self {
            pieces,
            active_color,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            entanglements,
            next_slot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn singleton(square: Square) -> Distribution {
        let mut d = IndexMap::new();
        d.insert(square, 1.0);
        d
    }

    #[test]
    fn piece_at_requires_certainty() {
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(
            PieceKind::Rook,
            Color::White,
            {
                let mut d = IndexMap::new();
                d.insert(Square::new(0), 0.4);
                d.insert(Square::new(1), 0.6);
                d
            },
        );
        assert!(board.piece_at(Square::new(0)).is_none());
        assert_eq!(board.all_pieces_at(Square::new(0)).len(), 1);
        assert_eq!(board.piece(id).unwrap().is_superposed(), true);
    }

    #[test]
    fn turn_switch_increments_fullmove_on_return_to_white() {
        let board = Snapshot::empty(Color::White);
        let after_white = board.with_turn_switched();
        assert_eq!(after_white.active_color, Color::Black);
        assert_eq!(after_white.fullmove_number, 1);
        let after_black = after_white.with_turn_switched();
        assert_eq!(after_black.active_color, Color::White);
        assert_eq!(after_black.fullmove_number, 2);
    }

    #[test]
    fn joint_key_canonical_string_round_trips() {
        let key = JointKey::new(vec![
            (PieceId::pack(3, 0), Square::new(10)),
            (PieceId::pack(1, 0), Square::new(5)),
        ]);
        let text = key.canonical_string();
        assert_eq!(JointKey::parse(&text).unwrap(), key);
    }

    #[test]
    fn mutators_do_not_touch_the_prior_snapshot() {
        let (board, id) = Snapshot::empty(Color::White).with_added_piece(
            PieceKind::Queen,
            Color::White,
            singleton(Square::new(3)),
        );
        let moved = board.with_distribution(id, singleton(Square::new(4)));
        assert_eq!(board.piece(id).unwrap().certain_square(), Some(Square::new(3)));
        assert_eq!(moved.piece(id).unwrap().certain_square(), Some(Square::new(4)));
    }
}
