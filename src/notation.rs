//! Wire encoding for a [`Snapshot`]: the JSON shape clients and the
//! game-server boundary exchange. [`Snapshot`] does not derive `Serialize`/
//! `Deserialize` directly because its `pieces` map and `next_slot` counter
//! are private invariants, not public fields; this module is the one place
//! that reaches past that boundary, through [`Snapshot::from_raw_parts`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::board::{CastlingRights, Distribution, EnPassant, Entanglement, Piece, PieceId, Snapshot};
use crate::geometry::Square;
use crate::pieces::{Color, PieceKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PieceWire {
    id: PieceId,
    kind: PieceKind,
    color: Color,
    distribution: Distribution,
}

impl From<&Piece> for PieceWire {
    fn from(piece: &Piece) -> Self {
        PieceWire {
            id: piece.id,
            kind: piece.kind,
            color: piece.color,
            distribution: piece.distribution.clone(),
        }
    }
}

impl From<PieceWire> for Piece {
    fn from(wire: PieceWire) -> Self {
        Piece {
            id: wire.id,
            kind: wire.kind,
            color: wire.color,
            distribution: wire.distribution,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotWire {
    pieces: Vec<PieceWire>,
    active_color: Color,
    castling_rights: CastlingRights,
    en_passant_target: Option<EnPassant>,
    halfmove_clock: u32,
    fullmove_number: u32,
    entanglements: Vec<Entanglement>,
    /// Not part of the original wire schema; carried so a deserialized
    /// snapshot never reuses a piece identity already seen in the game.
    next_piece_slot: u32,
}

impl From<&Snapshot> for SnapshotWire {
    fn from(snapshot: &Snapshot) -> Self {
        SnapshotWire {
            pieces: snapshot.pieces().map(PieceWire::from).collect(),
            active_color: snapshot.active_color,
            castling_rights: snapshot.castling,
            en_passant_target: snapshot.en_passant,
            halfmove_clock: snapshot.halfmove_clock,
            fullmove_number: snapshot.fullmove_number,
            entanglements: snapshot.entanglements.clone(),
            next_piece_slot: snapshot.next_slot(),
        }
    }
}

impl From<SnapshotWire> for Snapshot {
    fn from(wire: SnapshotWire) -> Self {
        let mut pieces: IndexMap<PieceId, Piece> = IndexMap::with_capacity(wire.pieces.len());
        for piece_wire in wire.pieces {
            let piece: Piece = piece_wire.into();
            pieces.insert(piece.id, piece);
        }
        Snapshot::from_raw_parts(
            pieces,
            wire.active_color,
            wire.castling_rights,
            wire.en_passant_target,
            wire.halfmove_clock,
            wire.fullmove_number,
            wire.entanglements,
            wire.next_piece_slot,
        )
    }
}

impl Serialize for Snapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SnapshotWire::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SnapshotWire::deserialize(deserializer).map(Snapshot::from)
    }
}

/// Serializes `record` to the exact wire shape external callers expect.
pub fn move_record_to_json(record: &crate::moves::MoveRecord) -> serde_json::Value {
    serde_json::to_value(record).expect("MoveRecord always serializes")
}

/// Serializes `snapshot` to the exact wire shape external callers expect.
pub fn snapshot_to_json(snapshot: &Snapshot) -> serde_json::Value {
    serde_json::to_value(snapshot).expect("Snapshot always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::Color as PieceColor;

    #[test]
    fn snapshot_round_trips_through_json() {
        let (board, id) = Snapshot::empty(PieceColor::White).with_added_piece(
            PieceKind::Queen,
            PieceColor::White,
            {
                let mut d = Distribution::new();
                d.insert(Square::new(3), 1.0);
                d
            },
        );
        let json = serde_json::to_string(&board).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.piece(id).unwrap().certain_square(), Some(Square::new(3)));
        assert_eq!(restored.active_color, board.active_color);
    }

    #[test]
    fn round_trip_preserves_next_piece_slot_so_identities_never_collide() {
        let (board, _id) = Snapshot::empty(PieceColor::White).with_added_piece(
            PieceKind::Pawn,
            PieceColor::White,
            {
                let mut d = Distribution::new();
                d.insert(Square::new(8), 1.0);
                d
            },
        );
        let json = serde_json::to_string(&board).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        let (_, fresh_id) = restored.with_added_piece(PieceKind::Pawn, PieceColor::White, {
            let mut d = Distribution::new();
            d.insert(Square::new(9), 1.0);
            d
        });
        assert!(board.piece(fresh_id).is_none());
    }

    #[test]
    fn move_record_wire_json_uses_kebab_case_type_tag() {
        use crate::moves::MoveRecord;
        let record = MoveRecord::Normal {
            piece_id: PieceId::test_id(0),
            from: Square::new(1),
            to: Square::new(2),
        };
        let json = move_record_to_json(&record);
        assert_eq!(json["type"], "normal");
    }
}
