//! Piece kinds, colors, and the per-kind geometric move rules (occupancy
//! ignored — [`crate::movegen`] layers certainty/occupancy on top).

use serde::{Deserialize, Serialize};
use strum::{EnumIs, FromRepr, VariantArray};

use crate::geometry::Square;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    #[inline]
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// The rank a pawn of this color starts on (0-indexed).
    pub fn pawn_home_rank(self) -> u8 {
        match self {
            Self::White => 1,
            Self::Black => 6,
        }
    }

    /// The rank a pawn of this color promotes on.
    pub fn promotion_rank(self) -> u8 {
        match self {
            Self::White => 7,
            Self::Black => 0,
        }
    }

    /// The home rank for this color's king and rooks.
    pub fn back_rank(self) -> u8 {
        match self {
            Self::White => 0,
            Self::Black => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, VariantArray, FromRepr, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

/// A pawn's move always promotes to one of these.
pub const PROMOTION_KINDS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

impl PieceKind {
    pub fn is_valid_promotion(self) -> bool {
        PROMOTION_KINDS.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Kingside,
    Queenside,
}

impl Side {
    #[inline]
    pub fn file_delta(self) -> i8 {
        match self {
            Self::Kingside => 2,
            Self::Queenside => -2,
        }
    }

    #[inline]
    pub fn rook_home_file(self) -> u8 {
        match self {
            Self::Kingside => 7,
            Self::Queenside => 0,
        }
    }
}

const KING_HOME_FILE: u8 = 4;

/// Geometric move rules for a piece kind, occupancy ignored. Dispatch is
/// generalized from bitboard surveillance to plain target lists.
pub trait PieceRules: Send + Sync {
    /// `true` for bishops, rooks and queens: rays extend to the board edge
    /// rather than stopping after one step.
    fn is_slider(&self) -> bool;
    /// Step directions, as `(file delta, rank delta)`. Sliders walk these
    /// repeatedly; steppers (knight, king) apply them once.
    fn directions(&self) -> &'static [(i8, i8)];
}

struct Slider(&'static [(i8, i8)]);
struct Stepper(&'static [(i8, i8)]);

impl PieceRules for Slider {
    fn is_slider(&self) -> bool {
        true
    }
    fn directions(&self) -> &'static [(i8, i8)] {
        self.0
    }
}

impl PieceRules for Stepper {
    fn is_slider(&self) -> bool {
        false
    }
    fn directions(&self) -> &'static [(i8, i8)] {
        self.0
    }
}

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const QUEEN_DIRS: [(i8, i8); 8] = [
    (1, 1), (1, -1), (-1, 1), (-1, -1),
    (1, 0), (-1, 0), (0, 1), (0, -1),
];
const KNIGHT_DIRS: [(i8, i8); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2),
    (-1, -2), (-2, -1), (-2, 1), (-1, 2),
];
const KING_DIRS: [(i8, i8); 8] = [
    (1, 0), (1, 1), (0, 1), (-1, 1),
    (-1, 0), (-1, -1), (0, -1), (1, -1),
];

/// Dispatch to the movement rules for a non-pawn piece kind. Pawns have no
/// single uniform direction set (forward advance and diagonal capture are
/// asymmetric), so they are handled by the dedicated `pawn_*` functions
/// below instead of through this trait.
pub fn rules_for(kind: PieceKind) -> &'static dyn PieceRules {
    static BISHOP: Slider = Slider(&BISHOP_DIRS);
    static ROOK: Slider = Slider(&ROOK_DIRS);
    static QUEEN: Slider = Slider(&QUEEN_DIRS);
    static KNIGHT: Stepper = Stepper(&KNIGHT_DIRS);
    static KING: Stepper = Stepper(&KING_DIRS);

    match kind {
        PieceKind::Bishop => &BISHOP,
        PieceKind::Rook => &ROOK,
        PieceKind::Queen => &QUEEN,
        PieceKind::Knight => &KNIGHT,
        PieceKind::King => &KING,
        PieceKind::Pawn => panic!("pawns are handled by the pawn_* functions, not PieceRules"),
    }
}

/// Every square geometrically reachable from `at`, occupancy ignored. For
/// sliders this walks each ray to the board edge.
pub fn targets(kind: PieceKind, at: Square) -> Vec<Square> {
    let rules = rules_for(kind);
    let mut out = Vec::new();
    for &(df, dr) in rules.directions() {
        let mut cursor = at;
        loop {
            match cursor.offset(df, dr) {
                Some(next) => {
                    out.push(next);
                    cursor = next;
                    if !rules.is_slider() {
                        break;
                    }
                }
                None => break,
            }
        }
    }
    out
}

/// Forward-advance targets (no captures): one step always, a second step
/// only from the pawn's home rank. Occupancy/certainty is movegen's job.
pub fn pawn_advance_targets(color: Color, at: Square) -> Vec<Square> {
    let dr = match color {
        Color::White => 1,
        Color::Black => -1,
    };
    let mut out = Vec::new();
    if let Some(one) = at.offset(0, dr) {
        out.push(one);
        if at.rank() == color.pawn_home_rank() {
            if let Some(two) = at.offset(0, 2 * dr) {
                out.push(two);
            }
        }
    }
    out
}

/// The two diagonal capture targets, on-board ones only.
pub fn pawn_capture_targets(color: Color, at: Square) -> Vec<Square> {
    let dr = match color {
        Color::White => 1,
        Color::Black => -1,
    };
    [(-1, dr), (1, dr)]
        .into_iter()
        .filter_map(|(df, dr)| at.offset(df, dr))
        .collect()
}

/// The king's destination square for castling to `side`, ignoring whether
/// the right is actually held or the path is clear.
pub fn castling_king_target(color: Color, side: Side) -> Square {
    Square::from_file_rank(
        (KING_HOME_FILE as i8 + side.file_delta()) as u8,
        color.back_rank(),
    )
    .expect("castling target stays on the back rank")
}

pub fn castling_king_home(color: Color) -> Square {
    Square::from_file_rank(KING_HOME_FILE, color.back_rank()).unwrap()
}

pub fn castling_rook_home(color: Color, side: Side) -> Square {
    Square::from_file_rank(side.rook_home_file(), color.back_rank()).unwrap()
}

/// The rook's destination square for castling to `side`.
pub fn castling_rook_target(color: Color, side: Side) -> Square {
    let file = match side {
        Side::Kingside => KING_HOME_FILE as i8 + 1,
        Side::Queenside => KING_HOME_FILE as i8 - 1,
    };
    Square::from_file_rank(file as u8, color.back_rank()).unwrap()
}
