use std::collections::BTreeMap;

use enum_map::EnumMap;
use serde::{Deserialize, Serialize};

use crate::force::Force;
use crate::piece::PieceKind;


// Relative (d_file, d_rank) offset in wire coordinate order.
pub type Offset = (i8, i8);

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct OffsetSet {
    pub moves: Vec<Offset>,   // realized only onto empty squares
    pub attacks: Vec<Offset>, // realized only onto enemy-occupied squares
}

impl OffsetSet {
    pub fn is_empty(&self) -> bool { self.moves.is_empty() && self.attacks.is_empty() }

    fn union(&mut self, other: &OffsetSet) {
        for &offset in &other.moves {
            if !self.moves.contains(&offset) {
                self.moves.push(offset);
            }
        }
        for &offset in &other.attacks {
            if !self.attacks.contains(&offset) {
                self.attacks.push(offset);
            }
        }
    }

    fn subtract(&mut self, other: &OffsetSet) {
        self.moves.retain(|offset| !other.moves.contains(offset));
        self.attacks.retain(|offset| !other.attacks.contains(offset));
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AbilityCard {
    #[serde(rename = "pieceType")]
    pub piece_kind: PieceKind,
    #[serde(default)]
    pub moves: Vec<Offset>,
    #[serde(default)]
    pub attacks: Vec<Offset>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool { true }

impl AbilityCard {
    fn offsets(&self) -> OffsetSet {
        OffsetSet { moves: self.moves.clone(), attacks: self.attacks.clone() }
    }
}

// Derived view over the enabled cards. Offsets are deduplicated per piece
// type; order carries no meaning.
pub type CustomMoveTable = EnumMap<Force, EnumMap<PieceKind, OffsetSet>>;

pub type CardsByName = BTreeMap<String, AbilityCard>;

// The table is fully determined by (cards, enabled flags). `toggle_card`
// rebuilds the color from scratch because plain removal cannot tell which
// enabled card owns a shared offset; `delete_card` subtracts by exact value
// and can thus under-remove a shared offset until the next rebuild. That
// asymmetry is inherited wire behavior, covered by tests below.
#[derive(Clone, Debug, Default)]
pub struct CardRegistry {
    cards: EnumMap<Force, CardsByName>,
    table: CustomMoveTable,
}

impl CardRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn table(&self) -> &CustomMoveTable { &self.table }
    pub fn cards(&self) -> &EnumMap<Force, CardsByName> { &self.cards }

    pub fn save_card(&mut self, force: Force, name: String, mut card: AbilityCard) {
        card.enabled = true;
        self.table[force][card.piece_kind].union(&card.offsets());
        self.cards[force].insert(name, card);
    }

    // Returns false if there is no card with this name.
    pub fn toggle_card(&mut self, force: Force, name: &str, enabled: bool) -> bool {
        match self.cards[force].get_mut(name) {
            None => false,
            Some(card) => {
                card.enabled = enabled;
                self.rebuild(force);
                true
            }
        }
    }

    pub fn delete_card(&mut self, force: Force, name: &str) -> bool {
        match self.cards[force].remove(name) {
            None => false,
            Some(card) => {
                if card.enabled {
                    self.table[force][card.piece_kind].subtract(&card.offsets());
                }
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.cards = EnumMap::default();
        self.table = CustomMoveTable::default();
    }

    fn rebuild(&mut self, force: Force) {
        self.table[force] = EnumMap::default();
        for card in self.cards[force].values().filter(|card| card.enabled) {
            self.table[force][card.piece_kind].union(&card.offsets());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rook_card(moves: Vec<Offset>, attacks: Vec<Offset>) -> AbilityCard {
        AbilityCard { piece_kind: PieceKind::Rook, moves, attacks, enabled: true }
    }

    #[test]
    fn save_unions_and_dedups() {
        let mut registry = CardRegistry::new();
        registry.save_card(Force::White, "a".to_owned(), rook_card(vec![(1, 1)], vec![]));
        registry.save_card(Force::White, "b".to_owned(), rook_card(vec![(1, 1), (2, 2)], vec![]));
        assert_eq!(registry.table()[Force::White][PieceKind::Rook].moves, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn toggle_twice_is_identity() {
        let mut registry = CardRegistry::new();
        registry.save_card(Force::White, "a".to_owned(), rook_card(vec![(1, 1)], vec![(-1, -1)]));
        registry.save_card(Force::White, "b".to_owned(), rook_card(vec![(2, 2)], vec![]));
        let before = registry.table().clone();
        assert!(registry.toggle_card(Force::White, "a", false));
        assert_eq!(registry.table()[Force::White][PieceKind::Rook].moves, vec![(2, 2)]);
        assert!(registry.toggle_card(Force::White, "a", true));
        assert_eq!(registry.table(), &before);
    }

    #[test]
    fn toggle_keeps_other_cards_shared_offsets() {
        let mut registry = CardRegistry::new();
        registry.save_card(Force::White, "a".to_owned(), rook_card(vec![(1, 1)], vec![]));
        registry.save_card(Force::White, "b".to_owned(), rook_card(vec![(1, 1)], vec![]));
        assert!(registry.toggle_card(Force::White, "a", false));
        // "b" still contributes the shared offset after the rebuild.
        assert_eq!(registry.table()[Force::White][PieceKind::Rook].moves, vec![(1, 1)]);
    }

    #[test]
    fn delete_under_removes_shared_offset() {
        let mut registry = CardRegistry::new();
        registry.save_card(Force::White, "a".to_owned(), rook_card(vec![(1, 1)], vec![]));
        registry.save_card(Force::White, "b".to_owned(), rook_card(vec![(1, 1)], vec![]));
        assert!(registry.delete_card(Force::White, "a"));
        // Exact-value subtraction takes the shared offset with it. Kept as-is:
        // the next toggle-triggered rebuild brings it back.
        assert!(registry.table()[Force::White][PieceKind::Rook].moves.is_empty());
        assert!(registry.toggle_card(Force::White, "b", true));
        assert_eq!(registry.table()[Force::White][PieceKind::Rook].moves, vec![(1, 1)]);
    }

    #[test]
    fn colors_are_independent() {
        let mut registry = CardRegistry::new();
        registry.save_card(Force::White, "a".to_owned(), rook_card(vec![(1, 1)], vec![]));
        assert!(registry.table()[Force::Black][PieceKind::Rook].is_empty());
        registry.reset();
        assert!(registry.table()[Force::White][PieceKind::Rook].is_empty());
        assert!(registry.cards()[Force::White].is_empty());
    }
}
