//! Word model: kana canonicalization, word validation and the fixed seven-slot board
//! every player exposes during battle.

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Number of display slots on every board, regardless of the real word length.
pub const WORD_SLOTS: usize = 7;
/// Shortest accepted word, in characters.
pub const MIN_WORD_LEN: usize = 2;
/// Sentinel glyph written into the slots past the end of the real word.
pub const EMPTY_SLOT: char = '×';
/// Long vowel mark, the only non-hiragana character accepted in a word.
pub const LONG_VOWEL: char = 'ー';

/// Collapse a single kana onto its base form.
///
/// Voiced and semi-voiced kana lose their diacritic and small kana become full-size, so
/// `が` and `か` (or `っ` and `つ`) are the same attack target.
pub fn canonical_kana(c: char) -> char {
    match c {
        'が' => 'か',
        'ぎ' => 'き',
        'ぐ' => 'く',
        'げ' => 'け',
        'ご' => 'こ',
        'ざ' => 'さ',
        'じ' => 'し',
        'ず' => 'す',
        'ぜ' => 'せ',
        'ぞ' => 'そ',
        'だ' => 'た',
        'ぢ' => 'ち',
        'づ' => 'つ',
        'で' => 'て',
        'ど' => 'と',
        'ば' | 'ぱ' => 'は',
        'び' | 'ぴ' => 'ひ',
        'ぶ' | 'ぷ' => 'ふ',
        'べ' | 'ぺ' => 'へ',
        'ぼ' | 'ぽ' => 'ほ',
        'ゔ' => 'う',
        'ぁ' => 'あ',
        'ぃ' => 'い',
        'ぅ' => 'う',
        'ぇ' => 'え',
        'ぉ' => 'お',
        'っ' => 'つ',
        'ゃ' => 'や',
        'ゅ' => 'ゆ',
        'ょ' => 'よ',
        'ゎ' => 'わ',
        'ヶ' => 'ケ',
        'ヵ' => 'カ',
        other => other,
    }
}

/// Canonical comparison form of a raw word.
pub fn normalize(raw: &str) -> String {
    raw.chars().map(canonical_kana).collect()
}

/// Whether `c` belongs to the game alphabet (the hiragana block plus `ー`).
pub fn is_alphabet(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}') || c == LONG_VOWEL
}

/// Check a raw word before it is accepted as a player's secret word.
pub fn validate(raw: &str) -> Result<(), GameError> {
    if raw.is_empty() || !raw.chars().all(is_alphabet) {
        return Err(GameError::Validation("words may only contain hiragana".into()));
    }

    let len = raw.chars().count();
    if !(MIN_WORD_LEN..=WORD_SLOTS).contains(&len) {
        return Err(GameError::Validation(format!(
            "words must be {MIN_WORD_LEN} to {WORD_SLOTS} hiragana long (got {len})"
        )));
    }

    Ok(())
}

/// Boolean form of [`validate`].
pub fn is_valid(raw: &str) -> bool {
    validate(raw).is_ok()
}

/// Turn a requested attack into the kana actually compared against boards.
pub fn attack_target(kana: char) -> Result<char, GameError> {
    if !is_alphabet(kana) {
        return Err(GameError::Validation(format!(
            "`{kana}` is not a hiragana character"
        )));
    }
    Ok(canonical_kana(kana))
}

/// A player's secret word laid out on seven slots, with the matching reveal bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBoard {
    slots: [char; WORD_SLOTS],
    revealed: [bool; WORD_SLOTS],
}

impl WordBoard {
    /// Validate and canonicalize `raw`, producing a fully hidden board.
    pub fn from_raw(raw: &str) -> Result<Self, GameError> {
        validate(raw)?;

        let mut slots = [EMPTY_SLOT; WORD_SLOTS];
        for (slot, c) in slots.iter_mut().zip(normalize(raw).chars()) {
            *slot = c;
        }

        Ok(Self {
            slots,
            revealed: [false; WORD_SLOTS],
        })
    }

    /// Rebuild a board from persisted slots.
    pub fn from_parts(slots: [char; WORD_SLOTS], revealed: [bool; WORD_SLOTS]) -> Self {
        Self { slots, revealed }
    }

    /// Display slots, padded with [`EMPTY_SLOT`].
    pub fn slots(&self) -> &[char; WORD_SLOTS] {
        &self.slots
    }

    /// Reveal bitmap parallel to [`WordBoard::slots`].
    pub fn revealed(&self) -> &[bool; WORD_SLOTS] {
        &self.revealed
    }

    /// Number of real (non-sentinel) characters.
    pub fn word_len(&self) -> usize {
        self.slots.iter().filter(|c| **c != EMPTY_SLOT).count()
    }

    /// Number of revealed slots.
    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|r| **r).count()
    }

    /// Reveal every slot holding `kana`, returning how many slots were newly revealed.
    ///
    /// Already revealed slots are left untouched, so applying the same kana twice is a no-op.
    pub fn reveal(&mut self, kana: char) -> usize {
        if kana == EMPTY_SLOT {
            return 0;
        }

        let mut newly = 0;
        for (slot, revealed) in self.slots.iter().zip(self.revealed.iter_mut()) {
            if !*revealed && *slot == kana {
                *revealed = true;
                newly += 1;
            }
        }
        newly
    }

    /// Whether `kana` sits in a slot that has already been revealed.
    pub fn shows(&self, kana: char) -> bool {
        self.slots
            .iter()
            .zip(self.revealed.iter())
            .any(|(slot, revealed)| *revealed && *slot == kana)
    }

    /// True once every real character is revealed; padding slots are ignored.
    pub fn is_fully_revealed(&self) -> bool {
        self.slots
            .iter()
            .zip(self.revealed.iter())
            .all(|(slot, revealed)| *slot == EMPTY_SLOT || *revealed)
    }

    /// Rendered view of the board, hiding unrevealed slots behind `?`.
    pub fn masked(&self) -> String {
        self.slots
            .iter()
            .zip(self.revealed.iter())
            .map(|(slot, revealed)| if *revealed { *slot } else { '?' })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_diacritics_and_small_kana() {
        assert_eq!(normalize("がっこう"), "かつこう");
        assert_eq!(normalize("ぱんだ"), "はんた");
        assert_eq!(normalize("きゃべつ"), "きやへつ");
        assert_eq!(normalize("らーめん"), "らーめん");
    }

    #[test]
    fn validate_rejects_bad_alphabet() {
        assert!(validate("ネコ").is_err());
        assert!(validate("cat").is_err());
        assert!(validate("").is_err());
        assert!(validate("ねこ").is_ok());
        assert!(validate("らーめん").is_ok());
    }

    #[test]
    fn validate_checks_raw_length() {
        assert!(validate("ね").is_err());
        assert!(validate("ねこ").is_ok());
        assert!(validate("あいうえおかき").is_ok());
        assert!(validate("あいうえおかきく").is_err());
    }

    #[test]
    fn board_is_padded_to_seven_slots() {
        let board = WordBoard::from_raw("たぬき").unwrap();
        assert_eq!(board.slots(), &['た', 'ぬ', 'き', '×', '×', '×', '×']);
        assert_eq!(board.revealed(), &[false; WORD_SLOTS]);
        assert_eq!(board.word_len(), 3);
    }

    #[test]
    fn board_stores_canonical_form() {
        let board = WordBoard::from_raw("だんご").unwrap();
        assert_eq!(board.slots()[..3], ['た', 'ん', 'こ']);
    }

    #[test]
    fn reveal_is_monotonic_and_idempotent() {
        let mut board = WordBoard::from_raw("ここあ").unwrap();
        assert_eq!(board.reveal('こ'), 2);
        assert_eq!(board.reveal('こ'), 0);
        assert_eq!(board.revealed_count(), 2);
        assert!(!board.is_fully_revealed());
        assert_eq!(board.reveal('あ'), 1);
        assert!(board.is_fully_revealed());
    }

    #[test]
    fn sentinel_never_reveals() {
        let mut board = WordBoard::from_raw("ねこ").unwrap();
        assert_eq!(board.reveal(EMPTY_SLOT), 0);
        assert_eq!(board.masked(), "???????");
    }

    #[test]
    fn attack_target_canonicalizes() {
        assert_eq!(attack_target('が').unwrap(), 'か');
        assert_eq!(attack_target('ー').unwrap(), 'ー');
        assert!(attack_target('A').is_err());
    }
}
