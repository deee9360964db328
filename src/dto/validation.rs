//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::{game::ROOM_CODE_LEN, word::WORD_SLOTS};

/// Validates that a room code is exactly six ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("042917") // Ok
/// validate_room_code("42917")  // Err - too short
/// validate_room_code("04291a") // Err - not a digit
/// ```
pub fn validate_room_code(id: &str) -> Result<(), ValidationError> {
    if id.len() != ROOM_CODE_LEN {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

/// Word columns are either empty (no word yet) or exactly [`WORD_SLOTS`] long.
pub fn validate_word_column(slots: &[char]) -> Result<(), ValidationError> {
    check_column_len(slots.len(), "display_word_length")
}

/// Same rule as [`validate_word_column`] for the reveal bitmap.
pub fn validate_reveal_column(revealed: &[bool]) -> Result<(), ValidationError> {
    check_column_len(revealed.len(), "revealed_indices_length")
}

fn check_column_len(len: usize, code: &'static str) -> Result<(), ValidationError> {
    if len == 0 || len == WORD_SLOTS {
        return Ok(());
    }

    let mut err = ValidationError::new(code);
    err.message = Some(format!("Column must hold 0 or {WORD_SLOTS} slots (got {len})").into());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("000000").is_ok());
        assert!(validate_room_code("123456").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("12345").is_err()); // too short
        assert!(validate_room_code("1234567").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("12345a").is_err());
        assert!(validate_room_code("12 456").is_err());
    }

    #[test]
    fn test_validate_columns() {
        assert!(validate_word_column(&[]).is_ok());
        assert!(validate_word_column(&['ね', 'こ', '×', '×', '×', '×', '×']).is_ok());
        assert!(validate_word_column(&['ね', 'こ']).is_err());
        assert!(validate_reveal_column(&[false; 7]).is_ok());
        assert!(validate_reveal_column(&[false; 3]).is_err());
    }
}
