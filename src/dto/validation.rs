//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 32;

/// Validates that a player name is 1 to 32 characters of letters, digits, `_`, `-` or `.`.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("alice")      // Ok
/// validate_player_name("   ")        // Err - blank
/// validate_player_name("bob/../etc") // Err - forbidden characters
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let length = name.chars().count();
    if length == 0 || length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be 1 to {MAX_PLAYER_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        let mut err = ValidationError::new("player_name_format");
        err.message =
            Some("Player name may only contain letters, digits, '_', '-' and '.'".into());
        return Err(err);
    }

    Ok(())
}
