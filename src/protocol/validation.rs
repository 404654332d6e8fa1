use super::error_codes::ErrorCode;
use super::ids::{ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH};

pub const MAX_NICKNAME_LENGTH: usize = 20;
pub const MAX_GHOST_CHAT_LENGTH: usize = 500;

/// Nicknames are 1-20 characters, no leading/trailing whitespace, and only
/// alphanumerics (unicode), spaces, hyphens, and underscores.
pub fn validate_nickname(nickname: &str) -> Result<(), ErrorCode> {
    if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_LENGTH {
        return Err(ErrorCode::InvalidNickname);
    }
    if nickname.trim() != nickname {
        return Err(ErrorCode::InvalidNickname);
    }
    let ok = nickname
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ErrorCode::InvalidNickname)
    }
}

/// Room codes are exactly six characters from the confusable-free alphabet.
/// Lowercase input is accepted and normalized by the caller.
pub fn validate_room_code(code: &str) -> Result<(), ErrorCode> {
    if code.len() == ROOM_CODE_LENGTH && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
        Ok(())
    } else {
        Err(ErrorCode::InvalidRoomCode)
    }
}

/// Ghost chat messages are non-empty after trimming and bounded in length.
pub fn validate_chat_message(message: &str) -> Result<(), ErrorCode> {
    if message.trim().is_empty() || message.chars().count() > MAX_GHOST_CHAT_LENGTH {
        Err(ErrorCode::InvalidMessage)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_rules() {
        assert!(validate_nickname("Alice").is_ok());
        assert!(validate_nickname("Player One").is_ok());
        assert!(validate_nickname("night-owl_7").is_ok());
        assert!(validate_nickname("玩家").is_ok());

        assert!(validate_nickname("").is_err());
        assert!(validate_nickname(" padded ").is_err());
        assert!(validate_nickname("tab\tchar").is_err());
        assert!(validate_nickname("way@too!odd").is_err());
        assert!(validate_nickname(&"x".repeat(21)).is_err());
    }

    #[test]
    fn room_code_rules() {
        assert!(validate_room_code("ABCDEF").is_ok());
        assert!(validate_room_code("K7MNP2").is_ok());

        assert!(validate_room_code("").is_err());
        assert!(validate_room_code("ABCDE").is_err());
        assert!(validate_room_code("ABCDEFG").is_err());
        // Confusables rejected
        assert!(validate_room_code("ABC0EF").is_err());
        assert!(validate_room_code("ABCO1I").is_err());
        assert!(validate_room_code("abcdef").is_err());
    }

    #[test]
    fn chat_message_rules() {
        assert!(validate_chat_message("boo").is_ok());
        assert!(validate_chat_message("").is_err());
        assert!(validate_chat_message("   ").is_err());
        assert!(validate_chat_message(&"x".repeat(501)).is_err());
    }
}
