use rand::RngExt;

/// Room codes use uppercase letters and digits without the confusable
/// characters 0, O, I, 1, L for easy verbal communication.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of a room code in characters.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Lowercase RFC 4648 base32 alphabet for player tokens.
const PLAYER_TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Length of a player token in characters.
pub const PLAYER_TOKEN_LENGTH: usize = 12;

/// Generate a 6-character room code over the confusable-free alphabet.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = ROOM_CODE_ALPHABET[idx] as char;
            ch
        })
        .collect()
}

/// Generate a 12-character lowercase base32 player token from 8 random bytes.
pub fn generate_player_id() -> String {
    let mut rng = rand::rng();
    let mut raw = [0u8; 8];
    for byte in &mut raw {
        *byte = rng.random_range(0..=u8::MAX);
    }

    // Map consecutive 5-bit groups of the 64 random bits onto the base32
    // alphabet, truncated to the token length.
    let mut out = String::with_capacity(PLAYER_TOKEN_LENGTH);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for byte in raw {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 && out.len() < PLAYER_TOKEN_LENGTH {
            bits -= 5;
            let idx = ((acc >> bits) & 0x1f) as usize;
            // SAFETY: a 5-bit value indexes a 32-entry alphabet.
            #[allow(clippy::indexing_slicing)]
            out.push(PLAYER_TOKEN_ALPHABET[idx] as char);
        }
    }
    out
}
