use rand::Rng;

pub const KEY_LEN: usize = 6;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Largest multiple of the alphabet size that fits in a byte;
/// bytes at or above it are redrawn so every character is equally likely.
const REJECT_FROM: u8 = 252;

/// Generates a random base-36 key of [`KEY_LEN`] characters.
///
/// Not cryptographically secure and not checked against existing links.
#[must_use]
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    let mut key = String::with_capacity(KEY_LEN);
    let mut buf = [0; KEY_LEN * 2];

    while key.len() < KEY_LEN {
        rng.fill_bytes(&mut buf);
        let missing = KEY_LEN - key.len();
        key.extend(
            buf.iter()
                .filter(|&&byte| byte < REJECT_FROM)
                .map(|&byte| char::from(ALPHABET[usize::from(byte % 36)]))
                .take(missing),
        );
    }

    key
}
