//! The fixed byte permutation used to obfuscate packet payloads on the wire.
//!
//! This is deliberately *not* cryptography (spec: "obfuscation, not
//! cryptography") — it's a single static bijection over the 256 possible
//! byte values, generated once from a fixed seed so every instance of the
//! server agrees on the same table without having to ship a binary blob.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Fixed seed for the permutation shuffle. Changing this changes the wire
/// format for every deployed server at once — never derive it from anything
/// request-specific.
const PERMUTATION_SEED: [u8; 32] = *b"sos-game-server-permutation-v001";

pub static ENCODE_TABLE: Lazy<[u8; 256]> = Lazy::new(build_encode_table);

pub static DECODE_TABLE: Lazy<[u8; 256]> = Lazy::new(|| invert(&ENCODE_TABLE));

fn build_encode_table() -> [u8; 256] {
    let mut values: Vec<u8> = (0..=255).collect();
    let mut rng = StdRng::from_seed(PERMUTATION_SEED);
    values.shuffle(&mut rng);

    let mut table = [0u8; 256];
    table.copy_from_slice(&values);
    table
}

fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut inverse = [0u8; 256];
    for (value, &encoded) in table.iter().enumerate() {
        inverse[encoded as usize] = value as u8;
    }
    inverse
}

/// Permutes each byte through [`ENCODE_TABLE`].
pub fn encrypt(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&b| ENCODE_TABLE[b as usize]).collect()
}

/// Inverts [`encrypt`] via [`DECODE_TABLE`].
pub fn decrypt(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&b| DECODE_TABLE[b as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_table_is_a_bijection() {
        let mut seen = [false; 256];
        for &value in ENCODE_TABLE.iter() {
            assert!(!seen[value as usize], "duplicate entry {value}");
            seen[value as usize] = true;
        }
    }

    #[test]
    fn decrypt_undoes_encrypt_over_arbitrary_bytes() {
        let original: Vec<u8> = (0..=255).chain(0..=255).rev().collect();
        let round_tripped = decrypt(&encrypt(&original));
        assert_eq!(original, round_tripped);
    }

    #[test]
    fn decrypt_undoes_encrypt_for_empty_input() {
        assert_eq!(decrypt(&encrypt(&[])), Vec::<u8>::new());
    }
}
