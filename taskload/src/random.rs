use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use taskload_core::LOWERCASE_ALPHABET;

/// `length` characters drawn uniformly from `alphabet` (lowercase ASCII when empty).
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, length: usize, alphabet: &str) -> String {
    let alphabet = if alphabet.is_empty() {
        LOWERCASE_ALPHABET
    } else {
        alphabet
    };
    let chars: Vec<char> = alphabet.chars().collect();

    (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}

/// Independent RNG per stream (setup is stream 0, each VU gets its own). With a seed the whole
/// run draws the same strings every time.
pub fn seeded_rng(seed: Option<u64>, stream: u64) -> SmallRng {
    match seed {
        Some(seed) => {
            SmallRng::seed_from_u64(seed.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
        }
        None => SmallRng::from_entropy(),
    }
}
