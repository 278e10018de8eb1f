// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object id generation: `"<millis>_<rand4>"`. `generate_unique` takes a
//! predicate so callers can detect a collision against their own live set
//! and regenerate, rather than trusting the timestamp+random shape to be
//! unique on its own.

use rand::Rng;

/// Generates a single candidate id, with no collision checking.
pub fn generate(now_millis: u128) -> String {
    let mut rng = rand::thread_rng();
    let rand4: u32 = rng.gen_range(1000..=9999);
    format!("{now_millis}_{rand4}")
}

/// Generates an id that does not collide with `exists`, regenerating up to
/// a small bounded number of times.
pub fn generate_unique(now_millis: u128, mut exists: impl FnMut(&str) -> bool) -> String {
    const MAX_ATTEMPTS: u32 = 8;
    for _ in 0..MAX_ATTEMPTS {
        let candidate = generate(now_millis);
        if !exists(&candidate) {
            return candidate;
        }
    }
    // Exhausted retries under an adversarial/test clock: fall back to a
    // candidate anyway rather than failing the put outright.
    generate(now_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_has_expected_shape() {
        let id = generate(1_700_000_000_000);
        let mut parts = id.split('_');
        assert_eq!(parts.next(), Some("1700000000000"));
        let rand_part: u32 = parts.next().unwrap().parse().unwrap();
        assert!((1000..=9999).contains(&rand_part));
        assert!(parts.next().is_none());
    }

    #[test]
    fn regenerates_on_collision() {
        let mut seen = 0;
        let id = generate_unique(1_700_000_000_000, |_| {
            seen += 1;
            seen <= 3
        });
        assert!(seen >= 4);
        assert!(!id.is_empty());
    }
}
