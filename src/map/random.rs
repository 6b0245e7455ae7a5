use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deterministic 3x16-bit game PRNG.
///
/// Every random draw during map generation and live updates goes through
/// this generator, so two maps built from the same seed string are
/// byte-identical. The recurrence must not change: saved games and
/// multiplayer sessions depend on it bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameRandom {
    state: [u16; 3],
}

/// Number of characters in the canonical seed string.
pub const SEED_STRING_LEN: usize = 16;

impl GameRandom {
    /// Seed from OS entropy. Not reproducible; used for "new game".
    pub fn from_entropy() -> Self {
        let bits: u64 = rand::random();
        GameRandom {
            state: [
                (bits & 0xffff) as u16,
                ((bits >> 16) & 0xffff) as u16,
                ((bits >> 32) & 0xffff) as u16,
            ],
        }
    }

    /// Seed from an explicit register tuple.
    pub fn from_state(state: [u16; 3]) -> Self {
        GameRandom { state }
    }

    /// Current register tuple, for serialization.
    pub fn state(&self) -> [u16; 3] {
        self.state
    }

    pub fn set_state(&mut self, state: [u16; 3]) {
        self.state = state;
    }

    /// Advance the generator and return the next value.
    // `next` is the established name for a PRNG draw; this type is not
    // an iterator and never terminates.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u16 {
        let [s0, mut s1, mut s2] = self.state;
        let r = s0.wrapping_add(s1) ^ s2;
        s2 = s2.wrapping_add(s1);
        s1 ^= s2;
        s1 = s1.rotate_right(1);
        s2 = s2.rotate_right(1);
        self.state = [r, s1, s2];
        r
    }

    fn packed(&self) -> u64 {
        self.state[0] as u64 | (self.state[1] as u64) << 16 | (self.state[2] as u64) << 32
    }
}

impl fmt::Display for GameRandom {
    /// Canonical printable form: the 48 state bits split into sixteen
    /// 3-bit groups, low bits first, each mapped to '1'..'8'.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut c = self.packed();
        for _ in 0..SEED_STRING_LEN {
            write!(f, "{}", (b'1' + (c & 7) as u8) as char)?;
            c >>= 3;
        }
        Ok(())
    }
}

/// Error parsing a canonical seed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeedError(String);

impl fmt::Display for ParseSeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid seed string: {}", self.0)
    }
}

impl std::error::Error for ParseSeedError {}

impl FromStr for GameRandom {
    type Err = ParseSeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SEED_STRING_LEN {
            return Err(ParseSeedError(format!(
                "expected {} characters, got {}",
                SEED_STRING_LEN,
                s.len()
            )));
        }
        let mut c: u64 = 0;
        for (i, ch) in s.bytes().enumerate() {
            if !(b'1'..=b'8').contains(&ch) {
                return Err(ParseSeedError(format!(
                    "character '{}' at position {} outside '1'..'8'",
                    ch as char, i
                )));
            }
            c |= ((ch - b'1') as u64) << (3 * i);
        }
        Ok(GameRandom {
            state: [
                (c & 0xffff) as u16,
                ((c >> 16) & 0xffff) as u16,
                ((c >> 32) & 0xffff) as u16,
            ],
        })
    }
}

impl TryFrom<String> for GameRandom {
    type Error = ParseSeedError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GameRandom> for String {
    fn from(r: GameRandom) -> String {
        r.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_matches_reference_recurrence() {
        let mut rng = GameRandom::from_state([0x1234, 0x5678, 0x9abc]);

        // One step computed by hand from the recurrence.
        let r = 0x1234u16.wrapping_add(0x5678) ^ 0x9abc;
        assert_eq!(rng.next(), r);

        let s2 = 0x9abcu16.wrapping_add(0x5678);
        let s1 = (0x5678 ^ s2).rotate_right(1);
        assert_eq!(rng.state(), [r, s1, s2.rotate_right(1)]);
    }

    #[test]
    fn sequence_is_deterministic() {
        let mut a = GameRandom::from_state([1, 2, 3]);
        let mut b = GameRandom::from_state([1, 2, 3]);
        for _ in 0..1000 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn seed_string_round_trip_is_bit_exact() {
        let mut rng = GameRandom::from_state([0xffff, 0x0001, 0x8000]);
        for _ in 0..50 {
            rng.next();
            let s = rng.to_string();
            let parsed: GameRandom = s.parse().unwrap();
            assert_eq!(parsed, rng, "round trip diverged for {}", s);
        }
    }

    #[test]
    fn all_ones_seed_is_zero_state() {
        let rng: GameRandom = "1111111111111111".parse().unwrap();
        assert_eq!(rng.state(), [0, 0, 0]);
        assert_eq!(rng.to_string(), "1111111111111111");
    }

    #[test]
    fn seed_string_uses_expected_alphabet() {
        let mut rng = GameRandom::from_state([0xdead, 0xbeef, 0xcafe]);
        for _ in 0..20 {
            rng.next();
            assert!(rng.to_string().bytes().all(|b| (b'1'..=b'8').contains(&b)));
        }
    }

    #[test]
    fn rejects_malformed_seed_strings() {
        assert!("".parse::<GameRandom>().is_err());
        assert!("123".parse::<GameRandom>().is_err());
        assert!("11111111111111119".parse::<GameRandom>().is_err());
        assert!("111111111111111x".parse::<GameRandom>().is_err());
        assert!("0111111111111111".parse::<GameRandom>().is_err());
    }

    #[test]
    fn state_accessors_round_trip() {
        let mut rng = GameRandom::from_state([10, 20, 30]);
        rng.next();
        let saved = rng.state();
        let mut restored = GameRandom::from_state([0, 0, 0]);
        restored.set_state(saved);
        assert_eq!(restored.next(), {
            let mut r = GameRandom::from_state(saved);
            r.next()
        });
    }

    #[test]
    fn entropy_seed_survives_string_round_trip() {
        let a = GameRandom::from_entropy();
        let parsed: GameRandom = a.to_string().parse().unwrap();
        assert_eq!(parsed, a);
    }
}
