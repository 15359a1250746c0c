//! # Signature Bitset
//!
//! Fixed-width bitset used for entity and signature masks.
//!
//! 256 bits in four `u64` words, stored inline so an entity's signature
//! never allocates.

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;

use crate::error::EcsError;

const WORDS: usize = 4;
const BITS_PER_WORD: usize = 64;

/// Fixed-width bitset.
///
/// ## Performance
///
/// - Set / clear / read: O(1)
/// - Superset test: O(words)
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bitset {
    words: [u64; WORDS],
}

impl Bitset {
    /// Number of bits the set can hold.
    pub const MAX_BITS: usize = WORDS * BITS_PER_WORD;

    /// The empty set.
    pub const EMPTY: Self = Self { words: [0; WORDS] };

    /// Creates an empty bitset.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Creates a bitset with the given bits set.
    ///
    /// # Panics
    ///
    /// Panics if any bit is `>= MAX_BITS`.
    #[must_use]
    pub fn from_bits(bits: &[usize]) -> Self {
        let mut set = Self::EMPTY;
        for &bit in bits {
            set.set(bit);
        }
        set
    }

    #[inline]
    fn locate(bit: usize) -> (usize, u64) {
        assert!(bit < Self::MAX_BITS, "bit {bit} out of range");
        (bit / BITS_PER_WORD, 1u64 << (bit % BITS_PER_WORD))
    }

    /// Reads a bit.
    #[inline]
    #[must_use]
    pub fn read(&self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        self.words[word] & mask != 0
    }

    /// Sets a bit. Returns `true` if it was previously clear.
    #[inline]
    pub fn set(&mut self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    /// Clears a bit. Returns `true` if it was previously set.
    #[inline]
    pub fn clear(&mut self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        let was_set = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        was_set
    }

    /// Sets or clears a bit. Returns `true` if the bit changed.
    #[inline]
    pub fn write(&mut self, bit: usize, value: bool) -> bool {
        if value {
            self.set(bit)
        } else {
            self.clear(bit)
        }
    }

    /// Clears every bit.
    #[inline]
    pub fn reset(&mut self) {
        self.words = [0; WORDS];
    }

    /// Checks whether every bit of `other` is also set here.
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Checks if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of set bits.
    #[inline]
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns the raw words, lowest bits first.
    #[inline]
    #[must_use]
    pub const fn words(&self) -> &[u64; WORDS] {
        &self.words
    }

    /// Iterates over the indices of set bits in ascending order.
    #[must_use]
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            word_idx: 0,
            current_word: self.words[0],
        }
    }

    /// Renders the first `width` bits, lowest bit first.
    #[must_use]
    pub fn to_bit_string(&self, width: usize) -> String {
        (0..width.min(Self::MAX_BITS))
            .map(|bit| if self.read(bit) { '1' } else { '0' })
            .collect()
    }
}

impl BitAnd for Bitset {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self {
        for (word, other) in self.words.iter_mut().zip(rhs.words) {
            *word &= other;
        }
        self
    }
}

impl BitOr for Bitset {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        for (word, other) in self.words.iter_mut().zip(rhs.words) {
            *word |= other;
        }
        self
    }
}

impl fmt::Debug for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}

impl FromStr for Bitset {
    type Err = EcsError;

    /// Parses a string of `0`/`1`, lowest bit first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() > Self::MAX_BITS {
            return Err(EcsError::TooManyBits {
                requested: s.len(),
                max: Self::MAX_BITS,
            });
        }
        let mut set = Self::EMPTY;
        for (bit, c) in s.chars().enumerate() {
            match c {
                '1' => {
                    set.set(bit);
                }
                '0' => {}
                other => {
                    return Err(EcsError::Config(format!(
                        "invalid bit character {other:?} at {bit}"
                    )))
                }
            }
        }
        Ok(set)
    }
}

/// Iterator over set bit indices.
pub struct Ones<'a> {
    words: &'a [u64; WORDS],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1;
                return Some(self.word_idx * BITS_PER_WORD + bit);
            }

            self.word_idx += 1;
            if self.word_idx >= WORDS {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
