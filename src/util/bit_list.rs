use std::fmt;
use std::hash::{Hash, Hasher};

/// Growable bit vector used for per-address facts about a code array
///
/// Bits are packed into `u32` words, most significant bit first, so bit 0 is the high bit of the
/// first word. Capacity is always a multiple of 32. Two lists of different capacities behave as if
/// the shorter one were padded with zero bits: this holds for merging, intersection, equality and
/// hashing.
///
/// [`BitList::set`] and [`BitList::or`] report whether they changed anything, which is what a
/// fixed-point iteration needs to decide when to stop.
#[derive(Clone, Default)]
pub struct BitList {
    words: Vec<u32>,
}

impl BitList {
    /// Make a list with room for at least `capacity` bits, all clear
    pub fn new(capacity: usize) -> BitList {
        BitList {
            words: vec![0; Self::words_for(capacity)],
        }
    }

    fn words_for(capacity: usize) -> usize {
        (capacity + 31) / 32
    }

    fn mask(index: usize) -> u32 {
        0x8000_0000 >> (index % 32)
    }

    /// Number of bits that can be stored without growing
    pub fn capacity(&self) -> usize {
        self.words.len() * 32
    }

    /// Bits past the capacity read as clear
    pub fn get(&self, index: usize) -> bool {
        match self.words.get(index / 32) {
            Some(word) => word & Self::mask(index) != 0,
            None => false,
        }
    }

    /// Set a bit, growing the list if needed
    ///
    /// Returns `true` if the bit was previously clear.
    pub fn set(&mut self, index: usize) -> bool {
        self.ensure_capacity(index + 1);
        let word = &mut self.words[index / 32];
        let before = *word;
        *word |= Self::mask(index);
        before != *word
    }

    /// Merge every bit of `other` into this list
    ///
    /// The receiver grows to the capacity of `other` first. Returns `true` if any bit went from
    /// clear to set; growing alone is not a change.
    pub fn or(&mut self, other: &BitList) -> bool {
        self.ensure_capacity(other.capacity());
        let mut changed = false;
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            let before = *word;
            *word |= other_word;
            changed |= before != *word;
        }
        changed
    }

    /// Check whether any bit is set in both lists
    ///
    /// A word pair shares a bit exactly when its bitwise or differs from its bitwise xor. A missing
    /// list intersects nothing.
    pub fn intersects(&self, other: Option<&BitList>) -> bool {
        match other {
            None => false,
            Some(other) => self
                .words
                .iter()
                .zip(&other.words)
                .any(|(a, b)| (a | b) != (a ^ b)),
        }
    }

    pub fn is_all_clear(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    pub fn is_all_set(&self) -> bool {
        self.words.iter().all(|word| *word == u32::MAX)
    }

    /// Iterate over the indices of set bits, in increasing order
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter(move |idx| self.get(*idx))
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        let len = Self::words_for(capacity);
        if len > self.words.len() {
            self.words.resize(len, 0);
        }
    }

    /// Words without the trailing zero words
    fn significant_words(&self) -> &[u32] {
        let len = self
            .words
            .iter()
            .rposition(|word| *word != 0)
            .map_or(0, |last| last + 1);
        &self.words[..len]
    }
}

impl PartialEq for BitList {
    fn eq(&self, other: &BitList) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for BitList {}

impl Hash for BitList {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state)
    }
}

impl fmt::Display for BitList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for word in &self.words {
            write!(f, "{:032b}", word)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for BitList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter_set()).finish()
    }
}
