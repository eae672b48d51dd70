//! Fixed-width bit-flag groups (`Part.drawInfo1.displayGroups`,
//! `Part.drawInfo1.collisionMask`, and similar fields), serialized as a
//! packed array of little-endian `u32` words, LSB-first within each word.

use bitvec::prelude::*;

#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBitSet<const BITS: usize> {
    bits: BitVec<u32, Lsb0>,
}

impl<const BITS: usize> GroupBitSet<BITS> {
    pub fn all_off() -> Self {
        Self {
            bits: BitVec::repeat(false, BITS),
        }
    }

    pub fn all_on() -> Self {
        Self {
            bits: BitVec::repeat(true, BITS),
        }
    }

    pub fn from_range(range: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::all_off();
        for bit in range {
            set.enable(bit);
        }
        set
    }

    pub fn enable(&mut self, bit: usize) {
        self.bits.set(bit, true);
    }

    pub fn disable(&mut self, bit: usize) {
        self.bits.set(bit, false);
    }

    pub fn is_set(&self, bit: usize) -> bool {
        self.bits[bit]
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            bits: self.bits.clone() | other.bits.clone(),
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            bits: self.bits.clone() & other.bits.clone(),
        }
    }

    pub fn difference(&self, other: &Self) -> Self {
        let mut result = self.bits.clone();
        result &= !other.bits.clone();
        Self { bits: result }
    }

    pub fn to_sorted_bit_list(&self) -> Vec<usize> {
        self.bits.iter_ones().collect()
    }

    /// Words as stored on disk: `BITS / 32` little-endian `u32`s.
    pub fn to_words(&self) -> Vec<u32> {
        self.bits.clone().into_vec()
    }

    pub fn from_words(words: &[u32]) -> Self {
        let mut bits: BitVec<u32, Lsb0> = BitVec::from_slice(words);
        bits.truncate(BITS);
        Self { bits }
    }

    pub const fn word_count() -> usize {
        BITS / 32
    }
}

impl<const BITS: usize> Default for GroupBitSet<BITS> {
    fn default() -> Self {
        Self::all_off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_words() {
        let set = GroupBitSet::<256>::from_range([0, 1, 33, 255]);
        let words = set.to_words();
        assert_eq!(words.len(), 8);
        let back = GroupBitSet::<256>::from_words(&words);
        assert_eq!(set, back);
    }

    #[test]
    fn union_and_difference() {
        let a = GroupBitSet::<128>::from_range([0, 5]);
        let b = GroupBitSet::<128>::from_range([5, 10]);
        assert_eq!(a.union(&b).to_sorted_bit_list(), vec![0, 5, 10]);
        assert_eq!(a.difference(&b).to_sorted_bit_list(), vec![0]);
    }
}
