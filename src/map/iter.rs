//! [`MapIter`]: approximate enumeration of a [`Map`]'s elements.
//!
//! Grounded on `BloomapIterator` in `original_source/bloomap.cpp`: walk the
//! map's `specials` bits, then its side-index into the family ghost, filter
//! every ghost candidate through this map's own `contains`. The original
//! iterates `specials` only after exhausting the side-index, which silently
//! drops small elements whenever the side-index walk is non-resumable; this
//! version yields `specials` bits 0..32 first so every inserted element is
//! eventually produced exactly once.

use super::Map;
use crate::bitmap::BitMatrix;
use crate::family::{CandidateIter, Family};

/// Lazy, single-pass iterator over the elements a [`Map`] approximately
/// contains. Built by [`Map::iter`].
pub struct MapIter<'a, 'fam> {
    map: &'a Map<'fam>,
    specials_bit: u32,
    current_hash: u32,
    candidates: Option<CandidateIter<'fam>>,
}

impl<'a, 'fam> MapIter<'a, 'fam> {
    pub(super) fn new(map: &'a Map<'fam>) -> Self {
        MapIter {
            map,
            specials_bit: 0,
            current_hash: 0,
            candidates: None,
        }
    }

    /// Scan forward from `self.current_hash` for the next set side-index
    /// bit, skipping whole zero words rather than testing bit by bit.
    /// Returns `false` once the side-index is exhausted.
    fn advance_hash(&mut self, family: &'fam Family) -> bool {
        let side_index: &BitMatrix = &self.map.side_index;
        let side_bits = side_index.compsize();
        let word_bits = usize::BITS;

        while (self.current_hash as usize) < side_bits {
            let bit = self.current_hash as usize;
            let word_idx = bit / word_bits as usize;
            let words = side_index.words_in_compartment(0);

            if bit % word_bits as usize == 0 && words[word_idx] == 0 {
                self.current_hash += word_bits;
                continue;
            }

            let in_word = bit % word_bits as usize;
            let is_set = words[word_idx] & (1usize << in_word) != 0;
            self.current_hash += 1;
            if is_set {
                self.candidates = Some(family.candidates(bit as u32));
                return true;
            }
        }
        false
    }
}

impl Iterator for MapIter<'_, '_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.specials_bit < 32 {
            let bit = self.specials_bit;
            self.specials_bit += 1;
            if self.map.specials & (1u32 << bit) != 0 {
                return Some(bit);
            }
        }

        let family = self.map.family?;
        loop {
            if let Some(candidates) = &mut self.candidates {
                for candidate in candidates {
                    if self.map.contains(candidate) {
                        return Some(candidate);
                    }
                }
                self.candidates = None;
            }
            if !self.advance_hash(family) {
                return None;
            }
        }
    }
}
