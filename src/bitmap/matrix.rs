use super::{bitmask_for_key, index_for_key, words_for_bits};

/// A fixed-size, multi-compartment packed-word bit array.
///
/// A `BitMatrix` holds `k` compartments of `compsize` bits each, addressed as
/// a `(compartment, bit)` pair. Compartment boundaries are word-aligned: each
/// compartment occupies `words_for_bits(compsize)` `usize` words, so a
/// `(comp, bit)` pair maps to word index `comp * words_per_comp +
/// index_for_key(bit)`.
///
/// This is the dense backing store for a [`Map`](crate::Map)'s own bits; it
/// has no notion of compartmented membership semantics (that's `Map`'s job)
/// and no sparse/lazy allocation — every word is allocated up front, since
/// the filter is sized once at family construction and never grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    k: usize,
    compsize: usize,
    words_per_comp: usize,
    words: Vec<usize>,
}

impl BitMatrix {
    /// Construct a new, all-zero `BitMatrix` with `k` compartments of
    /// `compsize` bits each.
    ///
    /// # Panics
    ///
    /// Panics if `k` or `compsize` is zero.
    pub fn new(k: usize, compsize: usize) -> Self {
        assert!(k > 0, "k must be non-zero");
        assert!(compsize > 0, "compsize must be non-zero");

        let words_per_comp = words_for_bits(compsize);
        let words = vec![0usize; words_per_comp * k];

        Self {
            k,
            compsize,
            words_per_comp,
            words,
        }
    }

    /// Number of compartments.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Bits per compartment.
    pub fn compsize(&self) -> usize {
        self.compsize
    }

    #[inline(always)]
    fn word_index(&self, comp: usize, bit: usize) -> usize {
        debug_assert!(comp < self.k, "compartment {} >= {}", comp, self.k);
        debug_assert!(bit < self.compsize, "bit {} >= {}", bit, self.compsize);
        comp * self.words_per_comp + index_for_key(bit)
    }

    /// Set `(comp, bit)`. Returns `true` iff the bit was previously clear
    /// (i.e. the matrix changed as a result of this call).
    pub fn set(&mut self, comp: usize, bit: usize) -> bool {
        let idx = self.word_index(comp, bit);
        let mask = bitmask_for_key(bit);
        let was_clear = self.words[idx] & mask == 0;
        self.words[idx] |= mask;
        was_clear
    }

    /// Test `(comp, bit)`.
    pub fn get(&self, comp: usize, bit: usize) -> bool {
        let idx = self.word_index(comp, bit);
        self.words[idx] & bitmask_for_key(bit) != 0
    }

    /// Zero every word in the matrix.
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    fn assert_same_shape(&self, other: &Self) {
        assert_eq!(self.k, other.k, "compartment count mismatch");
        assert_eq!(self.compsize, other.compsize, "compartment size mismatch");
    }

    /// Elementwise AND of `self` with `other`.
    ///
    /// # Panics
    ///
    /// Panics if the two matrices do not share the same shape (`k` and
    /// `compsize`) — this is a programmer error, never a runtime condition
    /// that can arise from valid use of a single [`Family`](crate::Family).
    pub fn and_with(&mut self, other: &Self) {
        self.assert_same_shape(other);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= b;
        }
    }

    /// Elementwise OR of `self` with `other`. Returns `true` iff any bit was
    /// newly introduced (i.e. was clear in `self` and set in `other`).
    ///
    /// # Panics
    ///
    /// Panics on shape mismatch, as [`and_with`](Self::and_with).
    pub fn or_with(&mut self, other: &Self) -> bool {
        self.assert_same_shape(other);
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            if (*a & b) != *b {
                changed = true;
                *a |= b;
            }
        }
        changed
    }

    /// Total number of set bits across the whole matrix.
    pub fn popcount(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// `true` iff every word in compartment `comp` is zero — i.e. no element
    /// can possibly pass a membership test against this compartment.
    pub fn any_set_in_compartment(&self, comp: usize) -> bool {
        let start = comp * self.words_per_comp;
        let end = start + self.words_per_comp;
        self.words[start..end].iter().any(|&w| w != 0)
    }

    /// Byte size of the backing word array, ignoring struct overhead.
    pub fn byte_size(&self) -> usize {
        self.words.len() * std::mem::size_of::<usize>()
    }

    /// Raw backing words of compartment `comp`, for callers that need to
    /// word-skip rather than test bit by bit (e.g. [`MapIter`](crate::MapIter)
    /// scanning a side-index for the next set bit).
    pub(crate) fn words_in_compartment(&self, comp: usize) -> &[usize] {
        let start = comp * self.words_per_comp;
        &self.words[start..start + self.words_per_comp]
    }
}
