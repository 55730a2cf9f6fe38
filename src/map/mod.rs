//! [`Map`]: a single compartmented bloom filter attached to a [`Family`].
//!
//! Grounded on `domodwyer-bloom2/src/bloom.rs`'s `Bloom2` for the overall
//! insert/contains shape, and on `original_source/bloomap.cpp`'s `Bloomap`
//! class for the exact algorithm bodies (the `specials` fast path, the
//! side-index bookkeeping, set algebra, and `purge`).

mod iter;

pub use iter::MapIter;

use crate::bitmap::BitMatrix;
use crate::family::Family;

/// A single member of a [`Family`]: its own compartmented bit matrix, a
/// 32-bit fast path for small elements, and a side-index into the family's
/// ghost for approximate enumeration.
///
/// `Map<'fam>` borrows the family that issued it for as long as it lives.
/// [`split_family`](Map::split_family) ends that borrow early, trading away
/// enumeration and `purge` for a map that can outlive its family.
pub struct Map<'fam> {
    family: Option<&'fam Family>,
    k: usize,
    compsize_shift: u32,
    index_logbits: u32,
    coeffs: Vec<(u32, u32)>,
    bits: BitMatrix,
    specials: u32,
    side_index: BitMatrix,
}

impl<'fam> Map<'fam> {
    pub(crate) fn new(family: &'fam Family) -> Self {
        let params = family.params();
        let side_bits = (1usize << params.index_logbits.min(31)).max(1);

        Map {
            family: Some(family),
            k: params.k as usize,
            compsize_shift: params.compsize_shift,
            index_logbits: params.index_logbits,
            coeffs: family.coeffs(),
            bits: BitMatrix::new(params.k as usize, params.compsize as usize),
            specials: 0,
            side_index: BitMatrix::new(1, side_bits),
        }
    }

    #[inline(always)]
    fn hash(&self, comp: usize, ele: u32) -> u32 {
        let (a, b) = self.coeffs[comp];
        let product = ele.wrapping_mul(a).wrapping_add(b);
        if self.compsize_shift >= 32 {
            0
        } else {
            product >> self.compsize_shift
        }
    }

    /// `true` iff this map still has a live reference to the family that
    /// issued it (i.e. [`split_family`](Self::split_family) hasn't run).
    pub fn is_attached(&self) -> bool {
        self.family.is_some()
    }

    /// Insert `ele`. Returns `true` iff the map changed as a result — i.e.
    /// at least one underlying bit was previously clear.
    ///
    /// Elements below 32 take the `specials` fast path and never touch the
    /// family or the bit matrix at all. Larger elements record themselves in
    /// the family ghost (if attached) before setting their `k` compartment
    /// bits; the ghost write and the side-index bit it lights up are
    /// unconditional and do not themselves count toward the returned
    /// `changed` flag — only bit-matrix writes do, mirroring `Bloomap::add`.
    pub fn add(&mut self, ele: u32) -> bool {
        if ele < 32 {
            let mask = 1u32 << ele;
            let was_clear = self.specials & mask == 0;
            self.specials |= mask;
            return was_clear;
        }

        if let Some(family) = self.family {
            let h = family.record(ele);
            self.side_index.set(0, h as usize);
        }

        let mut changed = false;
        for comp in 0..self.k {
            let h = self.hash(comp, ele);
            if self.bits.set(comp, h as usize) {
                changed = true;
            }
        }
        changed
    }

    /// Union `other` into `self`. Returns `true` iff any bit — in
    /// `specials`, the bit matrix, or the side-index — was newly set.
    ///
    /// # Panics
    ///
    /// Panics if `self` and `other` don't share the same shape (`k` and
    /// compartment size): mixing maps from differently-sized families is a
    /// programmer error.
    pub fn add_map(&mut self, other: &Map<'_>) -> bool {
        self.assert_same_shape(other);

        let mut changed = self.specials & other.specials != other.specials;
        self.specials |= other.specials;
        if self.bits.or_with(&other.bits) {
            changed = true;
        }
        if self.side_index.or_with(&other.side_index) {
            changed = true;
        }
        changed
    }

    /// Test membership. False positives are possible; false negatives are
    /// not, for any element previously passed to [`add`](Self::add) or
    /// merged in via [`add_map`](Self::add_map)/[`or_from`](Self::or_from).
    pub fn contains(&self, ele: u32) -> bool {
        if ele < 32 {
            return self.specials & (1u32 << ele) != 0;
        }
        (0..self.k).all(|comp| self.bits.get(comp, self.hash(comp, ele) as usize))
    }

    /// Reset to the empty map. The side-index is cleared too, even though
    /// the family ghost (shared with sibling maps) is untouched.
    pub fn clear(&mut self) {
        self.specials = 0;
        self.bits.clear_all();
        self.side_index.clear_all();
    }

    fn assert_same_shape(&self, other: &Map<'_>) {
        assert_eq!(self.k, other.k, "compartment count mismatch");
        assert_eq!(
            self.bits.compsize(),
            other.bits.compsize(),
            "compartment size mismatch"
        );
    }

    /// Intersect `self` with `other` in place (`self &= other`).
    ///
    /// # Panics
    ///
    /// Panics on shape mismatch, as [`add_map`](Self::add_map).
    pub fn intersect(&mut self, other: &Map<'_>) -> &mut Self {
        self.assert_same_shape(other);
        self.specials &= other.specials;
        self.bits.and_with(&other.bits);
        self.side_index.and_with(&other.side_index);
        self
    }

    /// `true` iff `self` and `other` are guaranteed to share no elements.
    ///
    /// Short-circuits on the first compartment whose word-wise AND is
    /// entirely zero: a single empty compartment of the intersection proves
    /// disjointness, the same way `is_empty` only needs one empty
    /// compartment. This is allowed to return `false` for two maps with no
    /// actual common element — every compartment's AND can still collide by
    /// chance — but it never returns `true` when the maps do share one.
    pub fn is_intersection_empty(&self, other: &Map<'_>) -> bool {
        self.assert_same_shape(other);
        if self.specials & other.specials != 0 {
            return false;
        }
        for comp in 0..self.k {
            let mine = self.bits.words_in_compartment(comp);
            let theirs = other.bits.words_in_compartment(comp);
            if mine.iter().zip(theirs).all(|(x, y)| x & y == 0) {
                return true;
            }
        }
        false
    }

    /// OR `other` into `self` in place, without reporting whether anything
    /// changed. Equivalent to [`add_map`](Self::add_map) that discards its
    /// return value, kept distinct because the original interface exposes
    /// both — one for chaining, one for change-tracking.
    pub fn or_from(&mut self, other: &Map<'_>) -> &mut Self {
        self.assert_same_shape(other);
        self.specials |= other.specials;
        self.bits.or_with(&other.bits);
        self.side_index.or_with(&other.side_index);
        self
    }

    /// `true` iff `specials == 0` and at least one compartment is entirely
    /// zero. Every `add` sets a bit in every compartment, so one empty
    /// compartment alone proves no element was ever inserted — this does
    /// not require every compartment to be zero.
    pub fn is_empty(&self) -> bool {
        if self.specials != 0 {
            return false;
        }
        (0..self.k).any(|comp| !self.bits.any_set_in_compartment(comp))
    }

    /// Number of set bits across `specials` and the bit matrix. Not a count
    /// of distinct elements — collisions make that number unrecoverable.
    pub fn popcount(&self) -> u32 {
        self.specials.count_ones() + self.bits.popcount()
    }

    /// Detach this map from its family. After this call the map can outlive
    /// the family that issued it, at the cost of [`iter`](Self::iter) and
    /// [`purge`](Self::purge) no longer being available.
    pub fn split_family(&mut self) {
        self.family = None;
    }

    /// Iterate the elements this map approximately contains, by walking the
    /// family ghost through this map's side-index and filtering every
    /// candidate through [`contains`](Self::contains).
    ///
    /// # Panics
    ///
    /// Panics if the map has been detached via
    /// [`split_family`](Self::split_family).
    pub fn iter(&self) -> MapIter<'_, 'fam> {
        assert!(
            self.family.is_some(),
            "iter() requires an attached map; split_family() detached this one"
        );
        MapIter::new(self)
    }

    /// Rebuild this map from scratch by clearing it and re-inserting every
    /// element [`iter`](Self::iter) currently yields that still tests
    /// positive. This drops false positives accumulated from sibling maps'
    /// ghost entries that happen to land in this map's own buckets, at the
    /// cost of a full scan of the family ghost.
    ///
    /// # Panics
    ///
    /// Panics if the map has been detached via
    /// [`split_family`](Self::split_family).
    pub fn purge(&mut self) {
        assert!(
            self.family.is_some(),
            "purge() requires an attached map; split_family() detached this one"
        );
        let elements: Vec<u32> = self.iter().filter(|&e| self.contains(e)).collect();
        self.clear();
        for e in elements {
            self.add(e);
        }
    }
}

impl std::fmt::Debug for Map<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("attached", &self.family.is_some())
            .field("k", &self.k)
            .field("specials", &self.specials)
            .field("popcount", &self.popcount())
            .finish()
    }
}

impl PartialEq for Map<'_> {
    /// Two maps are equal iff they share the same family handle, the same
    /// shape, identical `specials`, and identical bit-matrix words. The
    /// side-index is deliberately excluded: it's enumeration bookkeeping,
    /// not membership state.
    fn eq(&self, other: &Self) -> bool {
        let same_family = match (self.family, other.family) {
            (Some(a), Some(b)) => std::ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_family && self.k == other.k && self.specials == other.specials && self.bits == other.bits
    }
}

impl Clone for Map<'_> {
    fn clone(&self) -> Self {
        Map {
            family: self.family,
            k: self.k,
            compsize_shift: self.compsize_shift,
            index_logbits: self.index_logbits,
            coeffs: self.coeffs.clone(),
            bits: self.bits.clone(),
            specials: self.specials,
            side_index: self.side_index.clone(),
        }
    }
}

impl<'a, 'fam> IntoIterator for &'a Map<'fam> {
    type Item = u32;
    type IntoIter = MapIter<'a, 'fam>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Family;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_specials_fast_path() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut m = f.new_map();
        assert!(!m.contains(7));
        assert!(m.add(7));
        assert!(m.contains(7));
        assert!(!m.add(7), "re-adding an already-set special reports no change");
    }

    #[test]
    fn test_add_large_element_sets_bits() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut m = f.new_map();
        assert!(!m.contains(90_000));
        assert!(m.add(90_000));
        assert!(m.contains(90_000));
    }

    #[test]
    fn test_clear_empties_map() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut m = f.new_map();
        m.add(5);
        m.add(90_000);
        assert!(!m.is_empty());
        m.clear();
        assert!(m.is_empty());
        assert!(!m.contains(5));
        assert!(!m.contains(90_000));
    }

    #[test]
    fn test_add_map_union() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut a = f.new_map();
        let mut b = f.new_map();
        a.add(1);
        b.add(2);

        assert!(a.add_map(&b));
        assert!(a.contains(1));
        assert!(a.contains(2));
        assert!(!a.add_map(&b), "merging the same map again changes nothing");
    }

    #[test]
    fn test_intersect() {
        let f = Family::for_size_and_functions(4096, 4);
        let mut a = f.new_map();
        let mut b = f.new_map();
        a.add(1);
        a.add(2);
        b.add(2);
        b.add(3);

        a.intersect(&b);
        assert!(!a.contains(1));
        assert!(a.contains(2));
    }

    #[test]
    fn test_is_intersection_empty() {
        let f = Family::for_size_and_functions(4096, 4);
        let mut a = f.new_map();
        let mut b = f.new_map();
        a.add(1);
        assert!(a.is_intersection_empty(&b));
        b.add(2);
        assert!(a.is_intersection_empty(&b));
        b.add(1);
        assert!(!a.is_intersection_empty(&b));
    }

    #[test]
    fn test_or_from_chains() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut a = f.new_map();
        let mut b = f.new_map();
        b.add(9);
        a.or_from(&b);
        assert!(a.contains(9));
    }

    #[test]
    fn test_equality_unaffected_by_sibling_inserts() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut a = f.new_map();
        let mut b = f.new_map();
        a.add(5);
        b.add(5);
        // A sibling map growing the shared ghost shouldn't touch a's or b's
        // own bits, so their equality is unaffected.
        let mut c = f.new_map();
        c.add(99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_family_detaches() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut m = f.new_map();
        m.add(5);
        m.split_family();
        assert!(!m.is_attached());
        assert!(m.contains(5));
        assert!(m.add(6));
    }

    #[test]
    #[should_panic]
    fn test_iter_after_split_panics() {
        let f = Family::for_size_and_functions(1024, 4);
        let mut m = f.new_map();
        m.split_family();
        let _ = m.iter();
    }

    #[quickcheck]
    fn prop_contains_after_add(elements: Vec<u32>) -> bool {
        let f = Family::for_size_and_functions(65536, 4);
        let mut m = f.new_map();
        for &e in &elements {
            m.add(e);
        }
        elements.iter().all(|&e| m.contains(e))
    }

    #[quickcheck]
    fn prop_add_idempotent(ele: u32) -> bool {
        let f = Family::for_size_and_functions(4096, 4);
        let mut m = f.new_map();
        m.add(ele);
        !m.add(ele)
    }

    #[quickcheck]
    fn prop_union_commutative_on_membership(a_elems: Vec<u32>, b_elems: Vec<u32>) -> bool {
        let f = Family::for_size_and_functions(65536, 4);
        let mut a = f.new_map();
        let mut b = f.new_map();
        for &e in &a_elems {
            a.add(e);
        }
        for &e in &b_elems {
            b.add(e);
        }

        let mut ab = a.clone();
        ab.or_from(&b);
        let mut ba = b.clone();
        ba.or_from(&a);

        a_elems.iter().chain(&b_elems).all(|&e| ab.contains(e) && ba.contains(e))
    }
}
