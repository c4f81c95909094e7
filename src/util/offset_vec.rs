use std::fmt::{Debug, Error, Formatter};
use std::iter::{Enumerate, Extend};
use std::result::Result;
use std::slice::Iter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// The constant pool is the motivating case: indexing starts at 1, most entries take one index,
/// but `long` and `double` entries take two. The offset of an element is then exactly its
/// constant pool index.
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,

    /// Offset for the first element (usually 0, but sometimes 1)
    initial_offset: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Length of the `OffsetVec` (aka. number of entries)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current offset size of the `OffsetVec` (aka. offset of the next element
    /// to be added)
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));
        offset
    }

    /// Empty the vector
    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = self.initial_offset;
    }

    /// Get an entry (and its position) by its offset in the vector
    ///
    /// Offsets that fall inside a wide element, or past the end, have no entry. This uses binary
    /// search to find the offset.
    pub fn get_offset(&self, offset: Offset) -> Option<(usize, &T)> {
        self.entries
            .binary_search_by_key(&offset, |(off, _)| *off)
            .ok()
            .map(|found_idx| (found_idx, &self.entries[found_idx].1))
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}
