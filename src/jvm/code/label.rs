use crate::jvm::{Location, LocationRange};
use std::collections::HashMap;
use std::fmt;

/// Opaque label for a position in code that has not been laid out yet
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(usize);

impl Label {
    /// Label for the start of the method
    pub const START: Label = Label(0);

    /// Get the next fresh label
    pub fn next(&self) -> Label {
        Label(self.0 + 1)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

/// Generates fresh labels
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the one it was cloned from.
#[derive(Clone)]
pub struct LabelGenerator(Label);

impl LabelGenerator {
    pub fn new() -> LabelGenerator {
        LabelGenerator(Label::START.next())
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> Label {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        LabelGenerator::new()
    }
}

/// Placement of labels in a code array
///
/// Once every label that a structure mentions is bound, [`LabelLayout::resolve`] turns its pending
/// locations into fixed ones. [`Label::START`] is always bound to offset 0.
#[derive(Clone, Debug)]
pub struct LabelLayout {
    offsets: HashMap<Label, u32>,
}

impl LabelLayout {
    pub fn new() -> LabelLayout {
        let mut offsets = HashMap::new();
        offsets.insert(Label::START, 0);
        LabelLayout { offsets }
    }

    /// Bind a label to an offset, returning the previous offset if it was already bound
    pub fn bind(&mut self, label: Label, offset: u32) -> Option<u32> {
        self.offsets.insert(label, offset)
    }

    pub fn offset_of(&self, label: Label) -> Option<u32> {
        self.offsets.get(&label).copied()
    }

    /// Fix a location if its label is bound, otherwise leave it pending
    pub fn resolve(&self, location: Location) -> Location {
        match location {
            Location::Pending(label) => match self.offset_of(label) {
                Some(offset) => Location::Fixed(offset),
                None => location,
            },
            fixed => fixed,
        }
    }

    pub fn resolve_range(&self, range: LocationRange) -> LocationRange {
        LocationRange {
            start: self.resolve(range.start),
            end: self.resolve(range.end),
        }
    }
}

impl Default for LabelLayout {
    fn default() -> Self {
        LabelLayout::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_labels_are_distinct() {
        let mut gen = LabelGenerator::new();
        let l1 = gen.fresh_label();
        let mut cloned = gen.clone();
        let l2 = gen.fresh_label();
        assert_ne!(l1, Label::START);
        assert_ne!(l1, l2);
        assert_eq!(cloned.fresh_label(), l2);
        assert_eq!(format!("{:?}", l1), "l1");
    }

    #[test]
    fn resolve_bound_labels_only() {
        let mut gen = LabelGenerator::new();
        let (bound, unbound) = (gen.fresh_label(), gen.fresh_label());

        let mut layout = LabelLayout::new();
        assert_eq!(layout.bind(bound, 12), None);

        assert_eq!(layout.resolve(Location::Pending(bound)), Location::Fixed(12));
        assert_eq!(layout.resolve(Location::Pending(Label::START)), Location::Fixed(0));
        assert_eq!(layout.resolve(Location::Pending(unbound)), Location::Pending(unbound));
        assert_eq!(layout.resolve(Location::Fixed(3)), Location::Fixed(3));

        let range = layout.resolve_range(LocationRange {
            start: Location::Pending(Label::START),
            end: Location::Pending(bound),
        });
        assert_eq!(range.fixed(), Some(0..12));
    }
}
