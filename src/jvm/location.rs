use super::code::Label;
use super::Error;
use std::ops::Range;

/// Position in a method's code array
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Location {
    /// Resolved byte offset from the start of the code array
    Fixed(u32),

    /// Offset of a label that has not been placed yet
    Pending(Label),
}

impl Location {
    pub fn fixed(&self) -> Option<u32> {
        match self {
            Location::Fixed(offset) => Some(*offset),
            Location::Pending(_) => None,
        }
    }

    /// Offset, as stored in the `u16` fields of exception tables and friends
    pub(crate) fn to_u16(self, what: &'static str) -> Result<u16, Error> {
        match self {
            Location::Fixed(offset) => u16::try_from(offset).map_err(|_| Error::ValueOutOfRange {
                what,
                value: offset as i64,
            }),
            Location::Pending(_) => Err(Error::UnresolvedLocation(what)),
        }
    }
}

impl From<u32> for Location {
    fn from(offset: u32) -> Location {
        Location::Fixed(offset)
    }
}

impl From<Label> for Location {
    fn from(label: Label) -> Location {
        Location::Pending(label)
    }
}

/// Span of code, from `start` (inclusive) to `end` (exclusive)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct LocationRange {
    pub start: Location,
    pub end: Location,
}

impl LocationRange {
    /// Range between two resolved offsets
    pub fn new(start: u32, end: u32) -> LocationRange {
        LocationRange {
            start: Location::Fixed(start),
            end: Location::Fixed(end),
        }
    }

    /// Byte range, if both ends are resolved and the range is not empty
    pub fn fixed(&self) -> Option<Range<u32>> {
        let start = self.start.fixed()?;
        let end = self.end.fixed()?;
        if end > start {
            Some(start..end)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixed_ranges() {
        assert_eq!(LocationRange::new(10, 16).fixed(), Some(10..16));
        assert_eq!(LocationRange::new(16, 16).fixed(), None);
        assert_eq!(LocationRange::new(20, 16).fixed(), None);
        let pending = LocationRange {
            start: Location::Fixed(0),
            end: Location::Pending(Label::START),
        };
        assert_eq!(pending.fixed(), None);
    }

    #[test]
    fn narrow_to_u16() {
        assert_eq!(Location::Fixed(65535).to_u16("pc").unwrap(), 65535);
        assert!(matches!(
            Location::Fixed(65536).to_u16("pc"),
            Err(Error::ValueOutOfRange { what: "pc", value: 65536 })
        ));
        assert!(matches!(
            Location::Pending(Label::START).to_u16("pc"),
            Err(Error::UnresolvedLocation("pc"))
        ));
    }
}
