use super::{to_u16, ConstantIndices, ConstantPool, Decode, Deserialize, Encode, Serialize, Utf8Id};
use crate::jvm::code::LabelLayout;
use crate::jvm::{Error, FieldType, LocationRange, ParseDescriptor, RenderDescriptor};
use byteorder::{ReadBytesExt, WriteBytesExt};
use log::{trace, warn};
use std::ops::Range;

/// Local variable, as described by whoever generates the code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Variables without a name are not recorded
    pub name: Option<String>,
    pub variable_type: FieldType,

    /// Local variable slot (`long` and `double` variables also use the next slot)
    pub slot: u16,

    /// Code ranges in which the variable is live
    pub ranges: Vec<LocationRange>,
}

/// Accumulates local variables until the code they describe is laid out
///
/// [`LocalVariableTableBuilder::finalize`] then drops the variables that cannot be written (no
/// ranges, or ranges that are unresolved or empty) and freezes the rest.
#[derive(Debug, Clone, Default)]
pub struct LocalVariableTableBuilder {
    entries: Vec<PendingEntry>,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    name: Utf8Id,
    descriptor: Utf8Id,
    variable_type: FieldType,
    slot: u16,
    ranges: Vec<LocationRange>,
}

impl LocalVariableTableBuilder {
    pub fn new() -> LocalVariableTableBuilder {
        LocalVariableTableBuilder::default()
    }

    /// Record a variable, adding its name and descriptor to the constant pool
    pub fn add_entry(&mut self, constants: &mut ConstantPool, variable: LocalVariable) {
        let name = match variable.name {
            Some(name) => name,
            None => {
                trace!("skipping unnamed local in slot {}", variable.slot);
                return;
            }
        };
        self.entries.push(PendingEntry {
            name: constants.add_utf8(name),
            descriptor: constants.add_utf8(variable.variable_type.render()),
            variable_type: variable.variable_type,
            slot: variable.slot,
            ranges: variable.ranges,
        });
    }

    pub fn resolve_labels(&mut self, layout: &LabelLayout) {
        for entry in &mut self.entries {
            for range in &mut entry.ranges {
                *range = layout.resolve_range(*range);
            }
        }
    }

    pub fn finalize(self) -> LocalVariableTable {
        let entries = self
            .entries
            .into_iter()
            .filter_map(|entry| {
                let ranges: Option<Vec<Range<u32>>> =
                    entry.ranges.iter().map(LocationRange::fixed).collect();
                match ranges {
                    Some(ranges) if !ranges.is_empty() => Some(LocalVariableEntry {
                        name: entry.name,
                        descriptor: entry.descriptor,
                        variable_type: entry.variable_type,
                        slot: entry.slot,
                        ranges,
                    }),
                    _ => {
                        warn!(
                            "dropping local variable in slot {} with ranges {:?}",
                            entry.slot, entry.ranges
                        );
                        None
                    }
                }
            })
            .collect();
        LocalVariableTable { entries }
    }
}

/// Local variable table of a method body
///
/// Each range of an entry is one row in the class file. The length of a row is stored one less
/// than the length of the range: `start_pc = 10, length = 5` is the range `[10, 16)`.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.13
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableTable {
    entries: Vec<LocalVariableEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub name: Utf8Id,
    pub descriptor: Utf8Id,
    pub variable_type: FieldType,
    pub slot: u16,

    /// Resolved, non-empty ranges
    pub ranges: Vec<Range<u32>>,
}

impl LocalVariableTable {
    pub fn entries(&self) -> &[LocalVariableEntry] {
        &self.entries
    }

    fn rows(&self) -> usize {
        self.entries.iter().map(|entry| entry.ranges.len()).sum()
    }

    pub fn length(&self) -> usize {
        2 + 10 * self.rows()
    }

    /// Find the variable occupying a slot at some address
    ///
    /// The second slot of a `long` or `double` variable counts as occupied.
    pub fn lookup(&self, slot: u16, address: u32) -> Option<&LocalVariableEntry> {
        self.entries.iter().find(|entry| {
            let width = if entry.variable_type.is_double_word() { 2 } else { 1 };
            (entry.slot..entry.slot.saturating_add(width)).contains(&slot)
                && entry.ranges.iter().any(|range| range.contains(&address))
        })
    }

    /// Go back to a builder, eg. to add variables for code that was inserted
    pub fn into_builder(self) -> LocalVariableTableBuilder {
        let entries = self
            .entries
            .into_iter()
            .map(|entry| PendingEntry {
                name: entry.name,
                descriptor: entry.descriptor,
                variable_type: entry.variable_type,
                slot: entry.slot,
                ranges: entry
                    .ranges
                    .into_iter()
                    .map(|range| LocationRange::new(range.start, range.end))
                    .collect(),
            })
            .collect();
        LocalVariableTableBuilder { entries }
    }
}

impl Encode for LocalVariableTable {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        to_u16("local variable table length", self.rows())?.serialize(writer)?;
        for entry in &self.entries {
            for range in &entry.ranges {
                let start_pc = to_u16("local variable start", range.start as usize)?;
                let length = to_u16(
                    "local variable length",
                    (range.end - range.start - 1) as usize,
                )?;
                start_pc.serialize(writer)?;
                length.serialize(writer)?;
                entry.name.encode(indices, writer)?;
                entry.descriptor.encode(indices, writer)?;
                entry.slot.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Consecutive rows for the same variable are grouped into one entry, so that encoding writes
/// the rows back in the same order.
///
/// The table is debugging information, so a row whose name or descriptor is unusable (dangling
/// index, wrong constant kind, unparseable descriptor) is dropped with a warning instead of
/// failing the whole class.
impl Decode for LocalVariableTable {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let rows = u16::deserialize(reader)?;
        let mut entries: Vec<LocalVariableEntry> = vec![];
        for _ in 0..rows {
            let start_pc = u16::deserialize(reader)? as u32;
            let length = u16::deserialize(reader)? as u32;
            let name_index = u16::deserialize(reader)?;
            let descriptor_index = u16::deserialize(reader)?;
            let slot = u16::deserialize(reader)?;
            let range = start_pc..start_pc + length + 1;

            let resolved = constants.utf8_at(name_index).and_then(|name| {
                let descriptor = constants.utf8_at(descriptor_index)?;
                Ok((name, descriptor))
            });
            let (name, descriptor) = match resolved {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!("dropping local variable row in slot {}: {}", slot, err);
                    continue;
                }
            };

            match entries.last_mut() {
                Some(last)
                    if last.name == name && last.descriptor == descriptor && last.slot == slot =>
                {
                    last.ranges.push(range)
                }
                _ => {
                    let variable_type = match constants.utf8(descriptor).and_then(FieldType::parse) {
                        Ok(variable_type) => variable_type,
                        Err(err) => {
                            warn!("dropping local variable row in slot {}: {}", slot, err);
                            continue;
                        }
                    };
                    entries.push(LocalVariableEntry {
                        name,
                        descriptor,
                        variable_type,
                        slot,
                        ranges: vec![range],
                    })
                }
            }
        }
        Ok(LocalVariableTable { entries })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::LabelGenerator;
    use crate::jvm::Location;

    fn variable(name: &str, slot: u16, ranges: Vec<LocationRange>) -> LocalVariable {
        LocalVariable {
            name: Some(name.to_owned()),
            variable_type: FieldType::int(),
            slot,
            ranges,
        }
    }

    #[test]
    fn length_is_one_less_than_range() {
        let mut constants = ConstantPool::new();
        let mut builder = LocalVariableTableBuilder::new();
        builder.add_entry(&mut constants, variable("x", 1, vec![LocationRange::new(10, 16)]));
        let table = builder.finalize();
        assert_eq!(table.length(), 12);

        let indices = constants.resolve_indices().unwrap();
        let mut bytes = vec![];
        table.encode(&indices, &mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 1, 0, 10, 0, 5, 0, 1, 0, 2, 0, 1]);

        let decoded = LocalVariableTable::decode(&constants, &mut &bytes[..]).unwrap();
        assert_eq!(decoded.entries()[0].ranges, vec![10..16]);
        assert_eq!(decoded, table);
    }

    #[test]
    fn bad_entries_are_dropped() {
        let mut constants = ConstantPool::new();
        let mut labels = LabelGenerator::new();
        let unplaced = labels.fresh_label();

        let mut builder = LocalVariableTableBuilder::new();
        builder.add_entry(&mut constants, variable("empty", 0, vec![]));
        builder.add_entry(&mut constants, variable("inverted", 1, vec![LocationRange::new(8, 4)]));
        builder.add_entry(
            &mut constants,
            variable(
                "unresolved",
                2,
                vec![
                    LocationRange::new(0, 4),
                    LocationRange {
                        start: Location::Fixed(0),
                        end: Location::Pending(unplaced),
                    },
                ],
            ),
        );
        builder.add_entry(
            &mut constants,
            LocalVariable {
                name: None,
                ..variable("", 3, vec![LocationRange::new(0, 4)])
            },
        );
        builder.add_entry(&mut constants, variable("kept", 4, vec![LocationRange::new(0, 4)]));

        let table = builder.finalize();
        assert_eq!(table.entries().len(), 1);
        assert_eq!(constants.utf8(table.entries()[0].name).unwrap(), "kept");
        assert_eq!(table.length(), 12);
    }

    #[test]
    fn labels_resolve_before_finalizing() {
        let mut constants = ConstantPool::new();
        let mut labels = LabelGenerator::new();
        let end = labels.fresh_label();

        let mut builder = LocalVariableTableBuilder::new();
        builder.add_entry(
            &mut constants,
            LocalVariable {
                name: Some("d".to_owned()),
                variable_type: FieldType::double(),
                slot: 2,
                ranges: vec![LocationRange {
                    start: Location::Fixed(3),
                    end: Location::Pending(end),
                }],
            },
        );
        let mut layout = LabelLayout::new();
        layout.bind(end, 9);
        builder.resolve_labels(&layout);

        let table = builder.finalize();
        assert_eq!(table.entries()[0].ranges, vec![3..9]);
        assert_eq!(constants.utf8(table.entries()[0].descriptor).unwrap(), "D");

        // Both slots of the double are covered
        assert!(table.lookup(2, 3).is_some());
        assert!(table.lookup(3, 8).is_some());
        assert!(table.lookup(4, 8).is_none());
        assert!(table.lookup(2, 9).is_none());

        let rebuilt = table.clone().into_builder().finalize();
        assert_eq!(rebuilt, table);
    }

    #[test]
    fn multiple_ranges_round_trip() {
        let mut constants = ConstantPool::new();
        let mut builder = LocalVariableTableBuilder::new();
        builder.add_entry(
            &mut constants,
            variable("i", 1, vec![LocationRange::new(2, 5), LocationRange::new(9, 12)]),
        );
        builder.add_entry(&mut constants, variable("j", 2, vec![LocationRange::new(2, 12)]));
        let table = builder.finalize();
        assert_eq!(table.length(), 32);

        let indices = constants.resolve_indices().unwrap();
        let mut bytes = vec![];
        table.encode(&indices, &mut bytes).unwrap();
        let decoded = LocalVariableTable::decode(&constants, &mut &bytes[..]).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn unusable_rows_are_skipped() {
        let mut constants = ConstantPool::new();
        let name = constants.add_utf8("x");
        let int = constants.add_utf8("I");
        let bad = constants.add_utf8("Q");
        let class = constants.add_class("Foo");
        let indices = constants.resolve_indices().unwrap();
        let name = indices.index_of(name).unwrap() as u8;
        let int = indices.index_of(int).unwrap() as u8;
        let bad = indices.index_of(bad).unwrap() as u8;
        let class = indices.index_of(class).unwrap() as u8;

        #[rustfmt::skip]
        let bytes: Vec<u8> = vec![
            0, 5,
            // Name at #99, which does not exist
            0, 0, 0, 4, 0, 99, 0, int, 0, 1,
            // Name pointing at a Class
            0, 0, 0, 4, 0, class, 0, int, 0, 1,
            // Descriptor that does not parse
            0, 0, 0, 4, 0, name, 0, bad, 0, 1,
            // Good row
            0, 0, 0, 4, 0, name, 0, int, 0, 2,
            // Descriptor at #99
            0, 0, 0, 4, 0, name, 0, 99, 0, 3,
        ];
        let mut reader = &bytes[..];
        let table = LocalVariableTable::decode(&constants, &mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].slot, 2);
        assert_eq!(table.entries()[0].ranges, vec![0..5]);
        assert_eq!(table.length(), 12);
    }

    #[test]
    fn out_of_range_start() {
        let mut constants = ConstantPool::new();
        let mut builder = LocalVariableTableBuilder::new();
        builder.add_entry(
            &mut constants,
            variable("far", 1, vec![LocationRange::new(70_000, 70_004)]),
        );
        let table = builder.finalize();
        let indices = constants.resolve_indices().unwrap();
        assert!(matches!(
            table.encode(&indices, &mut vec![]),
            Err(Error::ValueOutOfRange { what: "local variable start", .. })
        ));
    }
}
