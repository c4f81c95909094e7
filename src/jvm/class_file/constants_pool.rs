use super::constants::PoolTag;
use super::{
    decode_modified_utf16, read_bytes, ClassId, ConstantId, ConstantInfo, Deserialize, Encode, HandleKind,
    NameAndTypeId, Serialize, Utf8Id,
};
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use log::debug;
use std::collections::HashMap;
use std::fmt;

/// Class file constants pool
///
/// Constants are interned: adding a constant that is structurally equal to one already in the
/// pool returns the handle of the existing one. Handles ([`ConstantId`]) stay valid for the
/// lifetime of the pool, but the index at which a constant ends up is only known after laying the
/// pool out with [`ConstantPool::resolve_indices`].
///
/// Layout puts constants marked as priority first, then all others. Within each group, constants
/// keep the order in which they were added. A pool read from a class file keeps the exact layout
/// of the file, duplicates included: those constants are already referenced by raw index (from
/// bytecode and opaque attributes), so they cannot be marked as priority and constants added later
/// are only ever laid out after them.
pub struct ConstantPool {
    tag: PoolTag,

    /// Constants, in the order they were added (a constant's slot is its position here)
    entries: Vec<PoolEntry>,

    /// First slot holding each distinct constant
    interned: HashMap<ConstantInfo, ConstantId>,

    /// Constants in layout order, with their indices as offsets
    layout: OffsetVec<LayoutSlot>,

    /// Number of leading slots whose index came from a class file
    fixed: usize,
}

struct PoolEntry {
    info: ConstantInfo,
    priority: bool,
}

#[derive(Copy, Clone, Debug)]
struct LayoutSlot {
    id: ConstantId,
    width: usize,
}

impl Width for LayoutSlot {
    fn width(&self) -> usize {
        self.width
    }
}

/// Indices assigned to the constants of a pool when it was laid out
///
/// This is a snapshot: constants added to the pool afterwards have no index here.
#[derive(Clone, Debug)]
pub struct ConstantIndices {
    pool: PoolTag,

    /// Index of each slot of the pool
    indices: Vec<u16>,

    /// Value of `constant_pool_count` (one more than the largest index)
    count: u16,
}

impl ConstantIndices {
    /// Index of a constant in the class file
    pub fn index_of(&self, id: impl Into<ConstantId>) -> Result<u16, Error> {
        let id = id.into();
        if id.pool() != self.pool {
            return Err(Error::ForeignConstant(id));
        }
        self.indices
            .get(id.slot())
            .copied()
            .ok_or(Error::ForeignConstant(id))
    }

    /// Value of the `constant_pool_count` field
    pub fn count(&self) -> u16 {
        self.count
    }
}

impl ConstantPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantPool {
        ConstantPool {
            tag: PoolTag::fresh(),
            entries: vec![],
            interned: HashMap::new(),
            layout: OffsetVec::new_starting_at(Offset(1)),
            fixed: 0,
        }
    }

    /// Number of constants in the pool (not the number of indices they use)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Constants in layout order, along with the index they will be given
    pub fn iter(&self) -> impl Iterator<Item = (usize, ConstantId, &ConstantInfo)> + '_ {
        self.layout
            .iter()
            .map(move |(offset, _, slot)| (offset.0, slot.id, &self.entries[slot.id.slot()].info))
    }

    fn check_owned(&self, id: ConstantId) -> Result<(), Error> {
        if id.pool() == self.tag && id.slot() < self.entries.len() {
            Ok(())
        } else {
            Err(Error::ForeignConstant(id))
        }
    }

    /// Add a constant, or find the existing equal constant
    ///
    /// Fails if the constant refers to constants of some other pool.
    pub fn add_constant(&mut self, info: ConstantInfo) -> Result<ConstantId, Error> {
        for reference in info.references() {
            self.check_owned(reference)?;
        }
        Ok(self.intern(info))
    }

    /// Like [`ConstantPool::add_constant`], but the constant is also laid out before all
    /// non-priority constants
    pub fn add_priority_constant(&mut self, info: ConstantInfo) -> Result<ConstantId, Error> {
        let id = self.add_constant(info)?;
        self.set_priority(id)?;
        Ok(id)
    }

    /// Mark a constant to be laid out before all non-priority constants
    ///
    /// This is mostly useful for keeping constants loaded by `ldc` within the first 255 indices.
    /// Constants read from a class file keep their index, so they are refused with
    /// [`Error::FixedConstantIndex`]. Priority constants added to such a pool come right after the
    /// constants that were read.
    pub fn set_priority(&mut self, id: ConstantId) -> Result<(), Error> {
        self.check_owned(id)?;
        if id.slot() < self.fixed {
            return Err(Error::FixedConstantIndex(id));
        }
        let entry = &mut self.entries[id.slot()];
        if !entry.priority {
            entry.priority = true;
            self.rebuild_layout();
        }
        Ok(())
    }

    fn intern(&mut self, info: ConstantInfo) -> ConstantId {
        if let Some(id) = self.interned.get(&info) {
            *id
        } else {
            let id = self.push_entry(info.clone());
            self.interned.insert(info, id);
            id
        }
    }

    /// Append a constant without interning it
    fn push_entry(&mut self, info: ConstantInfo) -> ConstantId {
        let id = ConstantId::new(self.tag, self.entries.len());
        let width = info.width();
        self.entries.push(PoolEntry {
            info,
            priority: false,
        });
        self.layout.push(LayoutSlot { id, width });
        id
    }

    fn rebuild_layout(&mut self) {
        self.layout.clear();
        let slots = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (entry.priority, slot, entry.info.width()));
        let fixed_len = self.fixed;
        let (fixed, added): (Vec<_>, Vec<_>) = slots.partition(|(_, slot, _)| *slot < fixed_len);
        let (priority, rest): (Vec<_>, Vec<_>) =
            added.into_iter().partition(|(priority, _, _)| *priority);
        for (_, slot, width) in fixed.into_iter().chain(priority).chain(rest) {
            self.layout.push(LayoutSlot {
                id: ConstantId::new(self.tag, slot),
                width,
            });
        }
    }

    /// Assign an index to every constant
    ///
    /// Fails if the constants need more indices than `constant_pool_count` can describe.
    pub fn resolve_indices(&self) -> Result<ConstantIndices, Error> {
        let count = self.layout.offset_len().0;
        let count = u16::try_from(count).map_err(|_| Error::ConstantPoolOverflow {
            slots: count - 1,
        })?;

        let mut indices = vec![0; self.entries.len()];
        for (offset, _, slot) in &self.layout {
            indices[slot.id.slot()] = offset.0 as u16;
        }

        Ok(ConstantIndices {
            pool: self.tag,
            indices,
            count,
        })
    }

    /// Look up the constant at an index, according to the current layout
    pub fn get_constant(&self, index: u16) -> Result<&ConstantInfo, Error> {
        let id = self.id_at(index)?;
        Ok(&self.entries[id.slot()].info)
    }

    /// Handle of the constant at an index, according to the current layout
    pub fn id_at(&self, index: u16) -> Result<ConstantId, Error> {
        self.layout
            .get_offset(Offset(index as usize))
            .map(|(_, slot)| slot.id)
            .ok_or(Error::InvalidConstantIndex(index))
    }

    fn id_with_tag(&self, index: u16, tag: u8, expected: &'static str) -> Result<ConstantId, Error> {
        let id = self.id_at(index)?;
        if self.entries[id.slot()].info.tag() == tag {
            Ok(id)
        } else {
            Err(Error::BadConstantReference { index, expected })
        }
    }

    pub fn utf8_at(&self, index: u16) -> Result<Utf8Id, Error> {
        self.id_with_tag(index, ConstantInfo::UTF8, "Utf8").map(Utf8Id)
    }

    pub fn class_at(&self, index: u16) -> Result<ClassId, Error> {
        self.id_with_tag(index, ConstantInfo::CLASS, "Class").map(ClassId)
    }

    pub fn name_and_type_at(&self, index: u16) -> Result<NameAndTypeId, Error> {
        self.id_with_tag(index, ConstantInfo::NAME_AND_TYPE, "NameAndType")
            .map(NameAndTypeId)
    }

    /// Look up a constant by handle
    pub fn constant(&self, id: impl Into<ConstantId>) -> Result<&ConstantInfo, Error> {
        let id = id.into();
        self.check_owned(id)?;
        Ok(&self.entries[id.slot()].info)
    }

    pub fn utf8(&self, id: Utf8Id) -> Result<&str, Error> {
        match self.constant(id)? {
            ConstantInfo::Utf8(string) => Ok(string),
            ConstantInfo::Utf16(_) => Err(Error::UnpairedSurrogates(id.into())),
            _ => Err(Error::ForeignConstant(id.into())),
        }
    }

    /// Internal name of a class constant (eg. `java/lang/Object`)
    pub fn class_name(&self, id: ClassId) -> Result<&str, Error> {
        match self.constant(id)? {
            ConstantInfo::Class(name) => self.utf8(*name),
            _ => Err(Error::ForeignConstant(id.into())),
        }
    }

    pub fn add_utf8(&mut self, string: impl Into<String>) -> Utf8Id {
        Utf8Id(self.intern(ConstantInfo::Utf8(string.into())))
    }

    /// Add a class constant for a class in internal form (or an array type descriptor)
    pub fn add_class(&mut self, name: &str) -> ClassId {
        let name = self.add_utf8(name);
        ClassId(self.intern(ConstantInfo::Class(name)))
    }

    pub fn add_string(&mut self, string: &str) -> ConstantId {
        let string = self.add_utf8(string);
        self.intern(ConstantInfo::String(string))
    }

    pub fn add_integer(&mut self, integer: i32) -> ConstantId {
        self.intern(ConstantInfo::Integer(integer))
    }

    pub fn add_float(&mut self, float: f32) -> ConstantId {
        self.intern(ConstantInfo::Float(float.to_bits()))
    }

    pub fn add_long(&mut self, long: i64) -> ConstantId {
        self.intern(ConstantInfo::Long(long))
    }

    pub fn add_double(&mut self, double: f64) -> ConstantId {
        self.intern(ConstantInfo::Double(double.to_bits()))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> NameAndTypeId {
        let name = self.add_utf8(name);
        let descriptor = self.add_utf8(descriptor);
        NameAndTypeId(self.intern(ConstantInfo::NameAndType { name, descriptor }))
    }

    pub fn add_field_ref(
        &mut self,
        class: ClassId,
        name_and_type: NameAndTypeId,
    ) -> Result<ConstantId, Error> {
        self.add_constant(ConstantInfo::FieldRef {
            class,
            name_and_type,
        })
    }

    pub fn add_method_ref(
        &mut self,
        class: ClassId,
        name_and_type: NameAndTypeId,
    ) -> Result<ConstantId, Error> {
        self.add_constant(ConstantInfo::MethodRef {
            class,
            name_and_type,
        })
    }

    pub fn add_interface_method_ref(
        &mut self,
        class: ClassId,
        name_and_type: NameAndTypeId,
    ) -> Result<ConstantId, Error> {
        self.add_constant(ConstantInfo::InterfaceMethodRef {
            class,
            name_and_type,
        })
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> ConstantId {
        let descriptor = self.add_utf8(descriptor);
        self.intern(ConstantInfo::MethodType { descriptor })
    }

    /// Add a method handle, checking that the reference has the right kind for the handle
    pub fn add_method_handle(
        &mut self,
        kind: HandleKind,
        reference: ConstantId,
    ) -> Result<ConstantId, Error> {
        let tag = self.constant(reference)?.tag();
        if !kind.reference_tags().contains(&tag) {
            return Err(Error::BadConstantReference {
                index: 0,
                expected: "member reference",
            });
        }
        self.add_constant(ConstantInfo::MethodHandle { kind, reference })
    }

    pub fn add_dynamic(
        &mut self,
        bootstrap_method: u16,
        name_and_type: NameAndTypeId,
    ) -> Result<ConstantId, Error> {
        self.add_constant(ConstantInfo::Dynamic {
            bootstrap_method,
            name_and_type,
        })
    }

    pub fn add_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name_and_type: NameAndTypeId,
    ) -> Result<ConstantId, Error> {
        self.add_constant(ConstantInfo::InvokeDynamic {
            bootstrap_method,
            name_and_type,
        })
    }

    pub fn add_module(&mut self, name: &str) -> ConstantId {
        let name = self.add_utf8(name);
        self.intern(ConstantInfo::Module(name))
    }

    pub fn add_package(&mut self, name: &str) -> ConstantId {
        let name = self.add_utf8(name);
        self.intern(ConstantInfo::Package(name))
    }

    /// Lay out the pool and write it, starting with `constant_pool_count`
    pub fn write_to<W: WriteBytesExt>(&self, writer: &mut W) -> Result<ConstantIndices, Error> {
        let indices = self.resolve_indices()?;
        indices.count.serialize(writer)?;
        for (_, _, slot) in &self.layout {
            self.entries[slot.id.slot()].info.encode(&indices, writer)?;
        }
        Ok(indices)
    }

    /// Read a pool, starting from `constant_pool_count`
    ///
    /// Every entry of the file becomes a slot of the pool, in order, so that writing the pool back
    /// reproduces the same bytes.
    pub fn read_from<R: ReadBytesExt>(reader: &mut R) -> Result<ConstantPool, Error> {
        let count = u16::deserialize(reader)?;

        // First pass: raw entries, and the tag found at each index
        let mut raw_entries: Vec<(u16, RawConstant)> = vec![];
        let mut tags_at: Vec<Option<(usize, u8)>> = vec![None; count as usize];
        let mut index: usize = 1;
        while index < count as usize {
            let raw = RawConstant::read(index as u16, reader)?;
            tags_at[index] = Some((raw_entries.len(), raw.tag));
            let width = raw.width;
            raw_entries.push((index as u16, raw));
            index += width;
        }
        if index != count as usize {
            return Err(Error::ValueOutOfRange {
                what: "constant pool count",
                value: count as i64,
            });
        }

        // Second pass: turn indices into handles, checking what they point at
        let mut pool = ConstantPool::new();
        let tag = pool.tag;
        let lookup = |index: u16, tags: &[u8], expected: &'static str| match tags_at
            .get(index as usize)
            .copied()
            .flatten()
        {
            Some((slot, found)) if tags.contains(&found) => Ok(ConstantId::new(tag, slot)),
            _ => Err(Error::BadConstantReference { index, expected }),
        };
        for (_, raw) in raw_entries {
            let info = raw.resolve(&lookup)?;
            let id = pool.push_entry(info.clone());
            pool.interned.entry(info).or_insert(id);
        }
        pool.fixed = pool.entries.len();

        debug!(
            "read constant pool with {} constants ({} distinct)",
            pool.entries.len(),
            pool.interned.len()
        );
        Ok(pool)
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool::new()
    }
}

impl fmt::Debug for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (index, _, info) in self.iter() {
            list.entry(&format_args!("#{} = {:?}", index, info));
        }
        list.finish()
    }
}

/// Constant as read, with references still as indices
struct RawConstant {
    index: u16,
    tag: u8,
    width: usize,
    body: RawBody,
}

enum RawBody {
    Resolved(ConstantInfo),
    Utf8Ref(u16),
    MemberRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(HandleKind, u16),
    Dynamic(u16, u16),
}

impl RawConstant {
    fn read<R: ReadBytesExt>(index: u16, reader: &mut R) -> Result<RawConstant, Error> {
        let tag = u8::deserialize(reader)?;
        let body = match tag {
            ConstantInfo::UTF8 => {
                let len = u16::deserialize(reader)?;
                let bytes = read_bytes(reader, len as usize)?;
                let units = decode_modified_utf16(&bytes)
                    .ok_or(Error::InvalidModifiedUtf8 { index })?;
                match String::from_utf16(&units) {
                    Ok(string) => RawBody::Resolved(ConstantInfo::Utf8(string)),
                    Err(_) => {
                        debug!("Utf8 constant #{} has unpaired surrogates", index);
                        RawBody::Resolved(ConstantInfo::Utf16(units))
                    }
                }
            }
            ConstantInfo::INTEGER => RawBody::Resolved(ConstantInfo::Integer(i32::deserialize(reader)?)),
            ConstantInfo::FLOAT => RawBody::Resolved(ConstantInfo::Float(u32::deserialize(reader)?)),
            ConstantInfo::LONG => RawBody::Resolved(ConstantInfo::Long(i64::deserialize(reader)?)),
            ConstantInfo::DOUBLE => RawBody::Resolved(ConstantInfo::Double(u64::deserialize(reader)?)),
            ConstantInfo::CLASS
            | ConstantInfo::STRING
            | ConstantInfo::METHOD_TYPE
            | ConstantInfo::MODULE
            | ConstantInfo::PACKAGE => RawBody::Utf8Ref(u16::deserialize(reader)?),
            ConstantInfo::FIELD_REF
            | ConstantInfo::METHOD_REF
            | ConstantInfo::INTERFACE_METHOD_REF => {
                RawBody::MemberRef(u16::deserialize(reader)?, u16::deserialize(reader)?)
            }
            ConstantInfo::NAME_AND_TYPE => {
                RawBody::NameAndType(u16::deserialize(reader)?, u16::deserialize(reader)?)
            }
            ConstantInfo::METHOD_HANDLE => {
                let kind = HandleKind::from_u8(u8::deserialize(reader)?)?;
                RawBody::MethodHandle(kind, u16::deserialize(reader)?)
            }
            ConstantInfo::DYNAMIC | ConstantInfo::INVOKE_DYNAMIC => {
                RawBody::Dynamic(u16::deserialize(reader)?, u16::deserialize(reader)?)
            }
            _ => return Err(Error::InvalidConstantTag { index, tag }),
        };
        let width = match tag {
            ConstantInfo::LONG | ConstantInfo::DOUBLE => 2,
            _ => 1,
        };
        Ok(RawConstant {
            index,
            tag,
            width,
            body,
        })
    }

    fn resolve<F>(self, lookup: &F) -> Result<ConstantInfo, Error>
    where
        F: Fn(u16, &[u8], &'static str) -> Result<ConstantId, Error>,
    {
        let utf8 = |index| lookup(index, &[ConstantInfo::UTF8], "Utf8").map(Utf8Id);
        let class = |index| lookup(index, &[ConstantInfo::CLASS], "Class").map(ClassId);
        let name_and_type = |index| {
            lookup(index, &[ConstantInfo::NAME_AND_TYPE], "NameAndType").map(NameAndTypeId)
        };

        let info = match self.body {
            RawBody::Resolved(info) => info,
            RawBody::Utf8Ref(name) => {
                let name = utf8(name)?;
                match self.tag {
                    ConstantInfo::CLASS => ConstantInfo::Class(name),
                    ConstantInfo::STRING => ConstantInfo::String(name),
                    ConstantInfo::METHOD_TYPE => ConstantInfo::MethodType { descriptor: name },
                    ConstantInfo::MODULE => ConstantInfo::Module(name),
                    _ => ConstantInfo::Package(name),
                }
            }
            RawBody::MemberRef(class_index, name_and_type_index) => {
                let class = class(class_index)?;
                let name_and_type = name_and_type(name_and_type_index)?;
                match self.tag {
                    ConstantInfo::FIELD_REF => ConstantInfo::FieldRef {
                        class,
                        name_and_type,
                    },
                    ConstantInfo::METHOD_REF => ConstantInfo::MethodRef {
                        class,
                        name_and_type,
                    },
                    _ => ConstantInfo::InterfaceMethodRef {
                        class,
                        name_and_type,
                    },
                }
            }
            RawBody::NameAndType(name, descriptor) => ConstantInfo::NameAndType {
                name: utf8(name)?,
                descriptor: utf8(descriptor)?,
            },
            RawBody::MethodHandle(kind, reference) => ConstantInfo::MethodHandle {
                kind,
                reference: lookup(reference, kind.reference_tags(), "member reference")?,
            },
            RawBody::Dynamic(bootstrap_method, name_and_type_index) => {
                let name_and_type = name_and_type(name_and_type_index)?;
                if self.tag == ConstantInfo::DYNAMIC {
                    ConstantInfo::Dynamic {
                        bootstrap_method,
                        name_and_type,
                    }
                } else {
                    ConstantInfo::InvokeDynamic {
                        bootstrap_method,
                        name_and_type,
                    }
                }
            }
        };
        debug_assert_eq!(info.tag(), self.tag, "constant #{} changed kind", self.index);
        Ok(info)
    }
}
