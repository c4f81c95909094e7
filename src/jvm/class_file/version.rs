use super::{Deserialize, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Result;

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
///
/// Ordering compares the major version first.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    /// JVM class file version corresponding to Java SE 8 (released March 2014)
    pub const JAVA8: Version = Version {
        major_version: 52,
        minor_version: 0,
    };

    /// JVM class file version corresponding to Java SE 11 (released September 2018)
    pub const JAVA11: Version = Version {
        major_version: 55,
        minor_version: 0,
    };
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major_version, self.minor_version)
    }
}

/// Minor version comes first in the class file
impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let minor_version = u16::deserialize(reader)?;
        let major_version = u16::deserialize(reader)?;
        Ok(Version {
            major_version,
            minor_version,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minor_version_first() {
        let version = Version::deserialize(&mut &[0, 3, 0, 45][..]).unwrap();
        assert_eq!(version.to_string(), "45.3");
        assert!(version < Version::JAVA8);
        assert!(Version::JAVA8 < Version::JAVA11);

        let mut out = vec![];
        version.serialize(&mut out).unwrap();
        assert_eq!(out, vec![0, 3, 0, 45]);
    }
}
