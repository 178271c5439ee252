//! Two-component compatibility marker for persisted data formats.
//!
//! A [`VersionTag`] packs into a single integer (`major * 100 + minor`) so it
//! fits lightweight metadata slots such as SQLite's `user_version` pragma or a
//! single JSON number.
//!
//! - Same major: **compatible**. The data can be migrated in place.
//! - Same major and minor: **identical**. No migration needed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A `(major, minor)` format version, each component in `0..=99`.
///
/// Fields are private so every value upholds the range invariant. Building a
/// tag with an out-of-range component is a programming error and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct VersionTag {
    major: u8,
    minor: u8,
}

impl VersionTag {
    /// Largest value either component may take.
    pub const MAX_COMPONENT: u8 = 99;

    /// Largest packed representation (`99.99`).
    pub const MAX_PACKED: u32 = 9999;

    /// Creates a tag.
    ///
    /// # Panics
    ///
    /// Panics if `major` or `minor` exceeds [`VersionTag::MAX_COMPONENT`].
    pub const fn new(major: u8, minor: u8) -> Self {
        assert!(
            major <= Self::MAX_COMPONENT && minor <= Self::MAX_COMPONENT,
            "version component exceeds 99"
        );
        VersionTag { major, minor }
    }

    pub const fn major(self) -> u8 {
        self.major
    }

    pub const fn minor(self) -> u8 {
        self.minor
    }

    /// Packs the tag as `major * 100 + minor`.
    pub const fn pack(self) -> u32 {
        self.major as u32 * 100 + self.minor as u32
    }

    /// Unpacks a value produced by [`VersionTag::pack`].
    ///
    /// Unlike [`VersionTag::new`], this reads data that came from disk, so an
    /// out-of-range value is reported instead of panicking.
    pub fn unpack(packed: u32) -> Result<Self, CoreError> {
        if packed > Self::MAX_PACKED {
            return Err(CoreError::VersionOutOfRange { packed });
        }
        Ok(VersionTag {
            major: (packed / 100) as u8,
            minor: (packed % 100) as u8,
        })
    }

    /// True iff both tags share a major version.
    pub fn is_compatible_with(self, other: VersionTag) -> bool {
        self.major == other.major
    }

    /// True iff both tags share major and minor versions.
    pub fn is_identical_to(self, other: VersionTag) -> bool {
        self == other
    }
}

impl TryFrom<u32> for VersionTag {
    type Error = CoreError;

    fn try_from(packed: u32) -> Result<Self, Self::Error> {
        VersionTag::unpack(packed)
    }
}

impl From<VersionTag> for u32 {
    fn from(tag: VersionTag) -> Self {
        tag.pack()
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pack_layout() {
        assert_eq!(VersionTag::new(0, 0).pack(), 0);
        assert_eq!(VersionTag::new(1, 0).pack(), 100);
        assert_eq!(VersionTag::new(1, 7).pack(), 107);
        assert_eq!(VersionTag::new(99, 99).pack(), 9999);
    }

    #[test]
    fn unpack_rejects_values_above_9999() {
        assert_eq!(
            VersionTag::unpack(10_000),
            Err(CoreError::VersionOutOfRange { packed: 10_000 })
        );
        assert!(VersionTag::unpack(u32::MAX).is_err());
    }

    #[test]
    #[should_panic(expected = "version component exceeds 99")]
    fn new_panics_on_major_out_of_range() {
        let _ = VersionTag::new(100, 0);
    }

    #[test]
    #[should_panic(expected = "version component exceeds 99")]
    fn new_panics_on_minor_out_of_range() {
        let _ = VersionTag::new(1, 100);
    }

    #[test]
    fn compatibility_is_major_only() {
        let v1_0 = VersionTag::new(1, 0);
        let v1_1 = VersionTag::new(1, 1);
        let v2_0 = VersionTag::new(2, 0);

        assert!(v1_0.is_compatible_with(v1_1));
        assert!(!v1_0.is_identical_to(v1_1));
        assert!(!v1_0.is_compatible_with(v2_0));
        assert!(v1_1.is_identical_to(VersionTag::new(1, 1)));
    }

    #[test]
    fn serializes_as_packed_integer() {
        let json = serde_json::to_string(&VersionTag::new(3, 14)).unwrap();
        assert_eq!(json, "314");

        let back: VersionTag = serde_json::from_str("205").unwrap();
        assert_eq!(back, VersionTag::new(2, 5));

        assert!(serde_json::from_str::<VersionTag>("12345").is_err());
    }

    #[test]
    fn display_is_dotted() {
        assert_eq!(VersionTag::new(1, 10).to_string(), "1.10");
    }

    proptest! {
        #[test]
        fn pack_unpack_is_bijective(n in 0u32..=9999) {
            let tag = VersionTag::unpack(n).unwrap();
            prop_assert_eq!(tag.pack(), n);
        }

        #[test]
        fn unpack_pack_is_identity(major in 0u8..=99, minor in 0u8..=99) {
            let tag = VersionTag::new(major, minor);
            prop_assert_eq!(VersionTag::unpack(tag.pack()).unwrap(), tag);
        }
    }
}
