//! Status flags for fragment entries and list heads.
//!
//! Flags are advisory: suspicious input (overlapping bytes that disagree,
//! more terminal fragments than expected, fragments past the declared total
//! length) is recorded here and reassembly still produces a best-effort
//! result. Callers inspect the flags afterwards to decide whether to present
//! a parse error.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of fragment status flags.
///
/// Head entries aggregate the flags of their fragments, so a single check on
/// the head answers "did anything look wrong anywhere in this PDU".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentFlags(u16);

impl FragmentFlags {
    /// Reassembly finished; the head holds the full concatenated payload.
    pub const DEFRAGMENTED: FragmentFlags = FragmentFlags(0x0001);
    /// Two fragments covered the same bytes with identical contents.
    pub const OVERLAP: FragmentFlags = FragmentFlags(0x0002);
    /// Two fragments covered the same bytes with different contents.
    pub const OVERLAP_CONFLICT: FragmentFlags = FragmentFlags(0x0004);
    /// More than one terminal fragment, declaring different total lengths.
    pub const MULTIPLE_TAILS: FragmentFlags = FragmentFlags(0x0008);
    /// A fragment extended past the declared total length.
    pub const TOO_LONG: FragmentFlags = FragmentFlags(0x0010);
    /// The entry's payload aliases the head's concatenated buffer instead of
    /// owning its own copy. Derived from the payload variant; see
    /// [`FragmentEntry::flags`](crate::entry::FragmentEntry::flags).
    pub const NOT_SEPARATELY_OWNED: FragmentFlags = FragmentFlags(0x0020);
    /// A completed list was reopened for extension with further fragments.
    pub const PARTIAL_REASSEMBLY: FragmentFlags = FragmentFlags(0x0040);
    /// Offsets on this list are ordinal block numbers, not byte positions.
    pub const BLOCK_SEQUENCE: FragmentFlags = FragmentFlags(0x0080);

    /// Flags that indicate an actual problem rather than benign redundancy.
    const ERROR_MASK: FragmentFlags =
        FragmentFlags(Self::OVERLAP_CONFLICT.0 | Self::MULTIPLE_TAILS.0 | Self::TOO_LONG.0);

    /// No flags set.
    pub const fn empty() -> Self {
        FragmentFlags(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every flag in `other` is set in `self`.
    pub const fn contains(self, other: FragmentFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FragmentFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FragmentFlags) {
        self.0 &= !other.0;
    }

    /// True if any error-class flag (conflict, multiple-tails, too-long)
    /// is present.
    pub const fn has_errors(self) -> bool {
        self.0 & Self::ERROR_MASK.0 != 0
    }
}

impl BitOr for FragmentFlags {
    type Output = FragmentFlags;

    fn bitor(self, rhs: FragmentFlags) -> FragmentFlags {
        FragmentFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FragmentFlags {
    fn bitor_assign(&mut self, rhs: FragmentFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for FragmentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(FragmentFlags, &str); 8] = [
            (FragmentFlags::DEFRAGMENTED, "defragmented"),
            (FragmentFlags::OVERLAP, "overlap"),
            (FragmentFlags::OVERLAP_CONFLICT, "overlap-conflict"),
            (FragmentFlags::MULTIPLE_TAILS, "multiple-tails"),
            (FragmentFlags::TOO_LONG, "too-long"),
            (FragmentFlags::NOT_SEPARATELY_OWNED, "not-separately-owned"),
            (FragmentFlags::PARTIAL_REASSEMBLY, "partial-reassembly"),
            (FragmentFlags::BLOCK_SEQUENCE, "block-sequence"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}
