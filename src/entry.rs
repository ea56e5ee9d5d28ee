//! Fragment entries: one received piece of a PDU.

use std::ops::Range;

use crate::flags::FragmentFlags;

/// Payload storage for a single fragment entry.
///
/// Until concatenation every entry owns its own copy of the fragment bytes.
/// Once the list is reassembled the bytes live in the head's single buffer
/// and entries alias it with a byte range instead, so the ownership
/// discipline is enforced by the type rather than a runtime flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentPayload {
    /// The entry owns its own copy of the fragment bytes.
    Owned(Vec<u8>),
    /// The entry's bytes live at this range of the head's concatenated
    /// buffer. Read-only once established.
    View(Range<usize>),
}

/// One received fragment of a conversation's PDU.
#[derive(Debug, Clone)]
pub struct FragmentEntry {
    /// Packet number of the frame that produced this fragment. Display
    /// only; never used for algorithmic decisions.
    pub frame: u32,
    /// Byte offset into the final buffer, or ordinal block number on a
    /// block-sequence list.
    pub offset: usize,
    /// Payload length in bytes.
    pub len: usize,
    pub(crate) flags: FragmentFlags,
    pub(crate) payload: FragmentPayload,
}

impl FragmentEntry {
    pub(crate) fn new(frame: u32, offset: usize, data: Vec<u8>) -> Self {
        let len = data.len();
        FragmentEntry {
            frame,
            offset,
            len,
            flags: FragmentFlags::empty(),
            payload: FragmentPayload::Owned(data),
        }
    }

    /// Advisory flags on this entry. The not-separately-owned state is
    /// derived from the payload variant.
    pub fn flags(&self) -> FragmentFlags {
        match self.payload {
            FragmentPayload::Owned(_) => self.flags,
            FragmentPayload::View(_) => self.flags | FragmentFlags::NOT_SEPARATELY_OWNED,
        }
    }

    /// True if the payload aliases the head buffer.
    pub fn is_view(&self) -> bool {
        matches!(self.payload, FragmentPayload::View(_))
    }

    /// Resolves this entry's bytes, reading views out of `head_buffer`.
    ///
    /// Returns an empty slice for a view whose list has no buffer (cannot
    /// happen through the public API; views are only created alongside the
    /// head buffer).
    pub fn bytes<'a>(&'a self, head_buffer: Option<&'a [u8]>) -> &'a [u8] {
        match &self.payload {
            FragmentPayload::Owned(data) => data,
            FragmentPayload::View(range) => match head_buffer {
                Some(buf) if range.end <= buf.len() => &buf[range.clone()],
                _ => &[],
            },
        }
    }

    /// Releases the owned copy, aliasing `range` of the head buffer instead.
    pub(crate) fn supersede(&mut self, range: Range<usize>) {
        self.payload = FragmentPayload::View(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_owns_its_bytes() {
        let entry = FragmentEntry::new(3, 10, b"abc".to_vec());
        assert_eq!(entry.frame, 3);
        assert_eq!(entry.offset, 10);
        assert_eq!(entry.len, 3);
        assert!(!entry.is_view());
        assert_eq!(entry.bytes(None), b"abc");
        assert!(entry.flags().is_empty());
    }

    #[test]
    fn test_supersede_aliases_head_buffer() {
        let mut entry = FragmentEntry::new(1, 2, b"cd".to_vec());
        entry.supersede(2..4);

        let head = b"abcdef";
        assert!(entry.is_view());
        assert_eq!(entry.bytes(Some(head)), b"cd");
        assert!(entry.flags().contains(FragmentFlags::NOT_SEPARATELY_OWNED));
    }

    #[test]
    fn test_view_without_buffer_is_empty() {
        let mut entry = FragmentEntry::new(1, 0, b"ab".to_vec());
        entry.supersede(0..2);
        assert_eq!(entry.bytes(None), b"");
    }

    #[test]
    fn test_advisory_flags_survive_supersede() {
        let mut entry = FragmentEntry::new(1, 0, b"ab".to_vec());
        entry.flags.insert(FragmentFlags::OVERLAP);
        entry.supersede(0..2);
        assert!(entry.flags().contains(FragmentFlags::OVERLAP));
    }
}
