//! Diagnostic span lists for presenting a completed reassembly.
//!
//! Rendering is abstract: the builder walks a completed [`FragmentList`] and
//! produces one annotated span per contributing entry (originating frame,
//! covered byte range, advisory flags), plus a single boolean saying whether
//! any error-class flag was present anywhere, for callers that want a
//! one-line error summary before drilling in.

use std::fmt;

use crate::entry::FragmentPayload;
use crate::flags::FragmentFlags;
use crate::list::FragmentList;

/// One contributing fragment of a reassembled PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSpan {
    /// Frame that carried this fragment.
    pub frame: u32,
    /// Covered byte range `[start, end)` in the reassembled buffer.
    pub start: usize,
    pub end: usize,
    /// Block number, for sequence-based lists.
    pub block: Option<usize>,
    /// Advisory flags recorded on the entry.
    pub flags: FragmentFlags,
}

impl fmt::Display for FragmentSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(block) => write!(f, "frame {}: block {}", self.frame, block)?,
            None => write!(f, "frame {}", self.frame)?,
        }
        write!(
            f,
            ", bytes {}-{} ({} bytes)",
            self.start,
            self.end,
            self.end - self.start
        )?;
        if !self.flags.is_empty() {
            write!(f, " [{}]", self.flags)?;
        }
        Ok(())
    }
}

/// Annotated span list for one reassembled PDU.
#[derive(Debug, Clone)]
pub struct FragmentTree {
    /// Spans in offset order, one per contributing entry.
    pub spans: Vec<FragmentSpan>,
    /// Frame whose fragment completed the reassembly.
    pub reassembled_in: Option<u32>,
    /// Length of the reassembled payload in bytes.
    pub total_len: usize,
    /// True if any error-class flag (conflict, multiple-tails, too-long)
    /// was present on the head or any entry.
    pub has_errors: bool,
}

impl FragmentTree {
    fn build(list: &FragmentList, blocks: bool) -> Self {
        let total_len = list.data().map_or(0, <[u8]>::len);
        let mut has_errors = list.flags().has_errors();
        let mut spans = Vec::with_capacity(list.entries().len());

        for entry in list.entries() {
            let flags = entry.flags();
            has_errors |= flags.has_errors();
            // Entries aliasing the head buffer know their exact byte range.
            // An offset-mode entry that never made it into the buffer still
            // has a meaningful byte position; a stray sequence block does
            // not and reports an empty range at the end.
            let (start, end) = match &entry.payload {
                FragmentPayload::View(range) => (range.start, range.end),
                FragmentPayload::Owned(_) if !blocks => (entry.offset, entry.offset + entry.len),
                FragmentPayload::Owned(_) => (total_len, total_len),
            };
            spans.push(FragmentSpan {
                frame: entry.frame,
                start,
                end,
                block: blocks.then_some(entry.offset),
                flags,
            });
        }

        FragmentTree {
            spans,
            reassembled_in: list.reassembled_in(),
            total_len,
            has_errors,
        }
    }
}

/// Builds the span list for an offset-based reassembly. The returned
/// `has_errors` is true if anything in the list warrants a caller-side
/// error summary.
pub fn show_fragment_tree(list: &FragmentList) -> FragmentTree {
    FragmentTree::build(list, false)
}

/// Builds the span list for a sequence-based reassembly; spans additionally
/// carry their block numbers, with byte ranges accumulated in block order.
pub fn show_fragment_seq_tree(list: &FragmentList) -> FragmentTree {
    FragmentTree::build(list, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::AddressingMode;

    #[test]
    fn test_tree_spans_in_offset_order() {
        let mut list = FragmentList::new(AddressingMode::ByteOffset);
        list.add(2, 2, b"CD", false);
        list.add(1, 0, b"AB", true);

        let tree = show_fragment_tree(&list);
        assert_eq!(tree.total_len, 4);
        assert_eq!(tree.reassembled_in, Some(1));
        assert!(!tree.has_errors);

        assert_eq!(tree.spans.len(), 2);
        assert_eq!((tree.spans[0].frame, tree.spans[0].start, tree.spans[0].end), (1, 0, 2));
        assert_eq!((tree.spans[1].frame, tree.spans[1].start, tree.spans[1].end), (2, 2, 4));
        assert_eq!(tree.spans[0].block, None);
    }

    #[test]
    fn test_tree_reports_conflicts() {
        let mut list = FragmentList::new(AddressingMode::ByteOffset);
        list.add(1, 0, b"ABCD", true);
        list.add(2, 2, b"XXEF", false);

        let tree = show_fragment_tree(&list);
        assert!(tree.has_errors);
        let conflicted = &tree.spans[1];
        assert!(conflicted.flags.contains(FragmentFlags::OVERLAP_CONFLICT));
    }

    #[test]
    fn test_seq_tree_carries_block_numbers() {
        let mut list = FragmentList::new(AddressingMode::BlockSequence);
        list.add(1, 0, b"AB", true);
        list.add(2, 1, b"CDE", false);

        let tree = show_fragment_seq_tree(&list);
        assert!(!tree.has_errors);
        assert_eq!(tree.spans[0].block, Some(0));
        assert_eq!(tree.spans[1].block, Some(1));
        assert_eq!((tree.spans[1].start, tree.spans[1].end), (2, 5));
    }

    #[test]
    fn test_tree_flags_too_long_entry() {
        let mut list = FragmentList::new(AddressingMode::BlockSequence);
        list.add(1, 0, b"AB", true);
        list.add(2, 9, b"ZZ", true);
        list.add(3, 1, b"CD", false);

        let tree = show_fragment_seq_tree(&list);
        assert!(tree.has_errors);
        let too_long = tree
            .spans
            .iter()
            .find(|s| s.block == Some(9))
            .expect("span for stray block");
        assert!(too_long.flags.contains(FragmentFlags::TOO_LONG));
        assert_eq!(too_long.start, too_long.end);
    }

    #[test]
    fn test_span_display() {
        let span = FragmentSpan {
            frame: 4,
            start: 0,
            end: 2,
            block: None,
            flags: FragmentFlags::OVERLAP | FragmentFlags::NOT_SEPARATELY_OWNED,
        };
        assert_eq!(
            span.to_string(),
            "frame 4, bytes 0-2 (2 bytes) [overlap|not-separately-owned]"
        );

        let block_span = FragmentSpan {
            frame: 5,
            start: 2,
            end: 5,
            block: Some(1),
            flags: FragmentFlags::empty(),
        };
        assert_eq!(block_span.to_string(), "frame 5: block 1, bytes 2-5 (3 bytes)");
    }
}
