//! Per-conversation fragment lists and the two reassembly strategies.
//!
//! A [`FragmentList`] is the head of one conversation's reassembly: aggregate
//! state (addressing mode, flags, expected total length, completing frame,
//! concatenated buffer) plus the received entries kept in a `Vec` sorted by
//! offset, with ties appended after existing ties so arrival order stays
//! visible in the duplicate/overlap scans.
//!
//! The two addressing modes, byte offsets and ordinal block numbers, share
//! the entry type and the insertion path but diverge in how coverage is
//! computed and how the final buffer is concatenated. Each mode keeps its
//! own private coverage/assembly routines, selected once at list creation.

use crate::entry::{FragmentEntry, FragmentPayload};
use crate::flags::FragmentFlags;

/// How fragment offsets on a list are interpreted. Chosen at list creation;
/// the two modes are mutually exclusive per list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// `offset` is a byte position in the final reassembled buffer.
    ByteOffset,
    /// `offset` is an ordinal block number (first block = 0).
    BlockSequence,
}

/// Head of one conversation's reassembly.
#[derive(Debug, Clone)]
pub struct FragmentList {
    mode: AddressingMode,
    flags: FragmentFlags,
    /// Expected total: byte count in offset mode, the terminal block's
    /// sequence number in sequence mode. `None` while still collecting.
    datalen: Option<usize>,
    /// Frame that completed the reassembly.
    reassembled_in: Option<u32>,
    /// The concatenated payload once defragmented. Kept across a partial
    /// reassembly restart so view entries stay resolvable.
    buffer: Option<Vec<u8>>,
    /// Entries sorted by offset; ties appended after existing ties.
    entries: Vec<FragmentEntry>,
}

impl FragmentList {
    pub fn new(mode: AddressingMode) -> Self {
        let mut flags = FragmentFlags::empty();
        if mode == AddressingMode::BlockSequence {
            flags.insert(FragmentFlags::BLOCK_SEQUENCE);
        }
        FragmentList {
            mode,
            flags,
            datalen: None,
            reassembled_in: None,
            buffer: None,
            entries: Vec::new(),
        }
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// Aggregate flags on the head.
    pub fn flags(&self) -> FragmentFlags {
        self.flags
    }

    pub fn is_defragmented(&self) -> bool {
        self.flags.contains(FragmentFlags::DEFRAGMENTED)
    }

    /// Expected total length: bytes in offset mode, the terminal block's
    /// sequence number in sequence mode. `None` while unknown.
    pub fn datalen(&self) -> Option<usize> {
        self.datalen
    }

    /// Frame number of the packet whose fragment completed the reassembly.
    pub fn reassembled_in(&self) -> Option<u32> {
        self.reassembled_in
    }

    /// The concatenated payload. Present once defragmented, and retained
    /// through a partial-reassembly restart; check [`is_defragmented`]
    /// before treating it as final.
    ///
    /// [`is_defragmented`]: FragmentList::is_defragmented
    pub fn data(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Received entries in offset order.
    pub fn entries(&self) -> &[FragmentEntry] {
        &self.entries
    }

    /// Resolves an entry's payload, reading view entries out of this list's
    /// concatenated buffer.
    pub fn entry_bytes<'a>(&'a self, entry: &'a FragmentEntry) -> &'a [u8] {
        entry.bytes(self.buffer.as_deref())
    }

    /// Supplies the expected total length out-of-band, for protocols that
    /// announce it instead of flagging a terminal fragment. Completion is
    /// re-evaluated on the next add.
    pub(crate) fn set_datalen(&mut self, total: usize) {
        self.datalen = Some(total);
    }

    /// Reopens a completed list for extension (partial reassembly): clears
    /// the completion and advisory error flags, forgets the expected length,
    /// and keeps the existing buffer so view entries remain resolvable until
    /// the next completion re-concatenates.
    pub(crate) fn set_partial(&mut self) {
        self.flags.remove(
            FragmentFlags::DEFRAGMENTED
                | FragmentFlags::OVERLAP
                | FragmentFlags::OVERLAP_CONFLICT
                | FragmentFlags::MULTIPLE_TAILS
                | FragmentFlags::TOO_LONG,
        );
        self.flags.insert(FragmentFlags::PARTIAL_REASSEMBLY);
        self.datalen = None;
        self.reassembled_in = None;
    }

    /// True if this exact fragment (frame and offset) was already added.
    pub(crate) fn contains(&self, frame: u32, offset: usize) -> bool {
        self.entries
            .iter()
            .any(|e| e.frame == frame && e.offset == offset)
    }

    /// True if any fragment from `frame` was already added.
    pub(crate) fn contains_frame(&self, frame: u32) -> bool {
        self.entries.iter().any(|e| e.frame == frame)
    }

    /// Next unseen ordinal for auto-numbered sequence lists.
    pub(crate) fn next_sequence(&self) -> usize {
        self.entries.iter().map(|e| e.offset + 1).max().unwrap_or(0)
    }

    /// Consumes the list, yielding the assembled payload if it completed.
    pub(crate) fn into_data(self) -> Option<Vec<u8>> {
        if self.flags.contains(FragmentFlags::DEFRAGMENTED) {
            self.buffer
        } else {
            None
        }
    }

    /// Inserts a new fragment and re-evaluates completion.
    ///
    /// Returns true once the list is fully reassembled. Adding to an
    /// already-complete list records overlap diagnostics without retracting
    /// completion and reports complete immediately.
    pub(crate) fn add(&mut self, frame: u32, offset: usize, data: &[u8], more_frags: bool) -> bool {
        if self.is_defragmented() {
            match self.mode {
                AddressingMode::ByteOffset => self.flag_completed_overlap(frame, offset, data),
                AddressingMode::BlockSequence => self.flag_completed_overlap_seq(frame, offset, data),
            }
            return true;
        }

        // Terminal fragment: pin down the expected total, or flag a
        // disagreeing second tail.
        let mut entry = FragmentEntry::new(frame, offset, data.to_vec());
        if !more_frags {
            let total = match self.mode {
                AddressingMode::ByteOffset => offset + data.len(),
                AddressingMode::BlockSequence => offset,
            };
            match self.datalen {
                Some(known) if known != total => {
                    entry.flags.insert(FragmentFlags::MULTIPLE_TAILS);
                    self.flags.insert(FragmentFlags::MULTIPLE_TAILS);
                }
                Some(_) => {}
                None => self.datalen = Some(total),
            }
        }
        self.insert_sorted(entry);

        let Some(datalen) = self.datalen else {
            return false;
        };
        match self.mode {
            AddressingMode::ByteOffset => {
                if self.contiguous_bytes() < datalen {
                    return false;
                }
                self.flag_too_long(datalen);
                self.assemble_bytes();
            }
            AddressingMode::BlockSequence => {
                // Complete once every block 0..=datalen is present.
                if self.first_missing_block() <= datalen {
                    return false;
                }
                self.flag_too_long(datalen);
                self.assemble_blocks(datalen);
            }
        }

        self.flags.insert(FragmentFlags::DEFRAGMENTED);
        self.flags.remove(FragmentFlags::PARTIAL_REASSEMBLY);
        self.reassembled_in = Some(frame);
        true
    }

    fn insert_sorted(&mut self, entry: FragmentEntry) {
        let idx = self.entries.partition_point(|e| e.offset <= entry.offset);
        self.entries.insert(idx, entry);
    }

    /// Maximal contiguous byte coverage starting at offset 0.
    fn contiguous_bytes(&self) -> usize {
        let mut covered = 0;
        for e in &self.entries {
            if e.offset > covered {
                break;
            }
            covered = covered.max(e.offset + e.len);
        }
        covered
    }

    /// First sequence number not yet seen (blocks 0..result are all present).
    fn first_missing_block(&self) -> usize {
        let mut next = 0;
        for e in &self.entries {
            if e.offset == next {
                next += 1;
            } else if e.offset > next {
                break;
            }
        }
        next
    }

    /// Flags entries extending past the declared total, and the head.
    fn flag_too_long(&mut self, datalen: usize) {
        let mut any = false;
        for e in &mut self.entries {
            let past_end = match self.mode {
                AddressingMode::ByteOffset => e.offset + e.len > datalen,
                AddressingMode::BlockSequence => e.offset > datalen,
            };
            if past_end {
                e.flags.insert(FragmentFlags::TOO_LONG);
                any = true;
            }
        }
        if any {
            self.flags.insert(FragmentFlags::TOO_LONG);
        }
    }

    /// Concatenates a byte-offset list into one buffer, re-validating
    /// overlapping regions for conflicts along the way. Entries fully inside
    /// the buffer release their owned copies and alias it instead.
    fn assemble_bytes(&mut self) {
        // Views from a previous completion resolve against the old buffer.
        let old = self.buffer.take();
        let extent = self.contiguous_bytes();
        let mut buf = vec![0u8; extent];
        let mut filled = 0usize;
        let mut head_flags = FragmentFlags::empty();

        for i in 0..self.entries.len() {
            let offset = self.entries[i].offset;
            let mut entry_flags = FragmentFlags::empty();
            {
                let data = self.entries[i].bytes(old.as_deref());
                let n = data.len();
                if offset <= filled && n > 0 {
                    if offset < filled {
                        let ov = (filled - offset).min(n);
                        entry_flags.insert(FragmentFlags::OVERLAP);
                        if buf[offset..offset + ov] != data[..ov] {
                            entry_flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                        }
                    }
                    let copy_end = (offset + n).min(extent);
                    if copy_end > filled {
                        let from = filled - offset;
                        let take = copy_end - offset;
                        buf[filled..copy_end].copy_from_slice(&data[from..take]);
                        filled = copy_end;
                    }
                }
                // Entries past the contiguous extent contribute nothing;
                // they carry the too-long flag from the completion scan.
            }
            self.entries[i].flags |= entry_flags;
            head_flags |= entry_flags;
        }

        self.flags |= head_flags;
        for e in &mut self.entries {
            let end = e.offset + e.len;
            if end <= extent {
                e.supersede(e.offset..end);
            }
        }
        self.buffer = Some(buf);
    }

    /// Concatenates a block-sequence list in sequence order. Repeated
    /// occurrences of a sequence number are duplicates: compared against the
    /// canonical block for conflicts, never re-appended.
    fn assemble_blocks(&mut self, datalen: usize) {
        let old = self.buffer.take();
        let mut buf: Vec<u8> = Vec::new();
        let mut head_flags = FragmentFlags::empty();
        let mut last_seq: Option<usize> = None;
        let mut block_start = 0usize;
        // Destination range per entry, applied once the buffer is final.
        let mut ranges: Vec<Option<std::ops::Range<usize>>> = Vec::with_capacity(self.entries.len());

        for i in 0..self.entries.len() {
            let seq = self.entries[i].offset;
            if seq > datalen {
                // Past the terminal block; flagged too-long, not appended.
                ranges.push(None);
                continue;
            }
            let mut entry_flags = FragmentFlags::empty();
            {
                let data = self.entries[i].bytes(old.as_deref());
                if Some(seq) == last_seq {
                    let canonical = &buf[block_start..];
                    entry_flags.insert(FragmentFlags::OVERLAP);
                    if canonical.len() != data.len() || canonical != data {
                        entry_flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                    }
                } else {
                    block_start = buf.len();
                    buf.extend_from_slice(data);
                    last_seq = Some(seq);
                }
            }
            ranges.push(Some(block_start..buf.len()));
            self.entries[i].flags |= entry_flags;
            head_flags |= entry_flags;
        }

        self.flags |= head_flags;
        for (e, range) in self.entries.iter_mut().zip(ranges) {
            if let Some(range) = range {
                e.supersede(range);
            }
        }
        self.buffer = Some(buf);
    }

    /// Overlap diagnostics for a fragment added after an offset-based list
    /// already completed: validate the bytes against the reassembled buffer
    /// at the same range. The entry is linked for display; completion is
    /// never retracted.
    fn flag_completed_overlap(&mut self, frame: u32, offset: usize, data: &[u8]) {
        let mut entry = FragmentEntry::new(frame, offset, data.to_vec());
        let buf = self.buffer.as_deref().unwrap_or(&[]);
        let end = offset + data.len();
        if end > buf.len() {
            entry.flags.insert(FragmentFlags::TOO_LONG);
            self.flags.insert(FragmentFlags::TOO_LONG);
        } else {
            entry.flags.insert(FragmentFlags::OVERLAP);
            self.flags.insert(FragmentFlags::OVERLAP);
            if &buf[offset..end] != data {
                entry.flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                self.flags.insert(FragmentFlags::OVERLAP_CONFLICT);
            }
            entry.supersede(offset..end);
        }
        self.insert_sorted(entry);
    }

    /// Same as [`flag_completed_overlap`](Self::flag_completed_overlap) for
    /// block-sequence lists: the fresh bytes are compared against the
    /// canonical block with that sequence number.
    fn flag_completed_overlap_seq(&mut self, frame: u32, seq: usize, data: &[u8]) {
        // Resolve the block's position in the assembled buffer.
        let canonical_range = self.entries.iter().find_map(|e| {
            if e.offset != seq {
                return None;
            }
            match &e.payload {
                FragmentPayload::View(range) => Some(range.clone()),
                FragmentPayload::Owned(_) => None,
            }
        });

        let mut entry = FragmentEntry::new(frame, seq, data.to_vec());
        match canonical_range {
            Some(range) => {
                let buf = self.buffer.as_deref().unwrap_or(&[]);
                let canonical = buf.get(range.clone()).unwrap_or(&[]);
                entry.flags.insert(FragmentFlags::OVERLAP);
                self.flags.insert(FragmentFlags::OVERLAP);
                if canonical.len() != data.len() || canonical != data {
                    entry.flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                    self.flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                }
                entry.supersede(range);
            }
            None => {
                // A block the completed PDU never had.
                entry.flags.insert(FragmentFlags::TOO_LONG);
                self.flags.insert(FragmentFlags::TOO_LONG);
            }
        }
        self.insert_sorted(entry);
    }
}
