//! Entry points consumed by protocol dissectors.
//!
//! Every add operation takes the captured packet bytes (`buf` plus a start
//! offset), the per-packet [`PacketContext`], the dissector-chosen
//! reassembly `id`, and the fragment's position (byte offset or block
//! sequence number) with its length and "more fragments" flag. The return
//! value is `None` while the PDU is incomplete and the completed
//! [`FragmentList`] head once the last gap closes.
//!
//! The `_check` variants additionally consult and populate the
//! [`ReassembledTable`], which makes a second dissection pass idempotent:
//! with `pinfo.visited` set they answer straight from the cache and never
//! mutate anything.

use log::{debug, trace, warn};

use crate::error::ReassemblyError;
use crate::key::{FragmentKey, PacketContext};
use crate::list::{AddressingMode, FragmentList};
use crate::table::{FragmentTable, ReassembledTable};

/// Bounds-checks a declared fragment against the captured bytes.
///
/// This runs before any list mutation or overlap comparison, so a truncated
/// capture can never short-read a conflict check or corrupt a list.
fn fragment_slice<'a>(
    buf: &'a [u8],
    buf_offset: usize,
    frag_len: usize,
    frame: u32,
) -> Result<&'a [u8], ReassemblyError> {
    let available = buf.len().saturating_sub(buf_offset);
    if available < frag_len {
        return Err(ReassemblyError::TruncatedFragment {
            frame,
            declared: frag_len,
            available,
        });
    }
    Ok(&buf[buf_offset..buf_offset + frag_len])
}

/// Shared add path for both addressing modes.
///
/// `position` is the byte offset or explicit block number; `None` means
/// "assign the next unseen block number" (the `_seq_next` convenience, which
/// also deduplicates by frame alone since the caller never names a
/// sequence).
fn add_work<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &'a mut FragmentTable,
    position: Option<usize>,
    frag_len: usize,
    more_frags: bool,
    mode: AddressingMode,
) -> Option<&'a FragmentList> {
    let key = FragmentKey::from_packet(pinfo, id);

    // A dissector may call add more than once for the same packet; answer
    // from the existing state without mutating.
    let duplicate = table.get(&key).and_then(|list| {
        let seen = match position {
            Some(offset) => list.contains(pinfo.frame, offset),
            None => list.contains_frame(pinfo.frame),
        };
        seen.then(|| list.is_defragmented())
    });
    if let Some(defragmented) = duplicate {
        trace!(
            "frame {} already in reassembly {}, not re-adding",
            pinfo.frame,
            id
        );
        return if defragmented { table.get(&key) } else { None };
    }

    let data = match fragment_slice(buf, buf_offset, frag_len, pinfo.frame) {
        Ok(data) => data,
        Err(err) => {
            warn!("declining fragment for reassembly {id}: {err}");
            if !more_frags {
                // A truncated terminal fragment tears down the in-progress
                // state; the PDU can never complete.
                table.remove_key(&key);
            }
            return None;
        }
    };

    let offset = position
        .unwrap_or_else(|| table.get(&key).map_or(0, |list| list.next_sequence()));

    let list = table.entry_or_insert(key.clone(), mode);
    trace!(
        "frame {}: adding {} bytes at {} to reassembly {} (more_frags={})",
        pinfo.frame,
        frag_len,
        offset,
        id,
        more_frags
    );
    if list.add(pinfo.frame, offset, data, more_frags) {
        debug!(
            "reassembly {} completed in frame {} ({} fragments)",
            id,
            pinfo.frame,
            list.entries().len()
        );
        table.get(&key)
    } else {
        None
    }
}

/// Shared `_check` path: runs the add on the fragment table and, on
/// completion, transplants the list into the reassembled table keyed by the
/// completing packet.
fn check_work<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &mut FragmentTable,
    reassembled: &'a mut ReassembledTable,
    position: Option<usize>,
    frag_len: usize,
    more_frags: bool,
    mode: AddressingMode,
) -> Option<&'a FragmentList> {
    if add_work(
        buf, buf_offset, pinfo, id, table, position, frag_len, more_frags, mode,
    )
    .is_none()
    {
        return None;
    }

    // Migrate out of the in-progress table so the completed PDU is findable
    // from any of its packets on the next pass. A duplicate add against an
    // already-migrated list will have started a fresh list; only a genuine
    // completion has one to move.
    let key = FragmentKey::from_packet(pinfo, id);
    if let Some(list) = table.remove_key(&key) {
        debug!("caching completed reassembly {id} for re-dissection");
        reassembled.insert(id, list);
    }
    reassembled.lookup(pinfo.frame, id)
}

/// Offset-based reassembly: inserts a fragment covering
/// `frag_offset..frag_offset + frag_len` of the final PDU.
///
/// Returns the completed head once the PDU is contiguous from byte 0 to the
/// total length declared by the terminal fragment (or supplied via
/// [`fragment_set_tot_len`]), `None` before that.
#[allow(clippy::too_many_arguments)]
pub fn fragment_add<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &'a mut FragmentTable,
    frag_offset: usize,
    frag_len: usize,
    more_frags: bool,
) -> Option<&'a FragmentList> {
    add_work(
        buf,
        buf_offset,
        pinfo,
        id,
        table,
        Some(frag_offset),
        frag_len,
        more_frags,
        AddressingMode::ByteOffset,
    )
}

/// [`fragment_add`] with the multi-pass cache layered on top: on a visited
/// packet it answers from `reassembled` without recomputation; on completion
/// it moves the list out of `table` into `reassembled`.
#[allow(clippy::too_many_arguments)]
pub fn fragment_add_check<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &mut FragmentTable,
    reassembled: &'a mut ReassembledTable,
    frag_offset: usize,
    frag_len: usize,
    more_frags: bool,
) -> Option<&'a FragmentList> {
    if pinfo.visited {
        return reassembled.lookup(pinfo.frame, id);
    }
    check_work(
        buf,
        buf_offset,
        pinfo,
        id,
        table,
        reassembled,
        Some(frag_offset),
        frag_len,
        more_frags,
        AddressingMode::ByteOffset,
    )
}

/// Sequence-based reassembly: inserts the fragment carrying block number
/// `frag_seq` (first block = 0). Contiguity is counted in distinct sequence
/// numbers rather than byte coverage.
#[allow(clippy::too_many_arguments)]
pub fn fragment_add_seq<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &'a mut FragmentTable,
    frag_seq: usize,
    frag_len: usize,
    more_frags: bool,
) -> Option<&'a FragmentList> {
    add_work(
        buf,
        buf_offset,
        pinfo,
        id,
        table,
        Some(frag_seq),
        frag_len,
        more_frags,
        AddressingMode::BlockSequence,
    )
}

/// [`fragment_add_seq`] with the multi-pass cache layered on top.
#[allow(clippy::too_many_arguments)]
pub fn fragment_add_seq_check<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &mut FragmentTable,
    reassembled: &'a mut ReassembledTable,
    frag_seq: usize,
    frag_len: usize,
    more_frags: bool,
) -> Option<&'a FragmentList> {
    if pinfo.visited {
        return reassembled.lookup(pinfo.frame, id);
    }
    check_work(
        buf,
        buf_offset,
        pinfo,
        id,
        table,
        reassembled,
        Some(frag_seq),
        frag_len,
        more_frags,
        AddressingMode::BlockSequence,
    )
}

/// Sequence-based reassembly for wire formats that deliver in order and
/// never number their fragments: each fragment is assigned the next unseen
/// block number automatically. Uses the multi-pass cache like the `_check`
/// variants.
#[allow(clippy::too_many_arguments)]
pub fn fragment_add_seq_next<'a>(
    buf: &[u8],
    buf_offset: usize,
    pinfo: &PacketContext,
    id: u32,
    table: &mut FragmentTable,
    reassembled: &'a mut ReassembledTable,
    frag_len: usize,
    more_frags: bool,
) -> Option<&'a FragmentList> {
    if pinfo.visited {
        return reassembled.lookup(pinfo.frame, id);
    }
    check_work(
        buf,
        buf_offset,
        pinfo,
        id,
        table,
        reassembled,
        None,
        frag_len,
        more_frags,
        AddressingMode::BlockSequence,
    )
}

/// Read-only probe for an in-progress reassembly; never mutates.
pub fn fragment_get<'a>(
    pinfo: &PacketContext,
    id: u32,
    table: &'a FragmentTable,
) -> Option<&'a FragmentList> {
    table.lookup(pinfo, id)
}

/// Supplies the expected total length out-of-band (byte count for
/// offset-based lists, terminal block number for sequence-based lists), for
/// protocols that announce it instead of flagging a terminal fragment.
/// Completion is re-evaluated on the next add. No-op if the conversation
/// has no in-progress list.
pub fn fragment_set_tot_len(
    pinfo: &PacketContext,
    id: u32,
    table: &mut FragmentTable,
    total_len: usize,
) {
    let key = FragmentKey::from_packet(pinfo, id);
    if let Some(list) = table.get_mut(&key) {
        trace!("reassembly {id}: expected total length set to {total_len}");
        list.set_datalen(total_len);
    }
}

/// Reopens a completed reassembly for extension with more data beyond its
/// current end. The next add operations resume the incremental algorithm
/// without re-copying already-assembled bytes.
pub fn fragment_set_partial_reassembly(pinfo: &PacketContext, id: u32, table: &mut FragmentTable) {
    let key = FragmentKey::from_packet(pinfo, id);
    if let Some(list) = table.get_mut(&key) {
        trace!("reassembly {id}: reopened for partial reassembly");
        list.set_partial();
    }
}

/// Tears down a reassembly, leaving no trace in the table. Returns the
/// assembled payload (now owned by the caller) if it had completed, `None`
/// otherwise.
pub fn fragment_delete(
    pinfo: &PacketContext,
    id: u32,
    table: &mut FragmentTable,
) -> Option<Vec<u8>> {
    table.remove(pinfo, id).and_then(FragmentList::into_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FragmentFlags;

    fn ctx(frame: u32) -> PacketContext {
        PacketContext::new(frame, &b"src"[..], &b"dst"[..])
    }

    #[test]
    fn test_fragment_slice_bounds() {
        assert_eq!(fragment_slice(b"abcdef", 2, 3, 1), Ok(&b"cde"[..]));
        assert_eq!(
            fragment_slice(b"abcdef", 4, 5, 1),
            Err(ReassemblyError::TruncatedFragment {
                frame: 1,
                declared: 5,
                available: 2,
            })
        );
        // Start offset past the end counts as zero available bytes.
        assert!(fragment_slice(b"ab", 10, 1, 1).is_err());
    }

    #[test]
    fn test_truncated_non_terminal_declines_but_keeps_state() {
        let mut table = FragmentTable::new();
        assert!(fragment_add(b"AB", 0, &ctx(1), 5, &mut table, 0, 2, true).is_none());
        assert_eq!(table.len(), 1);

        // Declared length exceeds capture: declined, list untouched.
        assert!(fragment_add(b"CD", 0, &ctx(2), 5, &mut table, 2, 10, true).is_none());
        let list = fragment_get(&ctx(2), 5, &table).expect("list should survive");
        assert_eq!(list.entries().len(), 1);
    }

    #[test]
    fn test_truncated_terminal_tears_down() {
        let mut table = FragmentTable::new();
        fragment_add(b"AB", 0, &ctx(1), 5, &mut table, 0, 2, true);
        assert!(fragment_add(b"CD", 0, &ctx(2), 5, &mut table, 2, 10, false).is_none());
        assert!(fragment_get(&ctx(2), 5, &table).is_none());
    }

    #[test]
    fn test_seq_next_assigns_ordinals_in_arrival_order() {
        let mut table = FragmentTable::new();
        let mut cache = ReassembledTable::new();

        assert!(
            fragment_add_seq_next(b"AB", 0, &ctx(1), 7, &mut table, &mut cache, 2, true).is_none()
        );
        let head = fragment_add_seq_next(b"CD", 0, &ctx(2), 7, &mut table, &mut cache, 2, false)
            .expect("second fragment should complete");
        assert_eq!(head.data(), Some(&b"ABCD"[..]));
        assert_eq!(head.datalen(), Some(1));
    }

    #[test]
    fn test_seq_next_deduplicates_by_frame() {
        let mut table = FragmentTable::new();
        let mut cache = ReassembledTable::new();

        fragment_add_seq_next(b"AB", 0, &ctx(1), 7, &mut table, &mut cache, 2, true);
        // Re-dissecting frame 1 must not take a second block number.
        fragment_add_seq_next(b"AB", 0, &ctx(1), 7, &mut table, &mut cache, 2, true);

        let list = fragment_get(&ctx(1), 7, &table).expect("in progress");
        assert_eq!(list.entries().len(), 1);
    }

    #[test]
    fn test_set_tot_len_completes_without_terminal_flag() {
        let mut table = FragmentTable::new();
        let pinfo = ctx(1);
        assert!(fragment_add(b"AB", 0, &pinfo, 3, &mut table, 0, 2, true).is_none());
        fragment_set_tot_len(&pinfo, 3, &mut table, 4);

        let head = fragment_add(b"CD", 0, &ctx(2), 3, &mut table, 2, 2, true)
            .expect("coverage reached the announced total");
        assert_eq!(head.data(), Some(&b"ABCD"[..]));
        assert!(!head.flags().has_errors());
    }

    #[test]
    fn test_delete_returns_buffer_only_when_complete() {
        let mut table = FragmentTable::new();
        fragment_add(b"AB", 0, &ctx(1), 3, &mut table, 0, 2, true);
        assert_eq!(fragment_delete(&ctx(1), 3, &mut table), None);
        assert!(table.is_empty());

        fragment_add(b"ABCD", 0, &ctx(2), 3, &mut table, 0, 4, false);
        assert_eq!(fragment_delete(&ctx(2), 3, &mut table), Some(b"ABCD".to_vec()));
        assert!(table.is_empty());
    }

    #[test]
    fn test_partial_reassembly_through_public_api() {
        let mut table = FragmentTable::new();
        fragment_add(b"ABCD", 0, &ctx(1), 3, &mut table, 0, 4, false);
        assert!(fragment_get(&ctx(1), 3, &table).unwrap().is_defragmented());

        fragment_set_partial_reassembly(&ctx(1), 3, &mut table);
        let head = fragment_add(b"EF", 0, &ctx(2), 3, &mut table, 4, 2, false)
            .expect("extension should recomplete");
        assert_eq!(head.data(), Some(&b"ABCDEF"[..]));
        assert!(!head.flags().contains(FragmentFlags::OVERLAP));
    }
}
