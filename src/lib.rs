//! Generic fragment/segment reassembly engine
//!
//! Reconstructs a complete protocol data unit (PDU) out of multiple
//! out-of-order, possibly overlapping, possibly duplicated transport-level
//! pieces, independent of which upper-layer protocol is being dissected.
//! Features:
//! - Offset-based reassembly (byte offset into the final buffer plus a
//!   "more fragments" flag): [`fragment_add`], [`fragment_add_check`]
//! - Sequence-based reassembly (ordinal block numbers): [`fragment_add_seq`],
//!   [`fragment_add_seq_check`], [`fragment_add_seq_next`]
//! - Multi-pass dissection cache ([`ReassembledTable`]) so re-dissecting an
//!   already-visited packet is O(1) and never re-runs the algorithm
//! - Advisory flagging of suspicious input (overlaps, conflicting bytes,
//!   multiple terminal fragments, over-long fragments) instead of hard errors
//! - Diagnostic span lists for presentation ([`show_fragment_tree`],
//!   [`show_fragment_seq_tree`])
//!
//! A dissector calls one of the add operations for every observed packet and
//! gets back `None` while the PDU is incomplete, or the completed
//! [`FragmentList`] head carrying the concatenated payload once the last gap
//! closes. Everything is synchronous call-and-return; the tables live for
//! the duration of a capture/analysis session.

pub mod add;
pub mod entry;
pub mod error;
pub mod flags;
pub mod key;
pub mod list;
pub mod table;
pub mod tree;

pub use add::{
    fragment_add, fragment_add_check, fragment_add_seq, fragment_add_seq_check,
    fragment_add_seq_next, fragment_delete, fragment_get, fragment_set_partial_reassembly,
    fragment_set_tot_len,
};
pub use entry::{FragmentEntry, FragmentPayload};
pub use error::ReassemblyError;
pub use flags::FragmentFlags;
pub use key::{FragmentKey, PacketContext};
pub use list::{AddressingMode, FragmentList};
pub use table::{FragmentTable, ReassembledTable};
pub use tree::{show_fragment_seq_tree, show_fragment_tree, FragmentSpan, FragmentTree};
