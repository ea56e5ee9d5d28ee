//! Conversation keys and per-packet dissection context.

use bytes::Bytes;

/// Per-packet context handed to every engine operation by the calling
/// dissector.
///
/// Dissection may run in two passes over the same captured data; `visited`
/// marks the second (random-access) pass, in which the `_check` operation
/// family answers from the [`ReassembledTable`](crate::table::ReassembledTable)
/// instead of re-running the algorithm.
#[derive(Debug, Clone)]
pub struct PacketContext {
    /// Capture-wide packet number of the packet being dissected.
    pub frame: u32,
    /// True on the second dissection pass.
    pub visited: bool,
    /// Source endpoint identifier (opaque, protocol-agnostic bytes).
    pub src: Bytes,
    /// Destination endpoint identifier (opaque, protocol-agnostic bytes).
    pub dst: Bytes,
}

impl PacketContext {
    pub fn new(frame: u32, src: impl Into<Bytes>, dst: impl Into<Bytes>) -> Self {
        PacketContext {
            frame,
            visited: false,
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// Same packet on the second dissection pass.
    pub fn visited(mut self) -> Self {
        self.visited = true;
        self
    }
}

/// Identifies one reassembly conversation: source endpoint, destination
/// endpoint, and the numeric reassembly id chosen by the dissector.
///
/// The key owns independent copies of both endpoint identifiers so it
/// outlives the packet that triggered its creation. Equality and hashing are
/// structural over all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    src: Bytes,
    dst: Bytes,
    id: u32,
}

impl FragmentKey {
    /// Builds the conversation key for `pinfo`'s endpoints and `id`.
    pub fn from_packet(pinfo: &PacketContext, id: u32) -> Self {
        FragmentKey {
            src: pinfo.src.clone(),
            dst: pinfo.dst.clone(),
            id,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}
