//! Reassembly session tables.
//!
//! The [`FragmentTable`] holds every in-progress reassembly, keyed by
//! conversation. The [`ReassembledTable`] caches completed reassemblies
//! keyed per packet, so a second dissection pass over the same capture
//! resolves any contributing packet to its finished PDU in O(1) without
//! re-running the algorithm. Both tables own everything they hold; flushing
//! or dropping a table releases all lists, entries, and key copies.

use std::collections::HashMap;

use crate::key::{FragmentKey, PacketContext};
use crate::list::{AddressingMode, FragmentList};

/// All in-progress reassemblies of a session, keyed by conversation.
#[derive(Debug, Default)]
pub struct FragmentTable {
    map: HashMap<FragmentKey, FragmentList>,
}

impl FragmentTable {
    pub fn new() -> Self {
        FragmentTable {
            map: HashMap::new(),
        }
    }

    /// Flushes the table for reuse, releasing every fragment list it held.
    /// Idempotent; a fresh table stays fresh.
    pub fn init(&mut self) {
        self.map.clear();
    }

    /// Number of in-progress reassemblies.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up the conversation for `pinfo`'s endpoints and `id`.
    pub fn lookup(&self, pinfo: &PacketContext, id: u32) -> Option<&FragmentList> {
        self.map.get(&FragmentKey::from_packet(pinfo, id))
    }

    pub fn insert(&mut self, key: FragmentKey, list: FragmentList) {
        self.map.insert(key, list);
    }

    /// Removes the conversation, handing the list back to the caller.
    pub fn remove(&mut self, pinfo: &PacketContext, id: u32) -> Option<FragmentList> {
        self.map.remove(&FragmentKey::from_packet(pinfo, id))
    }

    pub(crate) fn get(&self, key: &FragmentKey) -> Option<&FragmentList> {
        self.map.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &FragmentKey) -> Option<&mut FragmentList> {
        self.map.get_mut(key)
    }

    pub(crate) fn remove_key(&mut self, key: &FragmentKey) -> Option<FragmentList> {
        self.map.remove(key)
    }

    pub(crate) fn entry_or_insert(
        &mut self,
        key: FragmentKey,
        mode: AddressingMode,
    ) -> &mut FragmentList {
        self.map.entry(key).or_insert_with(|| FragmentList::new(mode))
    }
}

/// Completed reassemblies, keyed per packet for idempotent re-dissection.
///
/// A completed list is transplanted here from the [`FragmentTable`] by the
/// `_check` operation family. Every frame that contributed a fragment is
/// registered alongside the completing frame, so on the second pass any
/// packet of the set resolves to the same head.
#[derive(Debug, Default)]
pub struct ReassembledTable {
    /// Canonical storage: (completing frame, reassembly id) -> list.
    lists: HashMap<(u32, u32), FragmentList>,
    /// (contributing frame, reassembly id) -> canonical key.
    by_frame: HashMap<(u32, u32), (u32, u32)>,
}

impl ReassembledTable {
    pub fn new() -> Self {
        ReassembledTable {
            lists: HashMap::new(),
            by_frame: HashMap::new(),
        }
    }

    /// Flushes the cache for reuse. Idempotent.
    pub fn init(&mut self) {
        self.lists.clear();
        self.by_frame.clear();
    }

    /// Number of completed reassemblies held.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Resolves a packet to the completed reassembly it contributed to.
    pub fn lookup(&self, frame: u32, id: u32) -> Option<&FragmentList> {
        let canonical = self.by_frame.get(&(frame, id))?;
        self.lists.get(canonical)
    }

    /// Registers a completed list under every contributing frame and the
    /// completing frame. Lists that never completed are not cacheable and
    /// are ignored.
    pub fn insert(&mut self, id: u32, list: FragmentList) {
        let Some(completed_in) = list.reassembled_in() else {
            return;
        };
        let canonical = (completed_in, id);
        for entry in list.entries() {
            self.by_frame.insert((entry.frame, id), canonical);
        }
        self.by_frame.insert(canonical, canonical);
        self.lists.insert(canonical, list);
    }
}
