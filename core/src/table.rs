//! Descriptor table: one `UdsFd` per slot in an owned arena.
//!
//! Cross-socket references (`peer`, `child`, backlog entries) are plain
//! [`SlotId`]s into the same arena.  A slot is only ever freed by close,
//! which scrubs every reference to it first.

use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use udsd_abi::{
    Endpoint, IoGrant, IoctlCode, SelectOps, SlotId, SockAddrUn, SockMode, SockType, UDS_SOMAXCONN,
    Ucred, UdsError, UdsResult,
};
use udsd_pipefs::NodeId;

use crate::ancillary::InFlight;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotState {
    Free,
    InUse,
}

/// Which blocking operation a slot is parked on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Suspended {
    None,
    Read,
    Write,
    Connect,
    Accept,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CallKind {
    None,
    Open,
    Close,
    Read,
    Write,
    Ioctl,
}

/// Pending connections of a listening socket, oldest first.
#[derive(Clone, Copy, Debug)]
pub struct Backlog {
    entries: [Option<SlotId>; UDS_SOMAXCONN],
    len: usize,
    capacity: usize,
}

impl Backlog {
    pub const fn new() -> Self {
        Self {
            entries: [None; UDS_SOMAXCONN],
            len: 0,
            capacity: UDS_SOMAXCONN,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.min(UDS_SOMAXCONN);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn push(&mut self, slot: SlotId) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries[self.len] = Some(slot);
        self.len += 1;
        true
    }

    pub fn pop_front(&mut self) -> Option<SlotId> {
        let head = self.entries[..self.len].first().copied().flatten()?;
        self.entries.copy_within(1..self.len, 0);
        self.len -= 1;
        self.entries[self.len] = None;
        Some(head)
    }

    /// Drop `slot` from the queue, keeping the order of the rest.
    pub fn remove(&mut self, slot: SlotId) -> bool {
        let Some(idx) = self.iter().position(|s| s == slot) else {
            return false;
        };
        self.entries.copy_within(idx + 1..self.len, idx);
        self.len -= 1;
        self.entries[self.len] = None;
        true
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.iter().any(|s| s == slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.entries[..self.len].iter().flatten().copied()
    }

    pub fn drain(&mut self) -> Vec<SlotId> {
        let out = self.iter().collect();
        self.entries = [None; UDS_SOMAXCONN];
        self.len = 0;
        out
    }
}

impl Default for Backlog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SelectState {
    pub selecting: bool,
    pub select_proc: Endpoint,
    pub ops_in: SelectOps,
    pub ops_out: SelectOps,
    pub status_updated: bool,
}

/// Bookkeeping for the call currently in flight, consulted by cancel.
#[derive(Clone, Copy, Debug)]
pub struct CallTrack {
    pub call: CallKind,
    pub ioctl: Option<IoctlCode>,
    pub complete: bool,
}

impl CallTrack {
    pub const fn idle() -> Self {
        Self {
            call: CallKind::None,
            ioctl: None,
            complete: true,
        }
    }

    pub const fn started(call: CallKind, ioctl: Option<IoctlCode>) -> Self {
        Self {
            call,
            ioctl,
            complete: false,
        }
    }
}

#[derive(Debug)]
pub struct UdsFd {
    pub state: SlotState,
    pub owner: Endpoint,
    pub owner_cred: Ucred,
    /// Where the reply for the in-flight call goes.
    pub endpoint: Endpoint,
    pub sock_type: Option<SockType>,
    pub mode: SockMode,
    pub node: Option<NodeId>,
    pub pos: usize,
    pub size: usize,
    pub peer: Option<SlotId>,
    pub addr: SockAddrUn,
    pub target: SockAddrUn,
    pub source: SockAddrUn,
    pub listening: bool,
    pub backlog: Backlog,
    /// Accepting slot parked on this listener.
    pub child: Option<SlotId>,
    pub suspended: Suspended,
    pub ready_to_revive: bool,
    pub grant: IoGrant,
    pub io_len: usize,
    pub select: SelectState,
    pub track: CallTrack,
    pub ancillary: InFlight,
    pub pending_error: Option<UdsError>,
}

impl UdsFd {
    pub fn free() -> Self {
        Self {
            state: SlotState::Free,
            owner: Endpoint::default(),
            owner_cred: Ucred::default(),
            endpoint: Endpoint::default(),
            sock_type: None,
            mode: SockMode::default(),
            node: None,
            pos: 0,
            size: 0,
            peer: None,
            addr: SockAddrUn::unspecified(),
            target: SockAddrUn::unspecified(),
            source: SockAddrUn::unspecified(),
            listening: false,
            backlog: Backlog::new(),
            child: None,
            suspended: Suspended::None,
            ready_to_revive: false,
            grant: IoGrant::NONE,
            io_len: 0,
            select: SelectState::default(),
            track: CallTrack::idle(),
            ancillary: InFlight::new(),
            pending_error: None,
        }
    }

    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.state == SlotState::InUse
    }

    #[inline]
    pub fn is_connection_oriented(&self) -> bool {
        self.sock_type.is_some_and(SockType::is_connection_oriented)
    }

    #[inline]
    pub fn is_dgram(&self) -> bool {
        self.sock_type == Some(SockType::Dgram)
    }

    /// The sticky error if one is pending, else `fallback`.  Probing never
    /// consumes the sticky error.
    pub fn sticky_or(&mut self, fallback: UdsError, probe: bool) -> UdsError {
        match self.pending_error {
            Some(err) => {
                if !probe {
                    self.pending_error = None;
                }
                err
            }
            None => fallback,
        }
    }

    /// True when the slot carries nothing but its free-state defaults.
    pub fn is_pristine(&self) -> bool {
        self.state == SlotState::Free
            && self.node.is_none()
            && self.peer.is_none()
            && self.child.is_none()
            && self.backlog.is_empty()
            && self.suspended == Suspended::None
            && self.size == 0
            && self.pos == 0
            && self.ancillary.is_empty()
            && self.pending_error.is_none()
            && !self.select.selecting
    }
}

pub struct SlotTable {
    slots: Vec<UdsFd>,
}

impl SlotTable {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots).map(|_| UdsFd::free()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: SlotId) -> Option<&UdsFd> {
        self.slots.get(slot.index())
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut UdsFd> {
        self.slots.get_mut(slot.index())
    }

    /// An in-use socket slot; the control slot and free slots are rejected.
    pub fn in_use(&self, slot: SlotId) -> UdsResult<&UdsFd> {
        if slot.is_control() {
            return Err(UdsError::InvalidHandle);
        }
        self.get(slot)
            .filter(|fd| fd.is_in_use())
            .ok_or(UdsError::InvalidHandle)
    }

    pub fn in_use_mut(&mut self, slot: SlotId) -> UdsResult<&mut UdsFd> {
        if slot.is_control() {
            return Err(UdsError::InvalidHandle);
        }
        self.get_mut(slot)
            .filter(|fd| fd.is_in_use())
            .ok_or(UdsError::InvalidHandle)
    }

    /// Reserve the lowest free slot above the control slot.
    pub fn alloc(&mut self) -> Option<SlotId> {
        let idx = self.slots.iter().skip(1).position(|fd| !fd.is_in_use())? + 1;
        let fd = &mut self.slots[idx];
        *fd = UdsFd::free();
        fd.state = SlotState::InUse;
        Some(SlotId(idx))
    }

    pub fn release(&mut self, slot: SlotId) {
        if let Some(fd) = self.slots.get_mut(slot.index()) {
            *fd = UdsFd::free();
        }
    }

    pub fn iter_in_use(&self) -> impl Iterator<Item = (SlotId, &UdsFd)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, fd)| fd.is_in_use())
            .map(|(i, fd)| (SlotId(i), fd))
    }

    pub fn iter_in_use_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut UdsFd)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .skip(1)
            .filter(|(_, fd)| fd.is_in_use())
            .map(|(i, fd)| (SlotId(i), fd))
    }

    pub fn in_use_count(&self) -> usize {
        self.iter_in_use().count()
    }

    pub fn is_pristine(&self) -> bool {
        self.slots.iter().all(UdsFd::is_pristine)
    }

    /// Point two slots at each other.
    pub fn link(&mut self, a: SlotId, b: SlotId) {
        self[a].peer = Some(b);
        self[b].peer = Some(a);
    }
}

impl Index<SlotId> for SlotTable {
    type Output = UdsFd;

    fn index(&self, slot: SlotId) -> &UdsFd {
        &self.slots[slot.index()]
    }
}

impl IndexMut<SlotId> for SlotTable {
    fn index_mut(&mut self, slot: SlotId) -> &mut UdsFd {
        &mut self.slots[slot.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_is_fifo_and_bounded() {
        let mut backlog = Backlog::new();
        backlog.set_capacity(3);
        assert!(backlog.push(SlotId(4)));
        assert!(backlog.push(SlotId(2)));
        assert!(backlog.push(SlotId(9)));
        assert!(!backlog.push(SlotId(5)));
        assert_eq!(backlog.pop_front(), Some(SlotId(4)));
        assert_eq!(backlog.pop_front(), Some(SlotId(2)));
        assert!(backlog.push(SlotId(5)));
        assert_eq!(backlog.drain(), [SlotId(9), SlotId(5)]);
        assert!(backlog.is_empty());
        assert_eq!(backlog.pop_front(), None);
    }

    #[test]
    fn test_backlog_remove_keeps_order() {
        let mut backlog = Backlog::new();
        for i in 1..=4 {
            backlog.push(SlotId(i));
        }
        assert!(backlog.remove(SlotId(2)));
        assert!(!backlog.remove(SlotId(2)));
        assert!(!backlog.contains(SlotId(2)));
        assert_eq!(backlog.iter().collect::<Vec<_>>(), [SlotId(1), SlotId(3), SlotId(4)]);
        assert_eq!(backlog.len(), 3);
    }

    #[test]
    fn test_alloc_skips_control_slot() {
        let mut table = SlotTable::new(3);
        assert_eq!(table.alloc(), Some(SlotId(1)));
        assert_eq!(table.alloc(), Some(SlotId(2)));
        assert_eq!(table.alloc(), None);
        assert_eq!(table.in_use(SlotId::CONTROL).err(), Some(UdsError::InvalidHandle));
        table.release(SlotId(1));
        assert_eq!(table.in_use(SlotId(1)).err(), Some(UdsError::InvalidHandle));
        assert_eq!(table.in_use(SlotId(7)).err(), Some(UdsError::InvalidHandle));
        assert_eq!(table.alloc(), Some(SlotId(1)));
    }

    #[test]
    fn test_sticky_error_survives_probe() {
        let mut fd = UdsFd::free();
        fd.pending_error = Some(UdsError::ConnReset);
        assert_eq!(fd.sticky_or(UdsError::NotConnected, true), UdsError::ConnReset);
        assert_eq!(fd.sticky_or(UdsError::NotConnected, false), UdsError::ConnReset);
        assert_eq!(fd.sticky_or(UdsError::NotConnected, false), UdsError::NotConnected);
    }
}
