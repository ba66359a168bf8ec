//! Connection-oriented protocol (stream and seqpacket) and socket options.
//!
//! A server goes unbound -> bound -> listening.  A client goes
//! unconnected -> queued in a listener's backlog -> connected.  Accept is
//! issued on a freshly opened slot that becomes the server side of the
//! connection.

use core::task::Poll;

use udsd_abi::{
    PIPE_BUF, SelectOps, ShutdownHow, SlotId, SockAddrUn, SockType, UDS_SOMAXCONN, Ucred,
    UdsError, UdsResult,
};
use udsd_lib::{klog_debug, klog_warn};
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::table::Suspended;

/// Address both ends of a socketpair report.
const SOCKETPAIR_ADDR: &[u8] = b"X";

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn set_type(&mut self, slot: SlotId, raw: i32) -> UdsResult<()> {
        let fd = self.table.in_use_mut(slot)?;
        let sock_type = SockType::from_raw(raw).ok_or(UdsError::InvalidArgument)?;
        if fd.sock_type.is_some() {
            return Err(UdsError::InvalidArgument);
        }
        fd.sock_type = Some(sock_type);
        Ok(())
    }

    pub fn bind(&mut self, slot: SlotId, addr: &SockAddrUn) -> UdsResult<()> {
        let fd = self.table.in_use(slot)?;
        let sock_type = fd.sock_type.ok_or(UdsError::InvalidArgument)?;
        if fd.addr.is_unix() && sock_type != SockType::Dgram {
            return Err(UdsError::InvalidArgument);
        }
        if !addr.is_unix() {
            return Err(UdsError::AfNotSupported);
        }
        if !addr.has_path() {
            return Err(UdsError::AddrNotFound);
        }
        let taken = self
            .table
            .iter_in_use()
            .any(|(id, other)| id != slot && other.sock_type == Some(sock_type) && other.addr == *addr);
        if taken {
            return Err(UdsError::AddrInUse);
        }
        self.table[slot].addr = *addr;
        klog_debug!("uds: {} bound to {}", slot, addr);
        Ok(())
    }

    pub fn listen(&mut self, slot: SlotId, backlog: i32) -> UdsResult<()> {
        let fd = self.table.in_use_mut(slot)?;
        let sock_type = fd.sock_type.ok_or(UdsError::InvalidArgument)?;
        if !fd.addr.is_unix() {
            return Err(UdsError::InvalidArgument);
        }
        if !sock_type.is_connection_oriented() {
            return Err(UdsError::NotSupported);
        }
        if fd.peer.is_some() {
            return Err(UdsError::AlreadyConnected);
        }

        let wanted = match usize::try_from(backlog) {
            Ok(n) if n < UDS_SOMAXCONN => n,
            _ => UDS_SOMAXCONN,
        };
        if !fd.listening {
            fd.backlog.set_capacity(wanted);
            fd.listening = true;
        } else if wanted > fd.backlog.capacity() {
            fd.backlog.set_capacity(wanted);
        }
        klog_debug!("uds: {} listening, backlog {}", slot, fd.backlog.capacity());
        Ok(())
    }

    /// Queue `slot` on the listener bound to `addr`, or link it straight to
    /// an accept already parked there.
    pub fn connect(&mut self, slot: SlotId, addr: &SockAddrUn) -> UdsResult<Poll<()>> {
        let fd = self.table.in_use(slot)?;
        let sock_type = match fd.sock_type {
            Some(t) if t.is_connection_oriented() => t,
            _ => return Err(UdsError::InvalidArgument),
        };
        if fd.peer.is_some() {
            return Err(UdsError::AlreadyConnected);
        }
        if !addr.is_unix() {
            return Err(UdsError::AfNotSupported);
        }
        if !addr.has_path() {
            return Err(UdsError::AddrNotFound);
        }

        // Each type has its own namespace; another type's listener only
        // changes the error.
        let mut server = None;
        let mut other_type = false;
        for (id, other) in self.table.iter_in_use() {
            if id == slot || !other.listening || other.addr != *addr {
                continue;
            }
            if other.sock_type == Some(sock_type) {
                server = Some(id);
                break;
            }
            other_type = true;
        }
        let server = match server {
            Some(id) => id,
            None if other_type => return Err(UdsError::ProtocolType),
            None => return Err(UdsError::AddrNotFound),
        };

        if let Some(child) = self.table[server].child.take() {
            self.table.link(slot, child);
            self.table[slot].addr = *addr;
            self.table[child].addr = *addr;
            self.wake_if(child, Suspended::Accept);
            klog_debug!("uds: {} connected to {} via {}", slot, child, server);
            return Ok(Poll::Ready(()));
        }

        if !self.table[server].backlog.push(slot) {
            klog_warn!("uds: {} backlog full, refusing {}", server, slot);
            return Err(UdsError::ConnRefused);
        }
        self.table[slot].addr = *addr;
        self.notify_select(server, SelectOps::READ);
        klog_debug!("uds: {} queued on {}", slot, server);
        Ok(Poll::Pending)
    }

    /// Take the oldest queued client of `listener` onto `slot`.
    pub fn accept(&mut self, slot: SlotId, listener: SlotId) -> UdsResult<Poll<SlotId>> {
        if listener == slot {
            return Err(UdsError::InvalidArgument);
        }
        let server = self
            .table
            .in_use(listener)
            .ok()
            .filter(|fd| fd.listening)
            .ok_or(UdsError::InvalidArgument)?;
        let (server_type, server_addr) = (server.sock_type, server.addr);
        if server.child.is_some_and(|child| child != slot) {
            return Err(UdsError::InvalidArgument);
        }

        let fd = self.table.in_use_mut(slot)?;
        if fd.peer.is_some() {
            return Err(UdsError::AlreadyConnected);
        }
        if fd.sock_type.is_some() && fd.sock_type != server_type {
            return Err(UdsError::ProtocolType);
        }
        fd.sock_type = server_type;

        let Some(client) = self.table[listener].backlog.pop_front() else {
            self.table[listener].child = Some(slot);
            return Ok(Poll::Pending);
        };

        self.table[listener].child = None;
        self.table.link(slot, client);
        self.table[slot].addr = server_addr;
        self.table[client].addr = server_addr;
        self.wake_if(client, Suspended::Connect);
        klog_debug!("uds: {} accepted {} on {}", listener, client, slot);
        Ok(Poll::Ready(slot))
    }

    pub fn shutdown(&mut self, slot: SlotId, how: i32) -> UdsResult<()> {
        let fd = self.table.in_use_mut(slot)?;
        if fd.is_connection_oriented() && fd.peer.is_none() {
            return Err(fd.sticky_or(UdsError::NotConnected, false));
        }
        let how = ShutdownHow::from_raw(how).ok_or(UdsError::InvalidArgument)?;
        fd.mode.remove(how.cleared());
        let peer = fd.peer;

        if let Some(peer) = peer {
            self.wake_parked(peer);
            let mut ops = SelectOps::empty();
            if how != ShutdownHow::Read {
                ops |= SelectOps::READ;
            }
            if how != ShutdownHow::Write {
                ops |= SelectOps::WRITE;
            }
            self.notify_select(peer, ops);
        }
        Ok(())
    }

    pub fn socketpair(&mut self, slot: SlotId, other: SlotId) -> UdsResult<()> {
        if other == slot {
            return Err(UdsError::InvalidArgument);
        }
        let a = self.table.in_use(slot)?;
        let b = self
            .table
            .in_use(other)
            .map_err(|_| UdsError::InvalidArgument)?;
        let (Some(a_type), Some(b_type)) = (a.sock_type, b.sock_type) else {
            return Err(UdsError::InvalidArgument);
        };
        if a_type != b_type {
            return Err(UdsError::ProtocolType);
        }
        if !a_type.is_connection_oriented() {
            return Err(UdsError::NotSupported);
        }
        if a.peer.is_some() || b.peer.is_some() {
            return Err(UdsError::AlreadyConnected);
        }

        let addr = SockAddrUn::new(SOCKETPAIR_ADDR).ok_or(UdsError::InvalidArgument)?;
        self.table.link(slot, other);
        self.table[slot].addr = addr;
        self.table[other].addr = addr;
        klog_debug!("uds: socketpair {} <-> {}", slot, other);
        Ok(())
    }

    pub fn getsockname(&self, slot: SlotId) -> UdsResult<SockAddrUn> {
        Ok(self.table.in_use(slot)?.addr)
    }

    pub fn getpeername(&mut self, slot: SlotId) -> UdsResult<SockAddrUn> {
        match self.table.in_use(slot)?.peer {
            Some(peer) => Ok(self.table[peer].addr),
            None => Err(self.table[slot].sticky_or(UdsError::NotConnected, false)),
        }
    }

    pub fn get_so_type(&self, slot: SlotId) -> UdsResult<SockType> {
        self.table
            .in_use(slot)?
            .sock_type
            .ok_or(UdsError::InvalidArgument)
    }

    pub fn get_peer_cred(&mut self, slot: SlotId) -> UdsResult<Ucred> {
        match self.table.in_use(slot)?.peer {
            Some(peer) => Ok(self.table[peer].owner_cred),
            None => Err(self.table[slot].sticky_or(UdsError::NotConnected, false)),
        }
    }

    /// `SO_SNDBUF` / `SO_RCVBUF`: fixed at the pipe capacity.
    pub fn buf_size(&self, slot: SlotId) -> UdsResult<usize> {
        self.table.in_use(slot)?;
        Ok(PIPE_BUF)
    }

    /// Sizes up to the pipe capacity are accepted and ignored.
    pub fn set_buf_size(&self, slot: SlotId, size: usize) -> UdsResult<()> {
        self.table.in_use(slot)?;
        if size > PIPE_BUF {
            return Err(UdsError::NoSys);
        }
        Ok(())
    }

    // =========================================================================
    // Reference scrubbing shared by close and cancel
    // =========================================================================

    /// Drop `slot` from every listener's backlog.
    pub(crate) fn remove_from_backlogs(&mut self, slot: SlotId) {
        for (id, fd) in self.table.iter_in_use_mut() {
            if fd.listening && fd.backlog.remove(slot) {
                klog_debug!("uds: {} withdrawn from {} backlog", slot, id);
            }
        }
    }

    /// Clear every listener's `child` pointer naming `slot`.
    pub(crate) fn scrub_child(&mut self, slot: SlotId) {
        for (_, fd) in self.table.iter_in_use_mut() {
            if fd.child == Some(slot) {
                fd.child = None;
            }
        }
    }
}
