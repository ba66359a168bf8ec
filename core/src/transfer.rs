//! Buffered transfer engine: moves bytes between caller grants and the
//! pipe node behind each socket.
//!
//! Both directions return `Poll::Pending` where the call would block.  In
//! probe mode nothing is moved, no peer is woken and no sticky error is
//! consumed; the result only says what a real call would do.  Parking the
//! caller is left to the scheduler.

use core::task::Poll;

use udsd_abi::{IoGrant, PIPE_BUF, SelectOps, SlotId, SockMode, SockType, UdsError, UdsResult};
use udsd_lib::klog_error;
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::table::Suspended;

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn perform_read(
        &mut self,
        slot: SlotId,
        len: usize,
        grant: IoGrant,
        probe: bool,
    ) -> UdsResult<Poll<usize>> {
        if len == 0 {
            return Ok(Poll::Ready(0));
        }

        let fd = self.table.in_use(slot)?;
        if !fd.mode.contains(SockMode::READ) {
            return Err(UdsError::BrokenPipe);
        }
        let peer = fd.peer;
        let (pos, size, node) = (fd.pos, fd.size, fd.node);

        if size == 0 {
            if peer.is_none() && fd.is_connection_oriented() {
                return Err(self.table[slot].sticky_or(UdsError::NotConnected, probe));
            }
            if let Some(peer) = peer {
                if !self.table[peer].mode.contains(SockMode::WRITE) {
                    return Ok(Poll::Ready(0));
                }
            }
            if probe {
                return Ok(Poll::Pending);
            }
            if let Some(peer) = peer {
                self.wake_if(peer, Suspended::Write);
            }
            return Ok(Poll::Pending);
        }

        let want = len.min(size);
        if probe {
            return Ok(Poll::Ready(want));
        }

        let node = node.ok_or(UdsError::InvalidHandle)?;
        let read = self
            .store
            .read_bytes(node, pos, grant, want)
            .map_err(|err| {
                klog_error!("uds: {} read of {} bytes failed: {}", slot, want, err);
                UdsError::from(err)
            })?;

        let fd = &mut self.table[slot];
        if fd.sock_type == Some(SockType::Dgram) {
            // One packet per receive; any unread tail is discarded.
            fd.size = 0;
        } else {
            fd.pos += read;
            fd.size -= read;
        }
        if fd.size == 0 {
            fd.pos = 0;
        }
        let drained = fd.size == 0;

        if let Some(peer) = peer {
            self.wake_if(peer, Suspended::Write);
            if drained {
                self.notify_select(peer, SelectOps::WRITE);
            }
        }
        Ok(Poll::Ready(read))
    }

    pub fn perform_write(
        &mut self,
        slot: SlotId,
        len: usize,
        grant: IoGrant,
        probe: bool,
    ) -> UdsResult<Poll<usize>> {
        if len == 0 {
            return Ok(Poll::Ready(0));
        }

        let fd = self.table.in_use(slot)?;
        if !fd.mode.contains(SockMode::WRITE) {
            return Err(UdsError::BrokenPipe);
        }
        if len > PIPE_BUF {
            return Err(UdsError::MessageTooLarge);
        }
        let (sock_type, peer, source) = (fd.sock_type, fd.peer, fd.addr);

        let dest = match sock_type {
            Some(SockType::Dgram) => match self.resolve_target(slot) {
                Some(dest) => dest,
                None if probe => return Ok(Poll::Pending),
                None => return Err(UdsError::AddrNotFound),
            },
            Some(_) => match peer {
                Some(peer) => peer,
                None => return Err(self.table[slot].sticky_or(UdsError::NotConnected, probe)),
            },
            None => return Err(UdsError::NotConnected),
        };

        let target = &self.table[dest];
        if !target.mode.contains(SockMode::READ) {
            return Err(UdsError::BrokenPipe);
        }
        let (offset, queued, node) = (target.pos + target.size, target.size, target.node);
        if sock_type == Some(SockType::Dgram) && queued > 0 {
            // Single-packet mailbox already full: drop, report success.
            return Ok(Poll::Ready(len));
        }
        let no_room = offset + len > PIPE_BUF;
        let seq_busy = sock_type == Some(SockType::SeqPacket) && queued > 0;
        if no_room || seq_busy {
            if !probe {
                self.wake_if(dest, Suspended::Read);
            }
            return Ok(Poll::Pending);
        }
        if probe {
            return Ok(Poll::Ready(len));
        }

        let node = node.ok_or(UdsError::InvalidHandle)?;
        let written = self
            .store
            .write_bytes(node, offset, grant, len)
            .map_err(|err| {
                klog_error!("uds: {} write of {} bytes to {} failed: {}", slot, len, dest, err);
                UdsError::from(err)
            })?;

        let target = &mut self.table[dest];
        target.size += written;
        if sock_type == Some(SockType::Dgram) {
            target.source = source;
        }

        self.wake_if(dest, Suspended::Read);
        if written > 0 {
            self.notify_select(dest, SelectOps::READ);
        }
        Ok(Poll::Ready(written))
    }
}
