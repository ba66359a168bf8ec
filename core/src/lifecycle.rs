//! Socket lifecycle: open reserves a slot and its pipe node, close tears
//! down every reference to the slot before freeing it.

use udsd_abi::{Caller, SelectOps, SlotId, UdsError, UdsResult};
use udsd_lib::{klog_debug, klog_error};
use udsd_pipefs::{NodeMode, PipeStore};

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::table::{CallKind, CallTrack};

/// Permission bits of the pipe node behind every socket.
const NODE_PERMS: u16 = 0o777;

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn open(&mut self, caller: Caller) -> UdsResult<SlotId> {
        let slot = self.table.alloc().ok_or(UdsError::OutOfSlots)?;
        let fd = &mut self.table[slot];
        fd.owner = caller.endpoint;
        fd.owner_cred = caller.cred;
        fd.endpoint = caller.endpoint;
        fd.track = CallTrack::started(CallKind::Open, None);

        let mode = NodeMode::named_pipe(NODE_PERMS);
        match self.store.create_node(mode, caller.cred.uid, caller.cred.gid) {
            Ok(node) => {
                let fd = &mut self.table[slot];
                fd.node = Some(node);
                fd.track.complete = true;
                klog_debug!("uds: open {} for {} on {}", slot, caller.endpoint, node);
                Ok(slot)
            }
            Err(err) => {
                klog_error!("uds: open for {} failed to create node: {}", caller.endpoint, err);
                self.table.release(slot);
                Err(err.into())
            }
        }
    }

    pub fn close(&mut self, slot: SlotId) -> UdsResult<()> {
        let fd = self.table.in_use_mut(slot)?;
        let peer = fd.peer.take();
        let child = fd.child.take();
        let queued = fd.backlog.drain();
        klog_debug!("uds: close {}", slot);

        if let Some(peer) = peer {
            let other = &mut self.table[peer];
            other.peer = None;
            other.pending_error = Some(UdsError::ConnReset);
            self.wake_parked(peer);
            self.notify_select(peer, SelectOps::READ | SelectOps::WRITE);
        }

        self.remove_from_backlogs(slot);
        self.scrub_child(slot);

        for client in queued {
            self.table[client].pending_error = Some(UdsError::ConnRefused);
            self.wake_parked(client);
        }
        if let Some(child) = child {
            self.table[child].pending_error = Some(UdsError::ConnReset);
            self.wake_parked(child);
        }

        self.clear_ancillary(slot);
        let node = self.table[slot].node.take();
        self.table.release(slot);

        if let Some(node) = node {
            self.store.remove_node(node).map_err(|err| {
                klog_error!("uds: close {} failed to remove {}: {}", slot, node, err);
                UdsError::from(err)
            })?;
        }
        Ok(())
    }
}
