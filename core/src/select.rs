//! Readiness engine.
//!
//! `select` answers immediately from probe-mode transfers.  The socket
//! stays registered afterwards, so a later state change that satisfies an
//! interest bit not yet reported queues an out-of-band notification.

use core::task::Poll;

use udsd_abi::{Caller, IoGrant, PIPE_BUF, SelectOps, SlotId, UdsResult};
use udsd_lib::klog_trace;
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::table::SelectState;

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn select(&mut self, slot: SlotId, ops: SelectOps, caller: Caller) -> UdsResult<SelectOps> {
        let fd = self.table.in_use_mut(slot)?;
        fd.select = SelectState {
            selecting: true,
            select_proc: caller.endpoint,
            ops_in: ops,
            ops_out: SelectOps::empty(),
            status_updated: false,
        };
        let ready = self.probe_ready(slot);
        let fd = &mut self.table[slot];
        fd.select.ops_out = ready & ops;
        klog_trace!("uds: {} select {:?} -> {:?}", slot, ops, fd.select.ops_out);
        Ok(fd.select.ops_out)
    }

    /// Current readiness of `slot`, without side effects.
    pub fn probe_ready(&mut self, slot: SlotId) -> SelectOps {
        let mut ready = SelectOps::empty();

        let listening = self.table.get(slot).is_some_and(|fd| fd.listening);
        let readable = if listening {
            self.table.get(slot).is_some_and(|fd| !fd.backlog.is_empty())
        } else {
            !matches!(
                self.perform_read(slot, PIPE_BUF, IoGrant::NONE, true),
                Ok(Poll::Pending)
            )
        };
        if readable {
            ready |= SelectOps::READ;
        }

        let writable = !matches!(
            self.perform_write(slot, PIPE_BUF, IoGrant::NONE, true),
            Ok(Poll::Pending) | Ok(Poll::Ready(0))
        );
        if writable {
            ready |= SelectOps::WRITE;
        }
        ready
    }

    /// Report `ops` to a selecting `slot` if any of them is wanted and has
    /// not been reported yet.
    pub(crate) fn notify_select(&mut self, slot: SlotId, ops: SelectOps) {
        let Some(fd) = self.table.get_mut(slot) else {
            return;
        };
        if !fd.is_in_use() || !fd.select.selecting {
            return;
        }
        let fresh = ops & fd.select.ops_in & !fd.select.ops_out;
        if fresh.is_empty() {
            return;
        }
        fd.select.ops_out |= fresh;
        fd.select.status_updated = true;
        self.enqueue_wake(slot);
    }
}
