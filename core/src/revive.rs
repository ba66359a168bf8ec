//! Suspend/revive scheduler.
//!
//! Operations never block.  A call that cannot finish is parked on its
//! slot with the parameters needed to retry it.  Peers that change state
//! mark the parked slot ready and queue a wake; a later `revive` retries
//! the call and either produces its withheld reply or leaves it parked.

use alloc::vec::Vec;
use core::task::Poll;

use udsd_abi::{IoGrant, SlotId, SockAddrUn, UdsResult};
use udsd_lib::{klog_debug, klog_trace};
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::proto::{Reply, ReplyValue};
use crate::table::{SelectState, Suspended};

fn settle(result: UdsResult<Poll<usize>>) -> Option<UdsResult<ReplyValue>> {
    match result {
        Ok(Poll::Pending) => None,
        Ok(Poll::Ready(n)) => Some(Ok(ReplyValue::Count(n))),
        Err(err) => Some(Err(err)),
    }
}

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub(crate) fn enqueue_wake(&mut self, slot: SlotId) {
        if !self.wakeups.contains(&slot) {
            self.wakeups.push_back(slot);
        }
    }

    /// Mark `slot` revivable if it is parked on `kind`.
    pub(crate) fn wake_if(&mut self, slot: SlotId, kind: Suspended) {
        let Some(fd) = self.table.get_mut(slot) else {
            return;
        };
        if fd.is_in_use() && fd.suspended == kind {
            fd.ready_to_revive = true;
            self.enqueue_wake(slot);
        }
    }

    /// Mark `slot` revivable whatever it is parked on.
    pub(crate) fn wake_parked(&mut self, slot: SlotId) {
        let Some(fd) = self.table.get_mut(slot) else {
            return;
        };
        if fd.is_in_use() && fd.suspended != Suspended::None {
            fd.ready_to_revive = true;
            self.enqueue_wake(slot);
        }
    }

    pub(crate) fn park(&mut self, slot: SlotId, kind: Suspended, grant: IoGrant, len: usize) {
        let fd = &mut self.table[slot];
        fd.suspended = kind;
        fd.ready_to_revive = false;
        fd.grant = grant;
        fd.io_len = len;
        klog_trace!("uds: {} parked on {:?}", slot, kind);
    }

    /// Oldest queued wake, for a transport that delivers revives itself.
    pub fn next_wakeup(&mut self) -> Option<SlotId> {
        self.wakeups.pop_front()
    }

    /// Retry whatever `slot` is waiting for.
    ///
    /// A pending readiness notification goes first; if a parked call is
    /// also ready the slot is queued again so it is retried next.
    pub fn revive(&mut self, slot: SlotId) -> Option<Reply> {
        let fd = self.table.in_use_mut(slot).ok()?;

        if fd.select.status_updated {
            let to = fd.select.select_proc;
            let ops = fd.select.ops_out;
            fd.select = SelectState::default();
            let retry = fd.ready_to_revive;
            if retry {
                self.enqueue_wake(slot);
            }
            klog_trace!("uds: {} select notify {:?}", slot, ops);
            return Some(Reply::SelectNotify { to, slot, ops });
        }

        if !fd.ready_to_revive {
            return None;
        }
        fd.ready_to_revive = false;
        let (parked, grant, len) = (fd.suspended, fd.grant, fd.io_len);

        let result = match parked {
            Suspended::None => return None,
            Suspended::Read => settle(self.perform_read(slot, len, grant, false))?,
            Suspended::Write => settle(self.perform_write(slot, len, grant, false))?,
            Suspended::Connect | Suspended::Accept => {
                let fd = &mut self.table[slot];
                if fd.peer.is_some() {
                    Ok(match parked {
                        Suspended::Accept => ReplyValue::Handle(slot),
                        _ => ReplyValue::Done,
                    })
                } else if let Some(err) = fd.pending_error.take() {
                    if parked == Suspended::Connect {
                        fd.addr = SockAddrUn::unspecified();
                    }
                    Err(err)
                } else {
                    return None;
                }
            }
        };

        let fd = &mut self.table[slot];
        fd.suspended = Suspended::None;
        fd.track.complete = true;
        klog_debug!("uds: {} revived {:?}", slot, parked);
        Some(Reply::Task {
            to: fd.endpoint,
            grant: fd.grant,
            slot,
            result,
        })
    }

    /// Drain the wake queue in-process, collecting every reply produced.
    pub fn run_revivals(&mut self) -> Vec<Reply> {
        let mut replies = Vec::new();
        while let Some(slot) = self.wakeups.pop_front() {
            if let Some(reply) = self.revive(slot) {
                replies.push(reply);
            }
        }
        replies
    }
}
