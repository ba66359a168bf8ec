//! Cancellation of an in-flight call.
//!
//! Only connect and accept leave partial state behind; every other call is
//! atomic.  A cancel always answers `Interrupted`.

use udsd_abi::{Caller, IoGrant, IoctlCode, SlotId, SockAddrUn, UdsError};
use udsd_lib::klog_debug;
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::proto::Reply;
use crate::table::{CallKind, SelectState, Suspended};

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn cancel(&mut self, slot: SlotId, caller: Caller) -> Reply {
        let Ok(fd) = self.table.in_use_mut(slot) else {
            klog_debug!("uds: cancel on unused {}", slot);
            return Reply::Task {
                to: caller.endpoint,
                grant: IoGrant::NONE,
                slot,
                result: Err(UdsError::Interrupted),
            };
        };

        fd.endpoint = caller.endpoint;
        fd.select = SelectState::default();
        let parked = core::mem::replace(&mut fd.suspended, Suspended::None);
        fd.ready_to_revive = false;
        let grant = fd.grant;
        let track = fd.track;
        let linked = fd.peer.is_some();

        if !track.complete {
            match (track.call, track.ioctl) {
                (CallKind::Ioctl, Some(IoctlCode::Accept)) if !linked => {
                    self.scrub_child(slot);
                    self.table[slot].pending_error = None;
                }
                (CallKind::Ioctl, Some(IoctlCode::Connect)) if !linked => {
                    self.remove_from_backlogs(slot);
                    let fd = &mut self.table[slot];
                    fd.addr = SockAddrUn::unspecified();
                    // A refusal or reset planted while parked dies with the call.
                    fd.pending_error = None;
                }
                _ => {}
            }
            self.table[slot].track.complete = true;
        }
        klog_debug!("uds: {} cancelled ({:?}, parked {:?})", slot, track.call, parked);

        Reply::Task {
            to: caller.endpoint,
            grant,
            slot,
            result: Err(UdsError::Interrupted),
        }
    }
}
