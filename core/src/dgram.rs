//! Connectionless (datagram) addressing.
//!
//! A datagram socket has no peer link.  Every send goes to whichever
//! datagram socket is bound to the current `target` at that moment.

use udsd_abi::{SlotId, SockAddrUn, SockType, UdsError, UdsResult};
use udsd_lib::klog_trace;
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    /// `sendto` destination.
    pub fn set_target(&mut self, slot: SlotId, addr: &SockAddrUn) -> UdsResult<()> {
        let fd = self.table.in_use_mut(slot)?;
        if fd.sock_type != Some(SockType::Dgram) {
            return Err(UdsError::InvalidArgument);
        }
        if !addr.is_unix() || !addr.has_path() {
            return Err(UdsError::InvalidArgument);
        }
        fd.target = *addr;
        klog_trace!("uds: {} target {}", slot, addr);
        Ok(())
    }

    /// First in-use datagram socket bound to the target of `slot`.
    pub fn resolve_target(&self, slot: SlotId) -> Option<SlotId> {
        let target = self.table.get(slot)?.target;
        if !target.is_unix() {
            return None;
        }
        self.table
            .iter_in_use()
            .find(|(_, fd)| fd.sock_type == Some(SockType::Dgram) && fd.addr == target)
            .map(|(id, _)| id)
    }

    /// `recvfrom` address: the bound address of the last sender.
    pub fn get_from(&self, slot: SlotId) -> UdsResult<SockAddrUn> {
        Ok(self.table.in_use(slot)?.source)
    }
}
