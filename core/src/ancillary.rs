//! Descriptor passing (`SCM_RIGHTS`) and sender credentials.
//!
//! Descriptors sent as control data are pinned through a
//! [`DescriptorBroker`] while in flight and parked on the destination
//! socket until the receiver collects them.

use alloc::vec::Vec;

use spin::Mutex;
use udsd_abi::{Endpoint, OPEN_MAX, SlotId, SockType, Ucred, UdsError, UdsResult};
use udsd_lib::{klog_debug, klog_warn};
use udsd_pipefs::PipeStore;

use crate::driver::UdsDriver;

/// Reference to a descriptor held in flight by the broker.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FdRef(pub u64);

/// Owner of the process descriptor tables.
pub trait DescriptorBroker: Send + Sync {
    /// Take an in-flight reference on `fd` of process `owner`.
    fn acquire(&self, owner: Endpoint, fd: i32) -> UdsResult<FdRef>;

    /// Install the referenced file into `to`, returning its new number.
    fn install(&self, fd: FdRef, to: Endpoint) -> UdsResult<i32>;

    /// Drop an in-flight reference that will never be delivered.
    fn release(&self, fd: FdRef);
}

/// Broker for embedders that do not support descriptor passing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPassing;

impl DescriptorBroker for NoPassing {
    fn acquire(&self, _owner: Endpoint, _fd: i32) -> UdsResult<FdRef> {
        Err(UdsError::NotSupported)
    }

    fn install(&self, _fd: FdRef, _to: Endpoint) -> UdsResult<i32> {
        Err(UdsError::NotSupported)
    }

    fn release(&self, _fd: FdRef) {}
}

/// Control data delivered to a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlMsg {
    pub fds: Vec<i32>,
    pub cred: Option<Ucred>,
}

/// Control data parked on a socket.
#[derive(Debug, Default)]
pub struct InFlight {
    refs: Vec<FdRef>,
    cred: Option<Ucred>,
}

impl InFlight {
    pub const fn new() -> Self {
        Self {
            refs: Vec::new(),
            cred: None,
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty() && self.cred.is_none()
    }

    pub fn take(&mut self) -> (Vec<FdRef>, Option<Ucred>) {
        (core::mem::take(&mut self.refs), self.cred.take())
    }
}

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    /// The socket control data sent from `slot` lands on.
    fn control_destination(&mut self, slot: SlotId) -> UdsResult<SlotId> {
        match self.table.in_use(slot)?.sock_type {
            Some(SockType::Dgram) => self.resolve_target(slot).ok_or(UdsError::AddrNotFound),
            Some(_) => {
                let fd = &mut self.table[slot];
                match fd.peer {
                    Some(peer) => Ok(peer),
                    None => Err(fd.sticky_or(UdsError::NotConnected, false)),
                }
            }
            None => Err(UdsError::NotConnected),
        }
    }

    pub fn send_ctrl(&mut self, slot: SlotId, fds: &[i32]) -> UdsResult<()> {
        let dest = self.control_destination(slot)?;
        if self.table[dest].ancillary.len() + fds.len() > OPEN_MAX {
            klog_warn!("uds: {} -> {} would exceed {} fds in flight", slot, dest, OPEN_MAX);
            return Err(UdsError::Overflow);
        }

        let owner = self.table[slot].owner;
        let cred = self.table[slot].owner_cred;
        let mut acquired = Vec::with_capacity(fds.len());
        for &fd in fds {
            match self.broker.acquire(owner, fd) {
                Ok(fd_ref) => acquired.push(fd_ref),
                Err(err) => {
                    for fd_ref in acquired {
                        self.broker.release(fd_ref);
                    }
                    return Err(err);
                }
            }
        }

        let parked = &mut self.table[dest].ancillary;
        parked.refs.extend(acquired);
        parked.cred = Some(cred);
        klog_debug!("uds: {} passed {} fds to {}", slot, fds.len(), dest);
        Ok(())
    }

    pub fn recv_ctrl(&mut self, slot: SlotId) -> UdsResult<ControlMsg> {
        let fd = self.table.in_use_mut(slot)?;
        let to = fd.owner;
        let (refs, cred) = fd.ancillary.take();

        let mut installed = Vec::with_capacity(refs.len());
        let mut pending = refs.into_iter();
        while let Some(fd_ref) = pending.next() {
            match self.broker.install(fd_ref, to) {
                Ok(num) => installed.push(num),
                Err(err) => {
                    klog_warn!("uds: {} failed to install passed fd: {}", slot, err);
                    self.broker.release(fd_ref);
                    for rest in pending {
                        self.broker.release(rest);
                    }
                    return Err(err);
                }
            }
        }
        Ok(ControlMsg {
            fds: installed,
            cred,
        })
    }

    /// Release every descriptor still parked on `slot`.
    pub(crate) fn clear_ancillary(&mut self, slot: SlotId) {
        let (refs, _) = self.table[slot].ancillary.take();
        for fd_ref in refs {
            self.broker.release(fd_ref);
        }
    }
}

// =============================================================================
// In-memory broker
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct HeldFd {
    fd_ref: FdRef,
    owner: Endpoint,
    fd: i32,
}

#[derive(Debug, Default)]
struct MemBrokerInner {
    next_ref: u64,
    next_fd: i32,
    held: Vec<HeldFd>,
    installed: Vec<(Endpoint, i32, i32)>,
    install_budget: Option<usize>,
}

/// Broker that tracks descriptors in memory.
///
/// Installed descriptors are numbered from 100 upwards per broker.
#[derive(Debug, Default)]
pub struct MemBroker {
    inner: Mutex<MemBrokerInner>,
}

impl MemBroker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemBrokerInner {
                next_fd: 100,
                ..MemBrokerInner::default()
            }),
        }
    }

    /// References currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().held.len()
    }

    /// `(receiver, original fd, installed fd)` for every delivery so far.
    pub fn installed(&self) -> Vec<(Endpoint, i32, i32)> {
        self.inner.lock().installed.clone()
    }

    /// Let only `n` more installs succeed.
    pub fn limit_installs(&self, n: usize) {
        self.inner.lock().install_budget = Some(n);
    }
}

impl DescriptorBroker for MemBroker {
    fn acquire(&self, owner: Endpoint, fd: i32) -> UdsResult<FdRef> {
        if fd < 0 {
            return Err(UdsError::InvalidHandle);
        }
        let mut inner = self.inner.lock();
        inner.next_ref += 1;
        let fd_ref = FdRef(inner.next_ref);
        inner.held.push(HeldFd { fd_ref, owner, fd });
        Ok(fd_ref)
    }

    fn install(&self, fd_ref: FdRef, to: Endpoint) -> UdsResult<i32> {
        let mut inner = self.inner.lock();
        if let Some(budget) = inner.install_budget.as_mut() {
            if *budget == 0 {
                return Err(UdsError::Overflow);
            }
            *budget -= 1;
        }
        let idx = inner
            .held
            .iter()
            .position(|h| h.fd_ref == fd_ref)
            .ok_or(UdsError::InvalidHandle)?;
        let held = inner.held.swap_remove(idx);
        let num = inner.next_fd;
        inner.next_fd += 1;
        inner.installed.push((to, held.fd, num));
        klog_debug!("broker: {} fd {} -> {} fd {}", held.owner, held.fd, to, num);
        Ok(num)
    }

    fn release(&self, fd_ref: FdRef) {
        self.inner.lock().held.retain(|h| h.fd_ref != fd_ref);
    }
}
