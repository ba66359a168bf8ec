//! Request dispatcher: validates the addressed slot, records call
//! bookkeeping and routes to the operation.

use core::task::Poll;

use udsd_abi::{Caller, IoGrant, IoctlCode, SlotId, UdsError, UdsResult};
use udsd_lib::{klog_trace, klog_warn};
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::proto::{Dispatch, Ioctl, Operation, Reply, ReplyValue, Request};
use crate::table::{CallKind, CallTrack, Suspended};

fn ready<T>(value: T) -> UdsResult<Poll<T>> {
    Ok(Poll::Ready(value))
}

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn handle(&mut self, req: Request) -> Dispatch {
        if self.config.trace {
            klog_trace!("uds: {} from {}: {:?}", req.slot, req.caller.endpoint, req.op);
        }
        let Request {
            slot,
            caller,
            grant,
            op,
        } = req;

        let reply = move |result| {
            Dispatch::Reply(Reply::Task {
                to: caller.endpoint,
                grant,
                slot,
                result,
            })
        };

        match op {
            Operation::Open => return reply(self.open(caller).map(ReplyValue::Handle)),
            Operation::Cancel => return Dispatch::Reply(self.cancel(slot, caller)),
            _ => {}
        }

        if self.table.in_use(slot).is_err() {
            klog_warn!("uds: {:?} on invalid {}", op, slot);
            if let Operation::Select { .. } = op {
                return Dispatch::Reply(Reply::Select {
                    to: caller.endpoint,
                    slot,
                    result: Err(UdsError::InvalidHandle),
                });
            }
            return reply(Err(UdsError::InvalidHandle));
        }

        match op {
            // Handled above without a slot.
            Operation::Open | Operation::Cancel => reply(Err(UdsError::BadOperation)),
            Operation::Close => {
                self.table[slot].track = CallTrack::started(CallKind::Close, None);
                reply(self.close(slot).map(|()| ReplyValue::Done))
            }
            Operation::Read { len } => {
                self.begin_call(slot, caller, CallKind::Read, None);
                let result = self.perform_read(slot, len, grant, false);
                self.finish(slot, grant, len, Suspended::Read, result.map(|p| p.map(ReplyValue::Count)))
            }
            Operation::Write { len } => {
                self.begin_call(slot, caller, CallKind::Write, None);
                let result = self.perform_write(slot, len, grant, false);
                self.finish(slot, grant, len, Suspended::Write, result.map(|p| p.map(ReplyValue::Count)))
            }
            Operation::Ioctl(ioctl) => {
                let code = ioctl.code();
                self.begin_call(slot, caller, CallKind::Ioctl, code);
                let fd = &mut self.table[slot];
                fd.owner = caller.endpoint;
                fd.owner_cred = caller.cred;
                let parks_as = match ioctl {
                    Ioctl::Connect(_) => Suspended::Connect,
                    Ioctl::Accept { .. } => Suspended::Accept,
                    _ => Suspended::None,
                };
                let result = self.ioctl(slot, ioctl);
                self.finish(slot, grant, 0, parks_as, result)
            }
            // Select never parks; the tracked call is left alone.
            Operation::Select { ops } => Dispatch::Reply(Reply::Select {
                to: caller.endpoint,
                slot,
                result: self.select(slot, ops, caller),
            }),
        }
    }

    fn begin_call(
        &mut self,
        slot: SlotId,
        caller: Caller,
        call: CallKind,
        ioctl: Option<IoctlCode>,
    ) {
        let fd = &mut self.table[slot];
        fd.endpoint = caller.endpoint;
        fd.track = CallTrack::started(call, ioctl);
    }

    /// Reply now, or park the call when the operation would block.
    fn finish(
        &mut self,
        slot: SlotId,
        grant: IoGrant,
        len: usize,
        parks_as: Suspended,
        result: UdsResult<Poll<ReplyValue>>,
    ) -> Dispatch {
        let result = match result {
            Ok(Poll::Pending) if parks_as != Suspended::None => {
                self.park(slot, parks_as, grant, len);
                return Dispatch::Suspended;
            }
            // Nothing to park on; report it as a would-be-blocking misuse.
            Ok(Poll::Pending) => Err(UdsError::InvalidArgument),
            Ok(Poll::Ready(value)) => Ok(value),
            Err(err) => Err(err),
        };
        let fd = &mut self.table[slot];
        fd.track.complete = true;
        Dispatch::Reply(Reply::Task {
            to: fd.endpoint,
            grant,
            slot,
            result,
        })
    }

    fn ioctl(&mut self, slot: SlotId, ioctl: Ioctl) -> UdsResult<Poll<ReplyValue>> {
        match ioctl {
            Ioctl::Connect(addr) => Ok(self.connect(slot, &addr)?.map(|()| ReplyValue::Done)),
            Ioctl::Accept { listener } => Ok(self.accept(slot, listener)?.map(ReplyValue::Handle)),
            Ioctl::Listen { backlog } => {
                self.listen(slot, backlog)?;
                ready(ReplyValue::Done)
            }
            Ioctl::SetType(raw) => {
                self.set_type(slot, raw)?;
                ready(ReplyValue::Done)
            }
            Ioctl::Bind(addr) => {
                self.bind(slot, &addr)?;
                ready(ReplyValue::Done)
            }
            Ioctl::GetSockName => ready(ReplyValue::Addr(self.getsockname(slot)?)),
            Ioctl::GetPeerName => ready(ReplyValue::Addr(self.getpeername(slot)?)),
            Ioctl::Shutdown(how) => {
                self.shutdown(slot, how)?;
                ready(ReplyValue::Done)
            }
            Ioctl::SocketPair { other } => {
                self.socketpair(slot, other)?;
                ready(ReplyValue::Done)
            }
            Ioctl::GetSoType => ready(ReplyValue::Type(self.get_so_type(slot)?)),
            Ioctl::GetPeerCred => ready(ReplyValue::Cred(self.get_peer_cred(slot)?)),
            Ioctl::SetTarget(addr) => {
                self.set_target(slot, &addr)?;
                ready(ReplyValue::Done)
            }
            Ioctl::GetFrom => ready(ReplyValue::Addr(self.get_from(slot)?)),
            Ioctl::GetSndBuf | Ioctl::GetRcvBuf => ready(ReplyValue::BufSize(self.buf_size(slot)?)),
            Ioctl::SetSndBuf(size) | Ioctl::SetRcvBuf(size) => {
                self.set_buf_size(slot, size)?;
                ready(ReplyValue::Done)
            }
            Ioctl::SendCtrl { fds } => {
                self.send_ctrl(slot, &fds)?;
                ready(ReplyValue::Done)
            }
            Ioctl::RecvCtrl => ready(ReplyValue::Control(self.recv_ctrl(slot)?)),
            Ioctl::Unknown(raw) => {
                klog_warn!("uds: {} unknown ioctl {:#x}", slot, raw);
                Err(UdsError::BadOperation)
            }
        }
    }
}
