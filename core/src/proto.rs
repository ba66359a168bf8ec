//! Request and reply descriptors exchanged with the transport.

use alloc::vec::Vec;

use udsd_abi::{
    Caller, Endpoint, IoGrant, IoctlCode, SelectOps, SlotId, SockAddrUn, SockType, Ucred,
    UdsResult,
};

use crate::ancillary::ControlMsg;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ioctl {
    Connect(SockAddrUn),
    /// Addressed to the slot that will carry the connection; names the
    /// listening socket to take it from.
    Accept { listener: SlotId },
    Listen { backlog: i32 },
    SetType(i32),
    Bind(SockAddrUn),
    GetSockName,
    GetPeerName,
    Shutdown(i32),
    SocketPair { other: SlotId },
    GetSoType,
    GetPeerCred,
    SetTarget(SockAddrUn),
    GetFrom,
    GetSndBuf,
    SetSndBuf(usize),
    GetRcvBuf,
    SetRcvBuf(usize),
    SendCtrl { fds: Vec<i32> },
    RecvCtrl,
    Unknown(u32),
}

impl Ioctl {
    pub fn code(&self) -> Option<IoctlCode> {
        let code = match self {
            Self::Connect(_) => IoctlCode::Connect,
            Self::Accept { .. } => IoctlCode::Accept,
            Self::Listen { .. } => IoctlCode::Listen,
            Self::SetType(_) => IoctlCode::SetType,
            Self::Bind(_) => IoctlCode::Bind,
            Self::GetSockName => IoctlCode::GetSockName,
            Self::GetPeerName => IoctlCode::GetPeerName,
            Self::Shutdown(_) => IoctlCode::Shutdown,
            Self::SocketPair { .. } => IoctlCode::SocketPair,
            Self::GetSoType => IoctlCode::GetSoType,
            Self::GetPeerCred => IoctlCode::GetPeerCred,
            Self::SetTarget(_) => IoctlCode::SetTarget,
            Self::GetFrom => IoctlCode::GetFrom,
            Self::GetSndBuf => IoctlCode::GetSndBuf,
            Self::SetSndBuf(_) => IoctlCode::SetSndBuf,
            Self::GetRcvBuf => IoctlCode::GetRcvBuf,
            Self::SetRcvBuf(_) => IoctlCode::SetRcvBuf,
            Self::SendCtrl { .. } => IoctlCode::SendCtrl,
            Self::RecvCtrl => IoctlCode::RecvCtrl,
            Self::Unknown(_) => return None,
        };
        Some(code)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Open,
    Close,
    Read { len: usize },
    Write { len: usize },
    Ioctl(Ioctl),
    Select { ops: SelectOps },
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Target slot; open requests address [`SlotId::CONTROL`].
    pub slot: SlotId,
    pub caller: Caller,
    /// Caller memory for read/write payloads.
    pub grant: IoGrant,
    pub op: Operation,
}

impl Request {
    pub fn new(slot: SlotId, caller: Caller, op: Operation) -> Self {
        Self {
            slot,
            caller,
            grant: IoGrant::NONE,
            op,
        }
    }

    pub fn with_grant(mut self, grant: IoGrant) -> Self {
        self.grant = grant;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyValue {
    Done,
    Count(usize),
    Handle(SlotId),
    Addr(SockAddrUn),
    Type(SockType),
    Cred(Ucred),
    BufSize(usize),
    Control(ControlMsg),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Completion of a task call, possibly long after it was issued.
    Task {
        to: Endpoint,
        grant: IoGrant,
        slot: SlotId,
        result: UdsResult<ReplyValue>,
    },
    /// Immediate answer to a select request.
    Select {
        to: Endpoint,
        slot: SlotId,
        result: UdsResult<SelectOps>,
    },
    /// Out-of-band readiness change for an earlier select.
    SelectNotify {
        to: Endpoint,
        slot: SlotId,
        ops: SelectOps,
    },
}

impl Reply {
    pub fn to(&self) -> Endpoint {
        match self {
            Self::Task { to, .. } | Self::Select { to, .. } | Self::SelectNotify { to, .. } => *to,
        }
    }

    pub fn slot(&self) -> SlotId {
        match self {
            Self::Task { slot, .. }
            | Self::Select { slot, .. }
            | Self::SelectNotify { slot, .. } => *slot,
        }
    }

    /// Reply status word: a byte count, a handle, a mask or a negated errno.
    pub fn status(&self) -> i32 {
        match self {
            Self::Task { result, .. } => match result {
                Ok(ReplyValue::Count(n)) => *n as i32,
                Ok(ReplyValue::Handle(slot)) => slot.0 as i32,
                Ok(_) => 0,
                Err(err) => err.status(),
            },
            Self::Select { result, .. } => match result {
                Ok(ops) => ops.bits() as i32,
                Err(err) => err.status(),
            },
            Self::SelectNotify { ops, .. } => ops.bits() as i32,
        }
    }
}

/// Outcome of handing one request to the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Reply(Reply),
    /// The call is parked; its reply comes out of a later revive.
    Suspended,
}

impl Dispatch {
    pub fn reply(self) -> Option<Reply> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Suspended => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended)
    }
}
