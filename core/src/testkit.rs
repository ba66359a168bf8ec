//! Shared fixtures for the driver test suites.

use alloc::vec::Vec;

use udsd_abi::{Caller, Endpoint, IoGrant, SlotId, SockAddrUn, Ucred, UdsError, UdsResult};
use udsd_lib::UdsConfig;
use udsd_pipefs::MemPipeFs;

use crate::ancillary::MemBroker;
use crate::driver::UdsDriver;
use crate::proto::{Dispatch, Ioctl, Operation, Reply, ReplyValue, Request};

pub type TestDriver = UdsDriver<MemPipeFs, MemBroker>;

pub const SLOTS: usize = 8;

pub fn driver() -> TestDriver {
    UdsDriver::new(
        MemPipeFs::new(),
        MemBroker::new(),
        UdsConfig::default().with_slots(SLOTS),
    )
}

/// Process `n`, with credentials derived from it.
pub fn caller(n: i32) -> Caller {
    Caller::new(
        Endpoint(n),
        Ucred {
            pid: n,
            uid: 1000 + n as u32,
            gid: 100,
        },
    )
}

pub fn addr(path: &str) -> SockAddrUn {
    SockAddrUn::new(path.as_bytes()).expect("test path fits")
}

pub fn request(d: &mut TestDriver, slot: SlotId, who: i32, op: Operation) -> Dispatch {
    d.handle(Request::new(slot, caller(who), op))
}

pub fn ioctl(d: &mut TestDriver, slot: SlotId, who: i32, ioctl: Ioctl) -> Dispatch {
    request(d, slot, who, Operation::Ioctl(ioctl))
}

/// Result carried by a task reply, if `dispatch` is one.
pub fn result_of(dispatch: Dispatch) -> Option<UdsResult<ReplyValue>> {
    match dispatch.reply()? {
        Reply::Task { result, .. } => Some(result),
        _ => None,
    }
}

/// Task replies for `slot` among `replies`.
pub fn results_for(replies: &[Reply], slot: SlotId) -> Vec<UdsResult<ReplyValue>> {
    replies
        .iter()
        .filter_map(|reply| match reply {
            Reply::Task { slot: s, result, .. } if *s == slot => Some(result.clone()),
            _ => None,
        })
        .collect()
}

pub fn open(d: &mut TestDriver, who: i32) -> UdsResult<SlotId> {
    match result_of(request(d, SlotId::CONTROL, who, Operation::Open)) {
        Some(Ok(ReplyValue::Handle(slot))) => Ok(slot),
        Some(Err(err)) => Err(err),
        _ => Err(UdsError::InvalidArgument),
    }
}

pub fn socket(d: &mut TestDriver, who: i32, raw_type: i32) -> UdsResult<SlotId> {
    let slot = open(d, who)?;
    d.set_type(slot, raw_type)?;
    Ok(slot)
}

pub fn listener(
    d: &mut TestDriver,
    who: i32,
    raw_type: i32,
    path: &str,
    backlog: i32,
) -> UdsResult<SlotId> {
    let slot = socket(d, who, raw_type)?;
    d.bind(slot, &addr(path))?;
    d.listen(slot, backlog)?;
    Ok(slot)
}

pub fn dgram_bound(d: &mut TestDriver, who: i32, path: &str) -> UdsResult<SlotId> {
    let slot = socket(d, who, udsd_abi::SOCK_DGRAM)?;
    d.bind(slot, &addr(path))?;
    Ok(slot)
}

/// Listener, connected client and its accepted server side, set up
/// through the dispatcher so the client's connect really parks.
pub struct Connection {
    pub listener: SlotId,
    pub client: SlotId,
    pub server: SlotId,
}

pub fn connect_pair(d: &mut TestDriver, raw_type: i32, path: &str) -> UdsResult<Connection> {
    let listener = listener(d, 1, raw_type, path, 4)?;
    let client = socket(d, 2, raw_type)?;
    if !ioctl(d, client, 2, Ioctl::Connect(addr(path))).is_suspended() {
        return Err(UdsError::InvalidArgument);
    }
    let server = open(d, 1)?;
    match result_of(ioctl(d, server, 1, Ioctl::Accept { listener })) {
        Some(Ok(ReplyValue::Handle(s))) if s == server => {}
        Some(Err(err)) => return Err(err),
        _ => return Err(UdsError::InvalidArgument),
    }
    let replies = d.run_revivals();
    match results_for(&replies, client).as_slice() {
        [Ok(ReplyValue::Done)] => Ok(Connection {
            listener,
            client,
            server,
        }),
        _ => Err(UdsError::NotConnected),
    }
}

pub fn write(d: &mut TestDriver, slot: SlotId, who: i32, bytes: &[u8]) -> Dispatch {
    let grant = d.store().grant_source(bytes);
    d.handle(Request::new(slot, caller(who), Operation::Write { len: bytes.len() }).with_grant(grant))
}

pub fn read(d: &mut TestDriver, slot: SlotId, who: i32, len: usize) -> (Dispatch, IoGrant) {
    let grant = d.store().grant_sink(len);
    let dispatch = d.handle(Request::new(slot, caller(who), Operation::Read { len }).with_grant(grant));
    (dispatch, grant)
}

pub fn received(d: &TestDriver, grant: IoGrant) -> Vec<u8> {
    d.store().grant_contents(grant).unwrap_or_default()
}

pub fn close(d: &mut TestDriver, slot: SlotId, who: i32) -> Option<UdsResult<ReplyValue>> {
    result_of(request(d, slot, who, Operation::Close))
}
