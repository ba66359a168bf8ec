use udsd_abi::{SOCK_STREAM, SlotId, StoreError, UdsError};
use udsd_lib::testing::TestResult;
use udsd_lib::{assert_eq_test, assert_err, assert_ok, assert_test, pass};

use crate::proto::{Ioctl, ReplyValue};
use crate::table::SlotState;
use crate::testkit::*;

pub fn test_open_takes_lowest_free_slot() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(open(&mut d, 5));
    let b = assert_ok!(open(&mut d, 5));
    assert_eq_test!(a, SlotId(1));
    assert_eq_test!(b, SlotId(2));

    let fd = d.slot(a).expect("slot exists");
    assert_eq_test!(fd.state, SlotState::InUse);
    assert_eq_test!(fd.owner, caller(5).endpoint);
    assert_eq_test!(fd.owner_cred, caller(5).cred);
    assert_test!(fd.node.is_some(), "pipe node created");
    assert_test!(fd.track.complete, "open call completed");
    assert_eq_test!(d.store().live_nodes(), 2);

    assert_eq_test!(close(&mut d, a, 5), Some(Ok(ReplyValue::Done)));
    assert_eq_test!(assert_ok!(open(&mut d, 6)), SlotId(1), "freed slot reused");
    pass!()
}

pub fn test_open_table_full() -> TestResult {
    let mut d = driver();
    for _ in 1..SLOTS {
        assert_ok!(open(&mut d, 1));
    }
    assert_err!(open(&mut d, 1), UdsError::OutOfSlots);
    assert_eq_test!(d.in_use_count(), SLOTS - 1);
    pass!()
}

pub fn test_open_store_failure_releases_slot() -> TestResult {
    let mut d = driver();
    d.store().set_node_quota(0);
    assert_err!(open(&mut d, 1), UdsError::Store(StoreError::NoSpace));
    assert_eq_test!(d.in_use_count(), 0);
    assert_test!(d.is_pristine(), "failed open leaves nothing behind");
    pass!()
}

pub fn test_close_invalid_handles() -> TestResult {
    let mut d = driver();
    assert_eq_test!(close(&mut d, SlotId::CONTROL, 1), Some(Err(UdsError::InvalidHandle)));
    assert_eq_test!(close(&mut d, SlotId(3), 1), Some(Err(UdsError::InvalidHandle)));
    assert_eq_test!(close(&mut d, SlotId(SLOTS + 4), 1), Some(Err(UdsError::InvalidHandle)));
    pass!()
}

pub fn test_close_resets_peer_once() -> TestResult {
    let mut d = driver();
    let conn = assert_ok!(connect_pair(&mut d, SOCK_STREAM, "/srv"));
    assert_eq_test!(close(&mut d, conn.client, 2), Some(Ok(ReplyValue::Done)));
    assert_eq_test!(d.slot(conn.server).and_then(|fd| fd.peer), None);

    let (first, _) = read(&mut d, conn.server, 1, 16);
    assert_eq_test!(result_of(first), Some(Err(UdsError::ConnReset)));
    let (second, _) = read(&mut d, conn.server, 1, 16);
    assert_eq_test!(result_of(second), Some(Err(UdsError::NotConnected)));
    pass!()
}

pub fn test_close_resets_writer_once() -> TestResult {
    let mut d = driver();
    let conn = assert_ok!(connect_pair(&mut d, SOCK_STREAM, "/srv"));
    assert_eq_test!(close(&mut d, conn.server, 1), Some(Ok(ReplyValue::Done)));

    assert_eq_test!(
        result_of(write(&mut d, conn.client, 2, b"gone")),
        Some(Err(UdsError::ConnReset))
    );
    assert_eq_test!(
        result_of(write(&mut d, conn.client, 2, b"gone")),
        Some(Err(UdsError::NotConnected))
    );
    pass!()
}

pub fn test_open_creates_owned_pipe_node() -> TestResult {
    let mut d = driver();
    let s = assert_ok!(open(&mut d, 3));
    let node = d.slot(s).and_then(|fd| fd.node).expect("node");
    let stat = assert_ok!(d.store().stat(node));
    assert_test!(stat.mode.is_pipe(), "socket buffer is a named pipe");
    assert_eq_test!((stat.uid, stat.gid), (caller(3).cred.uid, caller(3).cred.gid));
    assert_eq_test!(stat.size, 0);

    assert_ok!(d.close(s));
    assert_test!(d.store().stat(node).is_err(), "close removes the node");
    pass!()
}

pub fn test_close_revives_parked_reader() -> TestResult {
    let mut d = driver();
    let conn = assert_ok!(connect_pair(&mut d, SOCK_STREAM, "/srv"));
    let (parked, _) = read(&mut d, conn.server, 1, 16);
    assert_test!(parked.is_suspended(), "empty read parks");

    assert_ok!(d.close(conn.client));
    let replies = d.run_revivals();
    assert_eq_test!(
        results_for(&replies, conn.server),
        alloc::vec![Err(UdsError::ConnReset)]
    );
    pass!()
}

pub fn test_close_listener_refuses_queued_clients() -> TestResult {
    let mut d = driver();
    let srv = assert_ok!(listener(&mut d, 1, SOCK_STREAM, "/srv", 2));
    let client = assert_ok!(socket(&mut d, 2, SOCK_STREAM));
    let connect = ioctl(&mut d, client, 2, Ioctl::Connect(addr("/srv")));
    assert_test!(connect.is_suspended(), "connect parks until accepted");

    assert_ok!(d.close(srv));
    let replies = d.run_revivals();
    assert_eq_test!(
        results_for(&replies, client),
        alloc::vec![Err(UdsError::ConnRefused)]
    );
    let fd = d.slot(client).expect("client still open");
    assert_test!(!fd.addr.is_unix(), "refused connect forgets the address");
    pass!()
}

pub fn test_close_listener_resets_parked_accept() -> TestResult {
    let mut d = driver();
    let srv = assert_ok!(listener(&mut d, 1, SOCK_STREAM, "/srv", 2));
    let child = assert_ok!(open(&mut d, 1));
    assert_test!(
        ioctl(&mut d, child, 1, Ioctl::Accept { listener: srv }).is_suspended(),
        "accept parks on empty backlog"
    );

    assert_ok!(d.close(srv));
    let replies = d.run_revivals();
    assert_eq_test!(results_for(&replies, child), alloc::vec![Err(UdsError::ConnReset)]);
    pass!()
}

pub fn test_round_trip_leaves_table_pristine() -> TestResult {
    let mut d = driver();
    let conn = assert_ok!(connect_pair(&mut d, SOCK_STREAM, "/srv"));
    assert_eq_test!(result_of(write(&mut d, conn.client, 2, b"ping")), Some(Ok(ReplyValue::Count(4))));
    let (got, grant) = read(&mut d, conn.server, 1, 4);
    assert_eq_test!(result_of(got), Some(Ok(ReplyValue::Count(4))));
    assert_eq_test!(received(&d, grant), b"ping".to_vec());

    for (slot, who) in [(conn.client, 2), (conn.server, 1), (conn.listener, 1)] {
        assert_eq_test!(close(&mut d, slot, who), Some(Ok(ReplyValue::Done)));
    }
    d.run_revivals();
    assert_test!(d.is_pristine(), "every slot back to free defaults");
    assert_eq_test!(d.store().live_nodes(), 0);
    assert_eq_test!(d.broker().in_flight(), 0);
    pass!()
}

udsd_lib::define_test_suite!(
    lifecycle,
    [
        test_open_takes_lowest_free_slot,
        test_open_table_full,
        test_open_store_failure_releases_slot,
        test_close_invalid_handles,
        test_close_resets_peer_once,
        test_close_resets_writer_once,
        test_open_creates_owned_pipe_node,
        test_close_revives_parked_reader,
        test_close_listener_refuses_queued_clients,
        test_close_listener_resets_parked_accept,
        test_round_trip_leaves_table_pristine,
    ]
);
