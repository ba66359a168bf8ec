use alloc::vec;

use udsd_abi::{SOCK_DGRAM, SOCK_STREAM, SockAddrUn, UdsError};
use udsd_lib::testing::TestResult;
use udsd_lib::{assert_eq_test, assert_err, assert_ok, assert_test, pass};

use crate::proto::{Ioctl, ReplyValue};
use crate::testkit::*;

pub fn test_set_target_rules() -> TestResult {
    let mut d = driver();
    let stream = assert_ok!(socket(&mut d, 1, SOCK_STREAM));
    assert_err!(d.set_target(stream, &addr("/b")), UdsError::InvalidArgument);
    let a = assert_ok!(socket(&mut d, 1, SOCK_DGRAM));
    assert_err!(d.set_target(a, &addr("")), UdsError::InvalidArgument);
    assert_eq_test!(
        result_of(ioctl(&mut d, a, 1, Ioctl::SetTarget(addr("/b")))),
        Some(Ok(ReplyValue::Done))
    );
    assert_eq_test!(d.slot(a).map(|fd| fd.target), Some(addr("/b")));
    pass!()
}

pub fn test_send_to_unbound_target() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(socket(&mut d, 1, SOCK_DGRAM));
    assert_eq_test!(
        result_of(write(&mut d, a, 1, b"lost")),
        Some(Err(UdsError::AddrNotFound)),
        "no target set"
    );
    assert_ok!(d.set_target(a, &addr("/nobody")));
    assert_eq_test!(
        result_of(write(&mut d, a, 1, b"lost")),
        Some(Err(UdsError::AddrNotFound))
    );
    pass!()
}

pub fn test_datagrams_arrive_whole() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(dgram_bound(&mut d, 1, "/a"));
    let b = assert_ok!(dgram_bound(&mut d, 2, "/b"));
    assert_ok!(d.set_target(a, &addr("/b")));

    for msg in [&b"one"[..], &b"second"[..], &b"3"[..]] {
        assert_eq_test!(result_of(write(&mut d, a, 1, msg)), Some(Ok(ReplyValue::Count(msg.len()))));
        let (got, grant) = read(&mut d, b, 2, 64);
        assert_eq_test!(result_of(got), Some(Ok(ReplyValue::Count(msg.len()))));
        assert_eq_test!(received(&d, grant), msg.to_vec());
        assert_eq_test!(
            result_of(ioctl(&mut d, b, 2, Ioctl::GetFrom)),
            Some(Ok(ReplyValue::Addr(addr("/a"))))
        );
    }
    pass!()
}

pub fn test_short_read_discards_tail() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(dgram_bound(&mut d, 1, "/a"));
    let b = assert_ok!(dgram_bound(&mut d, 2, "/b"));
    assert_ok!(d.set_target(a, &addr("/b")));

    write(&mut d, a, 1, b"abcdef");
    let (got, grant) = read(&mut d, b, 2, 3);
    assert_eq_test!(result_of(got), Some(Ok(ReplyValue::Count(3))));
    assert_eq_test!(received(&d, grant), b"abc".to_vec());
    let (next, _) = read(&mut d, b, 2, 3);
    assert_test!(next.is_suspended(), "rest of the packet is gone");
    pass!()
}

pub fn test_second_datagram_dropped_while_unread() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(dgram_bound(&mut d, 1, "/a"));
    let b = assert_ok!(dgram_bound(&mut d, 2, "/b"));
    assert_ok!(d.set_target(a, &addr("/b")));

    assert_eq_test!(result_of(write(&mut d, a, 1, b"first")), Some(Ok(ReplyValue::Count(5))));
    assert_eq_test!(
        result_of(write(&mut d, a, 1, b"second")),
        Some(Ok(ReplyValue::Count(6))),
        "drop is reported as success"
    );
    let (got, grant) = read(&mut d, b, 2, 64);
    assert_eq_test!(result_of(got), Some(Ok(ReplyValue::Count(5))));
    assert_eq_test!(received(&d, grant), b"first".to_vec());
    let (empty, _) = read(&mut d, b, 2, 64);
    assert_test!(empty.is_suspended());
    pass!()
}

pub fn test_empty_mailbox_parks_reader() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(socket(&mut d, 1, SOCK_DGRAM));
    let b = assert_ok!(dgram_bound(&mut d, 2, "/b"));
    let (parked, grant) = read(&mut d, b, 2, 16);
    assert_test!(parked.is_suspended());

    assert_ok!(d.set_target(a, &addr("/b")));
    write(&mut d, a, 1, b"wake");
    let replies = d.run_revivals();
    assert_eq_test!(results_for(&replies, b), vec![Ok(ReplyValue::Count(4))]);
    assert_eq_test!(received(&d, grant), b"wake".to_vec());
    assert_eq_test!(assert_ok!(d.get_from(b)), SockAddrUn::unspecified(), "unbound sender");
    pass!()
}

pub fn test_target_resolved_per_send() -> TestResult {
    let mut d = driver();
    let a = assert_ok!(dgram_bound(&mut d, 1, "/a"));
    let b = assert_ok!(dgram_bound(&mut d, 2, "/b"));
    assert_ok!(d.set_target(a, &addr("/b")));
    assert_eq_test!(d.resolve_target(a), Some(b));

    assert_eq_test!(close(&mut d, b, 2), Some(Ok(ReplyValue::Done)));
    assert_eq_test!(d.resolve_target(a), None);
    let c = assert_ok!(dgram_bound(&mut d, 3, "/b"));
    assert_eq_test!(d.resolve_target(a), Some(c));
    assert_eq_test!(result_of(write(&mut d, a, 1, b"hi")), Some(Ok(ReplyValue::Count(2))));
    assert_eq_test!(d.slot(c).map(|fd| fd.size), Some(2));
    pass!()
}

udsd_lib::define_test_suite!(
    dgram,
    [
        test_set_target_rules,
        test_send_to_unbound_target,
        test_datagrams_arrive_whole,
        test_short_read_discards_tail,
        test_second_datagram_dropped_while_unread,
        test_empty_mailbox_parks_reader,
        test_target_resolved_per_send,
    ]
);
