use super::*;
use crate::message::CommunityMessage;
use crate::oid;
use crate::transport::MockTransport;
use crate::value::Value;
use crate::varbind::VarBind;
use std::sync::atomic::Ordering;

const LOCAL: &str = "127.0.0.1:162";

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], port))
}

fn manager() -> (Manager, MockTransport) {
    let mock = MockTransport::new(LOCAL.parse().unwrap());
    let manager = Manager::builder()
        .transport(mock.clone())
        .default_interval(Duration::from_secs(30))
        .build()
        .unwrap();
    (manager, mock)
}

fn sent_get(data: &[u8]) -> (Device, Pdu) {
    match codec::decode(data).unwrap() {
        Message::Community(msg) => (
            Device::new(addr(0), msg.community, msg.version),
            msg.pdu,
        ),
        other => panic!("expected community message, got {other:?}"),
    }
}

fn response(request_id: i32, varbinds: Vec<VarBind>) -> Bytes {
    CommunityMessage::v2c("public", Pdu::response(request_id, varbinds)).encode()
}

fn integer_pollers(
    manager: &mut Manager,
    device: &Arc<Device>,
    count: u32,
) -> Vec<(Arc<Handler>, Arc<AtomicI32>)> {
    (0..count)
        .map(|i| {
            let storage = Arc::new(AtomicI32::new(-1));
            let handler = manager
                .add_integer_poller(device.clone(), &format!("1.3.6.1.4.1.9.{}.0", i + 1), storage.clone(), None)
                .unwrap();
            (handler, storage)
        })
        .collect()
}

#[test]
fn test_builder_requires_transport() {
    assert!(matches!(Manager::builder().build(), Err(Error::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_batches_six_then_remainder() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    integer_pollers(&mut manager, &device, 8);

    let first = manager.prepare_next_polling_request().unwrap();
    let second = manager.prepare_next_polling_request().unwrap();
    assert_ne!(first, second);
    assert!(manager.prepare_next_polling_request().is_none());

    let sent = mock.take_sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|d| d.target == addr(161)));

    let (dev, pdu) = sent_get(&sent[0].data);
    assert_eq!(pdu.pdu_type, PduType::GetRequest);
    assert_eq!(pdu.request_id, first);
    assert_eq!(pdu.varbinds.len(), MAX_POLL_BINDINGS);
    assert_eq!(dev.community.as_ref(), b"public");
    assert_eq!(dev.version, Version::V2c);
    assert!(pdu.varbinds.iter().all(|vb| vb.value == Value::Null));

    let (_, pdu) = sent_get(&sent[1].data);
    assert_eq!(pdu.varbinds.len(), 2);
    assert_eq!(pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 4, 1, 9, 7, 0));
    assert_eq!(manager.live_request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_device_waits_for_first_device_batches() {
    let (mut manager, mock) = manager();
    let busy = manager.device(addr(161));
    let quiet = manager.device(addr(1161));
    integer_pollers(&mut manager, &busy, 7);
    let quiet_pollers = integer_pollers(&mut manager, &quiet, 1);

    manager.prepare_next_polling_request().unwrap();
    manager.prepare_next_polling_request().unwrap();
    assert!(
        manager
            .polling_info(&quiet_pollers[0].0, &quiet)
            .unwrap()
            .should_poll(Instant::now()),
        "second device is still due after two cycles"
    );
    manager.prepare_next_polling_request().unwrap();

    let targets: Vec<_> = mock.take_sent().into_iter().map(|d| d.target).collect();
    assert_eq!(targets, vec![addr(161), addr(161), addr(1161)]);
}

#[tokio::test(start_paused = true)]
async fn test_equal_devices_are_polled_separately() {
    let (mut manager, mock) = manager();
    let a = Arc::new(Device::v2c(addr(161), "public"));
    let b = Arc::new(Device::v2c(addr(161), "public"));
    integer_pollers(&mut manager, &a, 1);
    integer_pollers(&mut manager, &b, 1);

    manager.prepare_next_polling_request().unwrap();
    manager.prepare_next_polling_request().unwrap();
    assert_eq!(mock.sent_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_response_stores_values_and_restarts_interval() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 2);

    let id = manager.prepare_next_polling_request().unwrap();
    mock.take_sent();
    tokio::time::advance(Duration::from_millis(200)).await;

    mock.push_inbound(
        response(
            id,
            vec![
                VarBind::new(pollers[0].0.oid.clone(), Value::Integer(42)),
                VarBind::new(pollers[1].0.oid.clone(), Value::Integer(-7)),
            ],
        ),
        addr(161),
    );
    assert_eq!(manager.process_incoming_packets(), PollStatus::Handled);
    assert_eq!(pollers[0].1.load(Ordering::Relaxed), 42);
    assert_eq!(pollers[1].1.load(Ordering::Relaxed), -7);
    assert_eq!(manager.live_request_count(), 0);

    // Interval counts from the send, not the response.
    tokio::time::advance(Duration::from_millis(29_700)).await;
    assert!(manager.prepare_next_polling_request().is_none());
    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(manager.prepare_next_polling_request().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_error_response_leaves_poller_due() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 1);

    let id = manager.prepare_next_polling_request().unwrap();
    mock.take_sent();

    mock.push_inbound(
        response(id, vec![VarBind::new(pollers[0].0.oid.clone(), Value::NoSuchObject)]),
        addr(161),
    );
    assert_eq!(manager.process_incoming_packets(), PollStatus::Handled);
    assert_eq!(pollers[0].1.load(Ordering::Relaxed), -1);

    let info = manager.polling_info(&pollers[0].0, &device).unwrap();
    assert!(!info.is_awaiting());
    assert!(info.last_poll.is_none());
    assert!(manager.prepare_next_polling_request().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_wrong_type_counts_as_failure() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 1);

    let id = manager.prepare_next_polling_request().unwrap();
    mock.take_sent();
    mock.push_inbound(
        response(id, vec![VarBind::new(pollers[0].0.oid.clone(), Value::from("text"))]),
        addr(161),
    );
    manager.process_incoming_packets();

    let info = manager.polling_info(&pollers[0].0, &device).unwrap();
    assert!(info.last_poll.is_none());
    assert_eq!(pollers[0].1.load(Ordering::Relaxed), -1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_poller_to_idle() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 1);

    let id = manager.prepare_next_polling_request().unwrap();
    mock.take_sent();

    tokio::time::advance(REQUEST_TIMEOUT).await;
    assert_eq!(manager.teardown_old_requests(), 0, "timeout is strict");

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(manager.teardown_old_requests(), 1);
    assert_eq!(manager.live_request_count(), 0);
    assert!(!manager.polling_info(&pollers[0].0, &device).unwrap().is_awaiting());

    // Late answer is unsolicited and changes nothing.
    mock.push_inbound(
        response(id, vec![VarBind::new(pollers[0].0.oid.clone(), Value::Integer(5))]),
        addr(161),
    );
    assert_eq!(manager.process_incoming_packets(), PollStatus::Handled);
    assert_eq!(pollers[0].1.load(Ordering::Relaxed), -1);
}

#[tokio::test(start_paused = true)]
async fn test_request_id_is_consumed_by_first_response() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 2);

    let id = manager.prepare_next_polling_request().unwrap();
    mock.take_sent();

    mock.push_inbound(
        response(id, vec![VarBind::new(pollers[0].0.oid.clone(), Value::Integer(1))]),
        addr(161),
    );
    assert_eq!(manager.process_incoming_packets(), PollStatus::Handled);
    assert_eq!(manager.live_request_count(), 0);

    // Same id again: no longer live, so the second poller is not reconciled.
    mock.push_inbound(
        response(id, vec![VarBind::new(pollers[1].0.oid.clone(), Value::Integer(2))]),
        addr(161),
    );
    assert_eq!(manager.process_incoming_packets(), PollStatus::Handled);
    assert_eq!(pollers[0].1.load(Ordering::Relaxed), 1);
    assert_eq!(pollers[1].1.load(Ordering::Relaxed), -1);
    assert!(manager.polling_info(&pollers[1].0, &device).unwrap().is_awaiting());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_is_capped_per_pass() {
    let (mut manager, mock) = manager();
    for port in 0..12 {
        let device = manager.device(addr(2000 + port));
        integer_pollers(&mut manager, &device, 1);
    }
    for _ in 0..12 {
        manager.prepare_next_polling_request().unwrap();
    }
    assert_eq!(mock.take_sent().len(), 12);
    assert_eq!(manager.live_request_count(), 12);

    tokio::time::advance(REQUEST_TIMEOUT + Duration::from_millis(1)).await;
    assert_eq!(manager.teardown_old_requests(), MAX_TEARDOWN_PER_PASS);
    assert_eq!(manager.live_request_count(), 2);
    assert_eq!(manager.teardown_old_requests(), 2);
    assert_eq!(manager.live_request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_leaves_pollers_idle() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 3);

    mock.set_fail_sends(true);
    assert!(manager.prepare_next_polling_request().is_none());
    assert_eq!(manager.live_request_count(), 0);
    for (handler, _) in &pollers {
        assert!(!manager.polling_info(handler, &device).unwrap().is_awaiting());
    }

    mock.set_fail_sends(false);
    assert!(manager.prepare_next_polling_request().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_response_for_other_oid_is_unsolicited() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 1);

    let id = manager.prepare_next_polling_request().unwrap();
    mock.take_sent();
    mock.push_inbound(
        response(id, vec![VarBind::new(oid!(1, 3, 6, 1, 9, 9), Value::Integer(1))]),
        addr(161),
    );
    assert_eq!(manager.process_incoming_packets(), PollStatus::Handled);
    assert!(manager.polling_info(&pollers[0].0, &device).unwrap().is_awaiting());
}

#[tokio::test(start_paused = true)]
async fn test_non_response_and_garbage_are_dropped() {
    let (mut manager, mock) = manager();
    let get = CommunityMessage::v2c("public", Pdu::get_request(1, &[oid!(1, 3)])).encode();
    mock.push_inbound(get, addr(161));
    mock.push_inbound(&b"\x30\x03\x02\x01"[..], addr(161));

    assert_eq!(manager.process_incoming_packets(), PollStatus::Dropped);
    assert_eq!(manager.process_incoming_packets(), PollStatus::Dropped);
    assert_eq!(manager.process_incoming_packets(), PollStatus::NoPacket);
    assert_eq!(mock.sent_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_framing_errors() {
    let (mut manager, mock) = manager();
    mock.push_inbound(vec![0u8; crate::MAX_PACKET_SIZE + 1], addr(161));
    assert_eq!(manager.process_incoming_packets(), PollStatus::RequestTooLarge);

    mock.push_inbound_with_len(&b"\x30\x00"[..], addr(161), 10);
    assert_eq!(manager.process_incoming_packets(), PollStatus::RequestInvalid);
}

#[tokio::test(start_paused = true)]
async fn test_remove_poller_matches_handler_and_device() {
    let (mut manager, mock) = manager();
    let a = manager.device(addr(161));
    let b = manager.device(addr(1161));
    let storage = Arc::new(AtomicI32::new(0));
    let handler = manager
        .add_integer_poller(a.clone(), "1.3.6.1.2.1.1.3.0", storage, None)
        .unwrap();
    manager.add_poller(b.clone(), handler.clone(), Some(Duration::from_secs(5)));
    assert_eq!(manager.poller_count(), 2);

    assert!(manager.remove_poller(&handler, &a));
    assert!(!manager.remove_poller(&handler, &a));
    assert_eq!(manager.poller_count(), 1);

    manager.prepare_next_polling_request().unwrap();
    assert_eq!(mock.take_sent()[0].target, addr(1161));
}

#[tokio::test(start_paused = true)]
async fn test_poll_runs_full_cycle() {
    let (mut manager, mock) = manager();
    let device = manager.device(addr(161));
    let pollers = integer_pollers(&mut manager, &device, 1);

    assert_eq!(manager.poll(), PollStatus::NoPacket);
    let sent = mock.take_sent();
    let (_, pdu) = sent_get(&sent[0].data);

    mock.push_inbound(
        response(pdu.request_id, vec![VarBind::new(pollers[0].0.oid.clone(), Value::Integer(3))]),
        addr(161),
    );
    assert_eq!(manager.poll(), PollStatus::Handled);
    assert_eq!(pollers[0].1.load(Ordering::Relaxed), 3);
}
