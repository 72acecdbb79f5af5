//! Agent and manager talking over real UDP sockets on loopback.

mod common;

use std::net::UdpSocket;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use common::*;
use snmp_engine::{
    CommunityMessage, Device, ErrorStatus, Manager, Message, Pdu, PduType, PollStatus,
    StatusCallback, Trap, TrapDelivery, Value, VarBind, Version, codec, oid,
};

fn client_socket() -> UdpSocket {
    let socket = UdpSocket::bind(loopback()).unwrap();
    socket
        .set_read_timeout(Some(EXCHANGE_TIMEOUT))
        .unwrap();
    socket
}

fn receive(socket: &UdpSocket) -> (CommunityMessage, std::net::SocketAddr) {
    let mut buf = [0u8; 2048];
    let (len, from) = socket.recv_from(&mut buf).expect("datagram within timeout");
    match codec::decode(&buf[..len]).unwrap() {
        Message::Community(msg) => (msg, from),
        other => panic!("expected community message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_manager_polls_agent() {
    let mut agent = loopback_agent();
    let level = Arc::new(AtomicI32::new(42));
    agent
        .add_integer_handler(".1.0", level.clone(), 0, 100, true)
        .unwrap();
    agent.add_readonly_string_handler(".2.0", "tank").unwrap();
    agent.sort_handlers();
    let agent_addr = agent.local_addrs()[0];

    let mut manager = Manager::builder()
        .bind(loopback())
        .community(COMMUNITY_RO)
        .build()
        .unwrap();
    let device = manager.device(agent_addr);
    let polled = Arc::new(AtomicI32::new(-1));
    let handler = manager
        .add_integer_poller(
            device.clone(),
            &format!("{PREFIX}.1.0"),
            polled.clone(),
            Some(Duration::from_secs(60)),
        )
        .unwrap();

    let deadline = tokio::time::Instant::now() + EXCHANGE_TIMEOUT;
    while polled.load(Ordering::Relaxed) != 42 {
        assert!(tokio::time::Instant::now() < deadline, "poll never completed");
        manager.poll();
        agent.poll();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let info = manager.polling_info(&handler, &device).unwrap();
    assert!(!info.is_awaiting());
    assert!(info.last_poll.is_some());
    assert_eq!(manager.live_request_count(), 0);
}

#[tokio::test]
async fn test_manager_polls_v1_agent() {
    let mut agent = loopback_agent();
    agent
        .add_integer_handler(".3.0", Arc::new(AtomicI32::new(-5)), -10, 10, false)
        .unwrap();
    agent.sort_handlers();

    let mut manager = Manager::builder().bind(loopback()).build().unwrap();
    let device = Arc::new(Device::v1(agent.local_addrs()[0], COMMUNITY_RO));
    let polled = Arc::new(AtomicI32::new(0));
    manager
        .add_integer_poller(device, &format!("{PREFIX}.3.0"), polled.clone(), None)
        .unwrap();

    let deadline = tokio::time::Instant::now() + EXCHANGE_TIMEOUT;
    while polled.load(Ordering::Relaxed) != -5 {
        assert!(tokio::time::Instant::now() < deadline, "poll never completed");
        manager.poll();
        agent.poll();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_set_over_udp() {
    let mut agent = loopback_agent();
    let location = Arc::new(Mutex::new(b"lab".to_vec()));
    agent
        .add_handler_absolute(
            "1.3.6.1.2.1.1.6.0",
            snmp_engine::Binding::OctetString {
                value: location.clone(),
                max_len: 32,
            },
            true,
        )
        .unwrap();
    agent.sort_handlers();

    let client = client_socket();
    let set = CommunityMessage::v2c(
        COMMUNITY_RW,
        Pdu::set_request(77, vec![VarBind::new(sys_location(), Value::from("roof"))]),
    )
    .encode();
    client.send_to(&set, agent.local_addrs()[0]).unwrap();

    assert_eq!(poll_agent_until_packet(&mut agent).await, PollStatus::SetOccurred);
    assert_eq!(location.lock().unwrap().as_slice(), b"roof");

    let (reply, _) = receive(&client);
    assert_eq!(reply.version, Version::V2c);
    assert_eq!(reply.pdu.pdu_type, PduType::Response);
    assert_eq!(reply.pdu.request_id, 77);
    assert_eq!(reply.pdu.error_status_enum(), ErrorStatus::NoError);
}

#[tokio::test]
async fn test_wrong_community_gets_no_answer() {
    let mut agent = loopback_agent();
    agent
        .add_handler_absolute(
            "1.3.6.1.2.1.1.1.0",
            snmp_engine::Binding::ReadOnlyOctetString(Bytes::from_static(b"box")),
            false,
        )
        .unwrap();

    let client = client_socket();
    client
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let get = CommunityMessage::v2c("nope", Pdu::get_request(5, &[sys_descr()])).encode();
    client.send_to(&get, agent.local_addrs()[0]).unwrap();

    assert_eq!(poll_agent_until_packet(&mut agent).await, PollStatus::Dropped);
    let mut buf = [0u8; 64];
    assert!(client.recv_from(&mut buf).is_err());
}

#[tokio::test]
async fn test_inform_acknowledged_over_udp() {
    let mut agent = loopback_agent();
    let receiver = client_socket();
    let receiver_addr = receiver.local_addr().unwrap();

    let trap = Trap::v2c(oid!(1, 3, 6, 1, 4, 1, 99999, 0, 1))
        .inform(true)
        .remote_port(receiver_addr.port());
    let outcome = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    let on_status: StatusCallback = Box::new(move |id, delivered| {
        *sink.lock().unwrap() = Some((id, delivered));
    });

    let id = agent
        .send_trap_to(&trap, receiver_addr.ip(), Some(on_status), TrapDelivery::default())
        .unwrap();

    let (inform, from) = receive(&receiver);
    assert_eq!(inform.pdu.pdu_type, PduType::InformRequest);
    assert_eq!(inform.pdu.request_id, id);
    assert_eq!(inform.pdu.varbinds[0].oid, sys_uptime());

    let ack = CommunityMessage::v2c(COMMUNITY_RO, Pdu::response(id, inform.pdu.varbinds)).encode();
    receiver.send_to(&ack, from).unwrap();

    assert_eq!(
        poll_agent_until_packet(&mut agent).await,
        PollStatus::InformResponseOccurred
    );
    assert_eq!(*outcome.lock().unwrap(), Some((id, true)));
    assert_eq!(agent.queued_informs(), 0);
}

#[tokio::test]
async fn test_restart_keeps_port() {
    let mut agent = loopback_agent();
    let before = agent.local_addrs();
    agent.restart_transports().unwrap();
    assert_eq!(agent.local_addrs(), before);
}
