//! Forwarding decisions for transit datagrams

use super::topology::*;
use ipfwd::capture::RecordingTransmitter;
use ipfwd::dataplane::{Disposition, Interface, Route, Router, RouterContext, RoutingTable};
use ipfwd::protocol::ethernet::EthernetHeader;
use ipfwd::protocol::ipv4::Protocol;
use std::net::Ipv4Addr;

#[test]
fn test_no_route_is_net_unreachable() {
    let router = router();
    let mut frame = datagram_from_a(Ipv4Addr::new(8, 8, 8, 8), 64, Protocol::Udp as u8);

    assert_eq!(process(&router, "eth1", &mut frame), Disposition::Processed);

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth1");
    assert_eq!(icmp_type_code(&sent[0].data), (3, 0));
}

#[test]
fn test_unroutable_expiring_datagram_is_net_unreachable() {
    let router = router();
    let mut frame = datagram_from_a(Ipv4Addr::new(8, 8, 8, 8), 1, Protocol::Udp as u8);

    process(&router, "eth1", &mut frame);
    assert_eq!(icmp_type_code(&router.transmitter().sent()[0].data), (3, 0));
}

#[test]
fn test_ttl_one_is_never_forwarded() {
    for ttl in [0, 1] {
        let router = router();
        router.arp().insert(HOST_B_IP, HOST_B_MAC).unwrap();
        let mut frame = datagram_from_a(HOST_B_IP, ttl, Protocol::Udp as u8);
        let before = frame.clone();

        assert_eq!(process(&router, "eth1", &mut frame), Disposition::Processed);

        let sent = router.transmitter().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].interface, "eth1");
        assert_eq!(icmp_type_code(&sent[0].data), (11, 0));
        assert_eq!(frame, before);
        assert_eq!(router.stats().datagrams_forwarded.get(), 0);
    }
}

#[test]
fn test_cache_hit_forwards_with_rewritten_header() {
    let router = router();
    router.arp().insert(HOST_B_IP, HOST_B_MAC).unwrap();
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);

    assert_eq!(process(&router, "eth1", &mut frame), Disposition::Processed);

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth2");

    let eth = EthernetHeader::parse(&sent[0].data).unwrap();
    assert_eq!(eth.dst_mac(), HOST_B_MAC);
    assert_eq!(eth.src_mac(), ETH2_MAC);

    let ip = ip_header(&sent[0].data);
    assert_eq!(ip.ttl(), 63);
    assert!(ip.validate_checksum());
    assert_eq!(ip.src_addr(), HOST_A_IP);
    assert_eq!(ip.dst_addr(), HOST_B_IP);
    assert_eq!(&sent[0].data[34..], &frame[34..]);
    assert_eq!(router.stats().datagrams_forwarded.get(), 1);
}

#[test]
fn test_connected_route_resolves_destination() {
    let router = router();
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);

    process(&router, "eth1", &mut frame);

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth2");
    assert!(is_arp_request_for(&sent[0].data, HOST_B_IP));
}

#[test]
fn test_gateway_route_resolves_gateway() {
    let router = router();
    let mut frame = datagram_from_a(Ipv4Addr::new(172, 20, 1, 1), 64, Protocol::Udp as u8);

    process(&router, "eth1", &mut frame);

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth3");
    assert!(is_arp_request_for(&sent[0].data, GW_IP));

    let request = arp_packet(&sent[0].data);
    assert_eq!(request.sender_mac, ETH3_MAC);
    assert_eq!(request.sender_ip, ETH3_IP);
    assert!(request.target_mac.octets().iter().all(|b| *b == 0));
}

#[test]
fn test_gateway_hit_uses_gateway_mac() {
    let router = router();
    router.arp().insert(GW_IP, GW_MAC).unwrap();
    let mut frame = datagram_from_a(Ipv4Addr::new(172, 20, 1, 1), 64, Protocol::Tcp as u8);

    process(&router, "eth1", &mut frame);

    let sent = router.transmitter().sent();
    assert_eq!(sent[0].interface, "eth3");
    assert_eq!(EthernetHeader::parse(&sent[0].data).unwrap().dst_mac(), GW_MAC);
    assert_eq!(ip_header(&sent[0].data).dst_addr(), Ipv4Addr::new(172, 20, 1, 1));
}

#[test]
fn test_equal_masks_first_route_wins() {
    let interfaces = context().interfaces().to_vec();
    let routes: RoutingTable = [
        Route::new(
            Ipv4Addr::new(172, 16, 0, 0),
            Ipv4Addr::new(255, 240, 0, 0),
            GW_IP,
            "eth3",
        ),
        Route::new(
            Ipv4Addr::new(172, 16, 0, 0),
            Ipv4Addr::new(255, 240, 0, 0),
            HOST_B_IP,
            "eth2",
        ),
    ]
    .into_iter()
    .collect();
    let router = Router::new(
        RouterContext::new(interfaces, routes),
        RecordingTransmitter::new(),
    );
    let mut frame = datagram_from_a(Ipv4Addr::new(172, 16, 0, 9), 64, Protocol::Udp as u8);

    process(&router, "eth1", &mut frame);

    let sent = router.transmitter().sent();
    assert_eq!(sent[0].interface, "eth3");
    assert!(is_arp_request_for(&sent[0].data, GW_IP));
}

#[test]
fn test_bad_header_checksum_dropped() {
    let router = router();
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    frame[24] ^= 0xff;

    assert_eq!(process(&router, "eth1", &mut frame), Disposition::Dropped);
    assert!(router.transmitter().is_empty());
}

#[test]
fn test_transmit_failure_is_not_fatal() {
    let router = router();
    router.transmitter().set_down("eth2");
    router.arp().insert(HOST_B_IP, HOST_B_MAC).unwrap();
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);

    let result = router.process(ipfwd::dataplane::Frame::new("eth1", &mut frame));
    assert_eq!(result.unwrap(), Disposition::Processed);
    assert_eq!(router.stats().transmit_errors.get(), 1);
    assert!(router.transmitter().is_empty());
}

#[test]
fn test_interface_list_is_preserved() {
    let ctx = context();
    let names: Vec<&str> = ctx.interfaces().iter().map(|i: &Interface| i.name.as_str()).collect();
    assert_eq!(names, ["eth1", "eth2", "eth3"]);
}
