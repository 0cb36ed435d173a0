//! ARP resolution: withholding, replies and requests

use super::topology::*;
use ipfwd::dataplane::{ArpPolicy, Disposition};
use ipfwd::protocol::arp::{ArpOp, ArpPacket};
use ipfwd::protocol::ethernet::EthernetHeader;
use ipfwd::protocol::ipv4::Protocol;
use ipfwd::protocol::MacAddr;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

#[test]
fn test_miss_sends_one_request_and_withholds_copy() {
    let router = router();
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    let original = frame.clone();

    assert_eq!(process(&router, "eth1", &mut frame), Disposition::Processed);

    let sent = router.transmitter().take();
    assert_eq!(sent.len(), 1);
    assert!(is_arp_request_for(&sent[0].data, HOST_B_IP));

    let pending = router.arp().pending_lookup(HOST_B_IP).unwrap().unwrap();
    assert_eq!(pending.interface, "eth2");
    assert_eq!(pending.withheld, 1);
    assert_eq!(pending.requests_sent, 1);

    // The caller reuses its buffer
    frame.fill(0);

    let mut reply = arp_reply_from(HOST_B_MAC, HOST_B_IP, ETH2_MAC, ETH2_IP);
    process(&router, "eth2", &mut reply);

    let sent = router.transmitter().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0].data[34..], &original[34..]);
    assert_eq!(ip_header(&sent[0].data).ttl(), 63);
}

#[test]
fn test_second_datagram_joins_pending_request() {
    let router = router();

    for _ in 0..2 {
        let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
        process(&router, "eth1", &mut frame);
    }

    let requests = router
        .transmitter()
        .sent()
        .iter()
        .filter(|f| is_arp_request_for(&f.data, HOST_B_IP))
        .count();
    assert_eq!(requests, 1);
    assert_eq!(router.arp().pending_len().unwrap(), 1);
    assert_eq!(router.arp().pending_lookup(HOST_B_IP).unwrap().unwrap().withheld, 2);
    assert_eq!(router.stats().frames_withheld.get(), 2);
}

#[test]
fn test_withholding_races_expiry_sweep() {
    const FRAMES: usize = 200;
    let router = router_with_policy(ArpPolicy {
        max_requests: 1,
        retry_interval: Duration::ZERO,
        ..ArpPolicy::default()
    });

    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..FRAMES {
                let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
                assert_eq!(process(&router, "eth1", &mut frame), Disposition::Processed);
            }
        });
        s.spawn(|| {
            for _ in 0..FRAMES {
                router.run_arp_maintenance(Instant::now()).unwrap();
            }
        });
    });
    router.run_arp_maintenance(Instant::now()).unwrap();

    // Every withheld frame ends in exactly one Host Unreachable
    let unreachable = router
        .transmitter()
        .sent()
        .iter()
        .filter(|f| f.interface == "eth1" && icmp_type_code(&f.data) == (3, 1))
        .count();
    assert_eq!(unreachable, FRAMES);
    assert_eq!(router.stats().frames_withheld.get(), FRAMES as u64);
    assert_eq!(router.arp().pending_len().unwrap(), 0);
}

#[test]
fn test_reply_releases_all_withheld_frames() {
    let router = router();
    let ttls = [64u8, 10, 2];
    for ttl in ttls {
        let mut frame = datagram_from_a(HOST_B_IP, ttl, Protocol::Udp as u8);
        process(&router, "eth1", &mut frame);
    }
    router.transmitter().take();

    let mut reply = arp_reply_from(HOST_B_MAC, HOST_B_IP, ETH2_MAC, ETH2_IP);
    assert_eq!(process(&router, "eth2", &mut reply), Disposition::Processed);

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), ttls.len());
    for (frame, ttl) in sent.iter().zip(ttls) {
        assert_eq!(frame.interface, "eth2");
        let eth = EthernetHeader::parse(&frame.data).unwrap();
        assert_eq!(eth.dst_mac(), HOST_B_MAC);
        assert_eq!(eth.src_mac(), ETH2_MAC);

        let ip = ip_header(&frame.data);
        assert_eq!(ip.ttl(), ttl - 1);
        assert!(ip.validate_checksum());
    }

    assert!(router.arp().pending_lookup(HOST_B_IP).unwrap().is_none());
    assert_eq!(router.arp().lookup(HOST_B_IP).unwrap(), Some(HOST_B_MAC));
}

#[test]
fn test_resolved_hop_forwards_directly() {
    let router = router();
    let mut first = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    process(&router, "eth1", &mut first);
    let mut reply = arp_reply_from(HOST_B_MAC, HOST_B_IP, ETH2_MAC, ETH2_IP);
    process(&router, "eth2", &mut reply);
    router.transmitter().take();

    let mut second = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    process(&router, "eth1", &mut second);

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(EthernetHeader::parse(&sent[0].data).unwrap().dst_mac(), HOST_B_MAC);
    assert_eq!(router.arp().pending_len().unwrap(), 0);
}

#[test]
fn test_unsolicited_reply_populates_cache() {
    let router = router();
    let mut reply = arp_reply_from(HOST_B_MAC, HOST_B_IP, ETH2_MAC, ETH2_IP);

    assert_eq!(process(&router, "eth2", &mut reply), Disposition::Processed);
    assert!(router.transmitter().is_empty());
    assert_eq!(router.arp().lookup(HOST_B_IP).unwrap(), Some(HOST_B_MAC));
}

#[test]
fn test_request_for_interface_is_answered() {
    let router = router();
    let request = ArpPacket::request(HOST_A_MAC, HOST_A_IP, ETH1_IP);

    // Twice: once with an empty cache, once with a stale entry
    for _ in 0..2 {
        let mut frame = arp_frame(MacAddr::BROADCAST, &request);
        assert_eq!(process(&router, "eth1", &mut frame), Disposition::Processed);

        let sent = router.transmitter().take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].interface, "eth1");

        let eth = EthernetHeader::parse(&sent[0].data).unwrap();
        assert_eq!(eth.dst_mac(), HOST_A_MAC);
        assert_eq!(eth.src_mac(), ETH1_MAC);

        let reply = arp_packet(&sent[0].data);
        assert_eq!(reply.operation, ArpOp::Reply);
        assert_eq!(reply.sender_mac, ETH1_MAC);
        assert_eq!(reply.sender_ip, ETH1_IP);
        assert_eq!(reply.target_mac, HOST_A_MAC);
        assert_eq!(reply.target_ip, HOST_A_IP);

        router
            .arp()
            .insert(HOST_A_IP, MacAddr([0xde, 0xad, 0, 0, 0, 1]))
            .unwrap();
    }

    assert_eq!(router.arp().pending_len().unwrap(), 0);
}

#[test]
fn test_request_does_not_touch_cache() {
    let router = router();
    let mut frame = arp_frame(
        MacAddr::BROADCAST,
        &ArpPacket::request(HOST_A_MAC, HOST_A_IP, ETH1_IP),
    );

    process(&router, "eth1", &mut frame);
    assert_eq!(router.arp().lookup(HOST_A_IP).unwrap(), None);
    assert_eq!(router.arp().cache_len().unwrap(), 0);
}

#[test]
fn test_arp_not_for_ingress_address_dropped() {
    let router = router();

    for target in [Ipv4Addr::new(10, 0, 1, 99), ETH2_IP] {
        let mut frame = arp_frame(
            MacAddr::BROADCAST,
            &ArpPacket::request(HOST_A_MAC, HOST_A_IP, target),
        );
        assert_eq!(process(&router, "eth1", &mut frame), Disposition::Dropped);
    }

    let mut reply = arp_reply_from(HOST_B_MAC, HOST_B_IP, ETH1_MAC, ETH1_IP);
    assert_eq!(process(&router, "eth2", &mut reply), Disposition::Dropped);

    assert!(router.transmitter().is_empty());
    assert_eq!(router.arp().cache_len().unwrap(), 0);
}

#[test]
fn test_malformed_arp_dropped() {
    let router = router();
    let mut frame = arp_frame(
        MacAddr::BROADCAST,
        &ArpPacket::request(HOST_A_MAC, HOST_A_IP, ETH1_IP),
    );
    // Hardware type 6 (IEEE 802)
    frame[15] = 6;

    assert_eq!(process(&router, "eth1", &mut frame), Disposition::Dropped);

    let mut short = frame[..30].to_vec();
    assert_eq!(process(&router, "eth1", &mut short), Disposition::Dropped);
    assert!(router.transmitter().is_empty());
}
