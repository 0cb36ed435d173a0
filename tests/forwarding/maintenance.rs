//! Periodic ARP upkeep: retries, expiry and cache aging

use super::topology::*;
use ipfwd::dataplane::{spawn_arp_maintenance, ArpPolicy};
use ipfwd::protocol::ipv4::Protocol;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn policy(max_requests: u32) -> ArpPolicy {
    ArpPolicy {
        max_requests,
        ..ArpPolicy::default()
    }
}

#[test]
fn test_retry_then_host_unreachable() {
    let router = router_with_policy(policy(2));
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    process(&router, "eth1", &mut frame);
    router.transmitter().take();
    let start = Instant::now();

    router
        .run_arp_maintenance(start + Duration::from_secs(1))
        .unwrap();
    let sent = router.transmitter().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth2");
    assert!(is_arp_request_for(&sent[0].data, HOST_B_IP));
    assert_eq!(
        router.arp().pending_lookup(HOST_B_IP).unwrap().unwrap().requests_sent,
        2
    );

    router
        .run_arp_maintenance(start + Duration::from_secs(2))
        .unwrap();
    let sent = router.transmitter().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth1");
    assert_eq!(icmp_type_code(&sent[0].data), (3, 1));
    assert_eq!(ip_header(&sent[0].data).dst_addr(), HOST_A_IP);
    assert_eq!(router.arp().pending_len().unwrap(), 0);
}

#[test]
fn test_reply_after_final_request_still_flushes() {
    let router = router_with_policy(policy(2));
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    process(&router, "eth1", &mut frame);
    let start = Instant::now();

    // Second and final request goes out
    router
        .run_arp_maintenance(start + Duration::from_secs(1))
        .unwrap();
    // A sweep right behind it must not abandon the resolution
    router
        .run_arp_maintenance(start + Duration::from_millis(1001))
        .unwrap();
    assert_eq!(router.arp().pending_len().unwrap(), 1);
    router.transmitter().take();

    let mut reply = arp_reply_from(HOST_B_MAC, HOST_B_IP, ETH2_MAC, ETH2_IP);
    process(&router, "eth2", &mut reply);

    let sent = router.transmitter().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface, "eth2");
    assert_eq!(ip_header(&sent[0].data).dst_addr(), HOST_B_IP);
    assert_eq!(router.arp().pending_len().unwrap(), 0);
}

#[test]
fn test_no_retry_before_interval() {
    let router = router();
    let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
    process(&router, "eth1", &mut frame);
    router.transmitter().take();

    router.run_arp_maintenance(Instant::now()).unwrap();
    assert!(router.transmitter().is_empty());
    assert_eq!(router.arp().pending_len().unwrap(), 1);
}

#[test]
fn test_cache_entries_age_out() {
    let router = router();
    router.arp().insert(HOST_B_IP, HOST_B_MAC).unwrap();

    let later = Instant::now() + router.policy().cache_timeout + Duration::from_secs(1);
    router.run_arp_maintenance(later).unwrap();

    assert_eq!(router.arp().lookup(HOST_B_IP).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_task_expires_requests() {
    // std Instant does not follow paused tokio time
    let router = Arc::new(router_with_policy(ArpPolicy {
        retry_interval: Duration::ZERO,
        ..policy(1)
    }));
    for _ in 0..2 {
        let mut frame = datagram_from_a(HOST_B_IP, 64, Protocol::Udp as u8);
        process(&router, "eth1", &mut frame);
    }
    router.transmitter().take();

    let handle = spawn_arp_maintenance(Arc::clone(&router), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();

    let sent = router.transmitter().sent();
    assert_eq!(sent.len(), 2);
    for frame in &sent {
        assert_eq!(frame.interface, "eth1");
        assert_eq!(icmp_type_code(&frame.data), (3, 1));
    }
    assert_eq!(router.arp().pending_len().unwrap(), 0);
}
