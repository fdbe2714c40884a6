//! 전체 시뮬레이션 통합 테스트
//!
//! 작은 목표 수로 모든 태스크를 실제 스레드로 띄워 끝까지 실행한다.

use std::time::Duration;

use arqsim::{AckRouting, Config, DeliveryMode, Destination, Simulation};

fn lossless(mode: DeliveryMode, target: u64) -> Config {
    Config {
        target_packets: target,
        seed: Some(1234),
        run_timeout: Some(Duration::from_secs(20)),
        ..Config::lossless(mode)
    }
}

#[test]
fn test_windowed_lossless_single_sender() {
    let config = Config {
        sender_count: 1,
        destinations: vec![Destination::ReceiverA],
        ..lossless(DeliveryMode::Windowed, 200)
    };

    let summary = Simulation::new(config).unwrap().run().unwrap();

    assert!(summary.report.completed);
    assert_eq!(summary.report.received, 200);
    assert_eq!(summary.report.lost, 0);
    assert_eq!(summary.total_retransmissions(), 0);
    assert_eq!(summary.switch.dropped_by_loss, 0);
    assert_eq!(summary.sequences_issued as u64, summary.senders[0].created);
}

#[test]
fn test_windowed_two_senders_conserve_sequence_space() {
    let config = Config {
        sender_count: 2,
        ..lossless(DeliveryMode::Windowed, 300)
    };

    let summary = Simulation::new(config).unwrap().run().unwrap();

    assert!(summary.report.completed);
    assert_eq!(summary.report.received, 300);
    let created: u64 = summary.senders.iter().map(|s| s.created).sum();
    assert_eq!(created, summary.sequences_issued as u64);
    assert!(summary.switch.forwarded >= 300);
}

#[test]
fn test_stop_and_wait_lossless_delivers_everything() {
    let config = Config {
        ack_timeout: Duration::from_millis(500),
        ack_routing: AckRouting::PerSender,
        ..lossless(DeliveryMode::StopAndWait, 100)
    };

    let summary = Simulation::new(config).unwrap().run().unwrap();

    assert!(summary.report.completed);
    assert_eq!(summary.report.received, 100);
    assert_eq!(summary.report.lost, 0);
    assert_eq!(summary.senders.iter().map(|s| s.abandoned).sum::<u64>(), 0);
    assert_eq!(summary.receivers.len(), 2);
}

#[test]
fn test_stop_and_wait_total_ack_loss_abandons_after_four_attempts() {
    let config = Config {
        sender_count: 1,
        destinations: vec![Destination::ReceiverA],
        ack_loss_probability: 1.0,
        ack_timeout: Duration::from_millis(30),
        ..lossless(DeliveryMode::StopAndWait, 8)
    };

    let summary = Simulation::new(config).unwrap().run().unwrap();

    // 패킷마다 4번 도착, 첫 패킷만 포기가 집계된 뒤 두 번째 패킷 4번째 도착에서 완료
    assert!(summary.report.completed);
    assert_eq!(summary.report.received, 8);
    assert_eq!(summary.report.lost, 1);
    assert_eq!(summary.sequences_issued, 2);
    assert_eq!(summary.receivers[0].acks_dropped, 8);
}

#[test]
fn test_run_timeout_reports_incomplete() {
    let config = Config {
        sender_count: 1,
        switch_loss_probability: 1.0,
        run_timeout: Some(Duration::from_millis(100)),
        ..lossless(DeliveryMode::Windowed, 50)
    };

    let summary = Simulation::new(config).unwrap().run().unwrap();

    assert!(!summary.report.completed);
    assert_eq!(summary.report.received, 0);
    assert_eq!(summary.report.throughput_bps, 0);
    assert!(summary.switch.dropped_by_loss > 0);
}

#[test]
fn test_stop_and_wait_shared_acks_single_sender() {
    let config = Config {
        sender_count: 1,
        ack_routing: AckRouting::Shared,
        ack_timeout: Duration::from_millis(500),
        ..lossless(DeliveryMode::StopAndWait, 50)
    };

    let summary = Simulation::new(config).unwrap().run().unwrap();

    assert!(summary.report.completed);
    assert_eq!(summary.report.lost, 0);
    assert_eq!(summary.senders[0].stale_acks, 0);
    assert_eq!(summary.senders[0].created, 50);
    assert_eq!(summary.senders[0].acked, 50);
}
