//! 채널 시뮬레이터 (스위치)
//!
//! - 단일 입력 큐에서 도착 순서대로 처리
//! - 고정 확률로 패킷 폐기
//! - 살아남은 패킷은 고정 처리 지연 후 목적지 큐로 전달
//! - 목적지 큐가 가득 차면 블록하지 않고 폐기

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::{QueueRx, QueueTx};
use crate::packet::{Destination, Packet};
use crate::stats::Statistics;
use crate::Error;

/// 패킷 하나의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Forwarded(Destination),
    DroppedByLoss,
    DroppedQueueFull(Destination),
    Unroutable(Destination),
}

/// 스위치 종료 시 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchSummary {
    pub forwarded: u64,
    pub dropped_by_loss: u64,
    pub dropped_queue_full: u64,
    pub unroutable: u64,
}

impl SwitchSummary {
    fn record(&mut self, outcome: SwitchOutcome) {
        match outcome {
            SwitchOutcome::Forwarded(_) => self.forwarded += 1,
            SwitchOutcome::DroppedByLoss => self.dropped_by_loss += 1,
            SwitchOutcome::DroppedQueueFull(_) => self.dropped_queue_full += 1,
            SwitchOutcome::Unroutable(_) => self.unroutable += 1,
        }
    }
}

/// 스위치
pub struct Switch {
    inbound: QueueRx<Packet>,
    outputs: [Option<QueueTx<Packet>>; 2],
    loss_probability: f64,
    processing_delay: Duration,
    poll_interval: Duration,
    stats: Arc<Statistics>,
    rng: StdRng,
    summary: SwitchSummary,
}

impl Switch {
    pub fn new(
        inbound: QueueRx<Packet>,
        loss_probability: f64,
        processing_delay: Duration,
        poll_interval: Duration,
        stats: Arc<Statistics>,
        rng: StdRng,
    ) -> Self {
        Self {
            inbound,
            outputs: [None, None],
            loss_probability,
            processing_delay,
            poll_interval,
            stats,
            rng,
            summary: SwitchSummary::default(),
        }
    }

    /// 목적지 큐 연결
    pub fn connect(&mut self, destination: Destination, queue: QueueTx<Packet>) {
        self.outputs[destination.index()] = Some(queue);
    }

    /// 패킷 하나 처리
    pub fn process(&mut self, packet: Packet) -> SwitchOutcome {
        let outcome = self.route(packet);
        self.summary.record(outcome);
        outcome
    }

    fn route(&mut self, packet: Packet) -> SwitchOutcome {
        if self.loss_probability > 0.0 && self.rng.gen_bool(self.loss_probability) {
            debug!(
                "스위치 폐기: seq={} sender={}",
                packet.sequence_number(),
                packet.sender_id()
            );
            return SwitchOutcome::DroppedByLoss;
        }

        if !self.processing_delay.is_zero() {
            thread::sleep(self.processing_delay);
        }

        let destination = packet.destination();
        let Some(queue) = &self.outputs[destination.index()] else {
            warn!("연결되지 않은 목적지: {}", destination);
            return SwitchOutcome::Unroutable(destination);
        };

        match queue.try_send(packet) {
            Ok(()) => SwitchOutcome::Forwarded(destination),
            Err((packet, Error::QueueFull)) => {
                debug!(
                    "{} 큐 가득 참, 폐기: seq={}",
                    destination,
                    packet.sequence_number()
                );
                SwitchOutcome::DroppedQueueFull(destination)
            }
            Err((_, _)) => SwitchOutcome::Unroutable(destination),
        }
    }

    /// 종료 플래그나 입력 큐 단절까지 실행
    pub fn run(mut self) -> SwitchSummary {
        info!(
            "Switch started (loss={:.3}%, delay={:?})",
            self.loss_probability * 100.0,
            self.processing_delay
        );

        while !self.stats.is_done() {
            match self.inbound.recv_timeout(self.poll_interval) {
                Ok(packet) => {
                    self.process(packet);
                }
                Err(Error::QueueTimeout) => continue,
                Err(_) => break,
            }
        }

        info!(
            "Switch stopped: forwarded={} dropped={} full={}",
            self.summary.forwarded, self.summary.dropped_by_loss, self.summary.dropped_queue_full
        );
        self.summary
    }

    pub fn summary(&self) -> &SwitchSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::bounded;
    use bytes::Bytes;
    use rand::SeedableRng;

    fn switch_with(loss: f64) -> (QueueTx<Packet>, Switch) {
        let (tx, rx) = bounded(64);
        let stats = Arc::new(Statistics::new(1_000));
        let switch = Switch::new(
            rx,
            loss,
            Duration::ZERO,
            Duration::from_millis(1),
            stats,
            StdRng::seed_from_u64(3),
        );
        (tx, switch)
    }

    fn packet(destination: Destination, seq: u32, sender: u8) -> Packet {
        Packet::new(destination, seq, sender, Bytes::from_static(b"x"))
    }

    #[test]
    fn test_lossless_switch_conserves_packets() {
        let (_tx, mut switch) = switch_with(0.0);
        let (a_tx, a_rx) = bounded(64);
        let (b_tx, b_rx) = bounded(64);
        switch.connect(Destination::ReceiverA, a_tx);
        switch.connect(Destination::ReceiverB, b_tx);

        for seq in 0..20u32 {
            let dest = if seq % 3 == 0 { Destination::ReceiverB } else { Destination::ReceiverA };
            let sender = (seq % 2) as u8;
            assert_eq!(switch.process(packet(dest, seq, sender)), SwitchOutcome::Forwarded(dest));
        }

        let a: Vec<_> = a_rx.drain();
        let b: Vec<_> = b_rx.drain();
        assert_eq!(a.len() + b.len(), 20);
        assert!(a.iter().all(|p| p.destination() == Destination::ReceiverA));
        assert!(b.iter().all(|p| p.destination() == Destination::ReceiverB));

        // 송신자별 상대 순서 유지
        for sender in 0..2u8 {
            let seqs: Vec<u32> = a
                .iter()
                .filter(|p| p.sender_id() == sender)
                .map(|p| p.sequence_number())
                .collect();
            assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        }
        assert_eq!(switch.summary().forwarded, 20);
    }

    #[test]
    fn test_full_destination_drops_without_blocking() {
        let (_tx, mut switch) = switch_with(0.0);
        let (a_tx, a_rx) = bounded(2);
        switch.connect(Destination::ReceiverA, a_tx);

        for seq in 0..2 {
            switch.process(packet(Destination::ReceiverA, seq, 0));
        }
        assert_eq!(
            switch.process(packet(Destination::ReceiverA, 2, 0)),
            SwitchOutcome::DroppedQueueFull(Destination::ReceiverA)
        );
        assert_eq!(a_rx.len(), 2);
        assert_eq!(switch.summary().dropped_queue_full, 1);
    }

    #[test]
    fn test_total_loss_drops_everything() {
        let (_tx, mut switch) = switch_with(1.0);
        let (a_tx, a_rx) = bounded(8);
        switch.connect(Destination::ReceiverA, a_tx);

        for seq in 0..5 {
            assert_eq!(
                switch.process(packet(Destination::ReceiverA, seq, 0)),
                SwitchOutcome::DroppedByLoss
            );
        }
        assert!(a_rx.is_empty());
    }

    #[test]
    fn test_unconnected_destination() {
        let (_tx, mut switch) = switch_with(0.0);
        assert_eq!(
            switch.process(packet(Destination::ReceiverB, 0, 0)),
            SwitchOutcome::Unroutable(Destination::ReceiverB)
        );
    }

    #[test]
    fn test_run_exits_when_inbound_disconnects() {
        let (tx, mut switch) = switch_with(0.0);
        let (a_tx, a_rx) = bounded(8);
        switch.connect(Destination::ReceiverA, a_tx);

        tx.send(packet(Destination::ReceiverA, 0, 0)).unwrap();
        tx.send(packet(Destination::ReceiverA, 1, 0)).unwrap();
        drop(tx);

        let summary = switch.run();
        assert_eq!(summary.forwarded, 2);
        assert_eq!(a_rx.len(), 2);
    }
}
