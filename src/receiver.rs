//! 수신자
//!
//! - 목적지 검증 (잘못 라우팅된 패킷 폐기)
//! - 윈도우 모드: 시퀀스 갭 기반 손실 집계
//! - ARQ 모드: ACK 생성 (ACK 경로 손실 시뮬레이션 포함)

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::{QueueRx, QueueTx};
use crate::config::DeliveryMode;
use crate::packet::{Ack, Destination, Packet, SenderId, SequenceNumber};
use crate::stats::{ReceiveOutcome, Statistics};
use crate::{Config, Error};

/// 윈도우 모드의 "다음 기대 시퀀스" 커서
///
/// 기대값보다 큰 번호가 오면 그 차이를 손실로 본다. 커서는 순서와 무관하게
/// 항상 `received + 1`로 이동하므로, 늦게 도착한 번호는 이미 손실로 집계된 채 남는다.
#[derive(Debug, Clone, Default)]
pub struct GapTracker {
    expected: SequenceNumber,
}

impl GapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 커서를 움직이지 않고 `received`가 드러낼 손실 수만 계산
    pub fn gap(&self, received: SequenceNumber) -> u64 {
        received.saturating_sub(self.expected) as u64
    }

    /// 수신 번호 반영, 새로 발견된 손실 수 반환
    pub fn observe(&mut self, received: SequenceNumber) -> u64 {
        let lost = self.gap(received);
        self.expected = received.saturating_add(1);
        lost
    }

    pub fn expected(&self) -> SequenceNumber {
        self.expected
    }
}

/// ACK 경로
///
/// 큐가 하나면 모든 송신자가 공유하고, 여러 개면 `sender_id`로 골라 보낸다.
#[derive(Debug, Clone)]
pub struct AckRoute {
    queues: Vec<QueueTx<Ack>>,
}

impl AckRoute {
    /// 모든 송신자가 함께 읽는 공유 큐
    pub fn shared(queue: QueueTx<Ack>) -> Self {
        Self { queues: vec![queue] }
    }

    /// 송신자별 큐 (인덱스 = sender_id)
    pub fn per_sender(queues: Vec<QueueTx<Ack>>) -> Self {
        Self { queues }
    }

    fn queue_for(&self, sender_id: SenderId) -> Option<&QueueTx<Ack>> {
        match self.queues.len() {
            1 => self.queues.first(),
            _ => self.queues.get(sender_id as usize),
        }
    }
}

/// ACK 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDisposition {
    /// 윈도우 모드이거나 종료 후 수신
    NotRequired,
    Sent,
    /// ACK 경로 손실로 폐기
    Dropped,
    /// 대기 한도 안에 큐에 넣지 못함
    Failed,
}

/// 패킷 하나의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Misrouted,
    Accepted {
        gap_lost: u64,
        outcome: ReceiveOutcome,
        ack: AckDisposition,
    },
}

/// 수신자 종료 시 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverSummary {
    pub accepted: u64,
    pub misrouted: u64,
    pub gap_lost: u64,
    pub acks_sent: u64,
    pub acks_dropped: u64,
    pub ack_failures: u64,
}

/// 수신자
pub struct Receiver {
    identity: Destination,
    mode: DeliveryMode,
    inbound: QueueRx<Packet>,
    acks: Option<AckRoute>,
    stats: Arc<Statistics>,
    tracker: GapTracker,
    rng: StdRng,
    ack_loss_probability: f64,
    ack_send_timeout: Duration,
    poll_interval: Duration,
    summary: ReceiverSummary,
}

impl Receiver {
    /// 새 수신자 생성
    pub fn new(
        identity: Destination,
        config: &Config,
        inbound: QueueRx<Packet>,
        acks: Option<AckRoute>,
        stats: Arc<Statistics>,
        rng: StdRng,
    ) -> Self {
        Self {
            identity,
            mode: config.mode,
            inbound,
            acks,
            stats,
            tracker: GapTracker::new(),
            rng,
            ack_loss_probability: config.ack_loss_probability,
            ack_send_timeout: config.ack_send_timeout,
            poll_interval: config.poll_interval,
            summary: ReceiverSummary::default(),
        }
    }

    pub fn identity(&self) -> Destination {
        self.identity
    }

    /// 패킷 하나 처리
    pub fn handle(&mut self, packet: Packet) -> Delivery {
        if packet.destination() != self.identity {
            debug!(
                "{}: 잘못 라우팅된 패킷 폐기 (dest={}, seq={})",
                self.identity,
                packet.destination(),
                packet.sequence_number()
            );
            self.summary.misrouted += 1;
            return Delivery::Misrouted;
        }

        let gap_lost = match self.mode {
            DeliveryMode::Windowed => self.tracker.gap(packet.sequence_number()),
            DeliveryMode::StopAndWait => 0,
        };

        let outcome = self.stats.record_received(gap_lost);
        // 종료 후 도착분은 통계와 마찬가지로 요약과 커서에도 반영하지 않는다
        if outcome == ReceiveOutcome::AfterDone {
            return Delivery::Accepted {
                gap_lost: 0,
                outcome,
                ack: AckDisposition::NotRequired,
            };
        }

        if self.mode == DeliveryMode::Windowed {
            self.tracker.observe(packet.sequence_number());
        }
        self.summary.accepted += 1;
        self.summary.gap_lost += gap_lost;

        if gap_lost > 0 {
            debug!(
                "{}: 시퀀스 갭 {} (seq={})",
                self.identity,
                gap_lost,
                packet.sequence_number()
            );
        }
        if outcome == ReceiveOutcome::Completed {
            info!(
                "{}: 목표 {} 패킷 도달",
                self.identity,
                self.stats.target_packets()
            );
        }

        let ack = match self.mode {
            DeliveryMode::Windowed => AckDisposition::NotRequired,
            DeliveryMode::StopAndWait => self.acknowledge(&packet),
        };

        Delivery::Accepted {
            gap_lost,
            outcome,
            ack,
        }
    }

    fn acknowledge(&mut self, packet: &Packet) -> AckDisposition {
        let Some(route) = &self.acks else {
            return AckDisposition::NotRequired;
        };
        let Some(acks) = route.queue_for(packet.sender_id()) else {
            warn!("{}: sender {}의 ACK 큐 없음", self.identity, packet.sender_id());
            self.summary.ack_failures += 1;
            return AckDisposition::Failed;
        };

        if self.ack_loss_probability > 0.0 && self.rng.gen_bool(self.ack_loss_probability) {
            debug!("ACK 폐기: seq={} sender={}", packet.sequence_number(), packet.sender_id());
            self.summary.acks_dropped += 1;
            return AckDisposition::Dropped;
        }

        match acks.send_timeout(packet.ack(), self.ack_send_timeout) {
            Ok(()) => {
                self.summary.acks_sent += 1;
                AckDisposition::Sent
            }
            Err((ack, e)) => {
                warn!("{}: ACK 송신 실패 seq={}: {}", self.identity, ack.sequence_number, e);
                self.summary.ack_failures += 1;
                AckDisposition::Failed
            }
        }
    }

    /// 종료 플래그나 입력 큐 단절까지 실행
    pub fn run(mut self) -> ReceiverSummary {
        info!("Receiver {} started ({})", self.identity, self.mode);

        while !self.stats.is_done() {
            match self.inbound.recv_timeout(self.poll_interval) {
                Ok(packet) => {
                    self.handle(packet);
                }
                Err(Error::QueueTimeout) => continue,
                Err(_) => break,
            }
        }

        info!(
            "Receiver {} stopped: accepted={} gap_lost={} acks={}",
            self.identity, self.summary.accepted, self.summary.gap_lost, self.summary.acks_sent
        );
        self.summary
    }

    pub fn summary(&self) -> &ReceiverSummary {
        &self.summary
    }
}
