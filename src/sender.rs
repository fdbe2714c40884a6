//! 송신자
//!
//! - 윈도우 모드: ACK 없이 `window_size`개씩 일괄 전송 후 대기
//! - Stop-and-Wait 모드: 패킷 하나 전송 후 ACK 대기, 타임아웃 시 같은 번호로 재전송
//! - 종료 플래그를 보면 Drained 상태로 전이하고 더 이상 보내지 않음

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::channel::{QueueRx, QueueTx};
use crate::config::DeliveryMode;
use crate::packet::{Ack, Packet, PacketFactory, SenderId, SequenceCounter};
use crate::stats::Statistics;
use crate::{Config, Error, Result};

/// 송신자 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Running,
    /// 종료 관측 후. 이후 송신 없음.
    Drained,
}

/// ACK 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckVerdict {
    /// 대기 중인 패킷 확인 (몇 번째 시도에서였는지)
    Acknowledged { attempts: u32 },
    /// 다른 패킷/송신자의 ACK, 또는 대기 중인 패킷 없음
    Ignored,
}

/// 타임아웃 판정
#[derive(Debug, Clone)]
pub enum TimeoutVerdict {
    /// 같은 패킷 재전송
    Retransmit(Packet),
    /// 최대 시도 초과, 포기
    Abandon(Packet),
}

#[derive(Debug)]
struct InFlight {
    packet: Packet,
    attempts: u32,
}

/// Stop-and-Wait 재전송 상태
///
/// 입출력 없이 상태 전이만 다룬다. 전송은 호출자 책임.
#[derive(Debug)]
pub struct StopAndWait {
    max_attempts: u32,
    in_flight: Option<InFlight>,
}

impl StopAndWait {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            in_flight: None,
        }
    }

    /// 새 패킷 대기 시작, 첫 전송본 반환
    pub fn begin(&mut self, packet: Packet) -> Packet {
        let outgoing = packet.clone();
        self.in_flight = Some(InFlight { packet, attempts: 1 });
        outgoing
    }

    /// 현재 ACK를 기다리는 패킷
    pub fn awaiting(&self) -> Option<&Packet> {
        self.in_flight.as_ref().map(|f| &f.packet)
    }

    /// 현재 패킷의 전송 시도 횟수
    pub fn attempts(&self) -> u32 {
        self.in_flight.as_ref().map_or(0, |f| f.attempts)
    }

    pub fn on_ack(&mut self, ack: Ack) -> AckVerdict {
        match &self.in_flight {
            Some(f) if ack.acknowledges(&f.packet) => {
                let attempts = f.attempts;
                self.in_flight = None;
                AckVerdict::Acknowledged { attempts }
            }
            _ => AckVerdict::Ignored,
        }
    }

    pub fn on_timeout(&mut self) -> Option<TimeoutVerdict> {
        let flight = self.in_flight.as_mut()?;

        if flight.attempts < self.max_attempts {
            flight.attempts += 1;
            return Some(TimeoutVerdict::Retransmit(flight.packet.clone()));
        }

        self.in_flight
            .take()
            .map(|f| TimeoutVerdict::Abandon(f.packet))
    }
}

/// ACK 대기 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckWait {
    Acknowledged,
    TimedOut,
    Disconnected,
}

/// 송신자 종료 시 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderSummary {
    pub sender_id: SenderId,
    /// 생성한 패킷 수 (= 소비한 시퀀스 번호 수)
    pub created: u64,
    /// 큐에 넣은 총 전송 수 (재전송 포함)
    pub transmissions: u64,
    pub retransmissions: u64,
    pub acked: u64,
    pub abandoned: u64,
    pub stale_acks: u64,
    pub backoffs: u64,
}

/// 송신자
pub struct Sender {
    factory: PacketFactory,
    mode: DeliveryMode,
    outbound: QueueTx<Packet>,
    acks: Option<QueueRx<Ack>>,
    stats: Arc<Statistics>,
    rng: StdRng,
    window_size: usize,
    burst_interval: Duration,
    ack_timeout: Duration,
    send_timeout: Duration,
    backoff_delay: Duration,
    arq: StopAndWait,
    state: SenderState,
    summary: SenderSummary,
}

impl Sender {
    /// 새 송신자 생성
    pub fn new(
        sender_id: SenderId,
        config: &Config,
        counter: Arc<SequenceCounter>,
        outbound: QueueTx<Packet>,
        acks: Option<QueueRx<Ack>>,
        stats: Arc<Statistics>,
        rng: StdRng,
    ) -> Self {
        Self {
            factory: PacketFactory::new(
                sender_id,
                counter,
                config.destinations.clone(),
                config.payload_size,
            ),
            mode: config.mode,
            outbound,
            acks,
            stats,
            rng,
            window_size: config.window_size,
            burst_interval: config.burst_interval,
            ack_timeout: config.ack_timeout,
            send_timeout: config.send_timeout,
            backoff_delay: config.backoff_delay,
            arq: StopAndWait::new(config.max_attempts),
            state: SenderState::Running,
            summary: SenderSummary {
                sender_id,
                ..Default::default()
            },
        }
    }

    pub fn sender_id(&self) -> SenderId {
        self.factory.sender_id()
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn summary(&self) -> &SenderSummary {
        &self.summary
    }

    /// Drained가 될 때까지 실행
    pub fn run(mut self) -> SenderSummary {
        info!("Sender {} started ({})", self.sender_id(), self.mode);

        while self.state == SenderState::Running {
            self.state = self.step();
        }

        info!(
            "Sender {} drained: created={} tx={} retx={} abandoned={}",
            self.sender_id(),
            self.summary.created,
            self.summary.transmissions,
            self.summary.retransmissions,
            self.summary.abandoned
        );
        self.summary
    }

    /// 루프 한 바퀴
    pub fn step(&mut self) -> SenderState {
        if self.state == SenderState::Drained || self.stats.is_done() {
            return SenderState::Drained;
        }

        match self.mode {
            DeliveryMode::Windowed => self.send_burst(),
            DeliveryMode::StopAndWait => self.deliver_next(),
        }
    }

    /// 윈도우 하나 전송 후 버스트 간격만큼 대기
    fn send_burst(&mut self) -> SenderState {
        for _ in 0..self.window_size {
            if self.stats.is_done() {
                return SenderState::Drained;
            }

            let Some(packet) = self.next_packet() else {
                return SenderState::Drained;
            };

            if self.transmit(packet).is_err() {
                return SenderState::Drained;
            }
        }

        if !self.burst_interval.is_zero() {
            thread::sleep(self.burst_interval);
        }
        SenderState::Running
    }

    /// 패킷 하나를 확인되거나 포기될 때까지 전송
    fn deliver_next(&mut self) -> SenderState {
        let Some(packet) = self.next_packet() else {
            return SenderState::Drained;
        };
        let mut outgoing = self.arq.begin(packet);

        loop {
            if self.transmit(outgoing).is_err() {
                return SenderState::Drained;
            }

            match self.await_ack() {
                AckWait::Acknowledged => {
                    self.summary.acked += 1;
                    return SenderState::Running;
                }
                AckWait::Disconnected => return SenderState::Drained,
                AckWait::TimedOut => {}
            }

            match self.arq.on_timeout() {
                Some(TimeoutVerdict::Retransmit(packet)) => {
                    debug!(
                        "Sender {}: 타임아웃, 재전송 seq={} (시도 {})",
                        self.sender_id(),
                        packet.sequence_number(),
                        self.arq.attempts()
                    );
                    self.summary.retransmissions += 1;
                    if self.stats.is_done() {
                        return SenderState::Drained;
                    }
                    outgoing = packet;
                }
                Some(TimeoutVerdict::Abandon(packet)) => {
                    debug!(
                        "Sender {}: seq={} 포기",
                        self.sender_id(),
                        packet.sequence_number()
                    );
                    self.summary.abandoned += 1;
                    self.stats.record_lost(1);
                    return SenderState::Running;
                }
                None => return SenderState::Running,
            }
        }
    }

    /// 새 패킷 생성. 시퀀스 번호가 소진되면 None.
    fn next_packet(&mut self) -> Option<Packet> {
        let Some(packet) = self.factory.build(&mut self.rng) else {
            warn!("Sender {}: 시퀀스 번호 소진", self.sender_id());
            return None;
        };
        self.summary.created += 1;
        Some(packet)
    }

    /// 대기 중인 패킷의 ACK를 `ack_timeout`까지 기다림
    ///
    /// 맞지 않는 ACK는 버리고 같은 마감 시각으로 계속 기다린다.
    fn await_ack(&mut self) -> AckWait {
        let Some(acks) = &self.acks else {
            thread::sleep(self.ack_timeout);
            return AckWait::TimedOut;
        };

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return AckWait::TimedOut;
            }

            match acks.recv_timeout(remaining) {
                Ok(ack) => match self.arq.on_ack(ack) {
                    AckVerdict::Acknowledged { attempts } => {
                        debug!(
                            "Sender {}: ACK seq={} (시도 {})",
                            self.factory.sender_id(),
                            ack.sequence_number,
                            attempts
                        );
                        return AckWait::Acknowledged;
                    }
                    AckVerdict::Ignored => {
                        self.summary.stale_acks += 1;
                        debug!(
                            "Sender {}: 무관한 ACK 폐기 seq={} sender={}",
                            self.factory.sender_id(),
                            ack.sequence_number,
                            ack.sender_id
                        );
                    }
                },
                Err(Error::QueueTimeout) => return AckWait::TimedOut,
                Err(_) => return AckWait::Disconnected,
            }
        }
    }

    /// 송신 큐에 넣기. 가득 차면 back-off 후 재시도.
    ///
    /// 큐가 끊겼거나 back-off 중 종료되면 Err.
    fn transmit(&mut self, mut packet: Packet) -> Result<()> {
        loop {
            match self.outbound.send_timeout(packet, self.send_timeout) {
                Ok(()) => {
                    self.summary.transmissions += 1;
                    return Ok(());
                }
                Err((_, Error::QueueDisconnected)) => {
                    warn!("Sender {}: 송신 큐 끊김", self.sender_id());
                    return Err(Error::QueueDisconnected);
                }
                Err((returned, e)) => {
                    warn!(
                        "Sender {}: 송신 실패 seq={} ({}), {:?} 후 재시도",
                        self.sender_id(),
                        returned.sequence_number(),
                        e,
                        self.backoff_delay
                    );
                    self.summary.backoffs += 1;
                    thread::sleep(self.backoff_delay);
                    if self.stats.is_done() {
                        return Err(e);
                    }
                    packet = returned;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::bounded;
    use crate::packet::Destination;
    use bytes::Bytes;
    use rand::SeedableRng;

    fn packet(seq: u32, sender: u8) -> Packet {
        Packet::new(Destination::ReceiverA, seq, sender, Bytes::from_static(b"p"))
    }

    fn test_config(mode: DeliveryMode) -> Config {
        Config {
            sender_count: 1,
            destinations: vec![Destination::ReceiverA],
            window_size: 4,
            burst_interval: Duration::ZERO,
            ack_timeout: Duration::from_millis(5),
            send_timeout: Duration::from_millis(1),
            backoff_delay: Duration::from_millis(1),
            payload_size: 32,
            ..Config::lossless(mode)
        }
    }

    struct Harness {
        sender: Sender,
        outbound: QueueRx<Packet>,
        acks: QueueTx<Ack>,
        stats: Arc<Statistics>,
    }

    fn harness(mode: DeliveryMode) -> Harness {
        let config = test_config(mode);
        let (out_tx, out_rx) = bounded(32);
        let (ack_tx, ack_rx) = bounded(8);
        let stats = Arc::new(Statistics::new(1_000));
        let sender = Sender::new(
            0,
            &config,
            Arc::new(SequenceCounter::new()),
            out_tx,
            Some(ack_rx),
            stats.clone(),
            StdRng::seed_from_u64(5),
        );
        Harness {
            sender,
            outbound: out_rx,
            acks: ack_tx,
            stats,
        }
    }

    #[test]
    fn test_stop_and_wait_abandons_after_max_attempts() {
        let mut arq = StopAndWait::new(4);
        let first = arq.begin(packet(9, 1));
        assert_eq!(first.sequence_number(), 9);
        assert_eq!(arq.attempts(), 1);

        for expected in 2..=4 {
            match arq.on_timeout() {
                Some(TimeoutVerdict::Retransmit(p)) => assert_eq!(p.sequence_number(), 9),
                other => panic!("retransmit 기대, got {:?}", other),
            }
            assert_eq!(arq.attempts(), expected);
        }

        assert!(matches!(
            arq.on_timeout(),
            Some(TimeoutVerdict::Abandon(p)) if p.sequence_number() == 9
        ));
        assert!(arq.awaiting().is_none());
        assert!(arq.on_timeout().is_none());
    }

    #[test]
    fn test_stop_and_wait_ack_on_later_attempt() {
        let mut arq = StopAndWait::new(4);
        let sent = arq.begin(packet(3, 0));
        arq.on_timeout();
        arq.on_timeout();

        assert_eq!(arq.on_ack(sent.ack()), AckVerdict::Acknowledged { attempts: 3 });
        assert!(arq.awaiting().is_none());
    }

    #[test]
    fn test_unmatched_ack_does_not_reset_attempts() {
        let mut arq = StopAndWait::new(4);
        arq.begin(packet(10, 1));
        arq.on_timeout();

        let stale = Ack { sequence_number: 9, sender_id: 1 };
        let foreign = Ack { sequence_number: 10, sender_id: 2 };
        assert_eq!(arq.on_ack(stale), AckVerdict::Ignored);
        assert_eq!(arq.on_ack(foreign), AckVerdict::Ignored);
        assert_eq!(arq.attempts(), 2);
        assert_eq!(arq.awaiting().map(|p| p.sequence_number()), Some(10));
    }

    #[test]
    fn test_windowed_burst_sends_window_without_acks() {
        let mut h = harness(DeliveryMode::Windowed);
        assert_eq!(h.sender.step(), SenderState::Running);

        let sent = h.outbound.drain();
        let seqs: Vec<u32> = sent.iter().map(|p| p.sequence_number()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert_eq!(h.sender.summary().created, 4);
        assert_eq!(h.sender.summary().retransmissions, 0);
    }

    #[test]
    fn test_arq_delivers_on_first_ack() {
        let mut h = harness(DeliveryMode::StopAndWait);
        h.acks.send(Ack { sequence_number: 0, sender_id: 0 }).unwrap();

        assert_eq!(h.sender.step(), SenderState::Running);
        assert_eq!(h.outbound.len(), 1);
        assert_eq!(h.sender.summary().acked, 1);
        assert_eq!(h.stats.snapshot().lost_count, 0);
    }

    #[test]
    fn test_arq_skips_stale_acks_while_waiting() {
        let mut h = harness(DeliveryMode::StopAndWait);
        h.acks.send(Ack { sequence_number: 77, sender_id: 0 }).unwrap();
        h.acks.send(Ack { sequence_number: 0, sender_id: 4 }).unwrap();
        h.acks.send(Ack { sequence_number: 0, sender_id: 0 }).unwrap();

        h.sender.step();
        let summary = h.sender.summary();
        assert_eq!(summary.acked, 1);
        assert_eq!(summary.stale_acks, 2);
        assert_eq!(summary.transmissions, 1);
    }

    #[test]
    fn test_arq_gives_up_after_four_attempts() {
        let mut h = harness(DeliveryMode::StopAndWait);

        assert_eq!(h.sender.step(), SenderState::Running);

        let sent = h.outbound.drain();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|p| p.sequence_number() == 0));

        let summary = h.sender.summary();
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.retransmissions, 3);
        assert_eq!(h.stats.snapshot().lost_count, 1);

        // 다음 패킷은 새 번호
        h.acks.send(Ack { sequence_number: 1, sender_id: 0 }).unwrap();
        h.sender.step();
        assert_eq!(h.outbound.recv().unwrap().sequence_number(), 1);
    }

    #[test]
    fn test_sender_drains_after_done() {
        let h = harness(DeliveryMode::Windowed);
        h.stats.force_done();

        let summary = h.sender.run();
        assert_eq!(summary.created, 0);
        assert!(h.outbound.is_empty());
    }

    #[test]
    fn test_sender_drains_when_sequence_space_exhausted() {
        let config = test_config(DeliveryMode::Windowed);
        let (out_tx, out_rx) = bounded(32);
        let mut sender = Sender::new(
            0,
            &config,
            Arc::new(SequenceCounter::starting_at(u32::MAX - 2)),
            out_tx,
            None,
            Arc::new(Statistics::new(1_000)),
            StdRng::seed_from_u64(5),
        );

        assert_eq!(sender.step(), SenderState::Drained);
        assert_eq!(sender.summary().created, 2);
        let seqs: Vec<u32> = out_rx.drain().iter().map(|p| p.sequence_number()).collect();
        assert_eq!(seqs, vec![u32::MAX - 2, u32::MAX - 1]);
    }

    #[test]
    fn test_full_outbound_backs_off_then_drains() {
        let config = test_config(DeliveryMode::Windowed);
        let (out_tx, _out_rx) = bounded(1);
        let stats = Arc::new(Statistics::new(1_000));
        let mut sender = Sender::new(
            1,
            &config,
            Arc::new(SequenceCounter::new()),
            out_tx,
            None,
            stats.clone(),
            StdRng::seed_from_u64(5),
        );

        let stopper = {
            let stats = stats.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                stats.force_done();
            })
        };

        let state = sender.step();
        stopper.join().unwrap();

        assert_eq!(state, SenderState::Drained);
        assert!(sender.summary().backoffs > 0);
        assert_eq!(sender.summary().transmissions, 1);
    }
}
