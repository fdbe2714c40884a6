//! 전역 통계
//!
//! 수신자가 갱신하고 모니터가 읽는 공유 카운터. 모든 읽기-수정-쓰기는
//! 하나의 뮤텍스 안에서 메서드 단위로 수행된다.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// `record_received` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// 집계됨
    Counted,

    /// 이번 수신으로 목표에 도달 (실행당 정확히 한 번)
    Completed,

    /// 이미 종료된 뒤라 무시됨
    AfterDone,
}

/// `record_lost` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossOutcome {
    Counted,
    AfterDone,
}

#[derive(Debug)]
struct StatsInner {
    received_count: u64,
    lost_count: u64,
    start: Option<Instant>,
    end: Option<Instant>,
    done: bool,
    completed: bool,
}

/// 통계 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received_count: u64,
    pub lost_count: u64,
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    pub done: bool,
    /// 목표 수신 수로 종료되었는지 (false면 강제 종료)
    pub completed: bool,
}

impl StatsSnapshot {
    /// 측정 구간 (시작/종료 둘 다 있을 때)
    pub fn elapsed(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

/// 공유 통계
#[derive(Debug)]
pub struct Statistics {
    target_packets: u64,
    inner: Mutex<StatsInner>,
}

impl Statistics {
    pub fn new(target_packets: u64) -> Self {
        Self {
            target_packets,
            inner: Mutex::new(StatsInner {
                received_count: 0,
                lost_count: 0,
                start: None,
                end: None,
                done: false,
                completed: false,
            }),
        }
    }

    pub fn target_packets(&self) -> u64 {
        self.target_packets
    }

    /// 검증된 패킷 한 개 수신 기록
    ///
    /// `gap_lost`는 윈도우 모드의 시퀀스 갭 손실 (ARQ 모드는 0).
    /// 첫 수신 시각, 손실, 수신 수, 완료 전이를 한 임계 구역에서 처리한다.
    /// 시각도 잠금 안에서 읽으므로 `start <= end`가 항상 성립한다.
    pub fn record_received(&self, gap_lost: u64) -> ReceiveOutcome {
        let mut inner = self.inner.lock();
        if inner.done {
            return ReceiveOutcome::AfterDone;
        }

        let now = Instant::now();
        if inner.start.is_none() {
            inner.start = Some(now);
        }

        inner.lost_count += gap_lost;
        inner.received_count += 1;

        if inner.received_count == self.target_packets {
            inner.done = true;
            inner.completed = true;
            inner.end = Some(now);
            ReceiveOutcome::Completed
        } else {
            ReceiveOutcome::Counted
        }
    }

    /// 손실 기록 (ARQ 포기 등)
    pub fn record_lost(&self, count: u64) -> LossOutcome {
        let mut inner = self.inner.lock();
        if inner.done {
            return LossOutcome::AfterDone;
        }
        inner.lost_count += count;
        LossOutcome::Counted
    }

    /// 목표 도달 전 강제 종료. 이미 종료된 경우 false.
    pub fn force_done(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.done {
            return false;
        }
        let now = Instant::now();
        inner.done = true;
        inner.end = Some(now);
        if inner.start.is_none() {
            inner.start = Some(now);
        }
        true
    }

    /// 종료 여부
    pub fn is_done(&self) -> bool {
        self.inner.lock().done
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        StatsSnapshot {
            received_count: inner.received_count,
            lost_count: inner.lost_count,
            start: inner.start,
            end: inner.end,
            done: inner.done,
            completed: inner.completed,
        }
    }
}

/// 처리율 (bytes/sec)
///
/// `packets × packet_size × 1000 / elapsed_ms`, 경과 0이면 0.
pub fn throughput_bytes_per_sec(packets: u64, packet_size: u64, elapsed_ms: u64) -> u64 {
    if elapsed_ms == 0 {
        return 0;
    }
    let bytes_ms = packets as u128 * packet_size as u128 * 1000;
    (bytes_ms / elapsed_ms as u128) as u64
}

/// 최종 보고
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub received: u64,
    pub lost: u64,
    pub elapsed_ms: u64,
    pub throughput_bps: u64,
    /// 목표 수신 수 도달 여부
    pub completed: bool,
}

impl SimulationReport {
    /// 스냅샷으로부터 보고 계산
    pub fn from_snapshot(
        snapshot: &StatsSnapshot,
        target_packets: u64,
        packet_size: usize,
    ) -> Self {
        let elapsed_ms = snapshot.elapsed().as_millis() as u64;
        let packets = if snapshot.completed {
            target_packets
        } else {
            snapshot.received_count
        };

        Self {
            received: snapshot.received_count,
            lost: snapshot.lost_count,
            elapsed_ms,
            throughput_bps: throughput_bytes_per_sec(packets, packet_size as u64, elapsed_ms),
            completed: snapshot.completed,
        }
    }

    /// 손실률
    pub fn loss_rate(&self) -> f64 {
        let total = self.received + self.lost;
        if total == 0 {
            return 0.0;
        }
        self.lost as f64 / total as f64
    }
}

impl std::fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Received: {} | Lost: {} ({:.2}%) | Elapsed: {} ms | Throughput: {} B/s{}",
            self.received,
            self.lost,
            self.loss_rate() * 100.0,
            self.elapsed_ms,
            self.throughput_bps,
            if self.completed { "" } else { " | INCOMPLETE" },
        )
    }
}
