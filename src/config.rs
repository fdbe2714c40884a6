//! 시뮬레이션 설정

use std::time::Duration;

use crate::packet::Destination;
use crate::{Error, Result, DEFAULT_MAX_ATTEMPTS, DEFAULT_PAYLOAD_SIZE};

/// 전달 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// 윈도우 단위 일괄 전송, 재전송 없음 (손실은 수신측 시퀀스 갭으로만 감지)
    Windowed,

    /// Stop-and-Wait ARQ (패킷별 ACK, 타임아웃, 제한된 재전송)
    StopAndWait,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Windowed => write!(f, "windowed"),
            DeliveryMode::StopAndWait => write!(f, "stop-and-wait"),
        }
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "windowed" | "window" => Ok(DeliveryMode::Windowed),
            "stop-and-wait" | "arq" | "saw" => Ok(DeliveryMode::StopAndWait),
            other => Err(Error::InvalidConfig(format!("알 수 없는 모드: {}", other))),
        }
    }
}

/// ACK 경로 구성
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckRouting {
    /// 모든 송신자가 하나의 ACK 큐를 나눠 읽음. 다른 송신자의 ACK는 읽은 쪽에서 폐기된다.
    Shared,

    /// 수신자가 `sender_id`별 큐로 골라 보냄
    PerSender,
}

impl std::str::FromStr for AckRouting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shared" => Ok(AckRouting::Shared),
            "per-sender" => Ok(AckRouting::PerSender),
            other => Err(Error::InvalidConfig(format!("알 수 없는 ACK 경로: {}", other))),
        }
    }
}

/// 시뮬레이션 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 전달 방식
    pub mode: DeliveryMode,

    /// 송신자 수
    pub sender_count: usize,

    /// 활성 수신자 (송신자는 이 중에서 균등하게 목적지를 고름)
    pub destinations: Vec<Destination>,

    /// 윈도우 크기 (버스트당 패킷 수)
    pub window_size: usize,

    /// 버스트 사이 대기 시간
    pub burst_interval: Duration,

    /// 시도당 ACK 대기 타임아웃
    pub ack_timeout: Duration,

    /// 패킷당 최대 전송 시도 횟수 (첫 전송 포함)
    pub max_attempts: u32,

    /// 스위치 패킷 손실 확률 (0.0 ~ 1.0)
    pub switch_loss_probability: f64,

    /// ACK 경로 손실 확률 (0.0 ~ 1.0)
    pub ack_loss_probability: f64,

    /// 스위치 처리 지연 (패킷당)
    pub processing_delay: Duration,

    /// 종료 조건: 수신 패킷 수
    pub target_packets: u64,

    /// 페이로드 크기 (바이트)
    pub payload_size: usize,

    /// 송신자 → 스위치 큐 용량
    pub switch_queue_capacity: usize,

    /// 스위치 → 수신자 큐 용량
    pub receiver_queue_capacity: usize,

    /// 수신자 → 송신자 ACK 큐 용량
    pub ack_queue_capacity: usize,

    /// ACK 경로 구성
    pub ack_routing: AckRouting,

    /// 송신 큐 대기 한도 (초과 시 back-off)
    pub send_timeout: Duration,

    /// ACK 큐 송신 대기 한도
    pub ack_send_timeout: Duration,

    /// 패킷 송신 실패 후 back-off 시간
    pub backoff_delay: Duration,

    /// 스위치/수신자가 종료 플래그를 확인하는 주기
    pub poll_interval: Duration,

    /// 모니터 폴링 주기
    pub monitor_interval: Duration,

    /// 완료 후 보고 전 대기 시간 (로그 flush)
    pub settle_delay: Duration,

    /// 전체 실행 제한 시간 (None이면 무제한)
    pub run_timeout: Option<Duration>,

    /// RNG 시드 (None이면 엔트로피 사용)
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::windowed()
    }
}

impl Config {
    /// 윈도우 모드 설정
    ///
    /// 갭 기반 손실 집계는 수신자별 커서를 쓰므로 기본값은 수신자 하나.
    pub fn windowed() -> Self {
        Self {
            mode: DeliveryMode::Windowed,
            sender_count: 1,
            destinations: vec![Destination::ReceiverA],
            window_size: 5,
            burst_interval: Duration::from_millis(10),
            ack_timeout: Duration::from_millis(100),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            switch_loss_probability: 0.001,   // 0.1%
            ack_loss_probability: 0.0,
            processing_delay: Duration::from_millis(1),
            target_packets: 2000,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            switch_queue_capacity: 200,
            receiver_queue_capacity: 100,
            ack_queue_capacity: 30,
            ack_routing: AckRouting::Shared,
            send_timeout: Duration::from_millis(10),
            ack_send_timeout: Duration::from_millis(20),
            backoff_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(50),
            monitor_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(100),
            run_timeout: None,
            seed: None,
        }
    }

    /// Stop-and-Wait ARQ 설정
    pub fn stop_and_wait() -> Self {
        Self {
            mode: DeliveryMode::StopAndWait,
            sender_count: 2,
            destinations: vec![Destination::ReceiverA, Destination::ReceiverB],
            ack_timeout: Duration::from_millis(50),
            switch_loss_probability: 0.002,   // 0.2%
            ack_loss_probability: 0.002,
            processing_delay: Duration::from_millis(2),
            switch_queue_capacity: 50,
            receiver_queue_capacity: 50,
            ack_queue_capacity: 30,
            ..Self::windowed()
        }
    }

    /// 손실/지연 없는 설정 (테스트용)
    pub fn lossless(mode: DeliveryMode) -> Self {
        let base = match mode {
            DeliveryMode::Windowed => Self::windowed(),
            DeliveryMode::StopAndWait => Self::stop_and_wait(),
        };

        Self {
            switch_loss_probability: 0.0,
            ack_loss_probability: 0.0,
            processing_delay: Duration::ZERO,
            burst_interval: Duration::from_millis(1),
            settle_delay: Duration::ZERO,
            monitor_interval: Duration::from_millis(5),
            poll_interval: Duration::from_millis(5),
            ..base
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("switch_loss_probability", self.switch_loss_probability),
            ("ack_loss_probability", self.ack_loss_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!(
                    "{} 범위 초과: {}",
                    name, p
                )));
            }
        }

        if self.sender_count == 0 {
            return Err(Error::InvalidConfig("sender_count는 1 이상".into()));
        }
        if self.sender_count > u8::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "sender_count 최대 {}",
                u8::MAX
            )));
        }
        if self.destinations.is_empty() {
            return Err(Error::InvalidConfig("destinations 비어 있음".into()));
        }
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts는 1 이상".into()));
        }
        if self.target_packets == 0 {
            return Err(Error::InvalidConfig("target_packets는 1 이상".into()));
        }
        if self.switch_queue_capacity == 0
            || self.receiver_queue_capacity == 0
            || self.ack_queue_capacity == 0
        {
            return Err(Error::InvalidConfig("큐 용량은 1 이상".into()));
        }

        Ok(())
    }
}
