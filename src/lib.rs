//! # arqsim
//!
//! 손실/지연이 있는 공유 채널 위에서 여러 송신자와 수신자의 패킷 전달을 시뮬레이션
//!
//! ## 전달 방식
//! - **Windowed**: ACK 없이 윈도우 단위 일괄 전송, 손실은 시퀀스 갭으로만 감지
//! - **Stop-and-Wait ARQ**: 패킷별 ACK, 타임아웃, 최대 4회 시도 후 포기
//!
//! ## 구성
//! - **Sender**: 전역 시퀀스 번호로 패킷 생성, 모드별 전송 루프
//! - **Switch**: 확률적 폐기 + 고정 처리 지연, 목적지 큐로 전달
//! - **Receiver**: 목적지 검증, 통계 갱신, (ARQ) ACK 전송
//! - **Monitor**: 완료 감지 후 처리율 계산 및 보고

pub mod channel;
pub mod config;
pub mod error;
pub mod monitor;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulation;
pub mod stats;
pub mod switch;

pub use config::{AckRouting, Config, DeliveryMode};
pub use error::{Error, Result};
pub use monitor::Monitor;
pub use packet::{Ack, Destination, Packet, SenderId, SequenceCounter, SequenceNumber};
pub use receiver::{AckRoute, GapTracker, Receiver};
pub use sender::{Sender, SenderState, StopAndWait};
pub use simulation::{RunSummary, Simulation};
pub use stats::{SimulationReport, Statistics};
pub use switch::Switch;

/// 기본 페이로드 크기 (바이트)
pub const DEFAULT_PAYLOAD_SIZE: usize = 996;

/// 패킷당 기본 최대 전송 시도 횟수 (첫 전송 포함)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
