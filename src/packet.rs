//! 패킷과 ACK 정의
//!
//! - Packet: 송신자가 만들고 큐를 따라 소유권이 이동하는 데이터 단위
//! - Ack: Stop-and-Wait 모드에서 특정 패킷의 수신 확인

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::Rng;

/// 시퀀스 번호 (32비트, 전체 송신자 공통)
pub type SequenceNumber = u32;

/// 송신자 ID
pub type SenderId = u8;

/// 논리 수신자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    ReceiverA,
    ReceiverB,
}

impl Destination {
    pub const ALL: [Destination; 2] = [Destination::ReceiverA, Destination::ReceiverB];

    /// 큐 배열 인덱스
    pub fn index(self) -> usize {
        match self {
            Destination::ReceiverA => 0,
            Destination::ReceiverB => 1,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::ReceiverA => write!(f, "receiver-a"),
            Destination::ReceiverB => write!(f, "receiver-b"),
        }
    }
}

/// 데이터 패킷
///
/// 생성 후 불변. 필드는 읽기 전용 접근자로만 노출한다.
#[derive(Debug, Clone)]
pub struct Packet {
    destination: Destination,
    sequence_number: SequenceNumber,
    sender_id: SenderId,
    payload: Bytes,
}

impl Packet {
    /// 새 패킷 생성
    pub fn new(
        destination: Destination,
        sequence_number: SequenceNumber,
        sender_id: SenderId,
        payload: Bytes,
    ) -> Self {
        Self {
            destination,
            sequence_number,
            sender_id,
            payload,
        }
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    pub fn sender_id(&self) -> SenderId {
        self.sender_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 이 패킷에 대한 ACK 생성
    pub fn ack(&self) -> Ack {
        Ack {
            sequence_number: self.sequence_number,
            sender_id: self.sender_id,
        }
    }
}

/// 수신 확인
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub sequence_number: SequenceNumber,
    pub sender_id: SenderId,
}

impl Ack {
    /// 해당 패킷을 가리키는지 확인 (시퀀스와 송신자 모두 일치)
    pub fn acknowledges(&self, packet: &Packet) -> bool {
        self.sequence_number == packet.sequence_number && self.sender_id == packet.sender_id
    }
}

/// 전역 시퀀스 카운터
///
/// 모든 송신자가 공유하며 `next_sequence()`로만 번호를 발급한다.
/// 번호 공간은 `0..u32::MAX`이고, 소진되면 더 발급하지 않는다 (재사용 없음).
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: AtomicU32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: SequenceNumber) -> Self {
        Self {
            next: AtomicU32::new(next),
        }
    }

    /// 다음 시퀀스 번호 발급. 번호 공간이 소진되면 None.
    pub fn next_sequence(&self) -> Option<SequenceNumber> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .ok()
    }

    /// 지금까지 발급된 번호 수
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::SeqCst)
    }
}

/// 송신자별 패킷 생성기
///
/// 페이로드 버퍼는 하나를 만들어 두고 패킷마다 `Bytes` 참조만 복제한다.
pub struct PacketFactory {
    sender_id: SenderId,
    counter: Arc<SequenceCounter>,
    destinations: Vec<Destination>,
    payload: Bytes,
}

impl PacketFactory {
    pub fn new(
        sender_id: SenderId,
        counter: Arc<SequenceCounter>,
        destinations: Vec<Destination>,
        payload_size: usize,
    ) -> Self {
        let payload = Bytes::from(vec![sender_id; payload_size]);
        Self {
            sender_id,
            counter,
            destinations,
            payload,
        }
    }

    pub fn sender_id(&self) -> SenderId {
        self.sender_id
    }

    /// 임의 목적지로 새 패킷 생성 (시퀀스 번호 1 소비)
    ///
    /// 시퀀스 번호가 소진되면 None.
    pub fn build(&self, rng: &mut StdRng) -> Option<Packet> {
        let destination = match self.destinations.len() {
            0 => Destination::ReceiverA,
            1 => self.destinations[0],
            n => self.destinations[rng.gen_range(0..n)],
        };
        self.build_to(destination)
    }

    /// 지정 목적지로 새 패킷 생성
    pub fn build_to(&self, destination: Destination) -> Option<Packet> {
        let sequence_number = self.counter.next_sequence()?;
        Some(Packet::new(
            destination,
            sequence_number,
            self.sender_id,
            self.payload.clone(),
        ))
    }
}
