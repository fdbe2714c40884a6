//! 시뮬레이션 구성 및 실행
//!
//! ```text
//!  Sender ─┐                          ┌─▶ queue ─▶ Receiver A ─┐
//!  Sender ─┴─▶ queue ─▶ Switch ───────┤                        │
//!                                     └─▶ queue ─▶ Receiver B ─┤
//!     ▲                                                        │
//!     └──────────────────── ack queue ◀────────────────────────┘
//! ```
//!
//! 모든 태스크는 이름 있는 OS 스레드로 실행되며 `run`이 전부 join한다.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::channel::bounded;
use crate::config::{AckRouting, DeliveryMode};
use crate::monitor::Monitor;
use crate::packet::{Ack, Packet, SequenceCounter};
use crate::receiver::{AckRoute, Receiver, ReceiverSummary};
use crate::sender::{Sender, SenderSummary};
use crate::stats::{SimulationReport, Statistics};
use crate::switch::{Switch, SwitchSummary};
use crate::{Config, Error, Result};

/// 한 번의 실행 결과
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: SimulationReport,
    pub senders: Vec<SenderSummary>,
    pub switch: SwitchSummary,
    pub receivers: Vec<ReceiverSummary>,
    /// 발급된 시퀀스 번호 수
    pub sequences_issued: u32,
}

impl RunSummary {
    /// 전체 전송 수 (재전송 포함)
    pub fn total_transmissions(&self) -> u64 {
        self.senders.iter().map(|s| s.transmissions).sum()
    }

    pub fn total_retransmissions(&self) -> u64 {
        self.senders.iter().map(|s| s.retransmissions).sum()
    }
}

/// 시뮬레이션
pub struct Simulation {
    config: Config,
    stats: Arc<Statistics>,
    counter: Arc<SequenceCounter>,
}

impl Simulation {
    /// 설정 검증 후 생성
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(Statistics::new(config.target_packets));
        Ok(Self {
            config,
            stats,
            counter: Arc::new(SequenceCounter::new()),
        })
    }

    /// 엔진별 RNG. 시드가 있으면 `seed + stream`으로 결정적.
    fn rng(&self, stream: u64) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }

    /// 모든 태스크를 띄우고 완료까지 실행
    ///
    /// 스레드 생성 실패는 치명적 초기화 에러로 반환한다.
    pub fn run(self) -> Result<RunSummary> {
        let config = &self.config;
        info!(
            "Simulation starting: mode={} senders={} receivers={} target={}",
            config.mode,
            config.sender_count,
            config.destinations.len(),
            config.target_packets
        );

        let (switch_tx, switch_rx) = bounded::<Packet>(config.switch_queue_capacity);
        let arq = config.mode == DeliveryMode::StopAndWait;

        // ACK 큐: 공유 하나 또는 송신자별
        let ack_queue_count = match config.ack_routing {
            AckRouting::Shared => 1,
            AckRouting::PerSender => config.sender_count,
        };
        let (ack_txs, ack_rxs): (Vec<_>, Vec<_>) = (0..ack_queue_count)
            .map(|_| bounded::<Ack>(config.ack_queue_capacity))
            .unzip();
        let ack_route = match config.ack_routing {
            AckRouting::Shared => AckRoute::shared(ack_txs[0].clone()),
            AckRouting::PerSender => AckRoute::per_sender(ack_txs.clone()),
        };
        drop(ack_txs);

        let mut switch = Switch::new(
            switch_rx,
            config.switch_loss_probability,
            config.processing_delay,
            config.poll_interval,
            self.stats.clone(),
            self.rng(0),
        );

        let mut receivers = Vec::with_capacity(config.destinations.len());
        let mut destinations = config.destinations.clone();
        destinations.sort();
        destinations.dedup();
        for (i, &destination) in destinations.iter().enumerate() {
            let (tx, rx) = bounded::<Packet>(config.receiver_queue_capacity);
            switch.connect(destination, tx);
            receivers.push(Receiver::new(
                destination,
                config,
                rx,
                arq.then(|| ack_route.clone()),
                self.stats.clone(),
                self.rng(100 + i as u64),
            ));
        }
        drop(ack_route);

        let senders: Vec<Sender> = (0..config.sender_count)
            .map(|i| {
                Sender::new(
                    i as u8,
                    config,
                    self.counter.clone(),
                    switch_tx.clone(),
                    arq.then(|| ack_rxs[i % ack_rxs.len()].clone()),
                    self.stats.clone(),
                    self.rng(200 + i as u64),
                )
            })
            .collect();
        drop(switch_tx);
        drop(ack_rxs);

        let monitor = Monitor::new(config, self.stats.clone());

        // 모니터를 먼저 띄워 run_timeout이 스레드 생성 이후의 모든 구간을 덮게 한다
        let monitor_handle = spawn("monitor", move || monitor.run())?;

        let mut receiver_handles = Vec::new();
        for receiver in receivers {
            let name = format!("receiver-{}", receiver.identity());
            receiver_handles.push((name.clone(), spawn(&name, move || receiver.run())?));
        }

        let switch_handle = spawn("switch", move || switch.run())?;

        let mut sender_handles = Vec::new();
        for sender in senders {
            let name = format!("sender-{}", sender.sender_id());
            sender_handles.push((name.clone(), spawn(&name, move || sender.run())?));
        }

        let report = join("monitor", monitor_handle)?;

        let mut sender_summaries = Vec::with_capacity(sender_handles.len());
        for (name, handle) in sender_handles {
            sender_summaries.push(join(&name, handle)?);
        }
        let switch_summary = join("switch", switch_handle)?;
        let mut receiver_summaries = Vec::with_capacity(receiver_handles.len());
        for (name, handle) in receiver_handles {
            receiver_summaries.push(join(&name, handle)?);
        }

        info!("All tasks stopped");

        Ok(RunSummary {
            report,
            senders: sender_summaries,
            switch: switch_summary,
            receivers: receiver_summaries,
            sequences_issued: self.counter.issued(),
        })
    }
}

fn spawn<T, F>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| Error::Init(format!("{} 스레드 생성 실패: {}", name, e)))
}

fn join<T>(name: &str, handle: JoinHandle<T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| Error::TaskPanicked(name.to_string()))
}
