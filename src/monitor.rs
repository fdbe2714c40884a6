//! 종료 감시자
//!
//! 완료 플래그를 주기적으로 확인하고, 완료되면 최종 보고를 한 번 계산한다.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::stats::{SimulationReport, Statistics};
use crate::Config;

/// 종료 감시자
pub struct Monitor {
    stats: Arc<Statistics>,
    poll_interval: Duration,
    settle_delay: Duration,
    run_timeout: Option<Duration>,
    payload_size: usize,
}

impl Monitor {
    pub fn new(config: &Config, stats: Arc<Statistics>) -> Self {
        Self {
            stats,
            poll_interval: config.monitor_interval,
            settle_delay: config.settle_delay,
            run_timeout: config.run_timeout,
            payload_size: config.payload_size,
        }
    }

    /// 완료까지 대기 후 보고 생성
    pub fn run(self) -> SimulationReport {
        let started = Instant::now();

        while !self.stats.is_done() {
            if let Some(limit) = self.run_timeout {
                if started.elapsed() >= limit {
                    if self.stats.force_done() {
                        warn!("실행 제한 시간 {:?} 초과, 강제 종료", limit);
                    }
                    break;
                }
            }
            thread::sleep(self.poll_interval);
        }

        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }

        let report = self.report();
        info!(
            received = report.received,
            lost = report.lost,
            elapsed_ms = report.elapsed_ms,
            throughput_bps = report.throughput_bps,
            completed = report.completed,
            "Simulation finished: {}",
            report
        );
        report
    }

    /// 현재 통계로 보고 계산
    pub fn report(&self) -> SimulationReport {
        let snapshot = self.stats.snapshot();
        SimulationReport::from_snapshot(&snapshot, self.stats.target_packets(), self.payload_size)
    }
}
