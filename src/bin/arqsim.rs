//! arqsim - 손실 채널 전달 방식 시뮬레이터
//!
//! 윈도우 전송과 Stop-and-Wait ARQ의 처리율/손실을 비교한다.
//!
//! 사용법:
//!   cargo run --release --bin arqsim -- [OPTIONS]
//!
//! 예시:
//!   # 윈도우 모드 기본 실행
//!   cargo run --release --bin arqsim -- --mode windowed
//!
//!   # ARQ, 송신자 2, ACK 손실 1%
//!   cargo run --release --bin arqsim -- --mode arq --senders 2 --ack-loss 0.01

use std::str::FromStr;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use arqsim::{AckRouting, Config, DeliveryMode, Destination, Simulation};

const HELP: &str = r#"arqsim - 손실 채널 전달 방식 시뮬레이터

사용법:
  cargo run --release --bin arqsim -- [OPTIONS]

옵션:
  -m, --mode <MODE>            windowed | arq (기본: windowed)
  -s, --senders <N>            송신자 수
  -r, --receivers <N>          수신자 수 1~2
  -n, --target <N>             종료 조건 수신 패킷 수 (기본: 2000)
  -w, --window <N>             윈도우 크기
  --burst-interval-ms <MS>     버스트 간격
  --ack-timeout-ms <MS>        시도당 ACK 타임아웃
  --max-attempts <N>           패킷당 최대 시도 (기본: 4)
  --loss <P>                   스위치 손실 확률 0.0~1.0
  --ack-loss <P>               ACK 손실 확률 0.0~1.0
  --delay-ms <MS>              스위치 처리 지연
  --payload <BYTES>            페이로드 크기 (기본: 996)
  --switch-queue <N>           스위치 큐 용량
  --receiver-queue <N>         수신자 큐 용량
  --ack-queue <N>              ACK 큐 용량
  --ack-routing <ROUTE>        shared | per-sender (기본: shared)
  --timeout-s <S>              실행 제한 시간
  --seed <N>                   RNG 시드
  -h, --help                   이 도움말 출력

로그 레벨은 RUST_LOG로 조정 (기본: info)
"#;

fn value<T: FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    let raw = args
        .get(i + 1)
        .ok_or_else(|| format!("{} 값 필요", flag))?;
    raw.parse()
        .map_err(|_| format!("{} 값이 유효하지 않음: {}", flag, raw))
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = std::env::args().collect();

    // 모드 먼저 정해서 프리셋 선택
    let mut mode = DeliveryMode::Windowed;
    for (i, arg) in args.iter().enumerate() {
        if arg == "--mode" || arg == "-m" {
            mode = value::<String>(&args, i, arg)?
                .parse()
                .map_err(|e: arqsim::Error| e.to_string())?;
        }
    }
    let mut config = match mode {
        DeliveryMode::Windowed => Config::windowed(),
        DeliveryMode::StopAndWait => Config::stop_and_wait(),
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--mode" | "-m" => {}
            "--senders" | "-s" => config.sender_count = value(&args, i, flag)?,
            "--receivers" | "-r" => {
                let n: usize = value(&args, i, flag)?;
                if !(1..=2).contains(&n) {
                    return Err(format!("수신자 수는 1~2: {}", n));
                }
                config.destinations = Destination::ALL[..n].to_vec();
            }
            "--target" | "-n" => config.target_packets = value(&args, i, flag)?,
            "--window" | "-w" => config.window_size = value(&args, i, flag)?,
            "--burst-interval-ms" => {
                config.burst_interval = Duration::from_millis(value(&args, i, flag)?)
            }
            "--ack-timeout-ms" => {
                config.ack_timeout = Duration::from_millis(value(&args, i, flag)?)
            }
            "--max-attempts" => config.max_attempts = value(&args, i, flag)?,
            "--loss" => config.switch_loss_probability = value(&args, i, flag)?,
            "--ack-loss" => config.ack_loss_probability = value(&args, i, flag)?,
            "--delay-ms" => {
                config.processing_delay = Duration::from_millis(value(&args, i, flag)?)
            }
            "--payload" => config.payload_size = value(&args, i, flag)?,
            "--switch-queue" => config.switch_queue_capacity = value(&args, i, flag)?,
            "--receiver-queue" => config.receiver_queue_capacity = value(&args, i, flag)?,
            "--ack-queue" => config.ack_queue_capacity = value(&args, i, flag)?,
            "--ack-routing" => {
                config.ack_routing = value::<String>(&args, i, flag)?
                    .parse::<AckRouting>()
                    .map_err(|e| e.to_string())?
            }
            "--timeout-s" => {
                config.run_timeout = Some(Duration::from_secs(value(&args, i, flag)?))
            }
            "--seed" => config.seed = Some(value(&args, i, flag)?),
            "--help" | "-h" => {
                println!("{}", HELP);
                std::process::exit(0);
            }
            other => return Err(format!("알 수 없는 옵션: {}", other)),
        }
        // 값을 받는 옵션은 한 칸 더 건너뜀
        i += if matches!(flag, "--help" | "-h") { 1 } else { 2 };
    }

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let config = parse_args()?;

    info!("arqsim starting...");
    info!("Mode: {}", config.mode);
    info!("Senders: {}, receivers: {}", config.sender_count, config.destinations.len());
    info!(
        "Switch loss: {:.2}%, delay: {:?}",
        config.switch_loss_probability * 100.0,
        config.processing_delay
    );
    if config.mode == DeliveryMode::StopAndWait {
        info!(
            "ACK timeout: {:?}, max attempts: {}, ACK loss: {:.2}%",
            config.ack_timeout,
            config.max_attempts,
            config.ack_loss_probability * 100.0
        );
    } else {
        info!("Window: {}, burst interval: {:?}", config.window_size, config.burst_interval);
    }

    let summary = Simulation::new(config)?.run()?;

    for sender in &summary.senders {
        info!(
            "  sender-{}: created={} tx={} retx={} acked={} abandoned={}",
            sender.sender_id,
            sender.created,
            sender.transmissions,
            sender.retransmissions,
            sender.acked,
            sender.abandoned
        );
    }
    info!(
        "  total: tx={} retx={}",
        summary.total_transmissions(),
        summary.total_retransmissions()
    );
    info!(
        "  switch: forwarded={} dropped={} queue_full={}",
        summary.switch.forwarded, summary.switch.dropped_by_loss, summary.switch.dropped_queue_full
    );

    println!("{}", summary.report);
    Ok(())
}
