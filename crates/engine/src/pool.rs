//! 처리기 풀 — fan-out 패턴으로 원시 레코드를 병렬 처리합니다.
//!
//! 설정된 수의 워커가 하나의 원시 레코드 채널을 나눠 소비합니다.
//! 각 워커는 레코드의 소스를 이름으로 조회해 그 소스의 처리기 체인을
//! 순서대로 적용하고, 마지막에 새 UUID를 부여한 뒤 결과 채널로 보냅니다.
//!
//! # 정책
//! 파이프라인 생존성을 위해 레코드 단위 실패는 엔진을 멈추지 않습니다.
//! - 소스를 찾을 수 없는 레코드: 로그 후 그대로 전달
//! - 체인에 없는 처리기 이름: 로그 후 해당 링크 생략
//! - 처리기 에러: 로그 후 직전 값을 유지한 채 다음 링크로 진행
//! - UUID 부여는 부분 처리된 레코드에도 무조건 수행
//!
//! 원시 채널이 닫혀 비워지거나 취소 토큰이 취소되면 종료하며,
//! 반환 전에 모든 워커의 종료를 기다립니다.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};
use uuid::Uuid;

use logchute_core::pipeline::{DynLogSource, LogProcessor};
use logchute_core::record::LogRecord;

/// 이름으로 조회하는 소스 라우팅 테이블
pub type SourceMap = HashMap<String, Arc<dyn DynLogSource>>;
/// 이름으로 조회하는 처리기 라우팅 테이블
pub type ProcessorMap = HashMap<String, Arc<dyn LogProcessor>>;

/// 처리기 풀
///
/// 라우팅 테이블은 생성 후 읽기 전용으로 공유됩니다.
pub struct ProcessorPool {
    sources: Arc<SourceMap>,
    processors: Arc<ProcessorMap>,
    workers: usize,
}

impl ProcessorPool {
    /// 새 처리기 풀을 생성합니다.
    pub fn new(sources: Arc<SourceMap>, processors: Arc<ProcessorMap>, workers: usize) -> Self {
        Self {
            sources,
            processors,
            workers,
        }
    }

    /// 워커들을 스폰하고 전부 종료할 때까지 실행합니다.
    ///
    /// `raw`가 닫혀 비워지거나 `cancel`이 취소되면 각 워커가 종료합니다.
    /// 이 메서드가 반환되면 더 이상 `out`으로 전송되는 레코드가 없습니다.
    pub async fn run(
        self,
        cancel: CancellationToken,
        raw: mpsc::Receiver<LogRecord>,
        out: mpsc::Sender<LogRecord>,
    ) {
        // 단일 수신자를 워커들이 나눠 쓰도록 뮤텍스로 감쌈
        let raw = Arc::new(Mutex::new(raw));
        let tracker = TaskTracker::new();

        for worker_id in 0..self.workers {
            let sources = Arc::clone(&self.sources);
            let processors = Arc::clone(&self.processors);
            let raw = Arc::clone(&raw);
            let out = out.clone();
            let cancel = cancel.clone();

            tracker.spawn(async move {
                worker_loop(worker_id, &sources, &processors, cancel, raw, out).await;
            });
        }

        drop(out);
        tracker.close();
        tracker.wait().await;
        debug!(workers = self.workers, "processor pool drained");
    }
}

async fn worker_loop(
    worker_id: usize,
    sources: &SourceMap,
    processors: &ProcessorMap,
    cancel: CancellationToken,
    raw: Arc<Mutex<mpsc::Receiver<LogRecord>>>,
    out: mpsc::Sender<LogRecord>,
) {
    loop {
        let record = tokio::select! {
            _ = cancel.cancelled() => break,
            record = async { raw.lock().await.recv().await } => match record {
                Some(record) => record,
                // 채널이 닫히고 비워짐
                None => break,
            },
        };

        let mut processed = process_record(sources, processors, record);

        // 부분 처리 여부와 관계없이 식별자는 항상 부여
        let id = Uuid::new_v4();
        processed.id = Some(id);
        debug!(worker_id, log_id = %id, "processed log");

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = out.send(processed) => {
                if result.is_err() {
                    warn!(worker_id, "processed log channel closed, stopping worker");
                    break;
                }
            }
        }
    }
}

/// 레코드의 소스에 해당하는 처리기 체인을 적용합니다.
fn process_record(
    sources: &SourceMap,
    processors: &ProcessorMap,
    mut record: LogRecord,
) -> LogRecord {
    let Some(source) = sources.get(&record.source) else {
        error!(source = %record.source, "source not found, forwarding record unprocessed");
        return record;
    };

    for name in source.processor_names() {
        let Some(processor) = processors.get(name) else {
            warn!(processor = %name, "processor not found, skipping");
            continue;
        };

        match processor.process(record.clone()) {
            Ok(next) => record = next,
            Err(e) => {
                error!(processor = %name, error = %e, "failed to process log");
            }
        }
    }

    record
}
