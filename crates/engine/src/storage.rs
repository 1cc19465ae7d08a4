//! 스토리지 인터페이스와 버퍼 — 크기/시간 트리거 배치 플러시
//!
//! [`Storage`]는 엔진이 저장 백엔드에 요구하는 쓰기 계약입니다.
//! [`StorageBuffer`]는 처리 완료 레코드를 모아 두 가지 조건으로
//! 플러시합니다.
//!
//! - 배치가 설정된 최대 크기에 도달하면 즉시 (크기가 0이면 비활성)
//! - 설정된 주기마다 (주기가 0이면 비활성)
//!
//! 뮤텍스는 버퍼 교체(swap)만 보호하며, 스토리지 호출은 락 밖에서
//! 별도 태스크로 실행됩니다. 취소 시에는 남은 배치를 마지막으로
//! 플러시한 뒤 진행 중인 플러시가 모두 끝나기를 기다립니다.
//! 스토리지 에러는 로그로 남기고 엔진을 중단하지 않습니다.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use logchute_core::fault::Fault;
use logchute_core::pipeline::BoxFuture;
use logchute_core::record::LogRecord;

/// 배치당 스토리지 호출 제한 시간
const STORE_TIMEOUT: Duration = Duration::from_secs(60);

/// 스토리지 쓰기 trait — 엔진이 요구하는 백엔드 계약
///
/// 배치 단위 삽입이며, 배치 내 원자성은 요구되지 않습니다.
pub trait Storage: Send + Sync {
    /// 처리 완료 레코드 배치를 저장합니다.
    fn store_processed_logs(
        &self,
        records: Vec<LogRecord>,
    ) -> impl Future<Output = Result<(), Fault>> + Send;
}

/// dyn-compatible 스토리지 trait
///
/// [`Storage`] 구현 타입은 blanket impl으로 자동으로 이 trait도 구현합니다.
pub trait DynStorage: Send + Sync {
    /// 처리 완료 레코드 배치를 저장합니다.
    fn store_processed_logs(&self, records: Vec<LogRecord>) -> BoxFuture<'_, Result<(), Fault>>;
}

impl<T: Storage> DynStorage for T {
    fn store_processed_logs(&self, records: Vec<LogRecord>) -> BoxFuture<'_, Result<(), Fault>> {
        Box::pin(Storage::store_processed_logs(self, records))
    }
}

/// 크기/시간 트리거 스토리지 버퍼
pub struct StorageBuffer {
    storage: Arc<dyn DynStorage>,
    buffer: Mutex<Vec<LogRecord>>,
    /// 진행 중인 플러시 태스크 추적
    tracker: TaskTracker,
    /// 배치 최대 크기 (0이면 크기 트리거 비활성)
    max_size: usize,
    /// 주기 플러시 간격 (0이면 주기 트리거 비활성)
    flush_interval: Duration,
}

impl StorageBuffer {
    /// 새 스토리지 버퍼를 생성합니다.
    ///
    /// `max_size`와 `flush_interval` 중 적어도 하나는 0이 아니어야 하며,
    /// 이는 엔진 설정 검증에서 보장됩니다.
    pub fn new(storage: Arc<dyn DynStorage>, max_size: usize, flush_interval: Duration) -> Self {
        Self {
            storage,
            buffer: Mutex::new(Vec::with_capacity(max_size)),
            tracker: TaskTracker::new(),
            max_size,
            flush_interval,
        }
    }

    /// 처리 완료 레코드를 버퍼에 추가합니다.
    ///
    /// 배치가 최대 크기에 도달하면 락 안에서 버퍼를 교체한 뒤
    /// 교체된 배치를 비동기로 플러시합니다.
    pub fn add(&self, records: Vec<LogRecord>) {
        if records.is_empty() {
            return;
        }

        let to_flush = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            buffer.extend(records);

            if self.max_size > 0 && buffer.len() >= self.max_size {
                Some(std::mem::replace(
                    &mut *buffer,
                    Vec::with_capacity(self.max_size),
                ))
            } else {
                None
            }
        };

        if let Some(batch) = to_flush {
            self.dispatch_flush(batch);
        }
    }

    /// 주기 플러시 루프를 실행합니다.
    ///
    /// 취소되면 남은 배치를 마지막으로 플러시하고, 진행 중인 플러시가
    /// 모두 끝난 뒤 반환합니다.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = if self.flush_interval.is_zero() {
            None
        } else {
            let start = tokio::time::Instant::now() + self.flush_interval;
            let mut ticker = tokio::time::interval_at(start, self.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(ticker)
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.flush_pending();
                    self.tracker.close();
                    self.tracker.wait().await;
                    debug!("storage buffer drained");
                    return;
                }
                _ = tick(&mut ticker) => {
                    self.flush_pending();
                }
            }
        }
    }

    /// 현재 버퍼에 있는 내용을 전부 플러시합니다.
    fn flush_pending(&self) {
        let to_flush = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if buffer.is_empty() {
                None
            } else {
                Some(std::mem::replace(
                    &mut *buffer,
                    Vec::with_capacity(self.max_size),
                ))
            }
        };

        if let Some(batch) = to_flush {
            self.dispatch_flush(batch);
        }
    }

    /// 배치를 별도 태스크에서 스토리지로 보냅니다.
    fn dispatch_flush(&self, batch: Vec<LogRecord>) {
        let storage = Arc::clone(&self.storage);
        self.tracker.spawn(async move {
            let count = batch.len();
            match tokio::time::timeout(STORE_TIMEOUT, storage.store_processed_logs(batch)).await {
                Ok(Ok(())) => debug!(count, "flushed processed logs"),
                Ok(Err(e)) => error!(error = %e, count, "failed to flush processed logs"),
                Err(_) => error!(count, "timed out flushing processed logs"),
            }
        });
    }

    /// 현재 버퍼에 대기 중인 레코드 수를 반환합니다.
    pub fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// 주기 트리거가 비활성이면 영원히 대기하는 틱 future
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
