//! 엔진 — 소스/풀/버퍼의 조립과 생명주기 관리
//!
//! [`Engine::run`]은 다음을 시작합니다.
//!
//! 1. 소스마다 태스크 하나 — 원시 채널로 fan-in
//! 2. 처리기 풀 — 원시 채널을 소비해 처리 완료 채널로 fan-out
//! 3. 스토리지 버퍼의 주기 플러시 루프
//! 4. 처리 완료 채널을 읽어 버퍼에 넘기는 펌프 루프
//!
//! 원시 채널은 마지막 소스가 반환하면서 송신자가 모두 해제될 때 닫히고,
//! 그 뒤 풀이 잔여 레코드를 비우고 처리 완료 채널을 닫습니다.
//! 취소 시에는 풀과 버퍼가 비워질 때까지 기다린 뒤 취소 에러를
//! 반환합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::error::EngineError;
use crate::pool::{ProcessorMap, ProcessorPool, SourceMap};
use crate::storage::{DynStorage, StorageBuffer};

/// 엔진 런타임 설정
///
/// 소스/처리기/스토리지는 이미 조립된 구현체로 전달됩니다.
/// 설정 파일로부터의 조립은 [`factory`](crate::factory)가 담당합니다.
pub struct EngineConfig {
    /// 이름으로 조회하는 소스 테이블
    pub sources: SourceMap,
    /// 이름으로 조회하는 처리기 테이블
    pub processors: ProcessorMap,
    /// 저장 백엔드
    pub storage: Arc<dyn DynStorage>,
    /// 원시 채널 용량이자 스토리지 배치 최대 크기 (0이면 크기 트리거 비활성)
    pub raw_logs_buffer_max_size: usize,
    /// 처리 완료 채널 용량
    pub processed_logs_buffer_max_size: usize,
    /// 처리기 풀 워커 수
    pub processor_workers: usize,
    /// 스토리지 버퍼 플러시 간격 (0이면 주기 트리거 비활성)
    pub storage_flush_interval: Duration,
}

impl EngineConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sources.is_empty() {
            return Err(EngineError::Config {
                field: "sources".to_owned(),
                reason: "no log sources are configured".to_owned(),
            });
        }

        if self.processed_logs_buffer_max_size == 0 {
            return Err(EngineError::Config {
                field: "processed_logs_buffer_max_size".to_owned(),
                reason: "cannot be zero".to_owned(),
            });
        }

        if self.processor_workers == 0 {
            return Err(EngineError::Config {
                field: "processor_workers".to_owned(),
                reason: "cannot be zero".to_owned(),
            });
        }

        if self.raw_logs_buffer_max_size == 0 && self.storage_flush_interval.is_zero() {
            return Err(EngineError::Config {
                field: "raw_logs_buffer_max_size".to_owned(),
                reason: "buffer max size and storage flush interval cannot both be zero"
                    .to_owned(),
            });
        }

        Ok(())
    }
}

/// 수집 엔진
///
/// 소스, 처리기 풀, 스토리지 버퍼를 묶어 하나의 생명주기로 실행합니다.
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// 설정을 검증하고 새 엔진을 생성합니다.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 엔진을 실행합니다.
    ///
    /// 취소 토큰이 취소되면 풀과 버퍼가 비워지기를 기다린 뒤
    /// [`EngineError::Cancelled`]를 반환합니다. 모든 소스가 스스로
    /// 종료하면 잔여 레코드를 플러시하고 `Ok(())`를 반환합니다.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), EngineError> {
        let EngineConfig {
            sources,
            processors,
            storage,
            raw_logs_buffer_max_size,
            processed_logs_buffer_max_size,
            processor_workers,
            storage_flush_interval,
        } = self.config;

        let sources = Arc::new(sources);
        let processors = Arc::new(processors);

        // 용량 0인 트리거 설정도 채널 자체는 최소 1칸이 필요함
        let (raw_tx, raw_rx) = mpsc::channel(raw_logs_buffer_max_size.max(1));
        let (processed_tx, mut processed_rx) = mpsc::channel(processed_logs_buffer_max_size);
        info!(
            size = raw_logs_buffer_max_size,
            "created incoming logs channel"
        );

        // 1. 소스 태스크 스폰.
        // 엔진이 들고 있던 송신자를 버리므로, 마지막 소스가 반환하는
        // 순간 원시 채널이 닫힘 (집계자 역할).
        let source_tracker = TaskTracker::new();
        for (name, source) in sources.iter() {
            let source = Arc::clone(source);
            let raw_tx = raw_tx.clone();
            let cancel = cancel.clone();
            let name = name.clone();
            source_tracker.spawn(async move {
                if let Err(e) = source.provide(cancel, raw_tx).await {
                    error!(source = %name, error = %e, "log source terminated with error");
                }
            });
        }
        source_tracker.close();
        drop(raw_tx);

        // 2. 처리기 풀
        let pool = ProcessorPool::new(
            Arc::clone(&sources),
            Arc::clone(&processors),
            processor_workers,
        );
        let pool_handle = tokio::spawn(pool.run(cancel.clone(), raw_rx, processed_tx));

        // 3. 스토리지 버퍼.
        // 소스가 자연 종료한 경우에도 최종 플러시를 트리거할 수 있도록
        // 자식 토큰으로 실행.
        let buffer = Arc::new(StorageBuffer::new(
            storage,
            raw_logs_buffer_max_size,
            storage_flush_interval,
        ));
        let buffer_cancel = cancel.child_token();
        let buffer_handle = {
            let buffer = Arc::clone(&buffer);
            let buffer_cancel = buffer_cancel.clone();
            tokio::spawn(async move { buffer.run(buffer_cancel).await })
        };

        info!(
            sources = sources.len(),
            workers = processor_workers,
            "engine started"
        );

        // 4. 펌프 루프: 처리 완료 레코드를 버퍼로
        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Err(EngineError::Cancelled),
                record = processed_rx.recv() => match record {
                    Some(record) => buffer.add(vec![record]),
                    // 모든 소스가 종료하고 풀이 비워짐
                    None => break Ok(()),
                }
            }
        };

        // 종료 절차: 풀과 소스의 종료를 기다린 뒤 버퍼를 마지막으로 비움
        if pool_handle.await.is_err() {
            error!("processor pool task panicked");
        }
        source_tracker.wait().await;
        buffer_cancel.cancel();
        if buffer_handle.await.is_err() {
            error!("storage buffer task panicked");
        }

        info!("engine stopped");
        result
    }
}
