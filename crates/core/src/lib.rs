#![doc = include_str!("../README.md")]

pub mod config;
pub mod fault;
pub mod logging;
pub mod pipeline;
pub mod record;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 레코드
pub use record::{LogLevel, LogRecord, Metadata};

// 에러
pub use fault::{Fault, FaultKind, FieldErrors};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynLogSource, LogProcessor, LogSource};

// 설정
pub use config::{
    Config, ConfigError, LoggerConfig, ProcessorConfig, SourceConfig, StorageConfig,
};

// 로깅
pub use logging::init_tracing;
