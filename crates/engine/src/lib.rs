#![doc = include_str!("../README.md")]

pub mod engine;
pub mod error;
pub mod factory;
pub mod pool;
pub mod processor;
pub mod source;
pub mod storage;

// --- 주요 타입 re-export ---

// 엔진
pub use engine::{Engine, EngineConfig};

// 에러
pub use error::EngineError;

// 팩토리
pub use factory::{build_engine_config, build_processors, build_sources};

// 풀
pub use pool::{ProcessorMap, ProcessorPool, SourceMap};

// 소스
pub use source::FileSource;

// 처리기
pub use processor::{JsonProcessor, JsonProcessorConfig, LuaProcessor, LuaProcessorConfig};

// 스토리지
pub use storage::{DynStorage, Storage, StorageBuffer};
