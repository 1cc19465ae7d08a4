//! 컴포넌트 팩토리 — 설정의 kind 문자열로 구현체를 조립합니다.
//!
//! 설정 파일의 소스/처리기 항목을 실제 구현체로 변환합니다.
//! kind별 옵션 테이블은 여기서 구체 타입으로 역직렬화되며, 옵션이
//! 잘못되었거나 kind를 모르면 시작 시점에 실패합니다.
//!
//! 스토리지 백엔드는 외부 협력자이므로 호출자가 조립해 전달합니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use logchute_core::config::Config;

use crate::engine::EngineConfig;
use crate::error::EngineError;
use crate::pool::{ProcessorMap, SourceMap};
use crate::processor::{JsonProcessor, JsonProcessorConfig, LuaProcessor, LuaProcessorConfig};
use crate::source::FileSource;
use crate::storage::DynStorage;

/// 파일 소스 옵션
#[derive(Debug, Clone, Deserialize)]
struct FileSourceOptions {
    /// 감시할 파일 경로
    path: PathBuf,
}

/// kind별 옵션 테이블을 구체 타입으로 역직렬화합니다.
fn parse_options<T: DeserializeOwned>(
    section: &str,
    name: &str,
    options: &toml::Value,
) -> Result<T, EngineError> {
    options.clone().try_into().map_err(|e| EngineError::Config {
        field: section.to_owned(),
        reason: format!("invalid options for '{name}': {e}"),
    })
}

/// 설정의 소스 목록을 구현체 테이블로 조립합니다.
pub fn build_sources(config: &Config) -> Result<SourceMap, EngineError> {
    let mut sources = SourceMap::new();

    for source_config in &config.sources {
        let source = match source_config.kind.as_str() {
            "file" => {
                let options: FileSourceOptions =
                    parse_options("sources", &source_config.name, &source_config.options)?;
                Arc::new(FileSource::new(
                    source_config.name.clone(),
                    options.path,
                    source_config.processors.clone(),
                )) as _
            }
            other => {
                return Err(EngineError::Config {
                    field: "sources".to_owned(),
                    reason: format!(
                        "invalid source kind '{other}' for '{}'",
                        source_config.name
                    ),
                });
            }
        };

        sources.insert(source_config.name.clone(), source);
    }

    Ok(sources)
}

/// 설정의 처리기 목록을 구현체 테이블로 조립합니다.
///
/// Lua 처리기의 스크립트 로드 실패는 레코드 단위 실패가 아니라
/// 여기서의 시작 실패입니다.
pub fn build_processors(config: &Config) -> Result<ProcessorMap, EngineError> {
    let mut processors = ProcessorMap::new();

    for processor_config in &config.processors {
        let processor = match processor_config.kind.as_str() {
            "json" => {
                let options: JsonProcessorConfig = parse_options(
                    "processors",
                    &processor_config.name,
                    &processor_config.options,
                )?;
                Arc::new(JsonProcessor::new(options)) as _
            }
            "lua" => {
                let options: LuaProcessorConfig = parse_options(
                    "processors",
                    &processor_config.name,
                    &processor_config.options,
                )?;
                Arc::new(LuaProcessor::new(processor_config.name.clone(), options)?) as _
            }
            other => {
                return Err(EngineError::Config {
                    field: "processors".to_owned(),
                    reason: format!(
                        "invalid processor kind '{other}' for '{}'",
                        processor_config.name
                    ),
                });
            }
        };

        processors.insert(processor_config.name.clone(), processor);
    }

    Ok(processors)
}

/// 검증된 설정과 스토리지로 엔진 런타임 설정을 조립합니다.
pub fn build_engine_config(
    config: &Config,
    storage: Arc<dyn DynStorage>,
) -> Result<EngineConfig, EngineError> {
    Ok(EngineConfig {
        sources: build_sources(config)?,
        processors: build_processors(config)?,
        storage,
        raw_logs_buffer_max_size: config.raw_logs_buffer_size,
        processed_logs_buffer_max_size: config.processed_logs_buffer_size,
        processor_workers: config.processor_workers,
        storage_flush_interval: Duration::from_secs(config.storage_flush_interval_secs),
    })
}
