//! 설정 관리 — TOML 설정 파일 파싱 및 유효성 검증
//!
//! 설정 파일은 로거, 스토리지, 처리기 목록, 소스 목록, 그리고 엔진의
//! 버퍼/워커/플러시 수치를 기술합니다. 스토리지/처리기/소스 섹션은
//! kind 문자열로 구현체를 선택하며, kind별 세부 옵션은 원시 TOML
//! 테이블로 운반되어 엔진 팩토리에서 역직렬화됩니다.
//!
//! 유효성 검증은 시작 시 한 번 수행되며, 실패 시 즉시 종료합니다.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fault::Fault;

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 읽을 수 없음
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 설정 파싱 실패
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<ConfigError> for Fault {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::InvalidValue { field, reason } => {
                let (field, reason) = (field.clone(), reason.clone());
                Fault::bad_input("invalid configuration")
                    .with_field_error(field, reason)
                    .with_source(err)
            }
            _ => Fault::unknown("cannot load configuration").with_source(err),
        }
    }
}

/// 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 로거 설정
    #[serde(default)]
    pub logger: LoggerConfig,
    /// 스토리지 설정
    pub storage: StorageConfig,
    /// 처리기 목록
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    /// 소스 목록
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// 원시 레코드 채널 최대 크기
    #[serde(default = "default_raw_logs_buffer_size")]
    pub raw_logs_buffer_size: usize,
    /// 처리 완료 레코드 채널 최대 크기
    #[serde(default = "default_processed_logs_buffer_size")]
    pub processed_logs_buffer_size: usize,
    /// 처리기 풀 워커 수
    #[serde(default = "default_processor_workers")]
    pub processor_workers: usize,
    /// 스토리지 버퍼 플러시 간격 (초, 0이면 주기 플러시 비활성)
    #[serde(default = "default_storage_flush_interval_secs")]
    pub storage_flush_interval_secs: u64,
}

fn default_raw_logs_buffer_size() -> usize {
    1024
}

fn default_processed_logs_buffer_size() -> usize {
    1024
}

fn default_processor_workers() -> usize {
    4
}

fn default_storage_flush_interval_secs() -> u64 {
    5
}

/// 로거 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// 로그 레벨 (debug, info, warn, error)
    pub level: String,
    /// 출력 형식 (json, text, pretty)
    pub format: String,
    /// 출력 대상 (stdout, stderr)
    pub output: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "text".to_owned(),
            output: "stdout".to_owned(),
        }
    }
}

/// 스토리지 설정
///
/// `kind`가 백엔드 구현을 선택하고, `options`는 백엔드별 설정입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 백엔드 종류
    pub kind: String,
    /// 백엔드별 옵션 테이블
    #[serde(default = "empty_table")]
    pub options: toml::Value,
}

/// 처리기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// 처리기 이름 (소스가 이 이름으로 참조)
    pub name: String,
    /// 처리기 종류 (json, lua)
    pub kind: String,
    /// 종류별 옵션 테이블
    #[serde(default = "empty_table")]
    pub options: toml::Value,
}

/// 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 소스 이름 (레코드의 `source` 필드 값)
    pub name: String,
    /// 소스 종류 (file)
    pub kind: String,
    /// 적용할 처리기 이름 목록 (순서 유지)
    #[serde(default)]
    pub processors: Vec<String>,
    /// 종류별 옵션 테이블
    #[serde(default = "empty_table")]
    pub options: toml::Value,
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

impl Config {
    /// 설정 파일을 읽고 파싱한 뒤 유효성을 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sources".to_owned(),
                reason: "at least one log source must be configured".to_owned(),
            });
        }

        if self.storage.kind.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.kind".to_owned(),
                reason: "storage kind must not be empty".to_owned(),
            });
        }

        if self.processed_logs_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "processed_logs_buffer_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.processor_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "processor_workers".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.raw_logs_buffer_size == 0 && self.storage_flush_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "raw_logs_buffer_size".to_owned(),
                reason: "buffer max size and storage flush interval cannot both be zero"
                    .to_owned(),
            });
        }

        // 이름 중복 및 참조 무결성 검사
        let mut source_names = HashSet::new();
        for source in &self.sources {
            if !source_names.insert(source.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "sources".to_owned(),
                    reason: format!("duplicate source name '{}'", source.name),
                });
            }
        }

        let mut processor_names = HashSet::new();
        for processor in &self.processors {
            if !processor_names.insert(processor.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "processors".to_owned(),
                    reason: format!("duplicate processor name '{}'", processor.name),
                });
            }
        }

        for source in &self.sources {
            for name in &source.processors {
                if !processor_names.contains(name.as_str()) {
                    return Err(ConfigError::InvalidValue {
                        field: "sources".to_owned(),
                        reason: format!(
                            "source '{}' references undefined processor '{}'",
                            source.name, name
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        raw_logs_buffer_size = 512
        processed_logs_buffer_size = 256
        processor_workers = 8
        storage_flush_interval_secs = 3

        [logger]
        level = "debug"
        format = "json"
        output = "stderr"

        [storage]
        kind = "clickhouse"
        [storage.options]
        addr = ["127.0.0.1:9000"]
        database = "logs"

        [[processors]]
        name = "nginx-json"
        kind = "json"
        [processors.options]
        level_field = "l"
        message_field = "m"
        timestamp_field = "t"

        [[sources]]
        name = "nginx"
        kind = "file"
        processors = ["nginx-json"]
        [sources.options]
        path = "/var/log/nginx/access.log"
    "#;

    fn sample_config() -> Config {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config
    }

    #[test]
    fn parses_full_sample() {
        let config = sample_config();
        assert_eq!(config.logger.level, "debug");
        assert_eq!(config.storage.kind, "clickhouse");
        assert_eq!(config.processors.len(), 1);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].processors, ["nginx-json".to_owned()]);
        assert_eq!(config.raw_logs_buffer_size, 512);
        assert_eq!(config.processor_workers, 8);
        config.validate().unwrap();
    }

    #[test]
    fn numeric_defaults_apply() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            kind = "clickhouse"

            [[sources]]
            name = "app"
            kind = "file"
            "#,
        )
        .unwrap();
        assert_eq!(config.raw_logs_buffer_size, 1024);
        assert_eq!(config.processed_logs_buffer_size, 1024);
        assert_eq!(config.processor_workers, 4);
        assert_eq!(config.storage_flush_interval_secs, 5);
        assert_eq!(config.logger.level, "info");
    }

    #[test]
    fn validate_rejects_empty_sources() {
        let mut config = sample_config();
        config.sources.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_processed_buffer() {
        let mut config = sample_config();
        config.processed_logs_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = sample_config();
        config.processor_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_both_triggers_disabled() {
        let mut config = sample_config();
        config.raw_logs_buffer_size = 0;
        config.storage_flush_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_allows_one_disabled_trigger() {
        let mut config = sample_config();
        config.raw_logs_buffer_size = 0;
        config.storage_flush_interval_secs = 5;
        config.validate().unwrap();

        let mut config = sample_config();
        config.raw_logs_buffer_size = 100;
        config.storage_flush_interval_secs = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_undefined_processor_reference() {
        let mut config = sample_config();
        config.sources[0].processors.push("missing".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn validate_rejects_duplicate_source_names() {
        let mut config = sample_config();
        let duplicate = config.sources[0].clone();
        config.sources.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_value_converts_to_bad_input_fault() {
        use crate::fault::FaultKind;

        let err = ConfigError::InvalidValue {
            field: "processor_workers".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        let fault: Fault = err.into();
        assert_eq!(fault.kind(), FaultKind::BadInput);
        assert!(fault.field_errors().unwrap().contains_key("processor_workers"));
    }

    #[tokio::test]
    async fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logchute.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.storage.kind, "clickhouse");
    }

    #[tokio::test]
    async fn load_fails_for_missing_file() {
        let result = Config::load("/nonexistent/logchute.toml").await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
