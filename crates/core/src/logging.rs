//! 로깅 초기화 — 설정 기반 `tracing-subscriber` 구성
//!
//! [`LoggerConfig`](crate::config::LoggerConfig)의 level/format/output에 따라
//! 전역 tracing subscriber를 설치합니다. `RUST_LOG` 환경 변수가 설정되어
//! 있으면 설정 파일의 레벨보다 우선합니다.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{ConfigError, LoggerConfig};

/// 전역 tracing subscriber를 초기화합니다.
///
/// tracing 매크로를 사용하기 전에 정확히 한 번 호출해야 합니다.
///
/// # 지원 형식
/// - `"json"`: 기계 판독용 JSON 라인
/// - `"text"`: 한 줄 텍스트 (기본값)
/// - `"pretty"`: 사람이 읽기 좋은 여러 줄 출력 (개발용)
pub fn init_tracing(config: &LoggerConfig) -> Result<(), ConfigError> {
    let config_filter =
        EnvFilter::try_new(&config.level).map_err(|e| ConfigError::InvalidValue {
            field: "logger.level".to_owned(),
            reason: e.to_string(),
        })?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(config_filter);

    let writer = match config.output.as_str() {
        "stdout" => BoxMakeWriter::new(std::io::stdout),
        "stderr" => BoxMakeWriter::new(std::io::stderr),
        other => {
            return Err(ConfigError::InvalidValue {
                field: "logger.output".to_owned(),
                reason: format!("unknown output '{other}', expected 'stdout' or 'stderr'"),
            });
        }
    };

    let result = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .try_init(),
        "text" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .try_init(),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(writer))
            .try_init(),
        other => {
            return Err(ConfigError::InvalidValue {
                field: "logger.format".to_owned(),
                reason: format!("unknown format '{other}', expected 'json', 'text' or 'pretty'"),
            });
        }
    };

    result.map_err(|e| ConfigError::InvalidValue {
        field: "logger".to_owned(),
        reason: format!("cannot install tracing subscriber: {e}"),
    })
}
