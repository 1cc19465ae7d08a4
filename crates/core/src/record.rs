//! 로그 레코드 모델 — 파이프라인 전체가 공유하는 표준 레코드
//!
//! 모든 소스와 처리기는 [`LogRecord`]를 주고받습니다.
//! 소스는 `source`/`raw_data`/`timestamp`만 채운 원시 레코드를 생성하고,
//! 처리기 체인이 `level`/`message`/`metadata`를 채우며,
//! 처리기 풀이 마지막에 `id`를 할당합니다.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 로그 레벨
///
/// 전순서를 가집니다 (`Unknown < Debug < Info < Warn < Error < Fatal`).
/// 알 수 없는 입력은 항상 [`LogLevel::Unknown`]으로 파싱됩니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// 파싱 불가 또는 미지정
    #[default]
    Unknown,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// 문자열에서 로그 레벨을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며, 인식할 수 없는 입력은 `Unknown`이 됩니다.
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            "fatal" => Self::Fatal,
            _ => Self::Unknown,
        }
    }

    /// 레벨의 대문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 레코드 메타데이터 — 중첩 가능한 JSON 객체
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// 로그 레코드
///
/// 소스가 생성한 원시 상태부터 저장 직전의 처리 완료 상태까지
/// 같은 타입으로 표현됩니다. 처리 완료 후에는 `id`, `source`,
/// `timestamp`가 항상 채워져 있습니다.
///
/// 직렬화 시 `raw_data`는 제외되며, `id`는 할당된 경우에만 포함됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// 처리 시점에 할당되는 고유 식별자
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// 레코드를 생성한 소스의 설정상 이름
    pub source: String,
    /// 원본 라인 바이트 (직렬화 제외)
    #[serde(skip)]
    pub raw_data: Bytes,
    /// 로그 레벨
    pub level: LogLevel,
    /// 타임스탬프 (밀리초 정밀도 RFC 3339로 직렬화)
    #[serde(with = "rfc3339_millis")]
    pub timestamp: DateTime<Utc>,
    /// 로그 메시지
    pub message: String,
    /// 추출 필드 이외의 나머지 구조화 데이터
    #[serde(default)]
    pub metadata: Metadata,
}

impl LogRecord {
    /// 소스가 방금 읽어들인 원시 레코드를 생성합니다.
    ///
    /// `timestamp`는 수집 시각이며, 나머지 필드는 처리기 체인이 채웁니다.
    pub fn raw(source: impl Into<String>, raw_data: Bytes) -> Self {
        Self {
            id: None,
            source: source.into(),
            raw_data,
            level: LogLevel::Unknown,
            timestamp: Utc::now(),
            message: String::new(),
            metadata: Metadata::new(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.level,
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.source,
            self.message,
        )
    }
}

/// 밀리초 정밀도 RFC 3339 타임스탬프 serde 모듈
pub mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
