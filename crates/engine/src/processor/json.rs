//! JSON 로그 처리기
//!
//! `raw_data`를 JSON 객체로 해석하여 설정된 필드 이름에서 타임스탬프,
//! 레벨, 메시지를 추출합니다. 추출된 세 키는 제거되고, 나머지 전체가
//! `metadata`가 됩니다.
//!
//! - 타임스탬프: RFC 3339 문자열. 누락/비문자열/빈 문자열/파싱 실패는 에러
//! - 레벨: 문자열 (대소문자 무시). 누락/비문자열은 에러
//! - 메시지: 누락이거나 문자열이 아니면 에러 없이 빈 문자열

use chrono::{DateTime, Utc};
use serde::Deserialize;

use logchute_core::fault::Fault;
use logchute_core::pipeline::LogProcessor;
use logchute_core::record::{LogLevel, LogRecord};

/// JSON 처리기 설정
#[derive(Debug, Clone, Deserialize)]
pub struct JsonProcessorConfig {
    /// 레벨을 추출할 필드 이름
    #[serde(default = "default_level_field")]
    pub level_field: String,
    /// 메시지를 추출할 필드 이름
    #[serde(default = "default_message_field")]
    pub message_field: String,
    /// 타임스탬프를 추출할 필드 이름
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

fn default_level_field() -> String {
    "level".to_owned()
}

fn default_message_field() -> String {
    "message".to_owned()
}

fn default_timestamp_field() -> String {
    "timestamp".to_owned()
}

impl Default for JsonProcessorConfig {
    fn default() -> Self {
        Self {
            level_field: default_level_field(),
            message_field: default_message_field(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

/// JSON 로그 처리기
#[derive(Debug)]
pub struct JsonProcessor {
    config: JsonProcessorConfig,
}

impl JsonProcessor {
    /// 주어진 필드 매핑으로 새 처리기를 생성합니다.
    pub fn new(config: JsonProcessorConfig) -> Self {
        Self { config }
    }
}

impl Default for JsonProcessor {
    fn default() -> Self {
        Self::new(JsonProcessorConfig::default())
    }
}

impl LogProcessor for JsonProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord, Fault> {
        let value: serde_json::Value = serde_json::from_slice(&record.raw_data)
            .map_err(|e| Fault::bad_input("cannot decode log as json").with_source(e))?;

        let serde_json::Value::Object(mut data) = value else {
            return Err(Fault::bad_input("expected a json object at top level"));
        };

        // 타임스탬프 추출
        let timestamp = match data.remove(&self.config.timestamp_field) {
            Some(serde_json::Value::String(raw)) if !raw.is_empty() => {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        Fault::bad_input(format!("cannot parse timestamp '{raw}'"))
                            .with_source(e)
                    })?
            }
            _ => {
                return Err(Fault::bad_input(
                    "timestamp field is missing or not a string",
                ));
            }
        };

        // 레벨 추출
        let level = match data.remove(&self.config.level_field) {
            Some(serde_json::Value::String(raw)) => LogLevel::parse(&raw),
            _ => {
                return Err(Fault::bad_input("level field is missing or not a string"));
            }
        };

        // 메시지 추출 (누락은 에러가 아님)
        let message = match data.remove(&self.config.message_field) {
            Some(serde_json::Value::String(message)) => message,
            _ => String::new(),
        };

        Ok(LogRecord {
            id: record.id,
            source: record.source,
            raw_data: record.raw_data,
            level,
            timestamp,
            message,
            metadata: data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn processor_with_short_fields() -> JsonProcessor {
        JsonProcessor::new(JsonProcessorConfig {
            level_field: "l".to_owned(),
            message_field: "m".to_owned(),
            timestamp_field: "t".to_owned(),
        })
    }

    fn raw_record(data: &str) -> LogRecord {
        LogRecord::raw("test", Bytes::copy_from_slice(data.as_bytes()))
    }

    #[test]
    fn extracts_configured_fields() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"warn","m":"disk","t":"2024-01-02T03:04:05Z","host":"a"}"#);

        let processed = processor.process(record).unwrap();
        assert_eq!(processed.level, LogLevel::Warn);
        assert_eq!(processed.message, "disk");
        assert_eq!(
            processed.timestamp,
            "2024-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(processed.metadata.len(), 1);
        assert_eq!(processed.metadata.get("host"), Some(&serde_json::json!("a")));
    }

    #[test]
    fn keeps_source_and_raw_data() {
        let processor = processor_with_short_fields();
        let data = r#"{"l":"info","m":"ok","t":"2024-01-02T03:04:05Z"}"#;

        let processed = processor.process(raw_record(data)).unwrap();
        assert_eq!(processed.source, "test");
        assert_eq!(processed.raw_data.as_ref(), data.as_bytes());
    }

    #[test]
    fn extracted_keys_are_removed_from_metadata() {
        let processor = processor_with_short_fields();
        let record =
            raw_record(r#"{"l":"info","m":"ok","t":"2024-01-02T03:04:05Z","a":1,"b":true}"#);

        let processed = processor.process(record).unwrap();
        assert!(!processed.metadata.contains_key("l"));
        assert!(!processed.metadata.contains_key("m"));
        assert!(!processed.metadata.contains_key("t"));
        assert!(processed.metadata.contains_key("a"));
        assert!(processed.metadata.contains_key("b"));
    }

    #[test]
    fn nested_metadata_is_preserved() {
        let processor = processor_with_short_fields();
        let record = raw_record(
            r#"{"l":"info","t":"2024-01-02T03:04:05Z","request":{"path":"/api","status":200}}"#,
        );

        let processed = processor.process(record).unwrap();
        assert_eq!(
            processed.metadata.get("request"),
            Some(&serde_json::json!({"path": "/api", "status": 200}))
        );
    }

    #[test]
    fn missing_timestamp_is_an_error() {
        let processor = processor_with_short_fields();
        let err = processor.process(raw_record(r#"{"l":"info","m":"x"}"#)).unwrap_err();
        assert!(err.to_string().contains("timestamp field"));
    }

    #[test]
    fn non_string_timestamp_is_an_error() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"info","t":1704164645}"#);
        assert!(processor.process(record).is_err());
    }

    #[test]
    fn empty_timestamp_is_an_error() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"info","t":""}"#);
        assert!(processor.process(record).is_err());
    }

    #[test]
    fn unparseable_timestamp_is_an_error() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"info","t":"yesterday"}"#);
        let err = processor.process(record).unwrap_err();
        assert!(err.to_string().contains("cannot parse timestamp"));
    }

    #[test]
    fn missing_level_is_an_error() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"m":"x","t":"2024-01-02T03:04:05Z"}"#);
        let err = processor.process(record).unwrap_err();
        assert!(err.to_string().contains("level field"));
    }

    #[test]
    fn non_string_level_is_an_error() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":3,"t":"2024-01-02T03:04:05Z"}"#);
        assert!(processor.process(record).is_err());
    }

    #[test]
    fn unknown_level_string_parses_as_unknown() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"verbose","t":"2024-01-02T03:04:05Z"}"#);
        let processed = processor.process(record).unwrap();
        assert_eq!(processed.level, LogLevel::Unknown);
    }

    #[test]
    fn missing_message_defaults_to_empty() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"info","t":"2024-01-02T03:04:05Z"}"#);
        let processed = processor.process(record).unwrap();
        assert!(processed.message.is_empty());
    }

    #[test]
    fn non_string_message_defaults_to_empty_and_is_removed() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"info","m":42,"t":"2024-01-02T03:04:05Z"}"#);
        let processed = processor.process(record).unwrap();
        assert!(processed.message.is_empty());
        assert!(!processed.metadata.contains_key("m"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let processor = processor_with_short_fields();
        assert!(processor.process(raw_record("not json at all")).is_err());
    }

    #[test]
    fn non_object_root_is_an_error() {
        let processor = processor_with_short_fields();
        assert!(processor.process(raw_record(r#"["a","b"]"#)).is_err());
        assert!(processor.process(raw_record("42")).is_err());
    }

    #[test]
    fn default_config_uses_conventional_field_names() {
        let processor = JsonProcessor::default();
        let record = raw_record(
            r#"{"level":"error","message":"boom","timestamp":"2024-01-02T03:04:05Z"}"#,
        );
        let processed = processor.process(record).unwrap();
        assert_eq!(processed.level, LogLevel::Error);
        assert_eq!(processed.message, "boom");
    }

    #[test]
    fn timestamp_with_offset_is_normalized_to_utc() {
        let processor = processor_with_short_fields();
        let record = raw_record(r#"{"l":"info","t":"2024-01-02T12:04:05+09:00"}"#);
        let processed = processor.process(record).unwrap();
        assert_eq!(
            processed.timestamp,
            "2024-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn processing_arbitrary_bytes_does_not_panic(
                bytes in prop::collection::vec(any::<u8>(), 0..512)
            ) {
                let processor = processor_with_short_fields();
                let record = LogRecord::raw("test", Bytes::from(bytes));
                let _ = processor.process(record);
            }

            #[test]
            fn extraction_matches_level_parser_and_strips_keys(
                level in "[a-zA-Z]{1,10}",
                message in "[a-zA-Z0-9 ]{0,40}",
                extra_key in "[a-z]{2,10}",
                extra_value in "[a-zA-Z0-9]{0,20}"
            ) {
                let processor = processor_with_short_fields();
                let mut object = serde_json::Map::new();
                object.insert("l".to_owned(), serde_json::json!(level.clone()));
                object.insert("m".to_owned(), serde_json::json!(message.clone()));
                object.insert("t".to_owned(), serde_json::json!("2024-01-02T03:04:05Z"));
                object.insert(extra_key.clone(), serde_json::json!(extra_value.clone()));
                let raw = serde_json::Value::Object(object).to_string();
                let record = LogRecord::raw("test", Bytes::from(raw));

                let processed = processor.process(record).unwrap();
                prop_assert_eq!(processed.level, LogLevel::parse(&level));
                prop_assert_eq!(processed.message, message);
                prop_assert!(!processed.metadata.contains_key("l"));
                prop_assert!(!processed.metadata.contains_key("m"));
                prop_assert!(!processed.metadata.contains_key("t"));
                prop_assert_eq!(
                    processed.metadata.get(&extra_key),
                    Some(&serde_json::Value::String(extra_value))
                );
            }
        }
    }
}
