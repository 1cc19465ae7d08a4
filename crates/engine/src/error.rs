//! 엔진 에러 타입
//!
//! [`EngineError`]는 수집 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<EngineError> for Fault` 변환이 구현되어 있어 계층 경계에서
//! `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logchute_core::fault::Fault;

/// 수집 엔진 도메인 에러
///
/// 설정 검증, 소스 I/O, 처리기 실행, 채널 통신 등 엔진 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 소스 에러 (파일 열기, 감시자 등)
    #[error("source error: {name}: {reason}")]
    Source {
        /// 소스 이름
        name: String,
        /// 에러 사유
        reason: String,
    },

    /// 처리기 에러
    #[error("processor error: {name}: {reason}")]
    Processor {
        /// 처리기 이름
        name: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 실행이 취소됨
    #[error("engine cancelled")]
    Cancelled,

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for Fault {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::Config { field, reason } => {
                let (field, reason) = (field.clone(), reason.clone());
                Fault::bad_input("invalid engine configuration")
                    .with_field_error(field, reason)
                    .with_source(err)
            }
            _ => {
                let message = err.to_string();
                Fault::unknown(message).with_source(err)
            }
        }
    }
}
