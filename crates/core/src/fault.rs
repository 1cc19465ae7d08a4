//! 계층 공통 에러 타입 — 네 가지 종류로 태깅되는 [`Fault`]
//!
//! 파이프라인 내부 에러는 각 크레이트의 도메인 에러로 표현되지만,
//! 계층 경계를 넘을 때는 [`Fault`]로 변환됩니다. 호출자는 `kind`만 보고
//! 응답 방식을 결정할 수 있고, `BadInput`의 경우 필드별 메시지 맵을
//! 함께 전달할 수 있습니다.

use std::collections::HashMap;
use std::error::Error as StdError;

/// 에러 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// 분류되지 않은 내부 에러
    #[default]
    Unknown,
    /// 대상을 찾을 수 없음
    NotFound,
    /// 잘못된 입력
    BadInput,
    /// 권한 없음
    PermissionDenied,
}

/// 필드 이름 → 필드별 에러 메시지 목록
pub type FieldErrors = HashMap<String, Vec<String>>;

/// 종류가 태깅된 에러
///
/// 사람이 읽을 메시지와 함께, 선택적으로 필드별 메시지 맵과
/// 원인 에러 체인을 운반합니다.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Fault {
    kind: FaultKind,
    message: String,
    field_errors: Option<FieldErrors>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Fault {
    /// 주어진 종류와 메시지로 새 에러를 생성합니다.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: None,
            source: None,
        }
    }

    /// `BadInput` 에러를 생성합니다.
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::BadInput, message)
    }

    /// `NotFound` 에러를 생성합니다.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound, message)
    }

    /// `PermissionDenied` 에러를 생성합니다.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(FaultKind::PermissionDenied, message)
    }

    /// `Unknown` 에러를 생성합니다.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unknown, message)
    }

    /// 필드별 에러 메시지를 첨부합니다.
    pub fn with_field_errors(mut self, field_errors: FieldErrors) -> Self {
        self.field_errors = Some(field_errors);
        self
    }

    /// 단일 필드에 대한 에러 메시지를 첨부합니다.
    pub fn with_field_error(self, field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        self.with_field_errors(errors)
    }

    /// 원인 에러를 첨부합니다.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// 에러 종류를 반환합니다.
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// 에러 메시지를 반환합니다.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 필드별 에러 메시지를 반환합니다.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_fault_has_kind_and_message() {
        let fault = Fault::new(FaultKind::NotFound, "record not found");
        assert_eq!(fault.kind(), FaultKind::NotFound);
        assert_eq!(fault.message(), "record not found");
        assert!(fault.field_errors().is_none());
    }

    #[test]
    fn constructors_set_expected_kinds() {
        assert_eq!(Fault::bad_input("x").kind(), FaultKind::BadInput);
        assert_eq!(Fault::not_found("x").kind(), FaultKind::NotFound);
        assert_eq!(Fault::permission_denied("x").kind(), FaultKind::PermissionDenied);
        assert_eq!(Fault::unknown("x").kind(), FaultKind::Unknown);
    }

    #[test]
    fn field_errors_are_carried() {
        let fault = Fault::bad_input("validation failed")
            .with_field_error("limit", "Values larger than 1000 are not supported.");

        let errors = fault.field_errors().unwrap();
        assert_eq!(
            errors.get("limit").unwrap(),
            &vec!["Values larger than 1000 are not supported.".to_owned()]
        );
    }

    #[test]
    fn source_is_chained() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let fault = Fault::unknown("cannot open file").with_source(io_err);

        assert_eq!(fault.to_string(), "cannot open file");
        let source = StdError::source(&fault).unwrap();
        assert!(source.to_string().contains("denied"));
    }

    #[test]
    fn display_shows_message_only() {
        let fault = Fault::bad_input("bad limit").with_field_error("limit", "too large");
        assert_eq!(fault.to_string(), "bad limit");
    }
}
